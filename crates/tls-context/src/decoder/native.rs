//! 基于 OpenSSL 的 PKCS#12 解码器（备用解码器）
//!
//! OpenSSL 的 PKCS#12 接口最多给出一个身份（私钥 + 叶子证书 + 其余证书）。
//! 身份的证书链沿签发关系从叶子向上拼接；链外的 CA 证书作为受信任证书条目，
//! 链外还有终端实体证书时说明证书库包含多个身份，本解码器无法完整表示，按格式错误处理。
//! 别名取 friendlyName，缺失时为 `entry-N`。

use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::{X509, X509Ref, X509VerifyResult};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use super::{StoreDecoder, looks_like_der};
use crate::error::DecodeError;
use crate::secret::Passphrase;
use crate::store::{CredentialStore, IdentityEntry, KeyMaterial, StoreEntry};

const NAME: &str = "openssl-pkcs12";

// 口令错误对应的 OpenSSL 库/原因代码（pkcs12err.h、evperr.h）
const ERR_LIB_EVP: i32 = 6;
const ERR_LIB_PKCS12: i32 = 35;
const EVP_R_BAD_DECRYPT: i32 = 100;
const PKCS12_R_MAC_VERIFY_FAILURE: i32 = 113;
const PKCS12_R_PKCS12_CIPHERFINAL_ERROR: i32 = 116;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativePkcs12Decoder;

impl StoreDecoder for NativePkcs12Decoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognizes(&self, bytes: &[u8]) -> bool {
        looks_like_der(bytes)
    }

    fn decode(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<CredentialStore, DecodeError> {
        let pkcs12 =
            Pkcs12::from_der(bytes).map_err(|e| DecodeError::malformed(NAME, describe(&e)))?;
        let parsed = pkcs12.parse2(passphrase.expose()).map_err(|e| {
            if rejects_passphrase(&e) {
                DecodeError::bad_passphrase(NAME, describe(&e))
            } else {
                DecodeError::malformed(NAME, describe(&e))
            }
        })?;

        let pool: Vec<X509> = parsed
            .ca
            .map(|ca| ca.iter().map(ToOwned::to_owned).collect())
            .unwrap_or_default();

        let mut store = CredentialStore::new();
        match (parsed.pkey, parsed.cert) {
            (Some(pkey), Some(leaf)) => {
                let pkcs8 = pkey
                    .private_key_to_pkcs8()
                    .map_err(|e| DecodeError::malformed(NAME, describe(&e)))?;
                let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pkcs8));
                let alias = alias_of(&leaf).unwrap_or_else(|| "entry-1".to_string());
                let (chain, rest) = issuer_chain(leaf, pool);

                let mut anchors = Vec::new();
                for cert in rest {
                    if !is_ca(&cert)? {
                        return Err(DecodeError::malformed(
                            NAME,
                            format!(
                                "end-entity certificate '{}' has no private key visible to OpenSSL; \
                                 the store holds more than one identity",
                                alias_of(&cert).unwrap_or_default()
                            ),
                        ));
                    }
                    anchors.push(cert);
                }

                let chain = chain
                    .iter()
                    .map(|cert| to_der(cert))
                    .collect::<Result<Vec<_>, _>>()?;
                let identity = IdentityEntry::new(KeyMaterial::Plain(key), chain);
                insert(&mut store, alias, StoreEntry::Identity(identity))?;
                insert_trusted(&mut store, anchors)?;
            }
            (Some(_), None) => {
                return Err(DecodeError::malformed(
                    NAME,
                    "private key without a matching certificate",
                ));
            }
            (None, leaf) => {
                let certs = leaf.into_iter().chain(pool).collect();
                insert_trusted(&mut store, certs)?;
            }
        }

        Ok(store)
    }
}

/// 从叶子证书沿签发关系向上拼出证书链，返回链与未用到的证书
fn issuer_chain(leaf: X509, mut pool: Vec<X509>) -> (Vec<X509>, Vec<X509>) {
    let mut chain = vec![leaf.clone()];
    let mut current = leaf;
    while current.issued(&current) != X509VerifyResult::OK {
        let Some(position) = pool
            .iter()
            .position(|candidate| candidate.issued(&current) == X509VerifyResult::OK)
        else {
            break;
        };
        current = pool.remove(position);
        chain.push(current.clone());
    }
    (chain, pool)
}

fn is_ca(cert: &X509Ref) -> Result<bool, DecodeError> {
    let der = cert
        .to_der()
        .map_err(|e| DecodeError::malformed(NAME, describe(&e)))?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| DecodeError::malformed(NAME, e.to_string()))?;
    Ok(parsed.is_ca())
}

fn insert_trusted(store: &mut CredentialStore, certs: Vec<X509>) -> Result<(), DecodeError> {
    for (index, cert) in certs.iter().enumerate() {
        let alias = store.free_alias(
            &alias_of(cert).unwrap_or_else(|| format!("entry-{}", index + 1)),
        );
        insert(store, alias, StoreEntry::TrustedCertificate(to_der(cert)?))?;
    }
    Ok(())
}

/// MAC 校验失败或解密填充错误都意味着口令不对
fn rejects_passphrase(stack: &ErrorStack) -> bool {
    stack.errors().iter().any(|e| {
        matches!(
            (e.library_code(), e.reason_code()),
            (ERR_LIB_PKCS12, PKCS12_R_MAC_VERIFY_FAILURE)
                | (ERR_LIB_PKCS12, PKCS12_R_PKCS12_CIPHERFINAL_ERROR)
                | (ERR_LIB_EVP, EVP_R_BAD_DECRYPT)
        )
    })
}

/// 用口令解开 DER 编码的 EncryptedPrivateKeyInfo，返回明文 PKCS#8
pub(crate) fn decrypt_pkcs8(encrypted: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, String> {
    PKey::private_key_from_pkcs8_passphrase(encrypted, passphrase.expose().as_bytes())
        .and_then(|pkey| pkey.private_key_to_pkcs8())
        .map_err(|e| describe(&e))
}

fn insert(store: &mut CredentialStore, alias: String, entry: StoreEntry) -> Result<(), DecodeError> {
    store
        .insert(alias, entry)
        .map_err(|e| DecodeError::malformed(NAME, e.to_string()))
}

fn alias_of(cert: &X509Ref) -> Option<String> {
    cert.alias()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .filter(|name| !name.is_empty())
}

fn to_der(cert: &X509Ref) -> Result<CertificateDer<'static>, DecodeError> {
    cert.to_der()
        .map(CertificateDer::from)
        .map_err(|e| DecodeError::malformed(NAME, describe(&e)))
}

fn describe(stack: &ErrorStack) -> String {
    let reasons: Vec<_> = stack
        .errors()
        .iter()
        .map(|e| e.reason().unwrap_or("unknown error").to_string())
        .collect();
    if reasons.is_empty() {
        stack.to_string()
    } else {
        reasons.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_der_input_is_not_recognised() {
        assert!(!NativePkcs12Decoder.recognizes(b"hello"));
        assert!(!NativePkcs12Decoder.recognizes(&[]));
    }

    #[test]
    fn truncated_input_is_malformed() {
        let err = NativePkcs12Decoder
            .decode(&[0x30, 0x80], &Passphrase::new("changeit"))
            .unwrap_err();
        assert_eq!(err.decoder, "openssl-pkcs12");
        assert!(!err.is_bad_passphrase());
    }

    #[test]
    fn decrypt_rejects_garbage() {
        assert!(decrypt_pkcs8(&[0x30, 0x00], &Passphrase::new("x")).is_err());
    }
}
