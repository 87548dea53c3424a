//! 纯 Rust 的 PKCS#12 解码器（主解码器）
//!
//! 保留证书库中的全部条目及其别名，支持包含多个身份的证书库。

use p12_keystore::error::Error as Pkcs12Error;
use p12_keystore::{KeyStore, KeyStoreEntry};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use super::{StoreDecoder, looks_like_der};
use crate::error::DecodeError;
use crate::secret::Passphrase;
use crate::store::{CredentialStore, IdentityEntry, KeyMaterial, StoreEntry};

const NAME: &str = "pkcs12";

#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs12Decoder;

impl StoreDecoder for Pkcs12Decoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognizes(&self, bytes: &[u8]) -> bool {
        looks_like_der(bytes)
    }

    fn decode(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<CredentialStore, DecodeError> {
        let keystore =
            KeyStore::from_pkcs12(bytes, passphrase.expose()).map_err(|e| classify(&e))?;

        let mut store = CredentialStore::new();
        for (alias, entry) in keystore.entries() {
            let entry = match entry {
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(chain.key().to_vec()));
                    let certs = chain
                        .chain()
                        .iter()
                        .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
                        .collect();
                    StoreEntry::Identity(IdentityEntry::new(KeyMaterial::Plain(key), certs))
                }
                KeyStoreEntry::Certificate(cert) => {
                    StoreEntry::TrustedCertificate(CertificateDer::from(cert.as_der().to_vec()))
                }
            };
            store
                .insert(alias.to_string(), entry)
                .map_err(|e| DecodeError::malformed(NAME, e.to_string()))?;
        }

        Ok(store)
    }
}

/// MAC 不匹配，或（无 MAC 的证书库）解密后填充错误，都意味着口令不对
fn classify(err: &Pkcs12Error) -> DecodeError {
    match err {
        Pkcs12Error::MacError(_) | Pkcs12Error::UnpadError | Pkcs12Error::Pkcs5Error(_) => {
            DecodeError::bad_passphrase(NAME, err.to_string())
        }
        _ => DecodeError::malformed(NAME, err.to_string()),
    }
}
