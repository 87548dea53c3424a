//! PEM 文本解码器
//!
//! 支持 `CERTIFICATE`、`PRIVATE KEY`、`RSA PRIVATE KEY`、`EC PRIVATE KEY`
//! 和 `ENCRYPTED PRIVATE KEY`。加密私钥原样保存在证书库中，
//! 由身份管理器工厂用口令解锁。
//!
//! 含私钥时整个文件是一个身份（别名 `identity`），全部证书按出现顺序组成证书链；
//! 不含私钥时每个证书是一个受信任证书条目（别名 `cert-N`）。

use rustls_pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};

use super::StoreDecoder;
use crate::error::DecodeError;
use crate::secret::Passphrase;
use crate::store::{CredentialStore, IdentityEntry, KeyMaterial, StoreEntry};

const NAME: &str = "pem";
const PEM_MARKER: &[u8] = b"-----BEGIN ";

#[derive(Debug, Default, Clone, Copy)]
pub struct PemBundleDecoder;

impl StoreDecoder for PemBundleDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn recognizes(&self, bytes: &[u8]) -> bool {
        bytes
            .windows(PEM_MARKER.len())
            .any(|window| window == PEM_MARKER)
    }

    fn decode(&self, bytes: &[u8], _passphrase: &Passphrase) -> Result<CredentialStore, DecodeError> {
        let blocks = pem::parse_many(bytes).map_err(|e| DecodeError::malformed(NAME, e.to_string()))?;

        let mut certs = Vec::new();
        let mut key = None;
        for block in blocks {
            let contents = block.contents().to_vec();
            let material = match block.tag() {
                "CERTIFICATE" => {
                    certs.push(CertificateDer::from(contents));
                    continue;
                }
                "PRIVATE KEY" => KeyMaterial::Plain(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(contents))),
                "RSA PRIVATE KEY" => KeyMaterial::Plain(PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(contents))),
                "EC PRIVATE KEY" => KeyMaterial::Plain(PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(contents))),
                "ENCRYPTED PRIVATE KEY" => KeyMaterial::EncryptedPkcs8(contents),
                other => {
                    tracing::debug!("Skipping PEM block '{}'", other);
                    continue;
                }
            };
            if key.replace(material).is_some() {
                return Err(DecodeError::malformed(NAME, "more than one private key in PEM bundle"));
            }
        }

        let mut store = CredentialStore::new();
        match key {
            Some(key) => {
                if certs.is_empty() {
                    return Err(DecodeError::malformed(NAME, "private key without a certificate"));
                }
                store
                    .insert("identity", StoreEntry::Identity(IdentityEntry::new(key, certs)))
                    .map_err(|e| DecodeError::malformed(NAME, e.to_string()))?;
            }
            None => {
                if certs.is_empty() {
                    return Err(DecodeError::malformed(NAME, "no certificates or keys found"));
                }
                for (index, cert) in certs.into_iter().enumerate() {
                    store
                        .insert(format!("cert-{}", index + 1), StoreEntry::TrustedCertificate(cert))
                        .map_err(|e| DecodeError::malformed(NAME, e.to_string()))?;
                }
            }
        }

        Ok(store)
    }
}
