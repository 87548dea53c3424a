//! 身份管理
//!
//! 证书库中的每个身份条目对应一个 [`IdentityManager`]，
//! 握手时由 [`IdentityResolver`] 选出与对端签名算法匹配的身份。

use std::sync::Arc;

use rustls::client::ResolvesClientCert;
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{InconsistentKeys, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, warn};

use crate::decoder::decrypt_pkcs8;
use crate::error::{Result, TlsContextError};
use crate::secret::Passphrase;
use crate::store::{CredentialStore, IdentityEntry, KeyMaterial};

/// 一个可在握手中出示的身份：签名密钥 + 证书链
#[derive(Debug, Clone)]
pub struct IdentityManager {
    alias: String,
    certified: Arc<CertifiedKey>,
}

impl IdentityManager {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certified.cert
    }

    pub fn certified_key(&self) -> &Arc<CertifiedKey> {
        &self.certified
    }

    fn supports(&self, schemes: &[SignatureScheme]) -> bool {
        self.certified.key.choose_scheme(schemes).is_some()
    }
}

/// 从证书库提取身份管理器
pub struct IdentityManagerFactory;

impl IdentityManagerFactory {
    /// 按证书库顺序为每个身份条目生成一个管理器
    ///
    /// 任一条目无法解锁、无法加载或与叶子证书不匹配都会使整个调用失败。
    pub fn derive_identity_managers(
        store: &CredentialStore,
        passphrase: &Passphrase,
        provider: &CryptoProvider,
    ) -> Result<Vec<IdentityManager>> {
        let managers = store
            .identities()
            .map(|(alias, entry)| Self::derive_one(alias, entry, passphrase, provider))
            .collect::<Result<Vec<_>>>()?;

        if managers.is_empty() {
            warn!("Identity store contains no private key entries; no certificate will be presented");
        }
        Ok(managers)
    }

    fn derive_one(
        alias: &str,
        entry: &IdentityEntry,
        passphrase: &Passphrase,
        provider: &CryptoProvider,
    ) -> Result<IdentityManager> {
        let unrecoverable = |reason: String| TlsContextError::UnrecoverableKey {
            alias: alias.to_string(),
            reason,
        };

        if entry.chain.is_empty() {
            return Err(unrecoverable("entry has no certificate chain".to_string()));
        }

        let key = match &entry.key {
            KeyMaterial::Plain(key) => key.clone_key(),
            KeyMaterial::EncryptedPkcs8(encrypted) => {
                let plain = decrypt_pkcs8(encrypted, passphrase).map_err(&unrecoverable)?;
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(plain))
            }
        };

        let signing_key = provider
            .key_provider
            .load_private_key(key)
            .map_err(|e| unrecoverable(e.to_string()))?;
        let certified = CertifiedKey::new(entry.chain.clone(), signing_key);

        match certified.keys_match() {
            Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(unrecoverable(e.to_string())),
        }

        debug!("Identity '{}' loaded ({} certificates)", alias, entry.chain.len());
        Ok(IdentityManager {
            alias: alias.to_string(),
            certified: Arc::new(certified),
        })
    }
}

/// 握手时选择身份：第一个支持对端签名算法的身份
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    identities: Arc<[IdentityManager]>,
}

impl IdentityResolver {
    pub fn new(identities: Arc<[IdentityManager]>) -> Self {
        Self { identities }
    }

    pub fn select(&self, schemes: &[SignatureScheme]) -> Option<&IdentityManager> {
        self.identities.iter().find(|identity| identity.supports(schemes))
    }
}

impl ResolvesServerCert for IdentityResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.select(client_hello.signature_schemes())
            .map(|identity| identity.certified.clone())
    }
}

impl ResolvesClientCert for IdentityResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.select(sigschemes).map(|identity| identity.certified.clone())
    }

    fn has_certs(&self) -> bool {
        !self.identities.is_empty()
    }
}
