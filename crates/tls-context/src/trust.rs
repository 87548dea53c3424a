//! 信任策略与信任管理器
//!
//! 两种策略在类型上完全分开：
//!
//! - [`TrustPolicy::TrustAll`] → [`TrustAllManager`]：不检查任何证书，仅用于测试环境
//! - [`TrustPolicy::ValidateAgainstStore`] → [`StoreTrustManager`]：基于信任库做 WebPKI 校验

use std::fmt;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::server::WebPkiClientVerifier;
use rustls::server::danger::ClientCertVerifier;
use rustls::{DistinguishedName, RootCertStore};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{info, warn};

use crate::error::{Result, TlsContextError};
use crate::loader::CredentialStoreLoader;
use crate::location::StoreLocation;
use crate::reporter::DiagnosticEvent;
use crate::secret::Passphrase;
use crate::store::CredentialStore;

/// 信任策略
#[derive(Debug, Clone)]
pub enum TrustPolicy {
    /// 不安全模式：接受任意证书，跳过证书链与主机名校验
    TrustAll,
    /// 用信任库中的证书校验对端
    ValidateAgainstStore {
        location: StoreLocation,
        passphrase: Passphrase,
    },
}

impl TrustPolicy {
    pub fn validate_against(location: StoreLocation, passphrase: impl Into<Passphrase>) -> Self {
        Self::ValidateAgainstStore {
            location,
            passphrase: passphrase.into(),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::TrustAll => PolicyKind::TrustAll,
            Self::ValidateAgainstStore { .. } => PolicyKind::ValidateAgainstStore,
        }
    }
}

/// 策略类别，不含位置和口令
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    TrustAll,
    ValidateAgainstStore,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrustAll => f.write_str("trust-all"),
            Self::ValidateAgainstStore => f.write_str("validate-against-store"),
        }
    }
}

/// 决定是否接受对端证书链
pub trait TrustManager: fmt::Debug + Send + Sync {
    fn check_client_trusted(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<(), rustls::Error>;

    fn check_server_trusted(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        now: UnixTime,
    ) -> std::result::Result<(), rustls::Error>;

    /// 握手时提示给对端的可接受签发者
    fn accepted_issuers(&self) -> &[DistinguishedName];

    fn kind(&self) -> PolicyKind;
}

/// 接受一切证书的信任管理器
///
/// 不解析、不检查证书链，签发者列表为空。
#[derive(Debug, Default)]
pub struct TrustAllManager {
    _private: (),
}

impl TrustManager for TrustAllManager {
    fn check_client_trusted(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<(), rustls::Error> {
        Ok(())
    }

    fn check_server_trusted(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _now: UnixTime,
    ) -> std::result::Result<(), rustls::Error> {
        Ok(())
    }

    fn accepted_issuers(&self) -> &[DistinguishedName] {
        &[]
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::TrustAll
    }
}

/// 基于信任库的 WebPKI 信任管理器
pub struct StoreTrustManager {
    anchors: usize,
    issuers: Vec<DistinguishedName>,
    client: Arc<dyn ClientCertVerifier>,
    server: Arc<WebPkiServerVerifier>,
}

impl fmt::Debug for StoreTrustManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTrustManager")
            .field("anchors", &self.anchors)
            .finish_non_exhaustive()
    }
}

impl StoreTrustManager {
    /// 以受信任证书条目和各身份的叶子证书作为信任锚
    pub fn from_store(
        location: &StoreLocation,
        store: &CredentialStore,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(store.trust_anchor_candidates());
        if ignored > 0 {
            warn!("Ignored {} unparsable certificates in trust store {}", ignored, location);
        }
        if added == 0 {
            return Err(TlsContextError::NoTrustAnchors {
                location: location.to_string(),
            });
        }

        let setup_error = |reason: String| TlsContextError::TrustSetup {
            location: location.to_string(),
            reason,
        };
        let issuers = roots.subjects();
        let roots = Arc::new(roots);
        let client = WebPkiClientVerifier::builder_with_provider(roots.clone(), provider.clone())
            .build()
            .map_err(|e| setup_error(e.to_string()))?;
        let server = WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(|e| setup_error(e.to_string()))?;

        info!("Trust store {} provides {} trust anchors", location, added);
        Ok(Self {
            anchors: added,
            issuers,
            client,
            server,
        })
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors
    }
}

impl TrustManager for StoreTrustManager {
    fn check_client_trusted(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<(), rustls::Error> {
        self.client
            .verify_client_cert(end_entity, intermediates, now)
            .map(|_| ())
    }

    fn check_server_trusted(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        now: UnixTime,
    ) -> std::result::Result<(), rustls::Error> {
        self.server
            .verify_server_cert(end_entity, intermediates, server_name, &[], now)
            .map(|_| ())
    }

    fn accepted_issuers(&self) -> &[DistinguishedName] {
        &self.issuers
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::ValidateAgainstStore
    }
}

/// 将信任策略解析为信任管理器
pub struct TrustPolicyResolver<'a> {
    loader: &'a CredentialStoreLoader,
    provider: Arc<CryptoProvider>,
}

impl<'a> TrustPolicyResolver<'a> {
    pub fn new(loader: &'a CredentialStoreLoader, provider: Arc<CryptoProvider>) -> Self {
        Self { loader, provider }
    }

    pub fn resolve(&self, policy: &TrustPolicy) -> Result<Vec<Arc<dyn TrustManager>>> {
        let managers: Vec<Arc<dyn TrustManager>> = match policy {
            TrustPolicy::TrustAll => {
                warn!("Trust-all policy selected: peer certificates will NOT be validated");
                vec![Arc::new(TrustAllManager::default())]
            }
            TrustPolicy::ValidateAgainstStore {
                location,
                passphrase,
            } => {
                let store = self.loader.load(location, passphrase)?;
                let manager = StoreTrustManager::from_store(location, &store, self.provider.clone())?;
                vec![Arc::new(manager)]
            }
        };

        self.loader
            .reporter()
            .report(DiagnosticEvent::PolicyChosen(policy.kind()));
        Ok(managers)
    }
}
