//! TLS 上下文
//!
//! 构建完成后不可变，以 `Arc<TlsContext>` 共享。监听端和客户端分别通过
//! [`TlsContext::server_config`] / [`TlsContext::client_config`] 取得 rustls 配置，
//! 服务端配置强制要求客户端证书。

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, GetRandomFailed, SecureRandom};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    ClientConfig, DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme,
};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::Result;
use crate::identity::{IdentityManager, IdentityResolver};
use crate::trust::{PolicyKind, TrustManager};

/// 加密安全随机数来源
#[derive(Clone, Copy)]
pub struct SecureRandomSource(&'static dyn SecureRandom);

impl SecureRandomSource {
    pub fn from_provider(provider: &CryptoProvider) -> Self {
        Self(provider.secure_random)
    }

    pub fn fill(&self, buf: &mut [u8]) -> std::result::Result<(), GetRandomFailed> {
        self.0.fill(buf)
    }
}

impl fmt::Debug for SecureRandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecureRandomSource").field(&self.0).finish()
    }
}

/// 身份管理器 + 信任管理器 + 随机数来源
pub struct TlsContext {
    identities: Arc<[IdentityManager]>,
    trust: Arc<[Arc<dyn TrustManager>]>,
    provider: Arc<CryptoProvider>,
    random: SecureRandomSource,
    policy: PolicyKind,
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("identities", &self.identity_aliases())
            .field("trust", &self.trust)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    pub(crate) fn assemble(
        identities: Vec<IdentityManager>,
        trust: Vec<Arc<dyn TrustManager>>,
        provider: Arc<CryptoProvider>,
        policy: PolicyKind,
    ) -> Self {
        let random = SecureRandomSource::from_provider(&provider);
        Self {
            identities: identities.into(),
            trust: trust.into(),
            provider,
            random,
            policy,
        }
    }

    pub fn identities(&self) -> &[IdentityManager] {
        &self.identities
    }

    pub fn identity_aliases(&self) -> Vec<&str> {
        self.identities.iter().map(IdentityManager::alias).collect()
    }

    pub fn trust_managers(&self) -> &[Arc<dyn TrustManager>] {
        &self.trust
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    pub fn random(&self) -> SecureRandomSource {
        self.random
    }

    /// 校验对端证书的适配器，供 rustls 配置使用
    pub fn verifier(&self) -> ContextVerifier {
        ContextVerifier::new(self.trust.clone(), self.provider.clone())
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.identities.clone())
    }

    /// 服务端配置：要求并校验客户端证书
    pub fn server_config(&self) -> Result<ServerConfig> {
        let config = ServerConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(Arc::new(self.verifier()))
            .with_cert_resolver(Arc::new(self.resolver()));
        Ok(config)
    }

    /// 客户端配置：出示本地身份并按信任策略校验服务端
    pub fn client_config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self.verifier()))
            .with_client_cert_resolver(Arc::new(self.resolver()));
        Ok(config)
    }

    pub fn acceptor(&self) -> Result<TlsAcceptor> {
        Ok(TlsAcceptor::from(Arc::new(self.server_config()?)))
    }

    pub fn connector(&self) -> Result<TlsConnector> {
        Ok(TlsConnector::from(Arc::new(self.client_config()?)))
    }
}

/// 将信任管理器接入 rustls：依次询问各管理器，第一个接受即通过
///
/// 证书是否可信由信任管理器决定；握手签名始终用提供者的算法校验。
pub struct ContextVerifier {
    trust: Arc<[Arc<dyn TrustManager>]>,
    issuers: Vec<DistinguishedName>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for ContextVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVerifier")
            .field("trust", &self.trust)
            .finish_non_exhaustive()
    }
}

impl ContextVerifier {
    fn new(trust: Arc<[Arc<dyn TrustManager>]>, provider: Arc<CryptoProvider>) -> Self {
        let issuers = trust
            .iter()
            .flat_map(|manager| manager.accepted_issuers().iter().cloned())
            .collect();
        Self {
            trust,
            issuers,
            provider,
        }
    }

    fn first_accepting(
        &self,
        check: impl Fn(&dyn TrustManager) -> std::result::Result<(), rustls::Error>,
    ) -> std::result::Result<(), rustls::Error> {
        let mut last = rustls::Error::General("no trust manager configured".to_string());
        for manager in self.trust.iter() {
            match check(manager.as_ref()) {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    fn tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl ServerCertVerifier for ContextVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        self.first_accepting(|manager| {
            manager.check_server_trusted(end_entity, intermediates, server_name, now)
        })
        .map(|()| ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes()
    }
}

impl ClientCertVerifier for ContextVerifier {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.issuers
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        self.first_accepting(|manager| manager.check_client_trusted(end_entity, intermediates, now))
            .map(|()| ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustAllManager;

    #[derive(Debug)]
    struct Rejecting;

    impl TrustManager for Rejecting {
        fn check_client_trusted(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _now: UnixTime,
        ) -> std::result::Result<(), rustls::Error> {
            Err(rustls::Error::General("rejected".to_string()))
        }

        fn check_server_trusted(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _now: UnixTime,
        ) -> std::result::Result<(), rustls::Error> {
            Err(rustls::Error::General("rejected".to_string()))
        }

        fn accepted_issuers(&self) -> &[DistinguishedName] {
            &[]
        }

        fn kind(&self) -> PolicyKind {
            PolicyKind::ValidateAgainstStore
        }
    }

    fn context(trust: Vec<Arc<dyn TrustManager>>) -> TlsContext {
        TlsContext::assemble(
            Vec::new(),
            trust,
            Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
            PolicyKind::ValidateAgainstStore,
        )
    }

    #[test]
    fn first_accepting_manager_wins() {
        let ctx = context(vec![Arc::new(Rejecting), Arc::new(TrustAllManager::default())]);
        let verifier = ctx.verifier();
        let cert = CertificateDer::from(vec![0x30, 0x00]);
        assert!(verifier
            .verify_client_cert(&cert, &[], UnixTime::now())
            .is_ok());
    }

    #[test]
    fn last_rejection_is_returned() {
        let ctx = context(vec![Arc::new(Rejecting)]);
        let verifier = ctx.verifier();
        let cert = CertificateDer::from(vec![0x30, 0x00]);
        let err = verifier
            .verify_client_cert(&cert, &[], UnixTime::now())
            .unwrap_err();
        assert_eq!(err, rustls::Error::General("rejected".to_string()));
        assert!(ClientCertVerifier::client_auth_mandatory(&verifier));
    }

    #[test]
    fn random_source_fills_buffers() {
        let ctx = context(vec![Arc::new(TrustAllManager::default())]);
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        ctx.random().fill(&mut a).unwrap();
        ctx.random().fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn configs_build_for_an_identityless_context() {
        let ctx = context(vec![Arc::new(TrustAllManager::default())]);
        assert!(ctx.server_config().is_ok());
        assert!(ctx.client_config().is_ok());
        assert!(ctx.identities().is_empty());
    }
}
