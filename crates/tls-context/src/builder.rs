//! TLS 上下文构建器
//!
//! 构建顺序固定：加载身份库 → 提取身份 → 解析信任策略 → 组装上下文 → 发布。
//! 发布是唯一的全局副作用，放在最后；之前任一步失败都不会修改默认槽位。

use std::sync::Arc;

use tracing::info;

use crate::context::TlsContext;
use crate::default_slot::{DefaultContextSlot, global_slot};
use crate::error::Result;
use crate::identity::IdentityManagerFactory;
use crate::loader::CredentialStoreLoader;
use crate::location::StoreLocation;
use crate::reporter::DiagnosticEvent;
use crate::secret::Passphrase;
use crate::trust::{TrustPolicy, TrustPolicyResolver};

/// 构建输入，创建后不可修改
#[derive(Debug, Clone)]
pub struct TlsContextConfig {
    identity_store: StoreLocation,
    identity_passphrase: Passphrase,
    trust_policy: TrustPolicy,
    publish_as_default: bool,
}

impl TlsContextConfig {
    /// 默认发布为进程级默认上下文
    pub fn new(
        identity_store: StoreLocation,
        identity_passphrase: impl Into<Passphrase>,
        trust_policy: TrustPolicy,
    ) -> Self {
        Self {
            identity_store,
            identity_passphrase: identity_passphrase.into(),
            trust_policy,
            publish_as_default: true,
        }
    }

    pub fn publish_as_default(mut self, publish: bool) -> Self {
        self.publish_as_default = publish;
        self
    }

    pub fn identity_store(&self) -> &StoreLocation {
        &self.identity_store
    }

    pub fn identity_passphrase(&self) -> &Passphrase {
        &self.identity_passphrase
    }

    pub fn trust_policy(&self) -> &TrustPolicy {
        &self.trust_policy
    }

    pub fn publishes_as_default(&self) -> bool {
        self.publish_as_default
    }
}

/// 上下文构建器
#[derive(Clone)]
pub struct TlsContextBuilder {
    loader: CredentialStoreLoader,
    slot: Arc<DefaultContextSlot>,
}

impl Default for TlsContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsContextBuilder {
    pub fn new() -> Self {
        Self {
            loader: CredentialStoreLoader::new(),
            slot: global_slot(),
        }
    }

    pub fn with_loader(mut self, loader: CredentialStoreLoader) -> Self {
        self.loader = loader;
        self
    }

    /// 发布到指定槽位而不是进程级槽位
    pub fn with_default_slot(mut self, slot: Arc<DefaultContextSlot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn loader(&self) -> &CredentialStoreLoader {
        &self.loader
    }

    pub fn build(&self, config: &TlsContextConfig) -> Result<Arc<TlsContext>> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let identities = {
            let store = self
                .loader
                .load(&config.identity_store, &config.identity_passphrase)?;
            IdentityManagerFactory::derive_identity_managers(
                &store,
                &config.identity_passphrase,
                &provider,
            )?
        };

        let trust = TrustPolicyResolver::new(&self.loader, provider.clone())
            .resolve(&config.trust_policy)?;

        let context = Arc::new(TlsContext::assemble(
            identities,
            trust,
            provider,
            config.trust_policy.kind(),
        ));
        info!(
            "TLS context built: {} identities, policy {}",
            context.identities().len(),
            context.policy()
        );

        if config.publish_as_default {
            self.slot.publish(context.clone());
            self.loader
                .reporter()
                .report(DiagnosticEvent::ContextPublished);
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TlsContextError;
    use crate::location::EmbeddedResources;

    fn builder(slot: Arc<DefaultContextSlot>) -> TlsContextBuilder {
        let resources = EmbeddedResources::new().with("garbage.p12", &b"\x30\x03\x02\x01\x00"[..]);
        TlsContextBuilder::new()
            .with_loader(CredentialStoreLoader::new().with_resources(resources))
            .with_default_slot(slot)
    }

    #[test]
    fn config_publishes_by_default() {
        let config = TlsContextConfig::new(
            StoreLocation::embedded("server.p12"),
            "changeit",
            TrustPolicy::TrustAll,
        );
        assert!(config.publishes_as_default());
        assert!(!config.clone().publish_as_default(false).publishes_as_default());
        assert_eq!(config.identity_passphrase().expose(), "changeit");
    }

    #[test]
    fn missing_identity_store_leaves_slot_untouched() {
        let slot = Arc::new(DefaultContextSlot::new());
        let config = TlsContextConfig::new(
            StoreLocation::filesystem("/missing/server.p12"),
            "changeit",
            TrustPolicy::TrustAll,
        );
        let err = builder(slot.clone()).build(&config).unwrap_err();
        assert!(matches!(err, TlsContextError::NotFound { .. }));
        assert!(!slot.is_published());
    }

    #[test]
    fn undecodable_identity_store_is_format_error() {
        let slot = Arc::new(DefaultContextSlot::new());
        let config = TlsContextConfig::new(
            StoreLocation::embedded("garbage.p12"),
            "changeit",
            TrustPolicy::TrustAll,
        );
        let err = builder(slot.clone()).build(&config).unwrap_err();
        assert!(matches!(err, TlsContextError::Format { .. }));
        assert!(slot.get().is_none());
    }
}
