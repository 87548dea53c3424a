//! 进程级默认 TLS 上下文
//!
//! 发布即生效，后发布者覆盖先发布者，没有清除操作。
//! 构建器默认写入 [`global_slot`]，测试可以注入独立的槽位。

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::context::TlsContext;

static GLOBAL_SLOT: Lazy<Arc<DefaultContextSlot>> = Lazy::new(|| Arc::new(DefaultContextSlot::new()));

/// 可替换的默认上下文槽位
#[derive(Debug, Default)]
pub struct DefaultContextSlot {
    current: RwLock<Option<Arc<TlsContext>>>,
}

impl DefaultContextSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<TlsContext>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 发布上下文，返回被替换的旧值
    pub fn publish(&self, context: Arc<TlsContext>) -> Option<Arc<TlsContext>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(context)
    }

    pub fn is_published(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// 进程级槽位
pub fn global_slot() -> Arc<DefaultContextSlot> {
    GLOBAL_SLOT.clone()
}

/// 当前进程级默认上下文
pub fn default_context() -> Option<Arc<TlsContext>> {
    GLOBAL_SLOT.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{PolicyKind, TrustAllManager};

    fn context() -> Arc<TlsContext> {
        Arc::new(TlsContext::assemble(
            Vec::new(),
            vec![Arc::new(TrustAllManager::default())],
            Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
            PolicyKind::TrustAll,
        ))
    }

    #[test]
    fn last_writer_wins() {
        let slot = DefaultContextSlot::new();
        assert!(!slot.is_published());
        assert!(slot.get().is_none());

        let first = context();
        let second = context();
        assert!(slot.publish(first.clone()).is_none());
        let previous = slot.publish(second.clone()).unwrap();

        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(&slot.get().unwrap(), &second));
    }

    #[test]
    fn global_slot_is_shared() {
        assert!(Arc::ptr_eq(&global_slot(), &global_slot()));
    }
}
