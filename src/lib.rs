//! # twoway
//!
//! 双向 TLS 上下文构建工具，核心逻辑位于 `twoway-tls`

// Re-export commonly used types
pub use twoway_tls::{
    TlsContext, TlsContextBuilder, TlsContextConfig, TlsContextError, TwowayConfig,
    default_context,
};
