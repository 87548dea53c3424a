//! 统一错误处理模型
//!
//! 提供 twoway 主程序的顶层错误类型，聚合 TLS 上下文构建库和依赖 crate 的错误

use thiserror::Error;
use twoway_tls::{ConfigError, TlsContextError};

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 配置相关错误 ==========
    /// 配置文件相关错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ========== TLS 上下文错误 ==========
    /// 证书库加载或上下文构建失败
    #[error("TLS context error: {0}")]
    Tls(#[from] TlsContextError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // ========== 业务逻辑错误 ==========
    /// 配置验证失败
    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    // ========== 通用错误 ==========
    /// Anyhow 错误兼容层
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建配置验证失败错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert!(matches!(err, Error::Custom { .. }));
    }

    #[test]
    fn test_library_errors_convert() {
        let err: Error = TlsContextError::NotFound {
            location: "server.p12".to_string(),
        }
        .into();
        assert!(err.to_string().contains("server.p12"));

        let err: Error = ConfigError::missing("ssl.keystore.path").into();
        assert!(matches!(err, Error::Config(_)));
    }
}
