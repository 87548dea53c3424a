//! 错误类型
//!
//! 上下文构建流程的错误分类：证书库定位、口令校验、单条密钥解锁、格式解析，
//! 以及配置加载相关错误

use thiserror::Error;

/// 构建 TLS 上下文时可能出现的错误
///
/// 所有错误对本次构建都是终止性的，构建器内部不做重试。
#[derive(Error, Debug)]
pub enum TlsContextError {
    /// 文件系统与内嵌资源中都找不到证书库
    #[error("No credential store found at {location}")]
    NotFound { location: String },

    /// 整个证书库的口令错误（MAC 校验失败等）
    #[error("Credential store {location} rejected the passphrase: {reason}")]
    Authentication { location: String, reason: String },

    /// 单条身份条目无法用给定口令解锁，或密钥不可用
    #[error("Identity entry '{alias}' cannot be recovered: {reason}")]
    UnrecoverableKey { alias: String, reason: String },

    /// 所有解码器都无法解析证书库内容
    #[error("Credential store {location} could not be decoded: {}", join_attempts(.attempts))]
    Format {
        location: String,
        attempts: Vec<DecodeError>,
    },

    /// 信任库中没有可用的信任锚
    #[error("Trust store {location} contains no usable trust anchors")]
    NoTrustAnchors { location: String },

    /// 信任校验器构建失败
    #[error("Failed to set up trust manager for {location}: {reason}")]
    TrustSetup { location: String, reason: String },

    /// 读取证书库时的 I/O 错误
    #[error("I/O error while reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// rustls 配置错误
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 解码失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// 口令错误或完整性校验（MAC）失败
    BadPassphrase,
    /// 内容无法识别或结构损坏
    Malformed,
}

/// 单个解码器的失败记录
#[derive(Error, Debug, Clone)]
#[error("{decoder}: {message}")]
pub struct DecodeError {
    pub decoder: &'static str,
    pub kind: DecodeFailure,
    pub message: String,
}

impl DecodeError {
    pub fn bad_passphrase(decoder: &'static str, message: impl Into<String>) -> Self {
        Self {
            decoder,
            kind: DecodeFailure::BadPassphrase,
            message: message.into(),
        }
    }

    pub fn malformed(decoder: &'static str, message: impl Into<String>) -> Self {
        Self {
            decoder,
            kind: DecodeFailure::Malformed,
            message: message.into(),
        }
    }

    pub fn is_bad_passphrase(&self) -> bool {
        self.kind == DecodeFailure::BadPassphrase
    }
}

fn join_attempts(attempts: &[DecodeError]) -> String {
    if attempts.is_empty() {
        return "no decoder recognised the content".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 配置相关错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, TlsContextError>;
