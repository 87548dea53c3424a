//! 诊断事件
//!
//! 构建流程在关键节点发出事件，供运维查看证书库解析情况和所选信任策略。
//! 事件中不包含任何口令或密钥材料。

use std::fmt;

use tracing::{info, warn};

use crate::location::StoreOrigin;
use crate::trust::PolicyKind;

/// 构建流程发出的诊断事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// 证书库位置已解析为可读来源
    StoreResolved { location: String, origin: StoreOrigin },
    /// 证书库条目数
    EntryCount { location: String, count: usize },
    /// 证书库中的一个别名
    Alias { location: String, alias: String },
    /// 某个解码器失败，转交下一个解码器
    DecoderFallback {
        location: String,
        decoder: &'static str,
        reason: String,
    },
    /// 已选定信任策略
    PolicyChosen(PolicyKind),
    /// 上下文已发布为进程级默认值
    ContextPublished,
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreResolved { location, origin } => {
                write!(f, "store-resolved({location}, {origin})")
            }
            Self::EntryCount { location, count } => write!(f, "entry-count({location}, {count})"),
            Self::Alias { location, alias } => write!(f, "alias({location}, {alias})"),
            Self::DecoderFallback {
                location, decoder, ..
            } => write!(f, "decoder-fallback({location}, {decoder})"),
            Self::PolicyChosen(kind) => write!(f, "policy-chosen({kind})"),
            Self::ContextPublished => f.write_str("context-published"),
        }
    }
}

/// 诊断事件接收方
pub trait DiagnosticReporter: Send + Sync {
    fn report(&self, event: DiagnosticEvent);
}

/// 默认实现：写入 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl DiagnosticReporter for TracingReporter {
    fn report(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::StoreResolved { location, origin } => {
                info!("Credential store resolved: {} ({})", location, origin);
            }
            DiagnosticEvent::EntryCount { location, count } => {
                info!("Credential store {} holds {} entries", location, count);
            }
            DiagnosticEvent::Alias { location, alias } => {
                info!("Credential store {} alias: {}", location, alias);
            }
            DiagnosticEvent::DecoderFallback {
                location,
                decoder,
                reason,
            } => {
                warn!(
                    "Decoder '{}' failed for {}, trying next decoder: {}",
                    decoder, location, reason
                );
            }
            DiagnosticEvent::PolicyChosen(kind) => {
                info!("Trust policy chosen: {}", kind);
            }
            DiagnosticEvent::ContextPublished => {
                info!("TLS context published as process-wide default");
            }
        }
    }
}
