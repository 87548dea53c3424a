//! 证书库加载器
//!
//! 解析位置 → 读取字节 → 按顺序尝试解码器 → 上报条目信息。
//!
//! 主解码器（解码链中的第一个）运行期间持有进程级互斥锁，
//! 同一进程内的多个加载调用不会并发进入主解码器。

use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use zeroize::Zeroizing;

use crate::decoder::{StoreDecoder, default_decoders};
use crate::error::{DecodeError, Result, TlsContextError};
use crate::location::{self, EmbeddedResources, StoreLocation};
use crate::reporter::{DiagnosticEvent, DiagnosticReporter, TracingReporter};
use crate::secret::Passphrase;
use crate::store::CredentialStore;

static PRIMARY_DECODE_LOCK: Mutex<()> = Mutex::new(());

/// 证书库加载器
#[derive(Clone)]
pub struct CredentialStoreLoader {
    decoders: Vec<Arc<dyn StoreDecoder>>,
    resources: EmbeddedResources,
    reporter: Arc<dyn DiagnosticReporter>,
}

impl Default for CredentialStoreLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStoreLoader {
    /// 默认解码链、无内嵌资源、写 tracing 日志
    pub fn new() -> Self {
        Self {
            decoders: default_decoders(),
            resources: EmbeddedResources::new(),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// 替换解码链，顺序即尝试顺序
    pub fn with_decoders(mut self, decoders: Vec<Arc<dyn StoreDecoder>>) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn with_resources(mut self, resources: EmbeddedResources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn DiagnosticReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    pub(crate) fn reporter(&self) -> &Arc<dyn DiagnosticReporter> {
        &self.reporter
    }

    /// 加载并解析证书库
    pub fn load(&self, location: &StoreLocation, passphrase: &Passphrase) -> Result<CredentialStore> {
        let bytes = self.read(location)?;
        let store = self.decode(location, &bytes, passphrase)?;

        let name = location.to_string();
        self.reporter.report(DiagnosticEvent::EntryCount {
            location: name.clone(),
            count: store.len(),
        });
        for alias in store.aliases() {
            self.reporter.report(DiagnosticEvent::Alias {
                location: name.clone(),
                alias: alias.to_string(),
            });
        }

        Ok(store)
    }

    /// 读取全部字节；字节流在返回前关闭，缓冲区释放时清零
    fn read(&self, location: &StoreLocation) -> Result<Zeroizing<Vec<u8>>> {
        let (mut stream, origin) = location::open(location, &self.resources)?;
        let mut bytes = Zeroizing::new(Vec::new());
        stream
            .read_to_end(&mut bytes)
            .map_err(|source| TlsContextError::Io {
                location: location.to_string(),
                source,
            })?;
        drop(stream);

        self.reporter.report(DiagnosticEvent::StoreResolved {
            location: location.to_string(),
            origin,
        });
        Ok(bytes)
    }

    fn decode(
        &self,
        location: &StoreLocation,
        bytes: &[u8],
        passphrase: &Passphrase,
    ) -> Result<CredentialStore> {
        let mut attempts: Vec<DecodeError> = Vec::new();

        for (index, decoder) in self.decoders.iter().enumerate() {
            if !decoder.recognizes(bytes) {
                debug!("Decoder '{}' skipped for {}", decoder.name(), location);
                continue;
            }

            let outcome = if index == 0 {
                let _guard = PRIMARY_DECODE_LOCK
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                decoder.decode(bytes, passphrase)
            } else {
                decoder.decode(bytes, passphrase)
            };

            match outcome {
                Ok(store) => {
                    debug!("Credential store {} decoded by '{}'", location, decoder.name());
                    return Ok(store);
                }
                Err(err) => {
                    self.reporter.report(DiagnosticEvent::DecoderFallback {
                        location: location.to_string(),
                        decoder: decoder.name(),
                        reason: err.message.clone(),
                    });
                    attempts.push(err);
                }
            }
        }

        Err(classify(location, attempts))
    }
}

/// 任一解码器报告口令错误即为认证失败，否则为格式错误
fn classify(location: &StoreLocation, attempts: Vec<DecodeError>) -> TlsContextError {
    match attempts.iter().find(|a| a.is_bad_passphrase()) {
        Some(err) => TlsContextError::Authentication {
            location: location.to_string(),
            reason: err.to_string(),
        },
        None => TlsContextError::Format {
            location: location.to_string(),
            attempts,
        },
    }
}
