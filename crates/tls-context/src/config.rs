//! 配置
//!
//! TOML 配置文件结构，`[ssl]` 段描述证书库，`[observability]` 段描述日志输出。
//!
//! ```toml
//! [ssl]
//! enable_two_way = true
//! override_default = true
//!
//! [ssl.keystore]
//! path = "certs/server.p12"
//! password = "changeit"
//!
//! [ssl.truststore]
//! path = "certs/trust.p12"
//! password = "changeit"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::builder::TlsContextConfig;
use crate::error::ConfigError;
use crate::location::StoreLocation;
use crate::secret::Passphrase;
use crate::trust::TrustPolicy;

/// 配置文件根结构
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwowayConfig {
    #[serde(default)]
    pub ssl: SslConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 双向 TLS 配置
#[derive(Debug, Clone, Deserialize)]
pub struct SslConfig {
    /// 是否启用双向 TLS，关闭时不构建上下文
    #[serde(default = "default_true")]
    pub enable_two_way: bool,

    /// 是否将构建出的上下文发布为进程级默认值
    #[serde(default = "default_true")]
    pub override_default: bool,

    /// 身份库（必填）
    #[serde(default)]
    pub keystore: StoreConfig,

    /// 信任库
    ///
    /// `path` 为空时使用 trust-all 策略，不校验对端证书。
    #[serde(default)]
    pub truststore: StoreConfig,
}

/// 证书库位置与口令
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// 文件路径或内嵌资源名
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub password: Passphrase,
}

impl StoreConfig {
    pub fn is_configured(&self) -> bool {
        !self.path.trim().is_empty()
    }

    pub fn location(&self) -> StoreLocation {
        StoreLocation::from_config(self.path.trim())
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            enable_two_way: true,
            override_default: true,
            keystore: StoreConfig::default(),
            truststore: StoreConfig::default(),
        }
    }
}

impl SslConfig {
    /// 转换为构建输入
    pub fn to_context_config(&self) -> Result<TlsContextConfig, ConfigError> {
        if !self.keystore.is_configured() {
            return Err(ConfigError::missing("ssl.keystore.path"));
        }
        if self.keystore.password.is_empty() {
            return Err(ConfigError::missing("ssl.keystore.password"));
        }

        let trust_policy = if self.truststore.is_configured() {
            if self.truststore.password.is_empty() {
                return Err(ConfigError::missing("ssl.truststore.password"));
            }
            TrustPolicy::validate_against(
                self.truststore.location(),
                self.truststore.password.clone(),
            )
        } else {
            TrustPolicy::TrustAll
        };

        Ok(TlsContextConfig::new(
            self.keystore.location(),
            self.keystore.password.clone(),
            trust_policy,
        )
        .publish_as_default(self.override_default))
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// 过滤级别，支持 EnvFilter 语法（如 "info,rustls=warn"）
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// output = "file" 时按天轮转
    #[serde(default)]
    pub rotate: bool,

    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

impl TwowayConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        Self::from_toml(&content)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })
    }

    pub fn is_console_logging(&self) -> bool {
        self.observability.log.output == "console"
    }

    pub fn should_rotate_logs(&self) -> bool {
        self.observability.log.output == "file" && self.observability.log.rotate
    }

    /// 过滤级别，RUST_LOG 优先
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 验证配置有效性
    ///
    /// 以 "Warning:" 开头的条目不影响启动。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let main_level = self
            .observability
            .filter_level
            .split(',')
            .next()
            .unwrap_or("")
            .trim();
        if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
            errors.push(format!(
                "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                self.observability.filter_level
            ));
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if self.ssl.enable_two_way {
            if let Err(e) = self.ssl.to_context_config() {
                errors.push(e.to_string());
            }

            if self.ssl.keystore.is_configured() && !Path::new(self.ssl.keystore.path.trim()).is_file() {
                errors.push(format!(
                    "Warning: keystore '{}' is not an existing file; unless an embedded resource of that name is registered, the build fails with NotFound",
                    self.ssl.keystore.path
                ));
            }

            if !self.ssl.truststore.is_configured() {
                errors.push(
                    "Warning: ssl.truststore.path is empty, peer certificates will NOT be validated (trust-all)"
                        .to_string(),
                );
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::PolicyKind;

    fn is_fatal(problems: &[String]) -> bool {
        problems.iter().any(|p| !p.starts_with("Warning:"))
    }

    #[test]
    fn parses_full_configuration() {
        let config = TwowayConfig::from_toml(
            r#"
[ssl]
enable_two_way = true
override_default = false

[ssl.keystore]
path = "certs/server.p12"
password = "changeit"

[ssl.truststore]
path = "certs/trust.p12"
password = "trustpass"

[observability]
filter_level = "debug"

[observability.log]
output = "file"
rotate = true
"#,
        )
        .unwrap();

        assert!(!config.ssl.override_default);
        assert_eq!(config.ssl.truststore.password.expose(), "trustpass");
        assert!(config.should_rotate_logs());

        let context = config.ssl.to_context_config().unwrap();
        assert!(!context.publishes_as_default());
        assert_eq!(context.trust_policy().kind(), PolicyKind::ValidateAgainstStore);
    }

    #[test]
    fn empty_truststore_path_means_trust_all() {
        let config = TwowayConfig::from_toml(
            r#"
[ssl.keystore]
path = "server.p12"
password = "changeit"
"#,
        )
        .unwrap();
        let context = config.ssl.to_context_config().unwrap();
        assert_eq!(context.trust_policy().kind(), PolicyKind::TrustAll);
        assert!(context.publishes_as_default());

        let problems = config.validate().unwrap_err();
        assert!(!is_fatal(&problems));
        assert!(problems.iter().any(|p| p.contains("trust-all")));
        assert!(problems
            .iter()
            .any(|p| p.contains("'server.p12'") && p.contains("NotFound")));
    }

    #[test]
    fn truststore_requires_password() {
        let config = TwowayConfig::from_toml(
            r#"
[ssl.keystore]
path = "server.p12"
password = "changeit"

[ssl.truststore]
path = "trust.p12"
"#,
        )
        .unwrap();
        let err = config.ssl.to_context_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "ssl.truststore.password"));
        assert!(is_fatal(&config.validate().unwrap_err()));
    }

    #[test]
    fn missing_keystore_is_fatal() {
        let config = TwowayConfig::default();
        assert!(matches!(
            config.ssl.to_context_config(),
            Err(ConfigError::MissingField { .. })
        ));
        assert!(is_fatal(&config.validate().unwrap_err()));
    }

    #[test]
    fn disabled_two_way_skips_ssl_checks() {
        let config = TwowayConfig::from_toml("[ssl]\nenable_two_way = false\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_log_settings_are_reported() {
        let config = TwowayConfig::from_toml(
            r#"
[ssl]
enable_two_way = false

[observability]
filter_level = "loud"

[observability.log]
output = "syslog"
"#,
        )
        .unwrap();
        let problems = config.validate().unwrap_err();
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = TwowayConfig::from_file("/no/such/twoway.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = TwowayConfig::from_toml("[ssl\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
