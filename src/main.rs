//! twoway 主程序
//!
//! 按配置文件构建双向 TLS 上下文并输出摘要，或列出单个证书库的条目

mod cli;
mod error;
mod observability;

use anyhow::Context;
use clap::Parser;
use observability::{init_observability, init_stderr_logging};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use twoway_tls::config::ObservabilityConfig;
use twoway_tls::{
    CredentialStoreLoader, EntryKind, Passphrase, StoreEntry, StoreLocation, TlsContext,
    TlsContextBuilder, TwowayConfig,
};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

const DEFAULT_CONFIG: &str = "twoway.toml";

/// Application launcher utilities
struct ApplicationLauncher;

/// `inspect --json` 输出的单个条目
#[derive(Debug, Serialize)]
struct EntrySummary<'a> {
    alias: &'a str,
    kind: EntryKind,
    certificates: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Inspect {
            store,
            password_env,
            json,
        }) => ApplicationLauncher::inspect_store(store, password_env, *json),
        Some(Commands::Check { config_file }) => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::check(&config_path)
        }
        None => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            ApplicationLauncher::check(&config_path)
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        if provided_path != Path::new(DEFAULT_CONFIG) {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from(DEFAULT_CONFIG),
            // 2. System config directory
            PathBuf::from("/etc/twoway/twoway.toml"),
        ];

        bootstrap_info!("Searching for config file in default locations...");

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            } else {
                bootstrap_info!("Config not found at: {:?}", path);
            }
        }

        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: twoway --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 加载并验证配置，构建 TLS 上下文
    fn check(config_path: &Path) -> Result<()> {
        bootstrap_info!("📄 加载配置文件: {:?}", config_path);

        let config = match TwowayConfig::from_file(config_path) {
            Ok(config) => {
                bootstrap_info!("✅ 配置加载成功");
                config
            }
            Err(e) => {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                return Err(e.into());
            }
        };

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::validation("配置验证失败，请修复上述错误"));
            }
        }

        let _observability_guard = init_observability(&config.observability)?;

        if !config.ssl.enable_two_way {
            info!("Two-way TLS is disabled (ssl.enable_two_way = false), nothing to build");
            bootstrap_info!("two-way TLS disabled");
            return Ok(());
        }

        let context_config = config.ssl.to_context_config()?;
        let context = TlsContextBuilder::new()
            .build(&context_config)
            .inspect_err(|e| {
                error!("TLS context build failed: {}", e);
                bootstrap_error!("❌ TLS 上下文构建失败: {}", e);
            })?;

        // 确认监听端和客户端配置都能生成
        context.server_config()?;
        context.client_config()?;

        Self::display_context_info(&context, context_config.publishes_as_default());
        Ok(())
    }

    /// 列出证书库条目
    fn inspect_store(store: &str, password_env: &str, json: bool) -> Result<()> {
        init_stderr_logging(&ObservabilityConfig::default());

        let password = std::env::var(password_env)
            .with_context(|| format!("environment variable {password_env} is not set"))?;
        let location = StoreLocation::from_config(store);
        let store = CredentialStoreLoader::new()
            .load(&location, &Passphrase::new(password))
            .inspect_err(|e| {
                bootstrap_error!("❌ {}", e);
            })?;

        let entries: Vec<EntrySummary<'_>> = store
            .entries()
            .map(|(alias, entry)| EntrySummary {
                alias,
                kind: entry.kind(),
                certificates: match entry {
                    StoreEntry::Identity(identity) => identity.chain.len(),
                    StoreEntry::TrustedCertificate(_) => 1,
                },
            })
            .collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            println!("{} ({} entries)", location, entries.len());
            for entry in &entries {
                println!(
                    "  {}\t{}\t{} certificate(s)",
                    entry.alias, entry.kind, entry.certificates
                );
            }
        }

        if store.identity_count() == 0 {
            warn!("{} contains no identity entries", location);
        }
        Ok(())
    }

    /// 显示上下文摘要
    fn display_context_info(context: &TlsContext, published: bool) {
        info!("✅ TLS 上下文构建完成");

        println!("two-way TLS context ready");
        println!("  identities: {}", context.identities().len());
        for identity in context.identities() {
            println!(
                "    - {} ({} certificates)",
                identity.alias(),
                identity.certificate_chain().len()
            );
        }
        println!("  trust policy: {}", context.policy());
        let issuers: usize = context
            .trust_managers()
            .iter()
            .map(|manager| manager.accepted_issuers().len())
            .sum();
        println!("  accepted issuers: {issuers}");
        println!("  published as default: {published}");
    }
}
