//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "twoway")]
#[command(version)]
#[command(about = "Build and verify the mutual TLS context described by a configuration file")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "twoway.toml")]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Build the TLS context from a configuration file and print a summary
    Check {
        /// Configuration file path (optional, defaults to twoway.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// List the entries of a credential store
    Inspect {
        /// Store file path
        #[arg(index = 1)]
        store: String,

        /// Environment variable holding the store password
        #[arg(long, value_name = "VAR")]
        password_env: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
}
