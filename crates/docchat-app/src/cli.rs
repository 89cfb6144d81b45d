//! CLI argument definitions for the docchat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// docchat: upload documents and chat with an assistant about them.
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the document/chat backend.
    #[arg(short = 'u', long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write the effective configuration to the config file.
    Init,
    /// Store the token returned by the sign-in or sign-up endpoint.
    Login {
        #[arg(long)]
        token: String,
    },
    /// Clear the stored token.
    Logout,
    /// Show where navigating to PATH leads with the current session.
    Route { path: String },
    /// List uploaded documents.
    Documents,
    /// Upload a document. Only the first file is sent.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Chat about a document, one message per line of stdin.
    Chat {
        #[arg(short = 'd', long = "document")]
        document: i64,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCCHAT_CONFIG env var > ~/.docchat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        docchat_core::config::default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --api-url flag > DOCCHAT_API_URL env var > config file value.
    pub fn resolve_api_url(&self, config_url: &str) -> String {
        if let Some(ref url) = self.api_url {
            return url.clone();
        }
        match std::env::var("DOCCHAT_API_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => config_url.to_string(),
        }
    }

    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}
