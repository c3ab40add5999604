//! Application configuration loading and merging

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::app::cli::Args;
use crate::orchestrator::BackupConfig;

/// Errors surfaced while assembling the application configuration
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl crate::core::error_handling::ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config { message } => Some(message),
        }
    }
}

/// The `[store]` table: where backups land and how much each producer may use
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dest: Option<PathBuf>,
    pub quota: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dest: None,
            quota: u64::MAX,
        }
    }
}

/// The `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
}

/// Complete application configuration: file values merged with CLI flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: Vec<PathBuf>,
    pub store: StoreConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load the TOML file at `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            AppError::config(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    /// Fold CLI flags over the file values; anything given on the command
    /// line wins.
    pub fn apply_cli(&mut self, args: &Args) {
        if !args.sources.is_empty() {
            self.sources = args.sources.clone();
        }
        if args.dest.is_some() {
            self.store.dest = args.dest.clone();
        }
        if let Some(quota) = args.quota {
            self.store.quota = quota;
        }
        if let Some(chunk_size) = args.chunk_size {
            self.backup.chunk_size = chunk_size;
        }
        if let Some(secs) = args.preflight_timeout {
            self.backup.preflight_timeout_secs = secs;
        }
        if let Some(secs) = args.transfer_timeout {
            self.backup.transfer_timeout_secs = secs;
        }
        if args.user_initiated {
            self.backup.user_initiated = true;
        }
        if args.no_update_schedule {
            self.backup.update_schedule = false;
        }
        if args.log_level.is_some() {
            self.logging.level = args.log_level.clone();
        }
        if args.log_format.is_some() {
            self.logging.format = args.log_format.clone();
        }
        if args.log_file.is_some() {
            self.logging.file = args.log_file.clone();
        }
    }
}
