//! aptiq configuration and storage factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use aptiq_core::memory::MemoryBackend;
use aptiq_core::sampler::MixRatio;
use aptiq_core::service::QuizServiceConfig;
use aptiq_core::storage::StorageBackend;

use crate::sqlite::SqliteBackend;

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    /// Nothing is written to disk; data lasts for one process.
    Memory,
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("aptiq")
            .join("aptiq.db"),
        Err(_) => PathBuf::from("aptiq.db"),
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_db_path(),
        }
    }
}

/// `[quiz]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizConfig {
    /// How long a result stays on screen before the next question.
    #[serde(default = "default_reveal_delay")]
    pub reveal_delay_ms: u64,
    /// Sessions shown by `history` when no limit is given.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_reveal_delay() -> u64 {
    3000
}
fn default_history_limit() -> usize {
    10
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: default_reveal_delay(),
            history_limit: default_history_limit(),
        }
    }
}

/// `[sampling]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_easy")]
    pub easy: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_hard")]
    pub hard: f64,
    /// Fixed RNG seed for reproducible draws.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_easy() -> f64 {
    MixRatio::default().easy
}
fn default_medium() -> f64 {
    MixRatio::default().medium
}
fn default_hard() -> f64 {
    MixRatio::default().hard
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            easy: default_easy(),
            medium: default_medium(),
            hard: default_hard(),
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn mix(&self) -> MixRatio {
        MixRatio {
            easy: self.easy,
            medium: self.medium,
            hard: self.hard,
        }
    }
}

/// Top-level aptiq configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AptiqConfig {
    /// Question bank file or directory to seed from instead of the bundled
    /// bank.
    #[serde(default)]
    pub question_bank: Option<PathBuf>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quiz: QuizConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

impl AptiqConfig {
    /// Engine settings derived from this configuration.
    pub fn to_service_config(&self) -> QuizServiceConfig {
        QuizServiceConfig {
            reveal_delay: Duration::from_millis(self.quiz.reveal_delay_ms),
            mix: self.sampling.mix(),
            rng_seed: self.sampling.seed,
            history_limit: self.quiz.history_limit,
            ..QuizServiceConfig::default()
        }
    }

    fn validate(&self) -> Result<()> {
        self.sampling
            .mix()
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid [sampling] section: {e}"))?;
        if self.quiz.history_limit == 0 {
            anyhow::bail!("quiz.history_limit must be at least 1");
        }
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order when no path is given:
/// 1. `aptiq.toml` in the current directory
/// 2. `~/.config/aptiq/config.toml`
///
/// `APTIQ_DB_PATH` overrides `storage.path`.
pub fn load_config_from(path: Option<&Path>) -> Result<AptiqConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("aptiq.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AptiqConfig::default(),
    };

    apply_db_path_override(&mut config, std::env::var("APTIQ_DB_PATH").ok());
    config.validate()?;
    tracing::debug!(
        config = ?config_path,
        backend = ?config.storage.backend,
        "configuration loaded"
    );
    Ok(config)
}

/// Parse a TOML string and expand `${VAR}` references in its paths.
pub fn parse_config_str(content: &str) -> Result<AptiqConfig> {
    let mut config: AptiqConfig = toml::from_str(content)?;
    config.storage.path = resolve_path(&config.storage.path);
    config.question_bank = config.question_bank.as_deref().map(resolve_path);
    Ok(config)
}

fn apply_db_path_override(config: &mut AptiqConfig, db_path: Option<String>) {
    if let Some(path) = db_path.filter(|p| !p.is_empty()) {
        config.storage.path = PathBuf::from(path);
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("aptiq"))
}

/// Create the configured storage backend.
///
/// The SQLite database is opened lazily, so this never fails; an
/// unreachable database shows up as degraded reads later.
pub fn open_backend(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match config.backend {
        BackendKind::Sqlite => Arc::new(SqliteBackend::new(&config.path)),
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}
