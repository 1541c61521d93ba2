use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::sources::{SUPPORTED_KINDS, get_profile};
use crate::strategy::{ParamOverrides, StrategyParameters};

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - The sources to poll and their kinds
// - Persistence cadence for strategy metrics
// - Optional debug configuration
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Sources to collect from
    pub sources: Vec<SourceConfig>,

    /// Optional persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// One polled source. Each source gets its own strategy instance
// and its own worker task.
//
// IMPORTANT:
// - `name` is the persistence key; renaming a source starts a
//   fresh metrics history.
// - `kind` selects the preset ("reddit", "rss", "web").
//
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Unique source identifier (e.g. "reddit-rust")
    pub name: String,

    /// Profile kind, see `sources::SUPPORTED_KINDS`
    pub kind: String,

    /// URL fetched on every poll
    pub url: String,

    /// Enables or disables this source at runtime
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Pause between polls, on top of the adaptive delay
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Optional overrides for the kind's preset
    pub params: Option<ParamOverrides>,
}

impl SourceConfig {
    /// Resolves the effective parameters: preset plus overrides.
    pub fn strategy_params(&self) -> Result<StrategyParameters> {
        let profile = get_profile(&self.kind)
            .with_context(|| format!("source '{}': unknown kind '{}'", self.name, self.kind))?;
        let preset = profile.default_params();

        match &self.params {
            Some(overrides) => preset
                .apply_overrides(overrides)
                .with_context(|| format!("source '{}': invalid parameter overrides", self.name)),
            None => Ok(preset),
        }
    }
}

// ------------------------------------------------------------
// Persistence configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    /// Snapshot every N requests per source (0 disables)
    #[serde(default = "default_persist_interval")]
    pub interval: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            interval: default_persist_interval(),
        }
    }
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Raises the default log level to `debug`
    pub log: Option<bool>,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_persist_interval() -> u64 {
    crate::strategy::controller::DEFAULT_PERSISTENCE_INTERVAL
}

impl Config {
    /// Parses and validates a configuration document.
    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(data).context("config is not valid JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic checks that serde cannot express.
    ///
    /// Fails fast so a typo in one source does not surface hours
    /// later as a silently skipped worker.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for source in &self.sources {
            if source.name.trim().is_empty() {
                bail!("source with url '{}' has an empty name", source.url);
            }
            if !seen.insert(source.name.as_str()) {
                bail!("duplicate source name '{}'", source.name);
            }
            if get_profile(&source.kind).is_none() {
                bail!(
                    "source '{}': unknown kind '{}' (supported: {})",
                    source.name,
                    source.kind,
                    SUPPORTED_KINDS.join(", ")
                );
            }
            source.strategy_params()?;
        }

        Ok(())
    }

    pub fn debug_log(&self) -> bool {
        self.debug.as_ref().is_some_and(|d| d.log.unwrap_or(false))
    }
}

/// Reads and validates `config.json` (or another path) from disk.
pub fn load_config(path: &str) -> Result<Config> {
    let data = fs::read_to_string(path).with_context(|| format!("cannot read {}", path))?;
    Config::from_json(&data)
}
