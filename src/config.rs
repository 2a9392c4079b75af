//! Runtime settings loaded from an optional YAML file.
//!
//! Every field has a built-in default, so an empty file (or no file at all)
//! gives a working configuration. Command-line flags are applied on top in
//! `main`.
//!
//! ```yaml
//! fetch:
//!   static_timeout_secs: 30
//!   navigation_timeout_secs: 15
//!   marker_timeout_secs: 10
//! run:
//!   max_concurrency: 3
//!   politeness_delay_ms: 1500
//!   deadline_secs: 180
//! sources:
//!   press_release:
//!     max_items: 10
//!     extra_keywords: ["질병"]
//!   keyword_search:
//!     enabled: false
//! ```

use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub run: RunSettings,
    pub sources: HashMap<Category, SourceOverride>,
}

/// Timeouts and identity used by both fetch strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub static_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub marker_timeout_secs: u64,
    /// Upper bound for the startup browser probe.
    pub probe_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            static_timeout_secs: 30,
            navigation_timeout_secs: 15,
            marker_timeout_secs: 10,
            probe_timeout_secs: 20,
        }
    }
}

impl FetchSettings {
    pub fn static_timeout(&self) -> Duration {
        Duration::from_secs(self.static_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn marker_timeout(&self) -> Duration {
        Duration::from_secs(self.marker_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Orchestration limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_concurrency: usize,
    pub politeness_delay_ms: u64,
    pub deadline_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            politeness_delay_ms: 1500,
            deadline_secs: 180,
        }
    }
}

impl RunSettings {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Per-source adjustments applied to the built-in source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
    pub enabled: bool,
    pub max_items: Option<usize>,
    /// Replaces the built-in keyword list.
    pub keywords: Option<Vec<String>>,
    /// Added to the built-in (or replaced) keyword list.
    pub extra_keywords: Vec<String>,
}

impl Default for SourceOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: None,
            keywords: None,
            extra_keywords: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let settings = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        settings.validate()?;
        info!("Loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "run.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch.static_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.static_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn source(&self, category: Category) -> Option<&SourceOverride> {
        self.sources.get(&category)
    }
}
