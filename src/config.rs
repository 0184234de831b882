//! Configuration management for tts-converter-rs.
//!
//! Loads config from YAML files in standard locations. Every key is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::history::{self, ConversionLedger};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub host: String,
    pub default_language: String,
    pub timeout_secs: u64,
    pub max_chars: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            host: "https://translate.google.com".into(),
            default_language: "en".into(),
            timeout_secs: 30,
            max_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub enabled: bool,
    pub host: String,
    pub source_language: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "https://translate.googleapis.com".into(),
            source_language: "en".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    File,
    Session,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: HistoryBackend,
    /// Empty means `~/.tts-converter/tts_history.json`.
    pub path: String,
    pub display_count: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::File,
            path: String::new(),
            display_count: 5,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.is_empty() {
            history::default_history_path()
        } else {
            PathBuf::from(&self.path)
        }
    }

    pub fn open_ledger(&self) -> ConversionLedger {
        match self.backend {
            HistoryBackend::File => ConversionLedger::open(self.resolved_path()),
            HistoryBackend::Session => ConversionLedger::in_memory(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tts: TtsConfig,
    pub translate: TranslateConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/tts-converter/config.yaml
    /// 3. /etc/tts-converter/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/tts-converter/config.yaml")),
                Some(PathBuf::from("/etc/tts-converter/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
