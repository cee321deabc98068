//! Configuration management for the campus assistant
//!
//! Loading, environment overrides and validation of `config.toml`. Topic
//! catalog, pronunciation table and intent rules live in their own files;
//! when a path is not set the copies shipped with the crate are used.

use crate::error::{CampusError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Current configuration schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub topics: TopicsConfig,
    pub phonetic: PhoneticConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    pub retrieval: RetrievalConfig,
    pub completion: CompletionConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where topic documents and the topic catalog live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub data_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<PathBuf>,
}

/// Pronunciation table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneticConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_file: Option<PathBuf>,
    pub max_variants: usize,
}

/// Intent rule settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

/// Query matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Shortest ideograph n-gram taken from a query
    pub min_ngram: usize,
    /// Longest ideograph n-gram taken from a query
    pub max_ngram: usize,
    /// Matched tokens a topic needs before it counts as a match
    pub min_score: usize,
    /// Default number of ranked topics shown by `match`
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_ngram: 1,
            max_ngram: 6,
            min_score: 1,
            limit: 3,
        }
    }
}

/// Offline completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Body lines quoted by the offline answerer
    pub excerpt_lines: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CampusError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CAMPUS_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("CAMPUS_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "TOPICS__DATA_DIR" => {
                self.topics.data_dir = PathBuf::from(value);
            }
            "TOPICS__CATALOG_FILE" => {
                self.topics.catalog_file = Some(PathBuf::from(value));
            }
            "PHONETIC__TABLE_FILE" => {
                self.phonetic.table_file = Some(PathBuf::from(value));
            }
            "INTENT__RULES_FILE" => {
                self.intent.rules_file = Some(PathBuf::from(value));
            }
            "RETRIEVAL__MIN_SCORE" => {
                self.retrieval.min_score = parse_usize(path, value)?;
            }
            "RETRIEVAL__MAX_NGRAM" => {
                self.retrieval.max_ngram = parse_usize(path, value)?;
            }
            "COMPLETION__EXCERPT_LINES" => {
                self.completion.excerpt_lines = parse_usize(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CampusError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("campus-assistant").join("config.toml"))
    }
}

fn parse_usize(path: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| CampusError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}' as a number", value),
    })
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CampusError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CampusError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            topics: TopicsConfig {
                data_dir: PathBuf::from("data/topics"),
                catalog_file: None,
            },
            phonetic: PhoneticConfig {
                table_file: None,
                max_variants: crate::phonetic::DEFAULT_MAX_VARIANTS,
            },
            intent: IntentConfig::default(),
            retrieval: RetrievalConfig::default(),
            completion: CompletionConfig { excerpt_lines: 4 },
        }
    }
}
