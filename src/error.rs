use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the campus assistant
#[derive(Error, Debug)]
pub enum CampusError {
    /// Topic document is missing its title or could not be parsed
    #[error("Malformed document for topic '{topic}': {reason}")]
    MalformedDocument { topic: String, reason: String },

    /// Topic document source could not be read
    #[error("Document for topic '{topic}' is unavailable: {reason}")]
    DocumentUnavailable { topic: String, reason: String },

    /// A topic with the same identifier is already registered
    #[error("Topic already registered: {id}")]
    DuplicateTopic { id: String },

    /// Lookup of an unregistered topic
    #[error("Topic not found: {id}")]
    TopicNotFound { id: String },

    /// The external completion service failed
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for campus assistant operations
pub type Result<T> = std::result::Result<T, CampusError>;
