use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{CampusError, Result, ValidationError};

/// Longest n-gram a query may be cut into
const MAX_NGRAM_LIMIT: usize = 16;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_topics(config, &mut errors);
        Self::validate_phonetic(config, &mut errors);
        Self::validate_intent(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_completion(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CampusError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_topics(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when documents are read; paths may contain ~
        if config.topics.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "topics.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if let Some(catalog) = &config.topics.catalog_file {
            if catalog.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "topics.catalog_file",
                    "Catalog file path cannot be empty",
                ));
            }
        }
    }

    fn validate_phonetic(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.phonetic.max_variants == 0 {
            errors.push(ValidationError::new(
                "phonetic.max_variants",
                "Max variants must be greater than 0",
            ));
        }

        if let Some(table) = &config.phonetic.table_file {
            if table.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "phonetic.table_file",
                    "Pronunciation table path cannot be empty",
                ));
            }
        }
    }

    fn validate_intent(config: &Config, errors: &mut Vec<ValidationError>) {
        if let Some(rules) = &config.intent.rules_file {
            if rules.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "intent.rules_file",
                    "Intent rules path cannot be empty",
                ));
            }
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.min_ngram == 0 {
            errors.push(ValidationError::new(
                "retrieval.min_ngram",
                "Minimum n-gram length must be greater than 0",
            ));
        }

        if retrieval.max_ngram < retrieval.min_ngram {
            errors.push(ValidationError::new(
                "retrieval.max_ngram",
                format!(
                    "Maximum n-gram length {} is below the minimum {}",
                    retrieval.max_ngram, retrieval.min_ngram
                ),
            ));
        }

        if retrieval.max_ngram > MAX_NGRAM_LIMIT {
            errors.push(ValidationError::new(
                "retrieval.max_ngram",
                format!(
                    "Maximum n-gram length must be at most {}, got {}",
                    MAX_NGRAM_LIMIT, retrieval.max_ngram
                ),
            ));
        }

        if retrieval.min_score == 0 {
            errors.push(ValidationError::new(
                "retrieval.min_score",
                "Minimum score must be at least 1",
            ));
        }

        if retrieval.limit == 0 {
            errors.push(ValidationError::new(
                "retrieval.limit",
                "Limit must be greater than 0",
            ));
        }
    }

    fn validate_completion(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.completion.excerpt_lines == 0 {
            errors.push(ValidationError::new(
                "completion.excerpt_lines",
                "Excerpt lines must be greater than 0",
            ));
        }
    }
}
