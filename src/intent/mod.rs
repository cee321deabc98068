//! Rule-based intent classification
//!
//! Rules are an ordered list of `(pattern, intent)` pairs loaded from
//! `intents.toml`. Lower priority values are checked first and the first
//! match decides, so greetings (priority 0) win over campus markers.

use crate::error::{CampusError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const BUILTIN_RULES: &str = include_str!("../../config-templates/intents.toml");

/// Coarse classification of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    TopicQuery,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Greeting => "GREETING",
            Intent::TopicQuery => "TOPIC_QUERY",
            Intent::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Intent rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRuleConfig {
    pub name: String,
    pub pattern: String,
    pub intent: Intent,
    #[serde(default)]
    pub priority: u8,
}

/// Intent rules file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentRulesConfig {
    #[serde(default)]
    pub rule: Vec<IntentRuleConfig>,
}

/// Compiled intent rule
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub name: String,
    pub regex: Regex,
    pub intent: Intent,
    pub priority: u8,
}

/// Stateless classifier over an ordered rule list
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    /// Compile rules; order is by priority, then file order
    pub fn from_config(config: IntentRulesConfig) -> Result<Self> {
        let mut rules = config
            .rule
            .into_iter()
            .map(|r| {
                Regex::new(&r.pattern)
                    .map(|regex| IntentRule {
                        name: r.name.clone(),
                        regex,
                        intent: r.intent,
                        priority: r.priority,
                    })
                    .map_err(|e| {
                        CampusError::Config(format!("Invalid intent pattern '{}': {}", r.name, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        rules.sort_by_key(|r| r.priority);

        Ok(Self { rules })
    }

    /// Load rules from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to read intent rules: {:?}", path),
        })?;
        Self::from_config(toml::from_str(&content)?)
    }

    /// Rules shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_config(toml::from_str(BUILTIN_RULES)?)
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// First rule matching the query, in evaluation order
    pub fn matching_rule(&self, query: &str) -> Option<&IntentRule> {
        let text = query.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        self.rules.iter().find(|r| r.regex.is_match(&text))
    }

    /// Classify using rules only
    pub fn classify(&self, query: &str) -> Intent {
        self.classify_with(query, |_| false)
    }

    /// Classify, falling back to `hits_index` when no rule matches.
    ///
    /// `hits_index` answers whether the expanded query tokens hit the topic
    /// index. It is only called for non-empty queries that no rule claimed.
    pub fn classify_with<F>(&self, query: &str, hits_index: F) -> Intent
    where
        F: FnOnce(&str) -> bool,
    {
        if query.trim().is_empty() {
            return Intent::Unknown;
        }

        if let Some(rule) = self.matching_rule(query) {
            tracing::debug!("Intent rule '{}' matched -> {}", rule.name, rule.intent);
            return rule.intent;
        }

        if hits_index(query) {
            Intent::TopicQuery
        } else {
            Intent::Unknown
        }
    }
}
