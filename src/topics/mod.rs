//! Topic definitions and the topic catalog file
//!
//! The catalog is configuration-driven: `topics.toml` lists every topic with
//! its canonical keywords and the document that backs it.

use crate::error::{CampusError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../config-templates/topics.toml");

/// A registered campus topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDefinition {
    /// Stable key, e.g. "dining"
    pub id: String,
    /// Name shown to users
    pub display_name: String,
    /// Canonical keywords, used even when the document cannot be parsed
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Document reference resolved by a [`crate::index::DocumentSource`]
    pub document: String,
    #[serde(default)]
    pub description: String,
}

impl TopicDefinition {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        keywords: &[&str],
        document: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into().trim().to_lowercase(),
            display_name: display_name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            document: document.into(),
            description: description.into(),
        }
    }

    /// "display name - description", as listed to users
    pub fn summary(&self) -> String {
        format!("{} - {}", self.display_name, self.description)
    }
}

/// Topic catalog file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicCatalog {
    #[serde(default)]
    pub topic: Vec<TopicDefinition>,
}

impl TopicCatalog {
    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to read topic catalog: {:?}", path),
        })?;
        Self::parse(&content)
    }

    /// Parse catalog TOML and normalize topic ids
    pub fn parse(content: &str) -> Result<Self> {
        let mut catalog: TopicCatalog = toml::from_str(content)?;
        for topic in &mut catalog.topic {
            topic.id = topic.id.trim().to_lowercase();
            if topic.id.is_empty() {
                return Err(CampusError::Config(format!(
                    "Topic '{}' has an empty id",
                    topic.display_name
                )));
            }
        }
        Ok(catalog)
    }

    /// The ten standard campus topics
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn len(&self) -> usize {
        self.topic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = TopicCatalog::builtin().unwrap();

        assert_eq!(catalog.len(), 10);
        let dining = catalog.topic.iter().find(|t| t.id == "dining").unwrap();
        assert!(dining.keywords.contains(&"食堂".to_string()));
        assert_eq!(dining.document, "Campus_and_Nearby_Dining_Options.md");
    }

    #[test]
    fn test_ids_are_normalized() {
        let catalog = TopicCatalog::parse(
            r#"
            [[topic]]
            id = " Library "
            display_name = "图书馆"
            document = "library.md"
            "#,
        )
        .unwrap();

        assert_eq!(catalog.topic[0].id, "library");
        assert!(catalog.topic[0].keywords.is_empty());
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = TopicCatalog::parse(
            r#"
            [[topic]]
            id = "  "
            display_name = "?"
            document = "x.md"
            "#,
        );
        assert!(matches!(result, Err(CampusError::Config(_))));
    }

    #[test]
    fn test_summary() {
        let topic = TopicDefinition::new("Dining", "餐饮选项", &["食堂"], "dining.md", "食堂信息");
        assert_eq!(topic.id, "dining");
        assert_eq!(topic.summary(), "餐饮选项 - 食堂信息");
    }
}
