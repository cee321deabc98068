//! Query matching
//!
//! The retriever classifies a query, cuts it into tokens, expands each token
//! with its same-sound spellings and asks the topic index which topics those
//! tokens point to. Topics are ranked by how many distinct query tokens hit
//! them; ties go to the topic registered first.

mod completion;
mod tokenizer;

pub use completion::{CompletionRequest, CompletionService, ExcerptCompletion};
pub use tokenizer::QueryTokenizer;

use crate::config::{expand_path, Config, RetrievalConfig};
use crate::document::QaPair;
use crate::error::{CampusError, Result};
use crate::index::{DirectorySource, TopicIndex};
use crate::intent::{Intent, IntentClassifier};
use crate::phonetic::{normalize_token, PhoneticVariantMap};
use crate::topics::{TopicCatalog, TopicDefinition};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Best topic for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMatch {
    pub topic_id: String,
    pub display_name: String,
    /// Distinct query tokens that hit the topic
    pub score: usize,
    /// Document reference of the topic
    pub document: String,
    /// The query tokens that hit, sorted
    pub matched_tokens: Vec<String>,
    /// Example QA pair whose question best overlaps the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa: Option<QaPair>,
}

/// Result of matching one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Salutation; the caller replies with a canned greeting
    Greeting,
    Matched(TopicMatch),
    /// Unknown intent, or no topic scored high enough
    NoConfidentMatch { intent: Intent },
}

impl MatchOutcome {
    pub fn topic(&self) -> Option<&TopicMatch> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}

/// Result of answering one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Answer {
    Greeting,
    NoMatch { intent: Intent },
    /// Text from the completion service, unmodified
    Generated { topic: TopicMatch, text: String },
}

/// Query tokens and the expanded spellings derived from them
struct QueryTokens {
    tokens: BTreeSet<String>,
    /// Expanded spelling -> query tokens it came from
    origins: BTreeMap<String, BTreeSet<String>>,
}

impl QueryTokens {
    fn expanded(&self) -> BTreeSet<String> {
        self.origins.keys().cloned().collect()
    }
}

/// Classifies queries and ranks topics against the index
pub struct Retriever {
    index: Arc<TopicIndex>,
    classifier: IntentClassifier,
    tokenizer: QueryTokenizer,
    min_score: usize,
}

impl Retriever {
    pub fn new(index: Arc<TopicIndex>, classifier: IntentClassifier, config: &RetrievalConfig) -> Self {
        Self {
            index,
            classifier,
            tokenizer: QueryTokenizer::new(config.min_ngram, config.max_ngram),
            min_score: config.min_score.max(1),
        }
    }

    /// Assemble the catalog, pronunciation table, intent rules and document
    /// directory named by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = match &config.topics.catalog_file {
            Some(path) => TopicCatalog::load(&expand_path(path)?)?,
            None => TopicCatalog::builtin()?,
        };

        let variants = match &config.phonetic.table_file {
            Some(path) => PhoneticVariantMap::load(&expand_path(path)?, config.phonetic.max_variants)?,
            None => PhoneticVariantMap::builtin(config.phonetic.max_variants),
        };

        let classifier = match &config.intent.rules_file {
            Some(path) => IntentClassifier::load(&expand_path(path)?)?,
            None => IntentClassifier::builtin()?,
        };

        let source = DirectorySource::new(expand_path(&config.topics.data_dir)?);
        tracing::info!(
            "Loading {} topics from {}",
            catalog.len(),
            source.root().display()
        );

        let index = TopicIndex::with_catalog(Arc::new(source), variants, catalog);
        Ok(Self::new(Arc::new(index), classifier, &config.retrieval))
    }

    pub fn index(&self) -> &Arc<TopicIndex> {
        &self.index
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Classify a query, consulting the index when no rule matches
    pub fn classify(&self, query: &str) -> Intent {
        self.index.ensure_index();
        let tokens = self.analyze(query);
        self.classify_tokens(query, &tokens)
    }

    /// Match a query to its best topic
    pub fn match_query(&self, query: &str) -> MatchOutcome {
        self.index.ensure_index();
        let tokens = self.analyze(query);
        let intent = self.classify_tokens(query, &tokens);
        tracing::debug!("Query {:?} classified as {}", query, intent);

        match intent {
            Intent::Greeting => MatchOutcome::Greeting,
            Intent::Unknown => MatchOutcome::NoConfidentMatch { intent },
            Intent::TopicQuery => match self.rank_tokens(&tokens).into_iter().next() {
                Some(best) => MatchOutcome::Matched(best),
                None => MatchOutcome::NoConfidentMatch { intent },
            },
        }
    }

    /// Every topic scoring at least `min_score`, best first, regardless of intent
    pub fn rank(&self, query: &str, limit: usize) -> Vec<TopicMatch> {
        self.index.ensure_index();
        let tokens = self.analyze(query);
        let mut ranked = self.rank_tokens(&tokens);
        ranked.truncate(limit);
        ranked
    }

    /// Match a query and hand the matched body to `completion`.
    ///
    /// "No topic matched" is `Ok(Answer::NoMatch)`; a completion failure is
    /// `Err(GenerationUnavailable)`.
    pub fn answer(&self, query: &str, completion: &dyn CompletionService) -> Result<Answer> {
        let topic = match self.match_query(query) {
            MatchOutcome::Greeting => return Ok(Answer::Greeting),
            MatchOutcome::NoConfidentMatch { intent } => return Ok(Answer::NoMatch { intent }),
            MatchOutcome::Matched(topic) => topic,
        };

        self.generate(topic, query, completion)
    }

    /// Answer from one chosen topic, skipping ranking.
    ///
    /// Greetings are still answered as greetings. Any other query goes to the
    /// topic's document even when none of its words hit the topic.
    /// `TopicNotFound` for an unregistered id; a topic without a usable
    /// document gives `Answer::NoMatch`.
    pub fn answer_in_topic(
        &self,
        id: &str,
        query: &str,
        completion: &dyn CompletionService,
    ) -> Result<Answer> {
        let definition = self
            .index
            .definition(id)
            .ok_or_else(|| CampusError::TopicNotFound {
                id: normalize_token(id),
            })?;

        self.index.ensure_index();
        let tokens = self.analyze(query);
        if self.classify_tokens(query, &tokens) == Intent::Greeting {
            return Ok(Answer::Greeting);
        }

        let matched = self
            .index
            .lookup_matches(&tokens.expanded())
            .remove(&definition.id)
            .unwrap_or_default();
        let topic = self.topic_match(definition, &matched, &tokens);
        tracing::debug!(
            "Query {:?} answered from chosen topic '{}' (score {})",
            query,
            topic.topic_id,
            topic.score
        );

        self.generate(topic, query, completion)
    }

    /// Hand the topic body to `completion`
    fn generate(
        &self,
        topic: TopicMatch,
        query: &str,
        completion: &dyn CompletionService,
    ) -> Result<Answer> {
        let document = match self.index.document(&topic.topic_id) {
            Ok(document) if !document.body.trim().is_empty() => document,
            Ok(_) => {
                tracing::warn!("Topic '{}' matched but its body is empty", topic.topic_id);
                return Ok(Answer::NoMatch {
                    intent: Intent::TopicQuery,
                });
            }
            Err(e) => {
                tracing::warn!("Topic '{}' matched but has no document: {}", topic.topic_id, e);
                return Ok(Answer::NoMatch {
                    intent: Intent::TopicQuery,
                });
            }
        };

        let request = CompletionRequest {
            topic: topic.display_name.clone(),
            context: document.body.clone(),
            query: query.to_string(),
        };

        let text = completion
            .complete(&request)
            .map_err(|e| CampusError::GenerationUnavailable(format!("{:#}", e)))?;

        Ok(Answer::Generated { topic, text })
    }

    fn analyze(&self, query: &str) -> QueryTokens {
        let mut tokens = self.tokenizer.tokenize(query);
        tokens.extend(self.index.keys_in(query));
        let mut origins: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for token in &tokens {
            for spelling in self.index.variants().expand(token) {
                origins.entry(spelling).or_default().insert(token.clone());
            }
        }
        QueryTokens { tokens, origins }
    }

    fn classify_tokens(&self, query: &str, tokens: &QueryTokens) -> Intent {
        self.classifier
            .classify_with(query, |_| self.index.contains_any(&tokens.expanded()))
    }

    fn rank_tokens(&self, tokens: &QueryTokens) -> Vec<TopicMatch> {
        let hits = self.index.lookup_matches(&tokens.expanded());

        let mut ranked: Vec<(usize, TopicMatch)> = hits
            .into_iter()
            .filter_map(|(id, spellings)| {
                let definition = self.index.definition(&id)?;
                let position = self.index.position(&id)?;
                let topic = self.topic_match(definition, &spellings, tokens);
                (topic.score >= self.min_score).then_some((position, topic))
            })
            .collect();

        ranked.sort_by_key(|(position, m)| (Reverse(m.score), *position));
        ranked.into_iter().map(|(_, m)| m).collect()
    }

    /// Score a topic from the indexed spellings that hit it
    fn topic_match(
        &self,
        definition: TopicDefinition,
        spellings: &BTreeSet<String>,
        tokens: &QueryTokens,
    ) -> TopicMatch {
        let matched: BTreeSet<String> = spellings
            .iter()
            .filter_map(|s| tokens.origins.get(s))
            .flatten()
            .cloned()
            .collect();
        let qa = self
            .index
            .document(&definition.id)
            .ok()
            .and_then(|doc| doc.best_qa(&tokens.tokens).cloned());

        TopicMatch {
            topic_id: definition.id,
            display_name: definition.display_name,
            score: matched.len(),
            document: definition.document,
            matched_tokens: matched.into_iter().collect(),
            qa,
        }
    }
}
