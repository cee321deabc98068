//! Topic catalog with lazily parsed documents and an inverted keyword index
//!
//! Documents are parsed on first use and cached until `reload` or
//! `clear_caches`. The inverted index maps every keyword (and each of its
//! same-sound spellings) to the topics that declare it. One mutex guards the
//! whole state, so "check cache, parse if missing, insert" is atomic when the
//! index is shared between threads.

mod source;

pub use source::{DirectorySource, DocumentSource, InMemorySource};

use crate::document::{parse_document, TopicDocument};
use crate::error::{CampusError, Result};
use crate::phonetic::{normalize_token, PhoneticVariantMap};
use crate::topics::{TopicCatalog, TopicDefinition};
use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Normalized token -> ids of the topics it points to
pub type InvertedIndex = BTreeMap<String, BTreeSet<String>>;

/// Counts reported by a rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Registered topics
    pub topics: usize,
    /// Topics with a parsed document
    pub documents: usize,
    /// Topics whose document failed to load or parse
    pub failed: usize,
    /// Distinct tokens in the index
    pub tokens: usize,
    /// Token -> topic pairs
    pub entries: usize,
}

#[derive(Debug, Clone)]
enum DocumentFailure {
    Malformed(String),
    Unavailable(String),
}

impl DocumentFailure {
    fn to_error(&self, topic: &str) -> CampusError {
        match self {
            DocumentFailure::Malformed(reason) => CampusError::MalformedDocument {
                topic: topic.to_string(),
                reason: reason.clone(),
            },
            DocumentFailure::Unavailable(reason) => CampusError::DocumentUnavailable {
                topic: topic.to_string(),
                reason: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum DocumentState {
    Parsed(Arc<TopicDocument>),
    Failed(DocumentFailure),
}

struct IndexState {
    /// Registration order
    definitions: Vec<TopicDefinition>,
    positions: HashMap<String, usize>,
    documents: HashMap<String, DocumentState>,
    inverted: InvertedIndex,
    stale: bool,
}

/// Catalog of topics plus the inverted index built from their keywords
pub struct TopicIndex {
    source: Arc<dyn DocumentSource>,
    variants: PhoneticVariantMap,
    state: Mutex<IndexState>,
}

impl TopicIndex {
    /// Create an empty index
    pub fn new(source: Arc<dyn DocumentSource>, variants: PhoneticVariantMap) -> Self {
        Self {
            source,
            variants,
            state: Mutex::new(IndexState {
                definitions: Vec::new(),
                positions: HashMap::new(),
                documents: HashMap::new(),
                inverted: InvertedIndex::new(),
                stale: true,
            }),
        }
    }

    /// Create an index and register every topic of `catalog`
    pub fn with_catalog(
        source: Arc<dyn DocumentSource>,
        variants: PhoneticVariantMap,
        catalog: TopicCatalog,
    ) -> Self {
        let index = Self::new(source, variants);
        index.register_all(catalog.topic);
        index
    }

    pub fn variants(&self) -> &PhoneticVariantMap {
        &self.variants
    }

    /// Register a topic. Fails if the id is taken; existing state is untouched.
    pub fn register(&self, mut definition: TopicDefinition) -> Result<()> {
        definition.id = normalize_token(&definition.id);
        if definition.id.is_empty() {
            return Err(CampusError::Config(format!(
                "Topic '{}' has an empty id",
                definition.display_name
            )));
        }

        let mut state = self.state.lock();
        if state.positions.contains_key(&definition.id) {
            return Err(CampusError::DuplicateTopic { id: definition.id });
        }

        tracing::debug!("Registered topic '{}'", definition.id);
        let position = state.definitions.len();
        state.positions.insert(definition.id.clone(), position);
        state.definitions.push(definition);
        state.stale = true;
        Ok(())
    }

    /// Register several topics in order, skipping duplicates.
    /// Returns how many were registered.
    pub fn register_all(&self, definitions: impl IntoIterator<Item = TopicDefinition>) -> usize {
        let mut registered = 0;
        for definition in definitions {
            match self.register(definition) {
                Ok(()) => registered += 1,
                Err(e) => tracing::warn!("Skipping topic: {}", e),
            }
        }
        registered
    }

    /// Parsed document for a topic, parsing it on first access
    pub fn document(&self, id: &str) -> Result<Arc<TopicDocument>> {
        let id = normalize_token(id);
        let mut state = self.state.lock();
        let position = *state
            .positions
            .get(&id)
            .ok_or_else(|| CampusError::TopicNotFound { id: id.clone() })?;
        materialize(self.source.as_ref(), &mut state, position)
    }

    /// Forget the cached document of one topic
    pub fn reload(&self, id: &str) -> Result<()> {
        let id = normalize_token(id);
        let mut state = self.state.lock();
        if !state.positions.contains_key(&id) {
            return Err(CampusError::TopicNotFound { id });
        }
        state.documents.remove(&id);
        state.stale = true;
        tracing::info!("Topic '{}' will be re-read on next access", id);
        Ok(())
    }

    /// Drop every cached document and the index. Registrations are kept.
    pub fn clear_caches(&self) {
        let mut state = self.state.lock();
        state.documents.clear();
        state.inverted.clear();
        state.stale = true;
    }

    /// Rebuild the inverted index from every registered topic.
    ///
    /// Topics whose document cannot be parsed are still indexed under their
    /// canonical keywords.
    pub fn rebuild_index(&self) -> IndexStats {
        let mut state = self.state.lock();
        let mut inverted = InvertedIndex::new();
        let mut stats = IndexStats {
            topics: state.definitions.len(),
            ..IndexStats::default()
        };

        for position in 0..state.definitions.len() {
            let mut keywords = state.definitions[position].keywords.clone();
            match materialize(self.source.as_ref(), &mut state, position) {
                Ok(document) => {
                    stats.documents += 1;
                    keywords.extend(document.keywords.iter().cloned());
                }
                Err(_) => stats.failed += 1,
            }

            let id = state.definitions[position].id.clone();
            for keyword in keywords {
                let keyword = normalize_token(&keyword);
                if keyword.is_empty() {
                    continue;
                }
                for token in self.variants.expand(&keyword) {
                    inverted.entry(token).or_default().insert(id.clone());
                }
            }
        }

        stats.tokens = inverted.len();
        stats.entries = inverted.values().map(BTreeSet::len).sum();
        state.inverted = inverted;
        state.stale = false;

        tracing::info!(
            "Index rebuilt: {} topics, {} documents, {} failed, {} tokens",
            stats.topics,
            stats.documents,
            stats.failed,
            stats.tokens
        );
        stats
    }

    /// Rebuild only if registrations or documents changed since the last build
    pub fn ensure_index(&self) -> Option<IndexStats> {
        if self.is_stale() {
            Some(self.rebuild_index())
        } else {
            None
        }
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().stale
    }

    /// Topic id -> number of distinct `tokens` found in the index
    pub fn lookup(&self, tokens: &BTreeSet<String>) -> BTreeMap<String, usize> {
        self.lookup_matches(tokens)
            .into_iter()
            .map(|(id, matched)| (id, matched.len()))
            .collect()
    }

    /// Topic id -> the `tokens` that point to it
    pub fn lookup_matches(&self, tokens: &BTreeSet<String>) -> BTreeMap<String, BTreeSet<String>> {
        let state = self.state.lock();
        let mut matches: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for token in tokens {
            if let Some(topics) = state.inverted.get(token) {
                for id in topics {
                    matches.entry(id.clone()).or_default().insert(token.clone());
                }
            }
        }
        matches
    }

    /// Whether any of `tokens` is indexed
    pub fn contains_any(&self, tokens: &BTreeSet<String>) -> bool {
        let state = self.state.lock();
        tokens.iter().any(|t| state.inverted.contains_key(t))
    }

    /// Indexed keys occurring in `text`.
    ///
    /// Catches keys no fixed query window can produce: long ideograph
    /// keywords, mixed-script keywords and multi-word phrases. A key edge that
    /// is an ASCII letter or digit must sit on a word boundary of `text`.
    pub fn keys_in(&self, text: &str) -> BTreeSet<String> {
        let text = text.to_lowercase();
        if text.trim().is_empty() {
            return BTreeSet::new();
        }

        let state = self.state.lock();
        state
            .inverted
            .keys()
            .filter(|key| occurs_as_token(&text, key))
            .cloned()
            .collect()
    }

    /// Copy of the current inverted index
    pub fn snapshot(&self) -> InvertedIndex {
        self.state.lock().inverted.clone()
    }

    /// Registered topics in registration order
    pub fn definitions(&self) -> Vec<TopicDefinition> {
        self.state.lock().definitions.clone()
    }

    pub fn definition(&self, id: &str) -> Option<TopicDefinition> {
        let state = self.state.lock();
        state
            .positions
            .get(&normalize_token(id))
            .map(|&p| state.definitions[p].clone())
    }

    /// Registration position of a topic; earlier wins ties
    pub fn position(&self, id: &str) -> Option<usize> {
        self.state.lock().positions.get(&normalize_token(id)).copied()
    }

    pub fn len(&self) -> usize {
        self.state.lock().definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, "display name - description")` for every topic
    pub fn topics(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .definitions
            .iter()
            .map(|d| (d.id.clone(), d.summary()))
            .collect()
    }

    /// Topics whose canonical keywords contain `keyword`
    pub fn find_topics_by_keyword(&self, keyword: &str) -> Vec<String> {
        let keyword = normalize_token(keyword);
        if keyword.is_empty() {
            return Vec::new();
        }
        self.state
            .lock()
            .definitions
            .iter()
            .filter(|d| d.keywords.iter().any(|k| k.to_lowercase().contains(&keyword)))
            .map(|d| d.id.clone())
            .collect()
    }
}

fn occurs_as_token(text: &str, key: &str) -> bool {
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    let key_starts_alnum = alnum(key.chars().next());
    let key_ends_alnum = alnum(key.chars().next_back());

    text.match_indices(key).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + key.len()..].chars().next();
        !(key_starts_alnum && alnum(before)) && !(key_ends_alnum && alnum(after))
    })
}

/// Return the cached document or read and parse it, caching the outcome
fn materialize(
    source: &dyn DocumentSource,
    state: &mut IndexState,
    position: usize,
) -> Result<Arc<TopicDocument>> {
    let definition = &state.definitions[position];
    let id = definition.id.clone();

    if let Some(cached) = state.documents.get(&id) {
        return match cached {
            DocumentState::Parsed(doc) => Ok(Arc::clone(doc)),
            DocumentState::Failed(failure) => Err(failure.to_error(&id)),
        };
    }

    let outcome = match source.load(&definition.document) {
        Ok(text) => match parse_document(&text) {
            Ok(doc) => Ok(Arc::new(doc)),
            Err(e) => Err(DocumentFailure::Malformed(e.to_string())),
        },
        Err(e) => Err(DocumentFailure::Unavailable(e.to_string())),
    };

    match outcome {
        Ok(doc) => {
            tracing::debug!(
                "Parsed document for '{}' ({} keywords, {} QA pairs)",
                id,
                doc.keywords.len(),
                doc.qa_pairs.len()
            );
            state
                .documents
                .insert(id, DocumentState::Parsed(Arc::clone(&doc)));
            Ok(doc)
        }
        Err(failure) => {
            tracing::warn!(
                "Topic '{}' has no usable document ({}): {}",
                id,
                source.describe(&definition.document),
                failure.to_error(&id)
            );
            let err = failure.to_error(&id);
            state.documents.insert(id, DocumentState::Failed(failure));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often each document is read
    struct CountingSource {
        inner: InMemorySource,
        reads: AtomicUsize,
    }

    impl DocumentSource for CountingSource {
        fn load(&self, reference: &str) -> Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(reference)
        }
    }

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with("library.md", "# 图书馆\n**关键词**: 图书馆、延期\n\n借阅规则。")
            .with("dining.md", "# 餐饮\n**关键词**: 食堂，餐厅\n\n食堂 7:00 开门。")
            .with("broken.md", "没有标题\n**关键词**: 坏")
    }

    fn library() -> TopicDefinition {
        TopicDefinition::new("library", "图书馆", &["library"], "library.md", "借还书")
    }

    fn dining() -> TopicDefinition {
        TopicDefinition::new("dining", "餐饮", &[], "dining.md", "食堂")
    }

    fn index() -> TopicIndex {
        let variants = PhoneticVariantMap::parse("延期: 延迟", 16);
        let index = TopicIndex::new(Arc::new(source()), variants);
        index.register(library()).unwrap();
        index.register(dining()).unwrap();
        index
    }

    fn tokens(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_topic_rejected() {
        let index = index();
        let err = index.register(library()).unwrap_err();

        assert!(matches!(err, CampusError::DuplicateTopic { ref id } if id == "library"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_document_parsed_once() {
        let source = CountingSource {
            inner: source(),
            reads: AtomicUsize::new(0),
        };
        let source = Arc::new(source);
        let index = TopicIndex::new(source.clone(), PhoneticVariantMap::default());
        index.register(library()).unwrap();

        let first = index.document("library").unwrap();
        let second = index.document("LIBRARY").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.title, "图书馆");
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        index.reload("library").unwrap();
        index.document("library").unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_topic() {
        let index = index();
        assert!(matches!(
            index.document("gym"),
            Err(CampusError::TopicNotFound { .. })
        ));
        assert!(matches!(
            index.reload("gym"),
            Err(CampusError::TopicNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_document_keeps_topic_registered() {
        let index = index();
        index
            .register(TopicDefinition::new("broken", "坏", &["维修"], "broken.md", ""))
            .unwrap();
        index
            .register(TopicDefinition::new("missing", "缺", &["地图"], "nope.md", ""))
            .unwrap();

        assert!(matches!(
            index.document("broken"),
            Err(CampusError::MalformedDocument { .. })
        ));
        // Failure is cached, same error again
        assert!(matches!(
            index.document("broken"),
            Err(CampusError::MalformedDocument { .. })
        ));
        assert!(matches!(
            index.document("missing"),
            Err(CampusError::DocumentUnavailable { .. })
        ));

        let stats = index.rebuild_index();
        assert_eq!(stats.topics, 4);
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.failed, 2);

        // Canonical keywords still route to the documentless topics
        assert_eq!(index.lookup(&tokens(&["维修"])).get("broken"), Some(&1));
        assert_eq!(index.lookup(&tokens(&["地图"])).get("missing"), Some(&1));
        // Other topics are unaffected
        assert_eq!(index.lookup(&tokens(&["食堂"])).get("dining"), Some(&1));
    }

    #[test]
    fn test_rebuild_indexes_keywords_and_variants() {
        let index = index();
        index.rebuild_index();
        let snapshot = index.snapshot();

        assert_eq!(snapshot["延迟"], tokens(&["library"]));
        assert_eq!(snapshot["延期"], tokens(&["library"]));
        assert_eq!(snapshot["library"], tokens(&["library"]));
        assert_eq!(snapshot["餐厅"], tokens(&["dining"]));
    }

    #[test]
    fn test_keys_in_finds_keys_of_any_shape() {
        let source = InMemorySource::new().with(
            "it.md",
            "# 信息化\n**关键词**: VPN账号、Web of Science、研究生院教务办公室、bus\n\n校外访问需登录 VPN。",
        );
        let index = TopicIndex::new(Arc::new(source), PhoneticVariantMap::default());
        index
            .register(TopicDefinition::new("it", "信息化", &[], "it.md", ""))
            .unwrap();
        index.rebuild_index();

        assert_eq!(index.keys_in("研究生院教务办公室"), tokens(&["研究生院教务办公室"]));
        assert_eq!(index.keys_in("怎么重置VPN账号密码"), tokens(&["vpn账号"]));
        assert_eq!(index.keys_in("Web of Science 在哪"), tokens(&["web of science"]));
        assert_eq!(index.keys_in("bus 几点"), tokens(&["bus"]));
        // ASCII keys do not match inside longer words
        assert!(index.keys_in("business school").is_empty());
        assert!(index.keys_in("   ").is_empty());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let index = index();
        let first_stats = index.rebuild_index();
        let first = index.snapshot();
        let second_stats = index.rebuild_index();

        assert_eq!(first, index.snapshot());
        assert_eq!(first_stats, second_stats);
    }

    #[test]
    fn test_lookup_counts_distinct_tokens() {
        let index = index();
        index.rebuild_index();

        let counts = index.lookup(&tokens(&["图书馆", "延迟", "食堂", "随便"]));
        assert_eq!(counts.get("library"), Some(&2));
        assert_eq!(counts.get("dining"), Some(&1));
        assert!(index.contains_any(&tokens(&["餐厅"])));
        assert!(!index.contains_any(&tokens(&["体育馆"])));
    }

    #[test]
    fn test_staleness_tracking() {
        let index = index();
        assert!(index.is_stale());
        assert!(index.ensure_index().is_some());
        assert!(index.ensure_index().is_none());

        index
            .register(TopicDefinition::new("gym", "体育馆", &["体育馆"], "gym.md", ""))
            .unwrap();
        assert!(index.is_stale());
        index.ensure_index();
        assert_eq!(index.lookup(&tokens(&["体育馆"])).get("gym"), Some(&1));

        index.clear_caches();
        assert!(index.snapshot().is_empty());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_listing_helpers() {
        let index = index();

        assert_eq!(index.position("dining"), Some(1));
        assert_eq!(index.topics()[0], ("library".to_string(), "图书馆 - 借还书".to_string()));
        assert_eq!(index.find_topics_by_keyword("LIB"), vec!["library".to_string()]);
        assert!(index.find_topics_by_keyword("  ").is_empty());
        assert_eq!(index.definition("Dining").unwrap().display_name, "餐饮");
    }

    #[test]
    fn test_concurrent_first_access_parses_once() {
        let source = Arc::new(CountingSource {
            inner: source(),
            reads: AtomicUsize::new(0),
        });
        let index = Arc::new(TopicIndex::new(source.clone(), PhoneticVariantMap::default()));
        index.register(library()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || index.document("library").unwrap().title.clone())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "图书馆");
        }
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }
}
