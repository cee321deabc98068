//! Query tokenization
//!
//! Chinese queries carry no spaces, so runs of ideographs are cut into every
//! n-gram in the configured length range and the index decides which of them
//! are real keywords. Everything else is split into Unicode words.

use crate::phonetic::{is_ideograph, normalize_token};
use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Splits a query into normalized tokens
#[derive(Debug, Clone)]
pub struct QueryTokenizer {
    min_ngram: usize,
    max_ngram: usize,
}

impl Default for QueryTokenizer {
    fn default() -> Self {
        Self::new(1, 6)
    }
}

impl QueryTokenizer {
    pub fn new(min_ngram: usize, max_ngram: usize) -> Self {
        let min_ngram = min_ngram.max(1);
        Self {
            min_ngram,
            max_ngram: max_ngram.max(min_ngram),
        }
    }

    /// Distinct tokens of `query`
    pub fn tokenize(&self, query: &str) -> BTreeSet<String> {
        let text = query.to_lowercase();
        let mut tokens = BTreeSet::new();
        let mut run: Vec<char> = Vec::new();
        let mut other = String::new();

        for c in text.chars() {
            if is_ideograph(c) {
                if !other.is_empty() {
                    self.push_words(&other, &mut tokens);
                    other.clear();
                }
                run.push(c);
            } else {
                if !run.is_empty() {
                    self.push_ngrams(&run, &mut tokens);
                    run.clear();
                }
                other.push(c);
            }
        }
        self.push_ngrams(&run, &mut tokens);
        self.push_words(&other, &mut tokens);

        tokens
    }

    fn push_ngrams(&self, run: &[char], tokens: &mut BTreeSet<String>) {
        for len in self.min_ngram..=self.max_ngram.min(run.len()) {
            for window in run.windows(len) {
                tokens.insert(window.iter().collect());
            }
        }
    }

    fn push_words(&self, text: &str, tokens: &mut BTreeSet<String>) {
        tokens.extend(
            text.unicode_words()
                .map(normalize_token)
                .filter(|w| !w.is_empty()),
        );
    }
}
