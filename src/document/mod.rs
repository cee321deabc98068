//! Topic document parsing
//!
//! A topic document is a small markdown file:
//!
//! ```text
//! # 学术资源
//! **关键词**: 图书馆、借书，文献, 数据库
//!
//! 图书馆开放时间为 8:00-22:00。
//!
//! Q: 图书可以续借吗？
//! A: 可以在线续借一次。
//! ```
//!
//! The first level-one heading is the title, the bold `关键词`/`Keywords` line
//! is the keyword list and everything else is body text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[ \t]+(.+?)\s*$").expect("title pattern"));

static KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\*\*|__|\*|_)\s*(?:关键词|关键字|keywords?)\s*[:：]?\s*(?:\*\*|__|\*|_)\s*[:：]?\s*(.*)$",
    )
    .expect("keyword line pattern")
});

static KEYWORD_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[、，,]").expect("keyword delimiter pattern"));

static QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?(?:Q|q|问题|问)\s*[:：]\s*(.+?)\s*$").expect("question pattern")
});

static ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?(?:A|a|回答|答)\s*[:：]\s*(.+?)\s*$").expect("answer pattern")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing top-level heading")]
    MissingTitle,

    #[error("document is empty")]
    Empty,
}

/// Example question/answer pair found inside a document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Parsed topic document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDocument {
    /// Text of the first `# ` heading
    pub title: String,
    /// Keywords in document order, without duplicates
    pub keywords: Vec<String>,
    /// Remaining text, verbatim apart from outer whitespace
    pub body: String,
    /// Question/answer pairs recognised in the body
    #[serde(default)]
    pub qa_pairs: Vec<QaPair>,
}

impl TopicDocument {
    /// First `lines` non-empty lines of the body
    pub fn excerpt(&self, lines: usize) -> String {
        self.body
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .take(lines)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// QA pair whose question mentions the most of `tokens`
    pub fn best_qa(&self, tokens: &BTreeSet<String>) -> Option<&QaPair> {
        let mut best: Option<(&QaPair, usize)> = None;
        for pair in &self.qa_pairs {
            let question = pair.question.to_lowercase();
            let hits = tokens
                .iter()
                .filter(|t| question.contains(t.as_str()))
                .count();
            if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
                best = Some((pair, hits));
            }
        }
        best.map(|(pair, _)| pair)
    }
}

/// Parse one document.
///
/// A missing keyword line is not an error: the document gets an empty
/// keyword list and a warning is logged.
pub fn parse_document(text: &str) -> Result<TopicDocument, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    // Lines keep their terminators so the body can be reassembled verbatim
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    let (title_line, title) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| {
            TITLE
                .captures(strip_line_ending(line))
                .map(|c| (i, c[1].to_string()))
        })
        .ok_or(ParseError::MissingTitle)?;

    let keyword_line = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != title_line)
        .find_map(|(i, line)| {
            KEYWORDS
                .captures(strip_line_ending(line))
                .map(|c| (i, c[1].trim().to_string()))
        });

    let keywords = match &keyword_line {
        Some((_, list)) => split_keywords(list),
        None => {
            tracing::warn!("Document '{}' has no keyword line", title);
            Vec::new()
        }
    };

    let skip_keyword = keyword_line.as_ref().map(|(i, _)| *i);
    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != title_line && Some(*i) != skip_keyword)
        .map(|(_, line)| *line)
        .collect();
    let body = body_text(&kept);

    let qa_pairs = extract_qa_pairs(&body);

    Ok(TopicDocument {
        title,
        keywords,
        body,
        qa_pairs,
    })
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Lines joined as written, without the blank lines around them
fn body_text(lines: &[&str]) -> String {
    let blank = |line: &&str| line.trim().is_empty();
    let Some(first) = lines.iter().position(|l| !blank(l)) else {
        return String::new();
    };
    let last = lines.iter().rposition(|l| !blank(l)).unwrap_or(first);

    let body = lines[first..=last].concat();
    strip_line_ending(&body).to_string()
}

/// Split a keyword list on full-width or half-width commas and 、
pub fn split_keywords(list: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    KEYWORD_DELIMITER
        .split(list)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

fn extract_qa_pairs(body: &str) -> Vec<QaPair> {
    let lines: Vec<&str> = body.lines().collect();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(question) = QUESTION.captures(lines[i]).map(|c| c[1].to_string()) else {
            i += 1;
            continue;
        };

        let mut j = i + 1;
        while j < lines.len() && lines[j].trim().is_empty() {
            j += 1;
        }

        let Some(first) = lines.get(j).and_then(|l| ANSWER.captures(l)) else {
            // Unpaired question stays plain body text
            i += 1;
            continue;
        };

        let mut answer = first[1].to_string();
        j += 1;
        while j < lines.len() {
            let line = lines[j].trim();
            if line.is_empty() || QUESTION.is_match(lines[j]) {
                break;
            }
            answer.push('\n');
            answer.push_str(line);
            j += 1;
        }

        pairs.push(QaPair { question, answer });
        i = j;
    }

    pairs
}
