//! Same-sound spelling expansion
//!
//! Chinese has many characters that share a pronunciation, so a student who
//! types 清蒸食堂 almost certainly means 清真食堂. The pronunciation table groups
//! such spellings; expansion replaces any group member found inside a token
//! with every other member of the group.
//!
//! Table format, one group per line:
//!
//! ```text
//! # base: variants
//! 清真: 清蒸
//! 延期 = 延迟、推迟
//! ```

use crate::error::{CampusError, Result};
use ahash::{HashMap, HashMapExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Default upper bound on the number of spellings one token expands to
pub const DEFAULT_MAX_VARIANTS: usize = 64;

static LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:：=\t]+)[:：=\t](.*)$").expect("table line pattern"));

static VARIANT_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[、，,\s]+").expect("variant delimiter pattern"));

const BUILTIN_TABLE: &str = include_str!("../../config-templates/pronunciations.txt");

/// Whether `c` is a CJK ideograph
pub fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{30000}'..='\u{3134F}')
}

/// Normalized form used for every keyword and query token
pub fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}

/// Read-only map from a token to its group of same-sound spellings
#[derive(Debug, Clone)]
pub struct PhoneticVariantMap {
    groups: Vec<BTreeSet<String>>,
    group_of: HashMap<String, usize>,
    longest: usize,
    max_variants: usize,
}

impl Default for PhoneticVariantMap {
    fn default() -> Self {
        Self::empty(DEFAULT_MAX_VARIANTS)
    }
}

impl PhoneticVariantMap {
    /// Map with no groups; every token expands to itself
    pub fn empty(max_variants: usize) -> Self {
        Self {
            groups: Vec::new(),
            group_of: HashMap::new(),
            longest: 0,
            max_variants: max_variants.max(1),
        }
    }

    /// Table shipped with the crate
    pub fn builtin(max_variants: usize) -> Self {
        Self::parse(BUILTIN_TABLE, max_variants)
    }

    /// Load a pronunciation table from disk
    pub fn load(path: &Path, max_variants: usize) -> Result<Self> {
        let table = std::fs::read_to_string(path).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to read pronunciation table: {:?}", path),
        })?;
        let map = Self::parse(&table, max_variants);
        tracing::info!(
            "Loaded {} phonetic groups from {}",
            map.group_count(),
            path.display()
        );
        Ok(map)
    }

    /// Parse a pronunciation table. Malformed lines are skipped with a warning.
    pub fn parse(table: &str, max_variants: usize) -> Self {
        let mut parent: HashMap<String, String> = HashMap::new();

        for (number, raw) in table.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(caps) = LINE.captures(line) else {
                tracing::warn!("Pronunciation table line {}: missing separator", number + 1);
                continue;
            };

            let base = normalize_token(&caps[1]);
            if base.is_empty() {
                tracing::warn!("Pronunciation table line {}: empty base token", number + 1);
                continue;
            }

            let variants: Vec<String> = VARIANT_DELIMITER
                .split(&caps[2])
                .map(normalize_token)
                .filter(|v| !v.is_empty())
                .collect();
            if variants.is_empty() {
                tracing::warn!("Pronunciation table line {}: no variants", number + 1);
                continue;
            }

            find_root(&mut parent, &base);
            for variant in variants {
                union(&mut parent, &base, &variant);
            }
        }

        let tokens: Vec<String> = parent.keys().cloned().collect();
        let mut by_root: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for token in tokens {
            let root = find_root(&mut parent, &token);
            by_root.entry(root).or_default().insert(token);
        }

        let mut map = Self::empty(max_variants);
        for group in by_root.into_values() {
            let idx = map.groups.len();
            for token in &group {
                map.longest = map.longest.max(token.chars().count());
                map.group_of.insert(token.clone(), idx);
            }
            map.groups.push(group);
        }
        map
    }

    /// Number of same-sound groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of tokens that belong to some group
    pub fn len(&self) -> usize {
        self.group_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_of.is_empty()
    }

    pub fn max_variants(&self) -> usize {
        self.max_variants
    }

    /// Group containing exactly `token`
    pub fn group(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.group_of
            .get(&normalize_token(token))
            .map(|&idx| &self.groups[idx])
    }

    /// Token plus every same-sound spelling of it.
    ///
    /// Always contains the (normalized) input. Members written in ideographs
    /// are also substituted inside longer tokens; other members only match a
    /// whole token. The result is closed under substitution, so expanding any
    /// element again yields the same set.
    pub fn expand(&self, token: &str) -> BTreeSet<String> {
        let token = normalize_token(token);
        let mut out = BTreeSet::new();
        out.insert(token.clone());
        if self.is_empty() || token.is_empty() {
            return out;
        }

        let mut queue = VecDeque::from([token]);
        while let Some(current) = queue.pop_front() {
            for candidate in self.substitutions(&current) {
                if out.len() >= self.max_variants {
                    tracing::debug!("Variant cap {} reached", self.max_variants);
                    return out;
                }
                if out.insert(candidate.clone()) {
                    queue.push_back(candidate);
                }
            }
        }
        out
    }

    /// Union of the expansions of every token
    pub fn expand_all<'a, I>(&self, tokens: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        tokens.into_iter().flat_map(|t| self.expand(t)).collect()
    }

    /// Spellings one substitution away from `token`
    fn substitutions(&self, token: &str) -> Vec<String> {
        let mut found = Vec::new();

        if let Some(group) = self.group(token) {
            found.extend(group.iter().filter(|m| m.as_str() != token).cloned());
        }

        let bounds: Vec<usize> = token
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(token.len()))
            .collect();

        for (si, &start) in bounds.iter().enumerate() {
            for &end in bounds.iter().skip(si + 1).take(self.longest) {
                if start == 0 && end == token.len() {
                    continue;
                }
                let piece = &token[start..end];
                if !piece.chars().all(is_ideograph) {
                    continue;
                }
                let Some(&idx) = self.group_of.get(piece) else {
                    continue;
                };
                for member in &self.groups[idx] {
                    if member != piece && member.chars().all(is_ideograph) {
                        found.push(format!("{}{}{}", &token[..start], member, &token[end..]));
                    }
                }
            }
        }

        found
    }
}

fn find_root(parent: &mut HashMap<String, String>, token: &str) -> String {
    let mut current = token.to_string();
    loop {
        let next = parent
            .entry(current.clone())
            .or_insert_with(|| current.clone())
            .clone();
        if next == current {
            break;
        }
        current = next;
    }
    // Path compression
    let mut node = token.to_string();
    while node != current {
        let next = parent
            .insert(node.clone(), current.clone())
            .unwrap_or_else(|| current.clone());
        node = next;
    }
    current
}

fn union(parent: &mut HashMap<String, String>, a: &str, b: &str) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra != rb {
        let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent.insert(drop, keep);
    }
}
