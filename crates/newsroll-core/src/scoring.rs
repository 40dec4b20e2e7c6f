//! Keyword-based scoring.
//!
//! A [`KeywordDictionary`] reports which tags a text matches and with what
//! weight. [`KeywordScorer`] sums those weights, floors the total at zero,
//! and returns the distinct set of matched tag ids.
//!
//! ```rust
//! use newsroll_core::scoring::{KeywordRule, KeywordScorer, KeywordTable};
//!
//! let table = KeywordTable::new(vec![
//!     KeywordRule::new("flood", "disaster", 5),
//!     KeywordRule::new("rumor", "unverified", -2),
//! ]);
//! let scorer = KeywordScorer::new(table);
//! let s = scorer.score(Some("Flood warning, rumor says"));
//! assert_eq!(s.score, 3);
//! assert_eq!(s.tag_ids.len(), 2);
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;

/// Source of `(tag id, weight)` matches for a piece of text.
pub trait KeywordDictionary: Send + Sync {
    fn lookup(&self, text: &str) -> Vec<(String, i64)>;
}

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub tag: String,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    1
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, tag: impl Into<String>, weight: i64) -> Self {
        Self {
            keyword: keyword.into(),
            tag: tag.into(),
            weight,
        }
    }
}

/// Case-insensitive substring dictionary. Each rule contributes its
/// weight at most once per text.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl KeywordTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| !r.keyword.trim().is_empty())
            .map(|r| KeywordRule {
                keyword: r.keyword.trim().to_lowercase(),
                ..r
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl KeywordDictionary for KeywordTable {
    fn lookup(&self, text: &str) -> Vec<(String, i64)> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|r| lowered.contains(&r.keyword))
            .map(|r| (r.tag.clone(), r.weight))
            .collect()
    }
}

/// Score and matched tags for one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    pub score: u32,
    pub tag_ids: BTreeSet<String>,
}

pub struct KeywordScorer<D> {
    dictionary: D,
}

impl<D: KeywordDictionary> KeywordScorer<D> {
    pub fn new(dictionary: D) -> Self {
        Self { dictionary }
    }

    /// Score `text`. Missing text scores zero with no tags.
    pub fn score(&self, text: Option<&str>) -> Score {
        let Some(text) = text else {
            return Score::default();
        };

        let mut total: i64 = 0;
        let mut tag_ids = BTreeSet::new();
        for (tag, weight) in self.dictionary.lookup(text) {
            total = total.saturating_add(weight);
            tag_ids.insert(tag);
        }

        Score {
            score: u32::try_from(total.max(0)).unwrap_or(u32::MAX),
            tag_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> KeywordScorer<KeywordTable> {
        KeywordScorer::new(KeywordTable::new(vec![
            KeywordRule::new("Biểu tình", "protest", 10),
            KeywordRule::new("kích động", "incitement", 4),
            KeywordRule::new("quảng cáo", "spam", -20),
            KeywordRule::new("tụ tập", "protest", 3),
        ]))
    }

    #[test]
    fn test_no_text_scores_zero() {
        assert_eq!(scorer().score(None), Score::default());
        assert_eq!(scorer().score(Some("")).score, 0);
    }

    #[test]
    fn test_weights_sum_and_tags_dedupe() {
        let s = scorer().score(Some("BIỂU TÌNH và tụ tập đông người"));
        assert_eq!(s.score, 13);
        assert_eq!(s.tag_ids.len(), 1);
        assert!(s.tag_ids.contains("protest"));
    }

    #[test]
    fn test_score_floors_at_zero() {
        let s = scorer().score(Some("quảng cáo kích động"));
        assert_eq!(s.score, 0);
        assert!(s.tag_ids.contains("spam"));
        assert!(s.tag_ids.contains("incitement"));
    }

    #[test]
    fn test_keyword_counts_once_per_text() {
        let s = scorer().score(Some("kích động, kích động, kích động"));
        assert_eq!(s.score, 4);
    }

    #[test]
    fn test_blank_keywords_are_dropped() {
        let table = KeywordTable::new(vec![KeywordRule::new("  ", "empty", 100)]);
        assert!(table.is_empty());
    }
}
