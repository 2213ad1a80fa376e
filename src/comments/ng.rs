//! NG filtering: shared-NG score threshold, blocked users, blocked words
//!
//! The three predicates are independent, so `NgFilter::accepts` just ands them.
//! Word matching is substring containment, case-sensitive, via Aho-Corasick.

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::model::RawComment;

// =============================================================================
// ShareThreshold
// =============================================================================

/// Shared-NG level as chosen in the player settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShareThreshold {
    #[default]
    None,
    Low,
    Middle,
    High,
}

impl ShareThreshold {
    /// Parse the stored setting; anything unrecognized disables score filtering
    pub fn from_setting(value: &str) -> Self {
        match value {
            "low" => Self::Low,
            "middle" => Self::Middle,
            "high" => Self::High,
            _ => Self::None,
        }
    }

    /// Scores must be strictly above this to be shown
    pub fn cutoff(&self) -> Option<i64> {
        match self {
            Self::None => None,
            Self::Low => Some(-10000),
            Self::Middle => Some(-4800),
            Self::High => Some(-1000),
        }
    }

    pub fn accepts(&self, score: i64) -> bool {
        self.cutoff().map_or(true, |cutoff| score > cutoff)
    }
}

impl fmt::Display for ShareThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Low => write!(f, "low"),
            Self::Middle => write!(f, "middle"),
            Self::High => write!(f, "high"),
        }
    }
}

// =============================================================================
// NgSettings
// =============================================================================

/// Snapshot of the viewer's NG preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NgSettings {
    pub share_threshold: ShareThreshold,
    pub blocked_user_ids: HashSet<String>,
    pub blocked_words: Vec<String>,
}

impl NgSettings {
    pub fn with_threshold(mut self, threshold: ShareThreshold) -> Self {
        self.share_threshold = threshold;
        self
    }

    pub fn with_blocked_user(mut self, user_id: impl Into<String>) -> Self {
        self.blocked_user_ids.insert(user_id.into());
        self
    }

    pub fn with_blocked_word(mut self, word: impl Into<String>) -> Self {
        self.blocked_words.push(word.into());
        self
    }
}

// =============================================================================
// NgFilter
// =============================================================================

/// Compiled form of `NgSettings`
pub struct NgFilter<'a> {
    threshold: ShareThreshold,
    blocked_users: &'a HashSet<String>,
    words: Option<AhoCorasick>,
}

impl<'a> NgFilter<'a> {
    pub fn new(settings: &'a NgSettings) -> Result<Self, String> {
        // An empty word would be contained in every body
        let words: Vec<&str> = settings
            .blocked_words
            .iter()
            .map(String::as_str)
            .filter(|w| !w.is_empty())
            .collect();

        let words = if words.is_empty() {
            None
        } else {
            let automaton = AhoCorasick::new(&words)
                .map_err(|e| format!("Failed to build word matcher: {}", e))?;
            Some(automaton)
        };

        Ok(Self {
            threshold: settings.share_threshold,
            blocked_users: &settings.blocked_user_ids,
            words,
        })
    }

    pub fn accepts(&self, comment: &RawComment) -> bool {
        if !self.threshold.accepts(comment.score) {
            return false;
        }
        if self.blocked_users.contains(&comment.user_id) {
            return false;
        }
        match &self.words {
            Some(words) => !words.is_match(comment.body.as_str()),
            None => true,
        }
    }
}
