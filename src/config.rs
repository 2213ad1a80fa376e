// nicoru-fix/src/config.rs
//
// Configuration types for the count-correction pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comment API endpoint whose responses feed the pipeline
pub const DEFAULT_API_URL: &str = "https://public.nvcomment.nicovideo.jp/v1/threads";

/// Thread kind that never shows up in the comment list
pub const DEFAULT_OWNER_FORK: &str = "owner";

// =============================================================================
// Ordering
// =============================================================================

/// How comments sharing a `vposMs` are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    /// Stable-sort threads by fork name before flattening ("easy" before "main")
    #[default]
    ForkName,

    /// Keep threads in payload order
    InputOrder,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForkName => write!(f, "forkName"),
            Self::InputOrder => write!(f, "inputOrder"),
        }
    }
}

// =============================================================================
// Storage keys
// =============================================================================

/// localStorage keys holding the player's NG settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageKeys {
    /// Holds `data.ngScoreThreshold.data`
    pub share_ng_key: String,
    /// Holds `data.lastMatchedTimeMap.data.{word,id}`
    pub user_ng_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            share_ng_key: "nvpc:watch".to_string(),
            user_ng_key: "@nvweb-packages/comments:userng:v2".to_string(),
        }
    }
}

// =============================================================================
// Retry policy
// =============================================================================

/// Poll schedule for the list locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay before the first probe and between probes
    pub interval_ms: u32,
    /// Multiplier applied to the delay after every miss (1.0 = fixed interval)
    pub backoff: f64,
    /// Upper bound for the grown delay
    pub max_interval_ms: u32,
    /// Give up after this many probes (None = poll forever)
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            backoff: 1.0,
            max_interval_ms: 500,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before probe number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> u32 {
        let grown = self.interval_ms as f64 * self.backoff.powi(attempt.min(i32::MAX as u32) as i32);
        if !grown.is_finite() || grown >= self.max_interval_ms as f64 {
            return self.max_interval_ms;
        }
        grown as u32
    }

    /// Builder: cap the number of probes
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

// =============================================================================
// Locator
// =============================================================================

/// Where the comment list container hangs off the marker control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocatorConfig {
    /// Tag name of the marker control
    pub marker_tag: String,
    /// `aria-label` identifying the marker control
    pub marker_label: String,
    /// Parent hops from the marker to the list container
    pub ancestor_levels: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            marker_tag: "button".to_string(),
            marker_label: "ニコるボタン".to_string(),
            ancestor_levels: 4,
        }
    }
}

// =============================================================================
// Row markup
// =============================================================================

/// Shape of one rendered comment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowMarkup {
    /// Attribute carrying the row's corpus position
    pub index_attribute: String,
    /// Tag shared by the count and body text elements
    pub text_tag: String,
    /// Position of the count element among `text_tag` descendants
    pub count_position: u32,
    /// Position of the body element among `text_tag` descendants
    pub body_position: u32,
    /// Tag of the reaction icon
    pub toggle_tag: String,
    /// Class present on the icon while the viewer's reaction is on
    pub toggle_class: String,
    /// Attribute the watcher filters on for local toggles
    pub watched_attribute: String,
    /// Attribute receiving the matched corpus entry as JSON (None = no annotation)
    pub debug_attribute: Option<String>,
}

impl Default for RowMarkup {
    fn default() -> Self {
        Self {
            index_attribute: "data-index".to_string(),
            text_tag: "p".to_string(),
            count_position: 0,
            body_position: 1,
            toggle_tag: "svg".to_string(),
            toggle_class: "transform_rotate(-90deg)".to_string(),
            watched_attribute: "class".to_string(),
            debug_attribute: Some("comment-object".to_string()),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Full configuration accepted by `install`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixConfig {
    /// Exact response URL to intercept
    pub api_url: String,
    /// Thread fork excluded from the corpus
    pub owner_fork: String,
    /// Ordering of equal-`vposMs` comments
    pub tie_break: TieBreak,
    pub storage: StorageKeys,
    pub locator: LocatorConfig,
    pub retry: RetryPolicy,
    pub markup: RowMarkup,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            owner_fork: DEFAULT_OWNER_FORK.to_string(),
            tie_break: TieBreak::default(),
            storage: StorageKeys::default(),
            locator: LocatorConfig::default(),
            retry: RetryPolicy::default(),
            markup: RowMarkup::default(),
        }
    }
}

impl FixConfig {
    /// Parse a JSON config, filling every missing field with its default
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| format!("Invalid config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder: set tie-break mode
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Builder: set retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.is_empty() {
            return Err("apiUrl must not be empty".to_string());
        }
        if self.retry.interval_ms == 0 {
            return Err("retry.intervalMs must be positive".to_string());
        }
        if self.retry.backoff.is_nan() || self.retry.backoff < 1.0 {
            return Err(format!("retry.backoff must be >= 1.0, got {}", self.retry.backoff));
        }
        if self.retry.max_interval_ms < self.retry.interval_ms {
            return Err(format!(
                "retry.maxIntervalMs ({}) is below retry.intervalMs ({})",
                self.retry.max_interval_ms, self.retry.interval_ms
            ));
        }
        if self.markup.count_position == self.markup.body_position {
            return Err("markup.countPosition and markup.bodyPosition must differ".to_string());
        }
        // Writing the watched attribute would wake the observer on its own writes
        if self.markup.debug_attribute.as_deref() == Some(self.markup.watched_attribute.as_str()) {
            return Err(format!(
                "markup.debugAttribute must not be the watched attribute '{}'",
                self.markup.watched_attribute
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FixConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.owner_fork, "owner");
        assert_eq!(config.tie_break, TieBreak::ForkName);
        assert_eq!(config.locator.ancestor_levels, 4);
        assert_eq!(config.retry.interval_ms, 500);
        assert_eq!(config.retry.max_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_camel_case_override() {
        let config = FixConfig::from_json(
            r#"{ "tieBreak": "inputOrder", "retry": { "maxAttempts": 20 }, "markup": { "debugAttribute": null } }"#,
        )
        .unwrap();

        assert_eq!(config.tie_break, TieBreak::InputOrder);
        assert_eq!(config.retry.max_attempts, Some(20));
        assert_eq!(config.retry.interval_ms, 500);
        assert_eq!(config.markup.debug_attribute, None);
        assert_eq!(config.markup.index_attribute, "data-index");
    }

    #[test]
    fn test_tie_break_display_matches_serde_name() {
        for mode in [TieBreak::ForkName, TieBreak::InputOrder] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(FixConfig::from_json("{}").unwrap(), FixConfig::default());
    }

    #[test]
    fn test_rejects_debug_attribute_equal_to_watched() {
        let err = FixConfig::from_json(r#"{ "markup": { "debugAttribute": "class" } }"#).unwrap_err();
        assert!(err.contains("watched attribute"));
    }

    #[test]
    fn test_rejects_bad_retry() {
        assert!(FixConfig::from_json(r#"{ "retry": { "intervalMs": 0 } }"#).is_err());
        assert!(FixConfig::from_json(r#"{ "retry": { "backoff": 0.5 } }"#).is_err());
        assert!(FixConfig::from_json(r#"{ "retry": { "intervalMs": 800 } }"#).is_err());
    }

    #[test]
    fn test_rejects_same_text_positions() {
        assert!(FixConfig::from_json(r#"{ "markup": { "bodyPosition": 0 } }"#).is_err());
    }

    #[test]
    fn test_fixed_interval_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), 500);
        assert_eq!(policy.delay_for(7), 500);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let policy = RetryPolicy {
            interval_ms: 100,
            backoff: 2.0,
            max_interval_ms: 1000,
            max_attempts: None,
        };
        assert_eq!(policy.delay_for(0), 100);
        assert_eq!(policy.delay_for(1), 200);
        assert_eq!(policy.delay_for(3), 800);
        assert_eq!(policy.delay_for(4), 1000);
        assert_eq!(policy.delay_for(u32::MAX), 1000);
    }
}
