//! Comment API payload types
//!
//! Mirrors the `/v1/threads` response closely enough to decode it. Fields the
//! pipeline does not read are kept in `extra` so a comment can be re-serialized
//! whole for row annotation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// RawComment
// =============================================================================

/// One comment as delivered by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    pub body: String,
    /// Timeline position in milliseconds
    pub vpos_ms: i64,
    /// Shared-NG score, negative = more objectionable
    pub score: i64,
    pub user_id: String,
    /// Server-side reaction count at fetch time
    pub nicoru_count: i64,
    /// Present when the viewer had reacted at fetch time; only presence matters.
    /// `Some(Value::Null)` is an explicit `null`, `None` an absent key.
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub nicoru_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawComment {
    /// Minimal comment, mostly for building payloads by hand
    pub fn new(body: impl Into<String>, vpos_ms: i64) -> Self {
        Self {
            body: body.into(),
            vpos_ms,
            score: 0,
            user_id: String::new(),
            nicoru_count: 0,
            nicoru_id: None,
            extra: Map::new(),
        }
    }

    /// Whether the snapshot says the viewer has reacted to this comment
    pub fn is_nicotta(&self) -> bool {
        match &self.nicoru_id {
            None | Some(Value::Null) => false,
            Some(Value::String(id)) => !id.is_empty(),
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(_) => true,
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_nicoru(mut self, count: i64, nicoru_id: Option<&str>) -> Self {
        self.nicoru_count = count;
        self.nicoru_id = nicoru_id.map(|id| Value::String(id.to_string()));
        self
    }
}

/// Decode a present key as `Some`, even when its value is `null`
fn keep_null<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// =============================================================================
// RawThread
// =============================================================================

/// One comment thread (`main`, `easy`, `owner`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawThread {
    pub fork: String,
    #[serde(default)]
    pub comments: Vec<RawComment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawThread {
    pub fn new(fork: impl Into<String>, comments: Vec<RawComment>) -> Self {
        Self {
            fork: fork.into(),
            comments,
            extra: Map::new(),
        }
    }
}

// =============================================================================
// ThreadsResponse
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadsData {
    pub threads: Vec<RawThread>,
    #[serde(default)]
    pub global_comments: Value,
}

/// Decoded body of an intercepted comment API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadsResponse {
    #[serde(default)]
    pub meta: Value,
    pub data: ThreadsData,
}

impl ThreadsResponse {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to decode threads response: {}", e))
    }

    pub fn threads(&self) -> &[RawThread] {
        &self.data.threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "meta": { "status": 200 },
        "data": {
            "globalComments": [{ "count": 3 }],
            "threads": [
                { "id": "1", "fork": "owner", "commentCount": 0, "comments": [] },
                { "id": "2", "fork": "main", "commentCount": 2, "comments": [
                    { "id": "c1", "no": 1, "vposMs": 1200, "body": "wkwk", "commands": ["184"],
                      "userId": "u1", "isPremium": false, "score": 0, "postedAt": "2024-01-01T00:00:00+09:00",
                      "nicoruCount": 4, "nicoruId": "n-1", "source": "trunk", "isMyPost": false },
                    { "id": "c2", "no": 2, "vposMs": 800, "body": "88888", "commands": [],
                      "userId": "u2", "isPremium": true, "score": -1200, "postedAt": "2024-01-01T00:00:01+09:00",
                      "nicoruCount": 0, "nicoruId": null, "source": "trunk", "isMyPost": false }
                ] },
                { "id": "3", "fork": "easy", "commentCount": 0 }
            ]
        }
    }"#;

    #[test]
    fn test_decode_payload() {
        let response = ThreadsResponse::from_json(PAYLOAD).unwrap();
        assert_eq!(response.threads().len(), 3);

        let main = &response.threads()[1];
        assert_eq!(main.fork, "main");
        assert_eq!(main.comments[0].vpos_ms, 1200);
        assert_eq!(main.comments[0].nicoru_count, 4);
        assert!(main.comments[0].is_nicotta());
        assert!(!main.comments[1].is_nicotta());

        // Missing `comments` decodes as an empty thread
        assert!(response.threads()[2].comments.is_empty());
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let response = ThreadsResponse::from_json(PAYLOAD).unwrap();
        let comment = &response.threads()[1].comments[0];
        let json: Value = serde_json::to_value(comment).unwrap();

        assert_eq!(json["id"], "c1");
        assert_eq!(json["isPremium"], false);
        assert_eq!(json["vposMs"], 1200);
        assert_eq!(json["nicoruId"], "n-1");
    }

    #[test]
    fn test_null_nicoru_id_survives_reserialization() {
        let response = ThreadsResponse::from_json(PAYLOAD).unwrap();
        let comment = &response.threads()[1].comments[1];
        assert_eq!(comment.nicoru_id, Some(Value::Null));

        let json: Value = serde_json::to_value(comment).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("nicoruId"));
        assert_eq!(object["nicoruId"], Value::Null);
    }

    #[test]
    fn test_absent_nicoru_id_stays_absent() {
        let comment: RawComment = serde_json::from_str(
            r#"{ "body": "a", "vposMs": 0, "score": 0, "userId": "u", "nicoruCount": 1 }"#,
        )
        .unwrap();
        assert_eq!(comment.nicoru_id, None);
        assert!(!comment.is_nicotta());

        let json: Value = serde_json::to_value(&comment).unwrap();
        assert!(!json.as_object().unwrap().contains_key("nicoruId"));
    }

    #[test]
    fn test_missing_threads_is_decode_error() {
        let err = ThreadsResponse::from_json(r#"{ "meta": {}, "data": {} }"#).unwrap_err();
        assert!(err.contains("threads"));
    }

    #[test]
    fn test_not_json_is_decode_error() {
        assert!(ThreadsResponse::from_json("<html>").is_err());
    }

    #[test]
    fn test_nicoru_id_presence() {
        let mut comment = RawComment::new("a", 0);
        assert!(!comment.is_nicotta());

        comment.nicoru_id = Some(Value::String(String::new()));
        assert!(!comment.is_nicotta());

        comment.nicoru_id = Some(Value::String("x".to_string()));
        assert!(comment.is_nicotta());

        comment.nicoru_id = Some(Value::from(12));
        assert!(comment.is_nicotta());
    }
}
