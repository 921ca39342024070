//! The host-facing session value.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A logical session as seen by the host container.
///
/// Seshat treats the attribute values as opaque JSON; the host decides what
/// goes in them. Timestamps are epoch milliseconds. An inactivity window of
/// zero or below means the session never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionValue {
    /// Unique session identifier. Immutable once created.
    pub id: String,

    /// When the session was created (epoch ms). Set once.
    pub creation_time: i64,

    /// When the session was last accessed (epoch ms).
    pub last_accessed_time: i64,

    /// Inactivity window in seconds. `<= 0` means the session is immortal.
    pub max_inactive_interval: i64,

    /// Named attributes. Ordered map so encodings are deterministic.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl SessionValue {
    /// Create a session with creation and last-access time set to now.
    pub fn new(id: impl Into<String>, max_inactive_interval: i64) -> Self {
        let now = now_epoch_ms();
        Self {
            id: id.into(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval,
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Set an attribute in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<serde_json::Value> {
        self.attributes.remove(name)
    }

    /// Names of all attributes, in map order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Record an access now.
    pub fn touch(&mut self) {
        self.last_accessed_time = now_epoch_ms();
    }

    /// Whether this session can ever expire.
    pub fn can_expire(&self) -> bool {
        self.max_inactive_interval > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_timestamps() {
        let session = SessionValue::new("abc", 1800);
        assert_eq!(session.creation_time, session.last_accessed_time);
        assert!(session.creation_time > 0);
        assert!(session.can_expire());
    }

    #[test]
    fn test_immortal_session() {
        assert!(!SessionValue::new("a", 0).can_expire());
        assert!(!SessionValue::new("b", -1).can_expire());
    }

    #[test]
    fn test_attribute_round_trip() {
        let mut session = SessionValue::new("abc", 1800).with_attribute("user", json!("alice"));
        session.set_attribute("count", json!(3));

        assert_eq!(session.attribute("user"), Some(&json!("alice")));
        assert_eq!(
            session.attribute_names().collect::<Vec<_>>(),
            vec!["count", "user"]
        );
        assert_eq!(session.remove_attribute("count"), Some(json!(3)));
        assert_eq!(session.attribute("count"), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let session = SessionValue::new("abc", 60).with_attribute("k", json!({"nested": [1, 2]}));
        let encoded = serde_json::to_string(&session).unwrap();
        let decoded: SessionValue = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, session);
    }
}
