use crate::SessionValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracks what must happen to the persisted copy when the store closes.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    UnChange,
    Change,
    Clear,
}

/// The live key-value map of a started session.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SessionInner {
    #[serde(skip)]
    pub(crate) id: String,
    pub(crate) data: HashMap<String, SessionValue>,
    #[serde(skip)]
    pub(crate) status: SessionStatus,
}

impl SessionInner {
    pub fn new(id: String) -> Self {
        SessionInner {
            id,
            data: HashMap::new(),
            status: SessionStatus::Change,
        }
    }
    /// Restores a session from the JSON payload a save handler returned.
    pub fn from_payload(id: String, payload: &str) -> Result<Self, serde_json::Error> {
        let data = serde_json::from_str::<HashMap<String, SessionValue>>(payload)?;
        Ok(SessionInner {
            id,
            data,
            status: SessionStatus::UnChange,
        })
    }
    pub fn payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.data)
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.data.get(key)
    }
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
    pub fn set(&mut self, key: &str, value: SessionValue) {
        self.data.insert(key.to_string(), value);
        self.status = SessionStatus::Change;
    }
    pub fn remove(&mut self, key: &str) -> Option<SessionValue> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.status = SessionStatus::Change;
        }
        removed
    }
    pub fn clear(&mut self) {
        self.data.clear();
        self.status = SessionStatus::Clear;
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut inner = SessionInner::from_payload("abc".to_string(), "{}").unwrap();
        assert_eq!(inner.status, SessionStatus::UnChange);

        inner.remove("missing");
        assert_eq!(inner.status, SessionStatus::UnChange);

        inner.set("count", SessionValue::Int(1));
        assert_eq!(inner.status, SessionStatus::Change);

        inner.clear();
        assert_eq!(inner.status, SessionStatus::Clear);
        assert!(inner.is_empty());
    }

    #[test]
    fn test_payload_round_trip_keeps_values() {
        let mut inner = SessionInner::new("abc".to_string());
        inner.set("name", "ada".into());
        let restored = SessionInner::from_payload("abc".to_string(), &inner.payload().unwrap()).unwrap();
        assert_eq!(restored.get("name"), Some(&SessionValue::Str("ada".to_string())));
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        assert!(SessionInner::from_payload("abc".to_string(), "not json").is_err());
    }
}
