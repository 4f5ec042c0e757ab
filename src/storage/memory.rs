use crate::storage::SaveHandler;
use crate::{Result, SessionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone)]
struct Record {
    payload: String,
    touched_at: OffsetDateTime,
}

/// In-process save handler. Clones share the same map, so one handler can back
/// the stores of many requests.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveHandler {
    sessions: Arc<Mutex<HashMap<String, Record>>>,
}

impl MemorySaveHandler {
    pub fn new() -> Self {
        MemorySaveHandler::default()
    }
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Record>>> {
        self.sessions
            .lock()
            .map_err(|err| SessionError::Storage(err.to_string()))
    }
    pub fn len(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn contains(&self, id: &str) -> bool {
        self.lock().map(|map| map.contains_key(id)).unwrap_or(false)
    }
}

impl SaveHandler for MemorySaveHandler {
    fn open(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, id: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(id).map(|record| record.payload.clone()))
    }

    fn write(&mut self, id: &str, payload: &str) -> Result<()> {
        self.lock()?.insert(
            id.to_string(),
            Record {
                payload: payload.to_string(),
                touched_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }

    fn destroy(&mut self, id: &str) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }

    fn gc(&mut self, max_lifetime: Duration) -> Result<usize> {
        let Some(cutoff) = OffsetDateTime::now_utc().checked_sub(max_lifetime) else {
            // Nothing can be older than the earliest representable date.
            return Ok(0);
        };
        let mut map = self.lock()?;
        let before = map.len();
        map.retain(|_, record| record.touched_at > cutoff);
        Ok(before - map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let mut handler = MemorySaveHandler::new();
        let mut other = handler.clone();
        handler.write("a", "{}").unwrap();
        assert_eq!(other.read("a").unwrap().as_deref(), Some("{}"));
        other.destroy("a").unwrap();
        assert!(handler.is_empty());
    }

    #[test]
    fn test_read_missing_is_none() {
        let mut handler = MemorySaveHandler::new();
        assert_eq!(handler.read("nope").unwrap(), None);
    }

    #[test]
    fn test_gc_drops_stale_records() {
        let mut handler = MemorySaveHandler::new();
        handler.write("old", "{}").unwrap();
        handler.write("new", "{}").unwrap();
        handler
            .lock()
            .unwrap()
            .get_mut("old")
            .unwrap()
            .touched_at -= Duration::hours(2);

        assert_eq!(handler.gc(Duration::hours(1)).unwrap(), 1);
        assert!(!handler.contains("old"));
        assert!(handler.contains("new"));
    }

    #[test]
    fn test_gc_with_unbounded_lifetime_keeps_everything() {
        let mut handler = MemorySaveHandler::new();
        handler.write("a", "{}").unwrap();
        assert_eq!(handler.gc(Duration::seconds(i64::MAX)).unwrap(), 0);
        assert!(handler.contains("a"));
    }
}
