use crate::inner::value::{
    CSRF_TOKENS_KEY, DEFAULT_QUEUE, FLASH_KEY, REMEMBERED_URI_KEY, escape_html,
};
use crate::{
    FlashMessage, RememberedUri, Result, SessionBuilder, SessionError, SessionStore, SessionValue,
};
use cookie::Cookie;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use time::{Duration, OffsetDateTime};
use url::Url;

/// Where [`Session::remembered_uri`] sends callers when nothing usable is stored.
pub const DEFAULT_REDIRECT: &str = "/";

/// Default lifetime of a remembered URI, in seconds.
pub const REMEMBER_URI_SECONDS: i64 = 3600;

/// Request-scoped handle over a [`SessionStore`].
///
/// Clones share the same store, which is how [`CsrfGuard`](crate::CsrfGuard)
/// keeps its tokens in the session the application is using.
#[derive(Debug)]
pub struct Session<S: SessionStore> {
    store: Rc<RefCell<S>>,
    builder: Rc<SessionBuilder>,
}

impl<S: SessionStore> Clone for Session<S> {
    fn clone(&self) -> Self {
        Session {
            store: self.store.clone(),
            builder: self.builder.clone(),
        }
    }
}

impl<S: SessionStore> Session<S> {
    pub fn new(store: S, builder: SessionBuilder) -> Self {
        Session {
            store: Rc::new(RefCell::new(store)),
            builder: Rc::new(builder),
        }
    }
    /// Mutable access to the underlying store, e.g. to close it at the end of
    /// the request.
    pub fn store_mut(&self) -> RefMut<'_, S> {
        self.store.borrow_mut()
    }

    /// Starts the session unless it is already running.
    ///
    /// The configured name and cookie parameters are applied first; stores that
    /// refuse them keep their own.
    pub fn start(&self) -> Result<()> {
        let mut store = self.store.borrow_mut();
        if store.is_active() {
            return Ok(());
        }
        if store.headers_sent() {
            return Err(SessionError::HeadersSent);
        }
        if !store.set_name(&self.builder.key) {
            tracing::debug!(name = %self.builder.key, "store kept its own session name");
        }
        store.set_cookie_params(self.builder.cookie.clone());
        store.start()
    }

    /// Clears all data, expires the client cookie and destroys the session.
    pub fn forget(&self) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.clear();
        let params = store.cookie_params();
        let mut expired = Cookie::build((store.name(), ""))
            .path(params.path)
            .secure(params.secure)
            .http_only(params.http_only)
            .expires(OffsetDateTime::now_utc() - Duration::days(1));
        if !params.domain.is_empty() {
            expired = expired.domain(params.domain);
        }
        store.set_cookie(expired.build());
        if store.is_active() {
            store.destroy()?;
        }
        Ok(())
    }

    /// Retrieves a value from the session
    ///
    /// # Arguments
    /// * `key` - The key associated with the value to retrieve
    ///
    /// # Returns
    /// Ok(value) if the key exists, Err(SessionError::OutOfBounds) naming the key otherwise
    pub fn get(&self, key: &str) -> Result<SessionValue> {
        self.store
            .borrow()
            .read(key)
            .ok_or_else(|| SessionError::OutOfBounds(key.to_string()))
    }

    /// Retrieves a value from the session, falling back to `default` when absent
    pub fn get_or(&self, key: &str, default: impl Into<SessionValue>) -> SessionValue {
        self.store
            .borrow()
            .read(key)
            .unwrap_or_else(|| default.into())
    }

    /// Stores a value in the session
    ///
    /// # Arguments
    /// * `key` - The key to associate with the value
    /// * `value` - Anything convertible into a [`SessionValue`]
    ///
    /// # Returns
    /// Ok(()) if successful, Err(SessionError::NotStarted) if the session is not active
    pub fn set(&self, key: &str, value: impl Into<SessionValue>) -> Result<()> {
        if !self.active() {
            return Err(SessionError::NotStarted);
        }
        self.store.borrow_mut().write(key, value.into());
        Ok(())
    }

    /// Returns whether `key` is present in the active session
    pub fn has(&self, key: &str) -> bool {
        self.store.borrow().exists(key)
    }

    /// Removes a key-value pair from the session
    ///
    /// # Arguments
    /// * `key` - The key to remove; missing keys are ignored
    pub fn unset(&self, key: &str) {
        self.store.borrow_mut().remove(key);
    }

    /// Returns whether the underlying store reports an active session
    pub fn active(&self) -> bool {
        self.store.borrow().is_active()
    }

    pub fn id(&self) -> Option<String> {
        self.store.borrow().id()
    }

    pub fn name(&self) -> String {
        self.store.borrow().name()
    }

    /// Rotates the session id, keeping application data. Issued CSRF tokens
    /// are dropped with the old id.
    ///
    /// # Returns
    /// Ok(()) when rotated or when there is no active session,
    /// Err(SessionError::HeadersSent) once the response headers are committed
    pub fn regenerate(&self) -> Result<()> {
        let mut store = self.store.borrow_mut();
        if !store.is_active() {
            return Ok(());
        }
        store.regenerate_id()?;
        store.remove(CSRF_TOKENS_KEY);
        tracing::debug!("session id regenerated");
        Ok(())
    }

    /// Queues a message on the default queue.
    pub fn flash(&self, message: &str) -> Result<()> {
        self.flash_to(message, DEFAULT_QUEUE)
    }

    /// Queues a message on a named queue
    ///
    /// # Arguments
    /// * `message` - Text of the message, HTML-escaped before storing
    /// * `queue` - Queue name, HTML-escaped before storing
    ///
    /// # Returns
    /// Ok(()) if queued, Err(SessionError::NotStarted) if the session is not active
    pub fn flash_to(&self, message: &str, queue: &str) -> Result<()> {
        if !self.active() {
            return Err(SessionError::NotStarted);
        }
        let mut flashes = self.stored_flashes();
        flashes.push(FlashMessage::new(message, queue));
        self.store
            .borrow_mut()
            .write(FLASH_KEY, SessionValue::Flashes(flashes));
        Ok(())
    }

    /// Returns queued messages without consuming them.
    ///
    /// An empty queue name selects every queue, like `None`.
    pub fn flashes(&self, queue: Option<&str>) -> Vec<FlashMessage> {
        let flashes = self.stored_flashes();
        match queue.filter(|queue| !queue.is_empty()) {
            None => flashes,
            Some(queue) => {
                let queue = escape_html(queue);
                flashes.into_iter().filter(|f| f.queue() == queue).collect()
            }
        }
    }

    /// Removes and returns queued messages.
    ///
    /// Without a queue everything is drained. With a queue only its messages
    /// are taken; the rest stay behind in their original order.
    ///
    /// # Arguments
    /// * `queue` - Queue to drain, or `None` for all of them
    ///
    /// # Returns
    /// The removed messages in the order they were flashed; empty when none are stored
    pub fn pop_flashes(&self, queue: Option<&str>) -> Vec<FlashMessage> {
        let flashes = self.stored_flashes();
        if flashes.is_empty() {
            return flashes;
        }
        let mut store = self.store.borrow_mut();
        let Some(queue) = queue else {
            store.remove(FLASH_KEY);
            return flashes;
        };
        let queue = escape_html(queue);
        let (taken, kept): (Vec<_>, Vec<_>) =
            flashes.into_iter().partition(|f| f.queue() == queue);
        if kept.is_empty() {
            store.remove(FLASH_KEY);
        } else if !taken.is_empty() {
            store.write(FLASH_KEY, SessionValue::Flashes(kept));
        }
        taken
    }

    /// Returns whether any message is queued, optionally on one queue only
    pub fn has_flashes(&self, queue: Option<&str>) -> bool {
        !self.flashes(queue).is_empty()
    }

    fn stored_flashes(&self) -> Vec<FlashMessage> {
        match self.store.borrow().read(FLASH_KEY) {
            Some(SessionValue::Flashes(flashes)) => flashes,
            _ => Vec::new(),
        }
    }

    /// Remembers `uri` for an hour, replacing any earlier one.
    pub fn remember_uri(&self, uri: &str) -> Result<()> {
        self.remember_uri_for(uri, REMEMBER_URI_SECONDS)
    }

    /// Remembers `uri` for `expires_in_seconds`, replacing any earlier one.
    /// Negative lifetimes store an already expired entry.
    pub fn remember_uri_for(&self, uri: &str, expires_in_seconds: i64) -> Result<()> {
        let remembered = RememberedUri::new(uri, Duration::seconds(expires_in_seconds));
        self.set(REMEMBERED_URI_KEY, remembered)
    }

    /// Takes the remembered URI out of the session.
    ///
    /// The stored entry is removed on every call. Expired entries and anything
    /// that is not an absolute URL yield [`DEFAULT_REDIRECT`].
    pub fn remembered_uri(&self) -> String {
        let stored = {
            let mut store = self.store.borrow_mut();
            let stored = store.read(REMEMBERED_URI_KEY);
            store.remove(REMEMBERED_URI_KEY);
            stored
        };
        match stored {
            Some(SessionValue::RememberedUri(remembered))
                if !remembered.is_expired() && is_absolute_url(&remembered.uri) =>
            {
                remembered.uri
            }
            _ => DEFAULT_REDIRECT.to_string(),
        }
    }
}

fn is_absolute_url(uri: &str) -> bool {
    Url::parse(uri).is_ok_and(|url| url.has_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandlerStore, MemorySaveHandler};
    use proptest::prelude::*;

    type TestSession = Session<HandlerStore<MemorySaveHandler>>;

    fn session() -> TestSession {
        let builder = SessionBuilder::new().key("sid").gc_probability(0);
        let store = HandlerStore::from_builder(&builder, MemorySaveHandler::new());
        builder.build(store)
    }

    fn started() -> TestSession {
        let session = session();
        session.start().unwrap();
        session
    }

    #[test]
    fn test_get_missing_key() {
        let session = started();
        match session.get("missing") {
            Err(SessionError::OutOfBounds(key)) => assert_eq!(key, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(session.get_or("missing", 5), SessionValue::Int(5));
    }

    #[test]
    fn test_set_get_unset() {
        let session = started();
        session.set("name", "ada").unwrap();
        session.set("age", 36).unwrap();
        assert_eq!(session.get("name").unwrap().as_str(), Some("ada"));
        assert_eq!(session.get("age").unwrap().as_int(), Some(36));
        assert_eq!(session.get_or("name", "bob").as_str(), Some("ada"));

        session.unset("name");
        assert!(!session.has("name"));
        session.unset("name");
        assert!(session.has("age"));
    }

    #[test]
    fn test_set_before_start_fails() {
        let session = session();
        assert!(matches!(
            session.set("k", 1),
            Err(SessionError::NotStarted)
        ));
        session.start().unwrap();
        assert!(session.set("k", 1).is_ok());
    }

    #[test]
    fn test_start_is_idempotent() {
        let session = started();
        let id = session.id();
        session.start().unwrap();
        assert_eq!(session.id(), id);
        assert_eq!(session.name(), "sid");
    }

    #[test]
    fn test_start_after_headers_sent() {
        let session = session();
        session.store_mut().commit_headers();
        assert!(matches!(session.start(), Err(SessionError::HeadersSent)));
    }

    #[test]
    fn test_forget_clears_and_expires_cookie() {
        let session = started();
        session.set("k", "v").unwrap();
        session.forget().unwrap();
        assert!(!session.active());
        assert!(!session.has("k"));

        let cookies = session.store_mut().commit_headers();
        let expired = cookies.last().unwrap();
        assert_eq!(expired.name(), "sid");
        assert_eq!(expired.path(), Some("/"));
        assert_eq!(expired.secure(), Some(true));
        assert_eq!(expired.http_only(), Some(true));
        let expires = expired.expires_datetime().unwrap();
        assert!(expires < OffsetDateTime::now_utc());
    }

    #[test]
    fn test_forget_while_inactive_does_not_fail() {
        let session = session();
        assert!(session.forget().is_ok());
        assert!(!session.active());
    }

    #[test]
    fn test_regenerate_keeps_data() {
        let session = started();
        session.set("user", "ada").unwrap();
        let old = session.id();
        session.regenerate().unwrap();
        assert_ne!(session.id(), old);
        assert_eq!(session.get("user").unwrap().as_str(), Some("ada"));
    }

    #[test]
    fn test_regenerate_inactive_is_noop() {
        let session = session();
        assert!(session.regenerate().is_ok());
        assert!(session.id().is_none());
    }

    #[test]
    fn test_flash_requires_started_session() {
        let session = session();
        assert!(matches!(session.flash("hi"), Err(SessionError::NotStarted)));
    }

    #[test]
    fn test_pop_all_flashes() {
        let session = started();
        session.flash("a").unwrap();
        session.flash_to("b", "error").unwrap();

        let popped = session.pop_flashes(None);
        assert_eq!(
            popped,
            vec![FlashMessage::new("a", "default"), FlashMessage::new("b", "error")]
        );
        assert!(!session.has_flashes(None));
        assert!(session.pop_flashes(None).is_empty());
    }

    #[test]
    fn test_pop_flashes_by_queue() {
        let session = started();
        session.flash("a").unwrap();
        session.flash_to("b", "error").unwrap();

        assert_eq!(
            session.pop_flashes(Some("error")),
            vec![FlashMessage::new("b", "error")]
        );
        assert!(!session.has_flashes(Some("error")));
        assert!(session.has_flashes(Some("default")));
        assert_eq!(session.pop_flashes(None), vec![FlashMessage::new("a", "default")]);
    }

    #[test]
    fn test_pop_flashes_without_any_stored() {
        let session = session();
        assert!(session.pop_flashes(None).is_empty());
        assert!(session.pop_flashes(Some("error")).is_empty());
        assert!(!session.has_flashes(None));
    }

    #[test]
    fn test_flash_content_is_escaped() {
        let session = started();
        session.flash_to("<script>", "<x>").unwrap();
        let flashes = session.pop_flashes(Some("<x>"));
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].message(), "&lt;script&gt;");
        assert_eq!(flashes[0].queue(), "&lt;x&gt;");
    }

    #[test]
    fn test_remembered_uri_is_single_use() {
        let session = started();
        session.remember_uri("https://x/y").unwrap();
        assert_eq!(session.remembered_uri(), "https://x/y");
        assert_eq!(session.remembered_uri(), "/");
    }

    #[test]
    fn test_remembered_uri_expired() {
        let session = started();
        session.remember_uri_for("https://x/y", -3600).unwrap();
        assert_eq!(session.remembered_uri(), "/");
        assert!(!session.has(REMEMBERED_URI_KEY));
    }

    #[test]
    fn test_remembered_uri_extreme_lifetimes() {
        let session = started();
        session.remember_uri_for("https://x/y", i64::MAX).unwrap();
        assert_eq!(session.remembered_uri(), "https://x/y");

        session.remember_uri_for("https://x/y", i64::MIN).unwrap();
        assert_eq!(session.remembered_uri(), "/");
        assert!(!session.has(REMEMBERED_URI_KEY));
    }

    #[test]
    fn test_regenerate_after_headers_sent_fails() {
        let session = started();
        session.set("user", "ada").unwrap();
        let id = session.id();
        session.store_mut().commit_headers();

        assert!(matches!(session.regenerate(), Err(SessionError::HeadersSent)));
        assert_eq!(session.id(), id);
        assert_eq!(session.get("user").unwrap().as_str(), Some("ada"));
    }

    #[test]
    fn test_empty_queue_name_means_all_queues() {
        let session = started();
        session.flash_to("b", "error").unwrap();
        assert!(session.has_flashes(Some("")));
        assert_eq!(session.flashes(Some("")).len(), 1);
    }

    #[test]
    fn test_remembered_uri_rejects_relative() {
        let session = started();
        session.remember_uri("/dashboard").unwrap();
        assert_eq!(session.remembered_uri(), "/");
        assert!(!session.has(REMEMBERED_URI_KEY));
    }

    #[test]
    fn test_remember_uri_overwrites() {
        let session = started();
        session.remember_uri("https://x/first").unwrap();
        session.remember_uri("https://x/second").unwrap();
        assert_eq!(session.remembered_uri(), "https://x/second");
    }

    #[test]
    fn test_remembered_uri_absent() {
        let session = started();
        assert_eq!(session.remembered_uri(), DEFAULT_REDIRECT);
    }

    proptest! {
        #[test]
        fn test_queue_pop_preserves_order(queues in proptest::collection::vec(proptest::sample::select(vec!["default", "error", "info"]), 0..20)) {
            let session = started();
            for (i, queue) in queues.iter().enumerate() {
                session.flash_to(&i.to_string(), queue).unwrap();
            }

            let errors = session.pop_flashes(Some("error"));
            let rest = session.pop_flashes(None);

            let expected_errors: Vec<String> = queues.iter().enumerate()
                .filter(|(_, q)| **q == "error")
                .map(|(i, _)| i.to_string())
                .collect();
            let expected_rest: Vec<String> = queues.iter().enumerate()
                .filter(|(_, q)| **q != "error")
                .map(|(i, _)| i.to_string())
                .collect();

            prop_assert_eq!(errors.iter().map(|f| f.message().to_string()).collect::<Vec<_>>(), expected_errors);
            prop_assert_eq!(rest.iter().map(|f| f.message().to_string()).collect::<Vec<_>>(), expected_rest);
            prop_assert!(!session.has_flashes(None));
        }
    }
}
