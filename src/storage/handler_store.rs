use crate::storage::{SaveHandler, SessionStore};
use crate::{
    CookieParams, RandKey, Result, SessionBuilder, SessionError, SessionInner, SessionStatus,
    SessionValue,
};
use cookie::Cookie;
use http::HeaderMap;
use http::header::COOKIE;
use rand::Rng;
use time::Duration;

/// A [`SessionStore`] that keeps the live map in memory for one request and
/// persists it through a pluggable [`SaveHandler`].
///
/// The session id arrives with the request cookie; outbound cookies are queued
/// until [`commit_headers`](HandlerStore::commit_headers) hands them to the HTTP layer.
#[derive(Debug)]
pub struct HandlerStore<H: SaveHandler> {
    handler: H,
    name: String,
    cookie: CookieParams,
    rand_key: RandKey,
    max_lifetime: Duration,
    gc_probability: u32,
    incoming_id: Option<String>,
    inner: Option<SessionInner>,
    headers_sent: bool,
    cookies: Vec<Cookie<'static>>,
}

impl<H: SaveHandler> HandlerStore<H> {
    pub fn new(handler: H) -> Self {
        HandlerStore::from_builder(&SessionBuilder::default(), handler)
    }
    pub fn from_builder(builder: &SessionBuilder, handler: H) -> Self {
        HandlerStore {
            handler,
            name: builder.key.clone(),
            cookie: builder.cookie.clone(),
            rand_key: builder.rand_key.clone(),
            max_lifetime: builder.max_lifetime,
            gc_probability: builder.gc_probability,
            incoming_id: None,
            inner: None,
            headers_sent: false,
            cookies: Vec::new(),
        }
    }
    /// Swaps the save handler. Only allowed before the session starts.
    pub fn set_handler(&mut self, handler: H) -> bool {
        if self.inner.is_some() {
            return false;
        }
        self.handler = handler;
        true
    }
    pub fn handler(&self) -> &H {
        &self.handler
    }
    /// Picks up the session id from the request's `Cookie` headers.
    pub fn with_request_headers(mut self, headers: &HeaderMap) -> Self {
        self.incoming_id = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|s| Cookie::split_parse(s))
            .filter_map(|c| c.ok())
            .find(|c| c.name() == self.name)
            .map(|c| c.value().to_string())
            .filter(|id| !id.is_empty());
        self
    }
    pub fn with_session_id(mut self, id: &str) -> Self {
        self.incoming_id = Some(id.to_string());
        self
    }
    /// Marks the response headers as sent and returns the queued cookies.
    pub fn commit_headers(&mut self) -> Vec<Cookie<'static>> {
        self.headers_sent = true;
        std::mem::take(&mut self.cookies)
    }
    pub fn pending_cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }
    /// Persists the session through the save handler and ends it for this request.
    pub fn close(&mut self) -> Result<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        match inner.status {
            SessionStatus::UnChange | SessionStatus::Change => {
                self.handler.write(&inner.id, &inner.payload()?)?;
            }
            SessionStatus::Clear => {
                self.handler.destroy(&inner.id)?;
            }
        }
        tracing::debug!(status = ?inner.status, "session closed");
        self.handler.close()
    }

    fn session_cookie(&self, id: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), id.to_string()))
            .path(self.cookie.path.clone())
            .secure(self.cookie.secure)
            .http_only(self.cookie.http_only);
        if !self.cookie.domain.is_empty() {
            builder = builder.domain(self.cookie.domain.clone());
        }
        if let Some(same_site) = self.cookie.same_site {
            builder = builder.same_site(same_site);
        }
        if let Some(max_age) = self.cookie.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build()
    }

    fn fresh_session(&mut self) -> SessionInner {
        let inner = SessionInner::new(self.rand_key.generate());
        let cookie = self.session_cookie(&inner.id);
        self.cookies.push(cookie);
        inner
    }

    fn resume(&mut self, id: String) -> Result<SessionInner> {
        match self.handler.read(&id)? {
            Some(payload) => match SessionInner::from_payload(id, &payload) {
                Ok(inner) => Ok(inner),
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable session payload");
                    Ok(self.fresh_session())
                }
            },
            // Unknown ids are never adopted.
            None => Ok(self.fresh_session()),
        }
    }

    fn maybe_gc(&mut self) {
        if self.gc_probability == 0 || !rand::rng().random_ratio(self.gc_probability, 100) {
            return;
        }
        match self.handler.gc(self.max_lifetime) {
            Ok(removed) => tracing::debug!(removed, "session garbage collection"),
            Err(err) => tracing::warn!(error = %err, "session garbage collection failed"),
        }
    }
}

impl<H: SaveHandler> SessionStore for HandlerStore<H> {
    fn start(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        if self.headers_sent {
            return Err(SessionError::HeadersSent);
        }
        self.handler
            .open(&self.name)
            .map_err(|err| SessionError::Start(err.to_string()))?;
        self.maybe_gc();
        let inner = match self.incoming_id.take() {
            Some(id) => self.resume(id)?,
            None => self.fresh_session(),
        };
        tracing::debug!(name = %self.name, "session started");
        self.inner = Some(inner);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            self.handler.destroy(&inner.id)?;
            self.handler.close()?;
            tracing::debug!("session destroyed");
        }
        Ok(())
    }

    fn regenerate_id(&mut self) -> Result<()> {
        if self.headers_sent {
            return Err(SessionError::HeadersSent);
        }
        let new_id = self.rand_key.generate();
        let cookie = self.session_cookie(&new_id);
        let inner = self.inner.as_mut().ok_or(SessionError::NotStarted)?;
        let old_id = std::mem::replace(&mut inner.id, new_id);
        inner.status = SessionStatus::Change;
        self.handler.destroy(&old_id)?;
        self.cookies.push(cookie);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    fn id(&self) -> Option<String> {
        self.inner.as_ref().map(|inner| inner.id.clone())
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_name(&mut self, name: &str) -> bool {
        if self.inner.is_some() {
            return false;
        }
        self.name = name.to_string();
        true
    }

    fn cookie_params(&self) -> CookieParams {
        self.cookie.clone()
    }

    fn set_cookie_params(&mut self, params: CookieParams) -> bool {
        if self.inner.is_some() {
            return false;
        }
        self.cookie = params;
        true
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies.push(cookie);
    }

    fn read(&self, key: &str) -> Option<SessionValue> {
        self.inner.as_ref().and_then(|inner| inner.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: SessionValue) {
        match self.inner.as_mut() {
            Some(inner) => inner.set(key, value),
            None => tracing::warn!(key, "write to inactive session dropped"),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.contains(key))
    }

    fn remove(&mut self, key: &str) {
        if let Some(inner) = self.inner.as_mut() {
            inner.remove(key);
        }
    }

    fn clear(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.clear();
        }
    }
}
