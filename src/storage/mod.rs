use crate::{CookieParams, Result, SessionValue};
use cookie::Cookie;
use time::Duration;

/// The session subsystem a [`Session`](crate::Session) facade sits on.
///
/// One store serves one request. Implementations own the key-value map of the
/// active session, the id, and whatever persistence sits behind them.
pub trait SessionStore {
    /// Starts or resumes the session. Fails once headers have been sent.
    fn start(&mut self) -> Result<()>;
    /// Destroys the session and its persisted copy.
    fn destroy(&mut self) -> Result<()>;
    /// Moves the data to a fresh id and invalidates the old one.
    fn regenerate_id(&mut self) -> Result<()>;
    fn is_active(&self) -> bool;
    fn id(&self) -> Option<String>;
    fn name(&self) -> String;
    /// Renames the session. Returns `false` when the store refuses because it is
    /// already active.
    fn set_name(&mut self, name: &str) -> bool;
    fn cookie_params(&self) -> CookieParams;
    fn set_cookie_params(&mut self, params: CookieParams) -> bool;
    /// Whether the outbound response headers have been committed.
    fn headers_sent(&self) -> bool;
    /// Queues a `Set-Cookie` for the response.
    fn set_cookie(&mut self, cookie: Cookie<'static>);

    fn read(&self, key: &str) -> Option<SessionValue>;
    fn write(&mut self, key: &str, value: SessionValue);
    fn exists(&self, key: &str) -> bool;
    fn remove(&mut self, key: &str);
    fn clear(&mut self);
}

/// Persistence backend behind [`HandlerStore`].
///
/// Payloads are opaque strings keyed by session id.
pub trait SaveHandler {
    fn open(&mut self, name: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn read(&mut self, id: &str) -> Result<Option<String>>;
    fn write(&mut self, id: &str, payload: &str) -> Result<()>;
    fn destroy(&mut self, id: &str) -> Result<()>;
    /// Drops sessions untouched for longer than `max_lifetime`; returns how many.
    fn gc(&mut self, max_lifetime: Duration) -> Result<usize>;
}

pub mod handler_store;
pub mod memory;

pub use handler_store::HandlerStore;
pub use memory::MemorySaveHandler;
