//! # sessionguard
//!
//! Request-scoped session handling for Rust web applications: typed session values,
//! one-shot flash messages, a remembered redirect target and per-page CSRF tokens.
//!
//! ## Features
//!
//! - **Pluggable session store**: the [`Session`] facade sits on any [`SessionStore`];
//!   [`HandlerStore`] is a ready-made one backed by a swappable [`SaveHandler`]
//! - **Flash messages**: queued per named queue, HTML-escaped, delivered exactly once
//! - **Remembered URI**: a single-use redirect target with an expiry window
//! - **CSRF tokens**: 32 random bytes per page, compared in constant time
//! - **Configurable**: cookie attributes, session id generation and lifetimes via
//!   [`SessionBuilder`], or from the environment with [`SessionBuilder::from_env`]
//!
//! ## Quick Start
//!
//! ```rust
//! use sessionguard::{CsrfGuard, HandlerStore, MemorySaveHandler, SessionBuilder};
//!
//! // One handler for the whole process, one store per request.
//! let handler = MemorySaveHandler::new();
//! let builder = SessionBuilder::new().key("sid");
//!
//! let store = HandlerStore::from_builder(&builder, handler.clone());
//! let session = builder.build(store);
//! session.start().unwrap();
//!
//! session.set("user", "ada").unwrap();
//! session.flash("Welcome back").unwrap();
//!
//! let csrf = CsrfGuard::new(session.clone());
//! let token = csrf.token().unwrap();
//! assert!(csrf.verify("default", Some(&token)));
//!
//! let cookies = session.store_mut().commit_headers();
//! session.store_mut().close().unwrap();
//! assert_eq!(cookies.len(), 1);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use sessionguard::{RandKey, SessionBuilder};
//!
//! let builder = SessionBuilder::new()
//!     .key("session_id") // Cookie name
//!     .path("/") // Cookie path
//!     .domain("example.com") // Cookie domain
//!     .secure(true) // Secure cookie flag
//!     .http_only(true) // HTTP-only cookie flag
//!     .same_site(cookie::SameSite::Lax) // SameSite policy
//!     .max_lifetime(time::Duration::hours(2)) // Garbage collection age
//!     .rand_key(RandKey::UuidV7); // Session ID generation method
//! ```
//!
//! ## Verifying submissions
//!
//! ```rust
//! use http::Request;
//! use sessionguard::{CsrfGuard, FormRequest, HandlerStore, MemorySaveHandler, SessionBuilder};
//!
//! let builder = SessionBuilder::new();
//! let session = builder.clone().build(HandlerStore::from_builder(&builder, MemorySaveHandler::new()));
//! session.start().unwrap();
//! let csrf = CsrfGuard::new(session);
//! let token = csrf.token().unwrap();
//!
//! let request = Request::post("/profile")
//!     .header("X-CSRF-TOKEN", token.as_str())
//!     .body(Vec::new())
//!     .unwrap();
//! // Explicit argument first, then the `_token` form field, then the header.
//! assert!(csrf.verify_request("default", None, &FormRequest::from_request(&request)));
//! ```

pub mod csrf;
pub mod error;
pub mod framework;
pub mod inner;
pub mod storage;

pub use csrf::*;
pub use error::*;
pub use framework::*;
pub use inner::*;
pub use storage::*;
