//! Per-page CSRF tokens kept in the session.
//!
//! A token is issued lazily the first time a page asks for it and stays valid
//! until the session is destroyed or its id is regenerated. Verification never
//! errors: a missing, malformed or mismatched token simply fails.

use crate::framework::{FieldValue, RequestSource};
use crate::inner::value::CSRF_TOKENS_KEY;
use crate::{Result, Session, SessionStore, SessionValue};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

pub const DEFAULT_PAGE: &str = "default";
pub const DEFAULT_BODY_FIELD: &str = "_token";
pub const DEFAULT_HEADER: &str = "X-CSRF-TOKEN";

const TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub struct CsrfGuard<S: SessionStore> {
    session: Session<S>,
    body_field: String,
    header: String,
}

impl<S: SessionStore> Clone for CsrfGuard<S> {
    fn clone(&self) -> Self {
        CsrfGuard {
            session: self.session.clone(),
            body_field: self.body_field.clone(),
            header: self.header.clone(),
        }
    }
}

impl<S: SessionStore> CsrfGuard<S> {
    pub fn new(session: Session<S>) -> Self {
        CsrfGuard {
            session,
            body_field: DEFAULT_BODY_FIELD.to_string(),
            header: DEFAULT_HEADER.to_string(),
        }
    }
    /// Form field consulted when no token is passed explicitly.
    pub fn body_field(mut self, name: &str) -> Self {
        self.body_field = name.to_string();
        self
    }
    /// Header consulted when neither an explicit token nor the form field is present.
    pub fn header_field(mut self, name: &str) -> Self {
        self.header = name.to_string();
        self
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Token for the default page.
    pub fn token(&self) -> Result<String> {
        self.get(DEFAULT_PAGE)
    }

    /// Returns the token for `page`, issuing one on first use.
    ///
    /// Issuing writes to the session, so it fails when the session has not
    /// been started.
    pub fn get(&self, page: &str) -> Result<String> {
        let mut tokens = self.tokens();
        if let Some(token) = tokens.get(page) {
            return Ok(token.clone());
        }
        let token = generate_token();
        tokens.insert(page.to_string(), token.clone());
        self.session.set(CSRF_TOKENS_KEY, SessionValue::CsrfTokens(tokens))?;
        tracing::debug!(page, "issued csrf token");
        Ok(token)
    }

    /// Drops the token issued for `page`, if any.
    pub fn forget(&self, page: &str) -> Result<()> {
        let mut tokens = self.tokens();
        if tokens.remove(page).is_some() {
            self.session.set(CSRF_TOKENS_KEY, SessionValue::CsrfTokens(tokens))?;
        }
        Ok(())
    }

    /// Checks an explicitly supplied token against the one stored for `page`.
    pub fn verify(&self, page: &str, supplied: Option<&str>) -> bool {
        self.check(page, supplied.map(|token| FieldValue::Text(token.to_string())))
    }

    /// Like [`verify`](CsrfGuard::verify), falling back to the configured
    /// form field and then the configured header of `request`.
    pub fn verify_request<R: RequestSource + ?Sized>(
        &self,
        page: &str,
        supplied: Option<&str>,
        request: &R,
    ) -> bool {
        let candidate = supplied
            .map(|token| FieldValue::Text(token.to_string()))
            .or_else(|| request.body_field(&self.body_field))
            .or_else(|| request.header(&self.header).map(FieldValue::Text));
        self.check(page, candidate)
    }

    // The lookup goes through `get`, so verifying a page that never had a
    // token issues one as a side effect.
    fn check(&self, page: &str, candidate: Option<FieldValue>) -> bool {
        let Some(candidate) = candidate else {
            tracing::warn!(page, "csrf token missing from request");
            return false;
        };
        let Some(supplied) = candidate.as_text() else {
            tracing::warn!(page, "csrf token is not a single value");
            return false;
        };
        let stored = match self.get(page) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(page, error = %err, "csrf token unavailable");
                return false;
            }
        };
        if stored.is_empty() {
            return false;
        }
        let matches: bool = stored.as_bytes().ct_eq(supplied.as_bytes()).into();
        if !matches {
            tracing::warn!(page, "csrf token mismatch");
        }
        matches
    }

    fn tokens(&self) -> BTreeMap<String, String> {
        match self.session.get(CSRF_TOKENS_KEY) {
            Ok(SessionValue::CsrfTokens(tokens)) => tokens,
            _ => BTreeMap::new(),
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}
