use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Session key holding the CSRF token set.
pub const CSRF_TOKENS_KEY: &str = "__sessionguard.csrf";
/// Session key holding the ordered flash message sequence.
pub const FLASH_KEY: &str = "__sessionguard.flash";
/// Session key holding the remembered redirect target.
pub const REMEMBERED_URI_KEY: &str = "__sessionguard.remembered_uri";

pub const DEFAULT_QUEUE: &str = "default";

/// Everything a session can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SessionValue {
    Str(String),
    Int(i64),
    Flashes(Vec<FlashMessage>),
    RememberedUri(RememberedUri),
    CsrfTokens(BTreeMap<String, String>),
}

impl SessionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SessionValue::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SessionValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        SessionValue::Str(value.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        SessionValue::Str(value)
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        SessionValue::Int(value)
    }
}

impl From<i32> for SessionValue {
    fn from(value: i32) -> Self {
        SessionValue::Int(value.into())
    }
}

impl From<Vec<FlashMessage>> for SessionValue {
    fn from(value: Vec<FlashMessage>) -> Self {
        SessionValue::Flashes(value)
    }
}

impl From<RememberedUri> for SessionValue {
    fn from(value: RememberedUri) -> Self {
        SessionValue::RememberedUri(value)
    }
}

impl From<BTreeMap<String, String>> for SessionValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        SessionValue::CsrfTokens(value)
    }
}

/// A one-shot notification. Both fields are HTML-escaped on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    message: String,
    queue: String,
}

impl FlashMessage {
    pub fn new(message: &str, queue: &str) -> Self {
        FlashMessage {
            message: escape_html(message),
            queue: escape_html(queue),
        }
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedUri {
    pub uri: String,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl RememberedUri {
    /// Lifetimes past the representable date range clamp to its ends.
    pub fn new(uri: &str, expires_in: Duration) -> Self {
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(expires_in)
            .unwrap_or_else(|| {
                if expires_in.is_negative() {
                    PrimitiveDateTime::MIN.assume_utc()
                } else {
                    PrimitiveDateTime::MAX.assume_utc()
                }
            });
        RememberedUri {
            uri: uri.to_string(),
            expires_at,
        }
    }
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

/// Escapes the five characters that are significant in HTML text and attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
