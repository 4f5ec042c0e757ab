/// A submitted form field. Fields sent more than once, or with a `[]` suffix,
/// arrive as a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::List(_) => None,
        }
    }
}

/// Read access to the parts of an incoming request that carry CSRF tokens.
pub trait RequestSource {
    fn body_field(&self, name: &str) -> Option<FieldValue>;
    fn header(&self, name: &str) -> Option<String>;
}

pub mod form;

pub use form::FormRequest;
