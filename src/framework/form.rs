use crate::framework::{FieldValue, RequestSource};
use http::{HeaderMap, Request};
use std::collections::HashMap;

/// Headers plus the decoded `application/x-www-form-urlencoded` body of a request.
#[derive(Debug, Clone, Default)]
pub struct FormRequest {
    headers: HeaderMap,
    fields: HashMap<String, FieldValue>,
}

impl FormRequest {
    pub fn new(headers: HeaderMap, body: &[u8]) -> Self {
        let mut fields: HashMap<String, FieldValue> = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            let (name, listed) = match key.strip_suffix("[]") {
                Some(name) => (name.to_string(), true),
                None => (key.into_owned(), false),
            };
            let value = value.into_owned();
            match fields.remove(&name) {
                None if listed => fields.insert(name, FieldValue::List(vec![value])),
                None => fields.insert(name, FieldValue::Text(value)),
                Some(FieldValue::Text(first)) => {
                    fields.insert(name, FieldValue::List(vec![first, value]))
                }
                Some(FieldValue::List(mut values)) => {
                    values.push(value);
                    fields.insert(name, FieldValue::List(values))
                }
            };
        }
        FormRequest { headers, fields }
    }

    pub fn from_request<B: AsRef<[u8]>>(request: &Request<B>) -> Self {
        FormRequest::new(request.headers().clone(), request.body().as_ref())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl RequestSource for FormRequest {
    fn body_field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers.header(name)
    }
}

/// Header-only requests, such as JSON or XHR calls.
impl RequestSource for HeaderMap {
    fn body_field(&self, _name: &str) -> Option<FieldValue> {
        None
    }

    fn header(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
    }
}
