use std::fs;
use wiremock::{Match, Request};

/// # Panics
///
/// Will panic if a file can't be read or missing
#[must_use = "This function returns the body of the file as a string"]
pub fn body_from_file(path: &str) -> String {
    fs::read_to_string(path).expect("Failed to read file")
}

/// Matches requests whose query string does not contain the given key at all
pub struct QueryParamMissingMatcher(String);

impl QueryParamMissingMatcher {
    /// Specify the key which must not be sent.
    pub fn new<K: Into<String>>(key: K) -> Self {
        Self(key.into())
    }
}

/// Shorthand for [`QueryParamMissingMatcher::new`].
pub fn query_param_missing<K: Into<String>>(key: K) -> QueryParamMissingMatcher {
    QueryParamMissingMatcher::new(key)
}

impl Match for QueryParamMissingMatcher {
    fn matches(&self, request: &Request) -> bool {
        let query = request.url.query().unwrap_or_default();
        !form_urlencoded::parse(query.as_bytes()).any(|q| q.0 == self.0.as_str())
    }
}

/// Matches requests without a body, parameters travel in the query string only
pub struct EmptyBodyMatcher;

/// Shorthand for [`EmptyBodyMatcher`].
#[must_use]
pub fn empty_body() -> EmptyBodyMatcher {
    EmptyBodyMatcher
}

impl Match for EmptyBodyMatcher {
    fn matches(&self, request: &Request) -> bool {
        request.body.is_empty()
    }
}
