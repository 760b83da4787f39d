//! Request matching logic.
//!
//! Decides whether a single registered matcher accepts an incoming request.

use crate::condition::{Condition, FieldCondition};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::trace;

/// Snapshot of a live request, as seen by the matcher.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// URL path, without the query string
    pub path: String,
    /// HTTP method, as sent
    pub method: String,
    /// Header values keyed by lowercase name, repeated values joined with `,`
    pub headers: HashMap<String, String>,
    /// Decoded query parameters, repeated values joined with `,`
    pub query: HashMap<String, String>,
    /// Raw body
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a header. Names are folded to lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        insert_joined(&mut self.headers, name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        insert_joined(&mut self.query, name.into(), value.into());
        self
    }

    /// Parse and add every parameter of a raw query string.
    pub fn with_query_string(mut self, query: &str) -> Self {
        for (name, value) in parse_query_string(query) {
            insert_joined(&mut self.query, name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Conditions a mock places on incoming requests.
///
/// Unset parts accept anything. Every configured part must accept.
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    pub url: Option<Condition>,
    pub method: Option<String>,
    pub headers: Vec<FieldCondition>,
    pub query: Vec<FieldCondition>,
    pub body: Option<Condition>,
    /// Higher wins when several mocks match
    pub priority: i64,
}

/// First part of a request a matcher refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPart {
    Url,
    Method,
    /// Header named by its lowercase name
    Header(String),
    Query(String),
    Body,
}

impl RequestMatcher {
    /// Whether every configured part accepts the request.
    pub fn matches(&self, request: &IncomingRequest) -> bool {
        self.first_rejection(request).is_none()
    }

    /// Check the request, in order: url, method, headers, query, body.
    ///
    /// Returns the first part that refused it, or `None` on a match.
    pub fn first_rejection(&self, request: &IncomingRequest) -> Option<MatchPart> {
        if let Some(url) = &self.url {
            if !url.test(&request.path) {
                trace!(path = %request.path, condition = %url, "url rejected");
                return Some(MatchPart::Url);
            }
        }

        if let Some(method) = &self.method {
            if *method != request.method {
                trace!(method = %request.method, expected = %method, "method rejected");
                return Some(MatchPart::Method);
            }
        }

        if let Some(header) = self.headers.iter().find(|c| !c.test(&request.headers)) {
            trace!(
                header = %header.field(),
                condition = %header.condition(),
                "header rejected"
            );
            return Some(MatchPart::Header(header.field().to_string()));
        }

        if let Some(param) = self.query.iter().find(|c| !c.test(&request.query)) {
            trace!(
                param = %param.field(),
                condition = %param.condition(),
                "query parameter rejected"
            );
            return Some(MatchPart::Query(param.field().to_string()));
        }

        if let Some(body) = &self.body {
            let text = String::from_utf8_lossy(&request.body);
            if !body.test(&text) {
                trace!(condition = %body, "body rejected");
                return Some(MatchPart::Body);
            }
        }

        None
    }
}

fn insert_joined(map: &mut HashMap<String, String>, key: String, value: String) {
    map.entry(key)
        .and_modify(|existing| {
            existing.push(',');
            existing.push_str(&value);
        })
        .or_insert(value);
}

/// Parse a query string into decoded key-value pairs, in order.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(part), String::new()),
        })
        .collect()
}

/// Percent-decode a URL path. `+` stays literal; undecodable input is kept raw.
pub fn decode_path(path: &str) -> String {
    match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
