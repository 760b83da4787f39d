//! Registration descriptors and their compilation into stored mocks.
//!
//! The descriptor types are the wire format of `POST /mock/mapping` and of
//! the `mappings` section of the configuration file:
//!
//! ```json
//! {
//!   "id": "orders",
//!   "request": {
//!     "url": { "contains": "order" },
//!     "method": "GET",
//!     "headers": { "Accept": { "equal_to": "application/json" } },
//!     "query_parameters": { "page": { "pattern": "^[0-9]+$" } },
//!     "priority": 5
//!   },
//!   "response": {
//!     "status": 200,
//!     "headers": { "Content-Type": "application/json" },
//!     "body": { "orders": [] }
//!   }
//! }
//! ```

use crate::condition::{
    compile_field_conditions, Condition, ConditionDescriptor, OPERATOR_CONTAINS, OPERATOR_EQUAL,
    OPERATOR_PATTERN,
};
use crate::error::MockError;
use crate::matcher::RequestMatcher;
use base64::Engine;
use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A registration: request conditions plus the response to serve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockDescriptor {
    /// Caller supplied id; generated when missing or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub request: Option<RequestDescriptor>,

    #[serde(default)]
    pub response: Option<ResponseDescriptor>,
}

/// Request conditions of a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<ConditionDescriptor>,

    /// Exact, case-sensitive method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Header name to condition; names compare case-insensitively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, ConditionDescriptor>>,

    /// Query parameter name to condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_parameters: Option<BTreeMap<String, ConditionDescriptor>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ConditionDescriptor>,

    /// Higher wins when several mocks match
    #[serde(default)]
    pub priority: i64,
}

/// Response half of a registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDescriptor {
    #[serde(default)]
    pub status: u16,

    /// A JSON string is sent as its text, any other value serialized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,

    /// Binary body, standard base64
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Response served verbatim when a mock wins.
#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A compiled, registered mock.
#[derive(Debug, Clone)]
pub struct StoredMock {
    pub id: String,
    /// Registration order, used to break priority ties. Assigned by the
    /// store on insert; zero until then.
    pub sequence: u64,
    pub request: RequestMatcher,
    pub response: ResponseSpec,
}

impl MockDescriptor {
    pub fn new(request: RequestDescriptor, response: ResponseDescriptor) -> Self {
        Self {
            id: None,
            request: Some(request),
            response: Some(response),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check minimum well-formedness without compiling anything.
    pub fn validate(&self) -> Result<(&RequestDescriptor, &ResponseDescriptor), MockError> {
        let request = self
            .request
            .as_ref()
            .ok_or_else(|| MockError::invalid("the mock request could not be a null"))?;
        let response = self
            .response
            .as_ref()
            .ok_or_else(|| MockError::invalid("the mock response could not be a null"))?;

        // The body is deliberately left out: a body condition alone does
        // not make a registration selective enough.
        if !request.has_conditions() {
            return Err(MockError::invalid("the request has no conditions"));
        }
        if response.status == 0 {
            return Err(MockError::invalid("the response status is required"));
        }
        Ok((request, response))
    }

    /// Validate and compile into a mock, generating an id when none is given.
    pub fn compile(&self) -> Result<StoredMock, MockError> {
        let (request, response) = self.validate()?;
        let id = match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        Ok(StoredMock {
            id,
            sequence: 0,
            request: request.compile()?,
            response: response.compile()?,
        })
    }
}

impl RequestDescriptor {
    pub fn builder() -> RequestDescriptorBuilder {
        RequestDescriptorBuilder::default()
    }

    /// Whether url, method, headers or query parameters are configured.
    pub fn has_conditions(&self) -> bool {
        self.url.is_some()
            || self.method.is_some()
            || self.headers.as_ref().is_some_and(|h| !h.is_empty())
            || self.query_parameters.as_ref().is_some_and(|q| !q.is_empty())
    }

    fn compile(&self) -> Result<RequestMatcher, MockError> {
        let url = self
            .url
            .as_ref()
            .map(|d| Condition::from_descriptor("url", d))
            .transpose()?;
        let headers = match &self.headers {
            Some(headers) => compile_field_conditions(headers, |name| name.to_ascii_lowercase())?,
            None => Vec::new(),
        };
        let query = match &self.query_parameters {
            Some(params) => compile_field_conditions(params, str::to_string)?,
            None => Vec::new(),
        };
        let body = self
            .body
            .as_ref()
            .map(|d| Condition::from_descriptor("body", d))
            .transpose()?;

        Ok(RequestMatcher {
            url,
            method: self.method.clone(),
            headers,
            query,
            body,
            priority: self.priority,
        })
    }
}

impl ResponseDescriptor {
    pub fn builder() -> ResponseDescriptorBuilder {
        ResponseDescriptorBuilder::default()
    }

    /// Raw bytes of the configured body.
    pub fn body_bytes(&self) -> Result<Bytes, MockError> {
        match (&self.body, &self.body_base64) {
            (Some(_), Some(_)) => Err(MockError::invalid(
                "the response body and body_base64 could not be both set",
            )),
            (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(|e| {
                    MockError::invalid(format!("the response body_base64 is not valid: {}", e))
                }),
            (None, None) | (Some(serde_json::Value::Null), None) => Ok(Bytes::new()),
            (Some(serde_json::Value::String(text)), None) => Ok(Bytes::from(text.clone())),
            (Some(value), None) => serde_json::to_vec(value).map(Bytes::from).map_err(|e| {
                MockError::invalid(format!("the response body could not be encoded: {}", e))
            }),
        }
    }

    fn compile(&self) -> Result<ResponseSpec, MockError> {
        // 1xx is interim only; hyper would replace it with an empty 500.
        let status = StatusCode::from_u16(self.status)
            .ok()
            .filter(|status| !status.is_informational())
            .ok_or_else(|| {
                MockError::invalid(format!("the response status {} is not valid", self.status))
            })?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                MockError::invalid(format!("the response header {} is not valid", name))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                MockError::invalid(format!("the value of response header {} is not valid", name))
            })?;
            headers.append(header_name, header_value);
        }

        Ok(ResponseSpec {
            status,
            headers,
            body: self.body_bytes()?,
        })
    }
}

fn single(operator: &str, value: impl Into<String>) -> ConditionDescriptor {
    BTreeMap::from([(operator.to_string(), value.into())])
}

/// Fluent construction of a [`RequestDescriptor`].
///
/// Setting the same part twice keeps the last condition.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptorBuilder {
    inner: RequestDescriptor,
}

impl RequestDescriptorBuilder {
    fn url(mut self, operator: &str, value: impl Into<String>) -> Self {
        self.inner.url = Some(single(operator, value));
        self
    }

    pub fn url_equal_to(self, value: impl Into<String>) -> Self {
        self.url(OPERATOR_EQUAL, value)
    }

    pub fn url_contains(self, value: impl Into<String>) -> Self {
        self.url(OPERATOR_CONTAINS, value)
    }

    pub fn url_pattern(self, value: impl Into<String>) -> Self {
        self.url(OPERATOR_PATTERN, value)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.inner.method = Some(method.into());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.inner.priority = priority;
        self
    }

    fn header(mut self, name: impl Into<String>, operator: &str, value: impl Into<String>) -> Self {
        self.inner
            .headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), single(operator, value));
        self
    }

    pub fn header_equal_to(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header(name, OPERATOR_EQUAL, value)
    }

    pub fn header_contains(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header(name, OPERATOR_CONTAINS, value)
    }

    pub fn header_pattern(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header(name, OPERATOR_PATTERN, value)
    }

    fn param(mut self, name: impl Into<String>, operator: &str, value: impl Into<String>) -> Self {
        self.inner
            .query_parameters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), single(operator, value));
        self
    }

    pub fn param_equal_to(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.param(name, OPERATOR_EQUAL, value)
    }

    pub fn param_contains(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.param(name, OPERATOR_CONTAINS, value)
    }

    pub fn param_pattern(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.param(name, OPERATOR_PATTERN, value)
    }

    fn body(mut self, operator: &str, value: impl Into<String>) -> Self {
        self.inner.body = Some(single(operator, value));
        self
    }

    pub fn body_equal_to(self, value: impl Into<String>) -> Self {
        self.body(OPERATOR_EQUAL, value)
    }

    pub fn body_contains(self, value: impl Into<String>) -> Self {
        self.body(OPERATOR_CONTAINS, value)
    }

    pub fn body_pattern(self, value: impl Into<String>) -> Self {
        self.body(OPERATOR_PATTERN, value)
    }

    pub fn build(self) -> RequestDescriptor {
        self.inner
    }
}

/// Fluent construction of a [`ResponseDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptorBuilder {
    inner: ResponseDescriptor,
}

impl ResponseDescriptorBuilder {
    pub fn status(mut self, status: u16) -> Self {
        self.inner.status = status;
        self
    }

    /// Raw body. UTF-8 content is kept as text, anything else as base64.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        match String::from_utf8(body.into()) {
            Ok(text) => {
                self.inner.body = Some(serde_json::Value::String(text));
                self.inner.body_base64 = None;
            }
            Err(e) => {
                self.inner.body = None;
                self.inner.body_base64 =
                    Some(base64::engine::general_purpose::STANDARD.encode(e.into_bytes()));
            }
        }
        self
    }

    pub fn body_str(self, body: impl Into<String>) -> Self {
        self.body(body.into())
    }

    /// JSON body, serialized when the mock is registered.
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.inner.body = Some(value);
        self.inner.body_base64 = None;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.inner.headers = headers;
        self
    }

    pub fn build(self) -> ResponseDescriptor {
        self.inner
    }
}
