//! HTTP front end.
//!
//! Two routes: `POST /mock/mapping` registers a mock, everything else is a
//! live request answered by the winning mock.

use crate::config::MockServerConfig;
use crate::error::{ErrorBody, MockError};
use crate::mapping::{MockDescriptor, ResponseSpec};
use crate::matcher::{decode_path, IncomingRequest};
use crate::service::MockService;
use bytes::Bytes;
use http::request::Parts;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Path of the registration endpoint.
pub const MAPPING_PATH: &str = "/mock/mapping";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body of a successful registration.
#[derive(Debug, Serialize)]
struct AddMockResponse<'a> {
    id: &'a str,
}

/// A bound mock server.
pub struct MockServer {
    listener: TcpListener,
    service: Arc<MockService>,
}

impl MockServer {
    /// Bind the listener and register the configured mappings.
    pub async fn bind(config: MockServerConfig) -> anyhow::Result<Self> {
        let service = Arc::new(MockService::new(config.settings));
        for (i, mapping) in config.mappings.iter().enumerate() {
            service
                .register(mapping)
                .map_err(|e| anyhow::anyhow!("Mapping {}: {}", i, e))?;
        }

        let listener = TcpListener::bind(config.listen).await?;
        Ok(Self { listener, service })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared service, for registering mocks in-process.
    pub fn service(&self) -> Arc<MockService> {
        Arc::clone(&self.service)
    }

    /// Accept connections until the task is cancelled or accept fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            address = %self.listener.local_addr()?,
            mocks = self.service.mock_count(),
            "Mock server listening"
        );

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let service = Arc::clone(&self.service);

            tokio::spawn(async move {
                let handler = service_fn(move |req| {
                    let service = Arc::clone(&service);
                    async move { route_request(req, service).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                    debug!(peer = %peer, "connection error: {}", e);
                }
            });
        }
    }
}

/// Dispatch one request.
pub async fn route_request<B>(
    req: Request<B>,
    service: Arc<MockService>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    debug!(method = %parts.method, path = %parts.uri.path(), "request received");

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {}", e);
            let error = ErrorBody::internal(format!("failed to read request body: {}", e));
            return Ok(json_response(error.status(), &error));
        }
    };

    let response = if parts.uri.path() == MAPPING_PATH {
        handle_add_mapping(&parts.method, &body, &service)
    } else {
        handle_live_request(&parts, body, &service)
    };
    Ok(response)
}

fn handle_add_mapping(
    method: &Method,
    body: &[u8],
    service: &MockService,
) -> Response<Full<Bytes>> {
    if *method != Method::POST {
        return build_response(StatusCode::METHOD_NOT_ALLOWED, Bytes::new());
    }

    let descriptor: MockDescriptor = match serde_json::from_slice(body) {
        Ok(d) => d,
        Err(e) => {
            return error_response(&MockError::InvalidRequest(format!(
                "the mapping is not valid JSON: {}",
                e
            )))
        }
    };

    match service.register(&descriptor) {
        Ok(id) => json_response(StatusCode::OK, &AddMockResponse { id: &id }),
        Err(e) => error_response(&e),
    }
}

fn handle_live_request(
    parts: &Parts,
    body: Bytes,
    service: &MockService,
) -> Response<Full<Bytes>> {
    let request = incoming_request(parts, body);
    match service.match_request(&request) {
        Ok(spec) => mock_response(spec),
        Err(e) => error_response(&e),
    }
}

/// Snapshot the parts of a live request the matcher looks at.
///
/// The path is percent-decoded like the query. Header values that are not
/// visible ASCII are compared in their lossy UTF-8 form.
pub fn incoming_request(parts: &Parts, body: Bytes) -> IncomingRequest {
    let path = decode_path(parts.uri.path());
    let mut request = IncomingRequest::new(parts.method.as_str(), path).with_body(body);
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        request = request.with_header(name.as_str(), value);
    }
    if let Some(query) = parts.uri.query() {
        request = request.with_query_string(query);
    }
    request
}

fn mock_response(spec: ResponseSpec) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(spec.body));
    *response.status_mut() = spec.status;
    *response.headers_mut() = spec.headers;
    response
}

fn error_response(error: &MockError) -> Response<Full<Bytes>> {
    json_response(error.status(), &error.to_body())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = build_response(status, Bytes::from(json));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

fn build_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}
