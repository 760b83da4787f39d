//! mockwire
//!
//! A programmable HTTP stub server. Callers register expected-request to
//! canned-response pairs ("mocks"), over HTTP or in-process, and live
//! traffic is answered by the best-matching mock.
//!
//! # Features
//!
//! - **Request Matching**: Match by URL, method, headers, query params, body
//! - **Operators**: `equal_to`, `contains` and unanchored regex `pattern`
//! - **Priorities**: The highest priority wins, ties go to the first registered
//! - **Eager Validation**: Bad operators and regexes fail at registration
//!
//! # Example
//!
//! ```no_run
//! use mockwire::{GlobalSettings, IncomingRequest, MockService};
//! use mockwire::mapping::{RequestDescriptor, ResponseDescriptor};
//!
//! let service = MockService::new(GlobalSettings::default());
//! service
//!     .when(RequestDescriptor::builder().url_contains("order").priority(5).build())
//!     .then_return(ResponseDescriptor::builder().status(201).body_str("B").build())?;
//!
//! let response = service.match_request(&IncomingRequest::new("GET", "/orders"))?;
//! assert_eq!(response.status.as_u16(), 201);
//! # Ok::<(), mockwire::MockError>(())
//! ```

pub mod condition;
pub mod config;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod resolver;
pub mod server;
pub mod service;
pub mod store;

pub use config::{GlobalSettings, MockServerConfig};
pub use error::MockError;
pub use matcher::IncomingRequest;
pub use server::MockServer;
pub use service::MockService;
