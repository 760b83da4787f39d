//! Mock service: registration and lookup over a shared store.

use crate::config::GlobalSettings;
use crate::error::MockError;
use crate::mapping::{
    MockDescriptor, RequestDescriptor, ResponseDescriptor, ResponseSpec, StoredMock,
};
use crate::matcher::IncomingRequest;
use crate::resolver;
use crate::store::{InMemoryStore, MockStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registers mocks and answers live requests with the best match.
///
/// Safe to share between tasks; every method takes `&self`.
pub struct MockService {
    store: Arc<dyn MockStore>,
    settings: GlobalSettings,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests matched to mocks.
    requests_matched: AtomicU64,
    /// Total requests unmatched.
    requests_unmatched: AtomicU64,
}

impl MockService {
    /// Create a service backed by an in-memory store.
    pub fn new(settings: GlobalSettings) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), settings)
    }

    /// Create a service over the given store.
    pub fn with_store(store: Arc<dyn MockStore>, settings: GlobalSettings) -> Self {
        Self {
            store,
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Validate, compile and store a registration. Returns the mock id.
    ///
    /// The store numbers the mock when it inserts it, so ties go to the
    /// registration that became visible first.
    pub fn register(&self, descriptor: &MockDescriptor) -> Result<String, MockError> {
        let mock = descriptor.compile().map_err(|e| {
            debug!(error = %e, "registration rejected");
            e
        })?;
        let mock = self.store.insert(mock)?;

        info!(
            mock_id = %mock.id,
            sequence = mock.sequence,
            priority = mock.request.priority,
            status = mock.response.status.as_u16(),
            "Mock registered"
        );
        Ok(mock.id.clone())
    }

    /// Start a programmatic registration.
    pub fn when(&self, request: RequestDescriptor) -> Expectation<'_> {
        Expectation {
            service: self,
            request,
        }
    }

    /// Find the winning mock for a request.
    pub fn resolve(&self, request: &IncomingRequest) -> Result<Arc<StoredMock>, MockError> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        match resolver::resolve(self.store.scan_all(), request) {
            Ok(mock) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        mock_id = %mock.id,
                        method = %request.method,
                        path = %request.path,
                        priority = mock.request.priority,
                        "Request matched mock"
                    );
                }
                Ok(mock)
            }
            Err(e) => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        mocks = self.store.len(),
                        "No matching mock found"
                    );
                }
                Err(e)
            }
        }
    }

    /// Response of the winning mock for a request.
    pub fn match_request(&self, request: &IncomingRequest) -> Result<ResponseSpec, MockError> {
        self.resolve(request).map(|mock| mock.response.clone())
    }

    /// Number of registered mocks.
    pub fn mock_count(&self) -> usize {
        self.store.len()
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }
}

/// Pending registration created by [`MockService::when`].
pub struct Expectation<'a> {
    service: &'a MockService,
    request: RequestDescriptor,
}

impl Expectation<'_> {
    /// Register the request with `response`. Returns the new mock id.
    pub fn then_return(self, response: ResponseDescriptor) -> Result<String, MockError> {
        self.service
            .register(&MockDescriptor::new(self.request, response))
    }
}
