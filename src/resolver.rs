//! Winner selection among mocks that accept the same request.

use crate::error::MockError;
use crate::mapping::StoredMock;
use crate::matcher::IncomingRequest;
use std::cmp::Reverse;
use std::sync::Arc;

/// Pick the highest-priority mock. Equal priorities go to the earliest
/// registration, whatever order the candidates arrive in.
pub fn select_winner<I>(candidates: I) -> Option<Arc<StoredMock>>
where
    I: IntoIterator<Item = Arc<StoredMock>>,
{
    candidates
        .into_iter()
        .max_by_key(|mock| (mock.request.priority, Reverse(mock.sequence)))
}

/// Filter `mocks` down to those accepting `request` and pick the winner.
pub fn resolve<I>(mocks: I, request: &IncomingRequest) -> Result<Arc<StoredMock>, MockError>
where
    I: IntoIterator<Item = Arc<StoredMock>>,
{
    select_winner(
        mocks
            .into_iter()
            .filter(|mock| mock.request.matches(request)),
    )
    .ok_or_else(|| MockError::MockNotFound {
        method: request.method.clone(),
        path: request.path.clone(),
    })
}
