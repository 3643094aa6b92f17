//! Admission permits.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::guard::{Guard, GuardError, GuardResult};
use crate::inflight::RequestId;

/// Proof that the guard admitted a request.
///
/// The request stays registered as in flight until the permit is dropped or
/// handed back through [`Guard::on_response`].
#[derive(Debug)]
pub struct Permit {
    id: RequestId,
    token: CancellationToken,
    guard: Guard,
}

impl Permit {
    pub(crate) fn new(id: RequestId, token: CancellationToken, guard: Guard) -> Self {
        Self { id, token, guard }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Token the guard cancels when it starts blocking.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive `fut` unless the guard cancels this request first.
    pub async fn run<F: Future>(&self, fut: F) -> GuardResult<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(GuardError::Cancelled { id: self.id }),
            output = fut => Ok(output),
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.guard.release(self.id);
    }
}
