use crate::api::CallResult;
use crate::cancel::CancellationToken;
use crate::{Error, Result};

/// Runs outbound calls with uniform failure handling.
///
/// A cancelled run never issues another call. A failed call is not retried:
/// it becomes an [`Error::Remote`] carrying the caller's message and the
/// underlying status, and the controller takes the abort path, which is
/// where failures are reported. A caller may also absorb the error, as the
/// readiness wait does.
#[derive(Debug, Clone)]
pub struct Executor {
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `op` and return whatever it produced (unit for fire-and-check
    /// calls, a typed body for queries).
    pub fn execute<T, F>(&self, failure_message: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> CallResult<T>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracing::debug!(call = failure_message, "issuing remote call");
        op().map_err(|err| {
            tracing::debug!(
                status = ?err.status,
                detail = %err.message,
                "{}",
                failure_message
            );
            Error::remote(failure_message, err.status, err.message)
        })
    }
}
