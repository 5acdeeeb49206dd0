//! Update dispatcher trait
//!
//! The merge/plan layer is strategy-agnostic: it only produces an
//! [`UpdateBatch`](crate::batch::UpdateBatch). Delivering that batch is the
//! job of an `UpdateDispatcher`, of which there are two implementations:
//!
//! - `dnsup-dispatch-rfc2136`: one TSIG-signed DNS UPDATE message,
//!   exchanged synchronously; any failure is fatal for the run.
//! - `dnsup-dispatch-azure`: one concurrent record upsert per host against
//!   the provider API; per-host failures are logged and isolated.

use async_trait::async_trait;

use crate::batch::UpdateBatch;
use crate::error::Result;

/// Outcome of one batch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Records that were accepted
    pub succeeded: usize,
    /// Records whose individual submission failed (provider-API path only;
    /// the signed-update path is all-or-nothing and returns an error instead)
    pub failed: usize,
}

impl DispatchReport {
    /// A report in which every record was accepted.
    pub fn clean(succeeded: usize) -> Self {
        Self {
            succeeded,
            failed: 0,
        }
    }

    /// Whether every record in the batch was accepted.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Trait for update-dispatch strategies.
///
/// Implementations must be thread-safe and usable across async tasks. They
/// perform no retries: a failed submission is terminal for this run and the
/// operator re-runs the tool.
#[async_trait]
pub trait UpdateDispatcher: Send + Sync {
    /// Submit one batch, blocking until every record's fate is known.
    ///
    /// Returning `Ok` means the batch ran to completion, not that every
    /// record succeeded; check the report. Fatal transport or
    /// authentication failures return `Err`.
    async fn submit(&self, batch: &UpdateBatch) -> Result<DispatchReport>;

    /// Get the dispatcher name (for logging)
    fn name(&self) -> &'static str;
}
