//! Rollback coordinator.
//!
//! Rollback asks the server to restore the document to a branch point and
//! returns the snapshot to install. Nothing local changes until the snapshot
//! has been fetched and parsed; the session then swaps the workbook and the
//! version state in one step.
//!
//! The fetch runs inside the session's `rollback` call, so no inbound batch
//! can be handled between the request and the commit. Turns numbered below
//! the boundary are superseded at commit time.

use sheetpilot_engine::workbook::Workbook;
use sheetpilot_protocol::rest::{RollbackRequest, RollbackResponse};

use crate::chat::TurnId;
use crate::error::{Result, SyncError};
use crate::store::DocumentStore;

/// Everything the session needs to commit a rollback.
#[derive(Debug, Clone)]
pub struct RollbackPlan {
    pub workbook: Workbook,
    pub response: RollbackResponse,
    /// Turns numbered below this were started before the rollback.
    pub boundary: TurnId,
}

#[derive(Debug, Default)]
pub struct RollbackCoordinator;

impl RollbackCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Fetch and validate the target snapshot. On error nothing is returned to
    /// commit and the caller's state is untouched.
    pub fn execute<S: DocumentStore>(
        &self,
        store: &S,
        connected: bool,
        req: &RollbackRequest,
        boundary: TurnId,
    ) -> Result<RollbackPlan> {
        if !connected {
            return Err(SyncError::NotConnected);
        }
        let response = store
            .rollback(req)
            .map_err(|e| SyncError::RollbackFailure(e.to_string()))?;
        let workbook = Workbook::from_json(&response.document_snapshot)
            .map_err(|e| SyncError::RollbackFailure(e.to_string()))?;
        Ok(RollbackPlan { workbook, response, boundary })
    }
}
