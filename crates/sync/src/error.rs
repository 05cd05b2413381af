//! Error kinds for the sync engine.
//!
//! Per-command failures (`NormalizeError`, `ApplyError`) are skip-and-continue:
//! they are collected into a batch report and never abort sibling commands.
//! `SyncError` covers everything that surfaces to the caller of a session
//! operation.

use sheetpilot_protocol::SheetRef;
use thiserror::Error;

use crate::chat::MessageStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("unknown sheet {0}")]
    UnknownSheet(SheetRef),
    #[error("invalid range {range:?}: {reason}")]
    InvalidRange { range: Vec<i64>, reason: &'static str },
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

impl From<NormalizeError> for ApplyError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::MalformedCommand(msg) => ApplyError::MalformedCommand(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("no chat message with id {0}")]
    UnknownMessage(String),
    #[error("message {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: MessageStatus, to: MessageStatus },
    #[error("message {0} is already streaming")]
    AlreadyStreaming(String),
}

/// Failure reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("version conflict")]
    Conflict { server_lock_version: Option<u64> },
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not connected to the AI backend")]
    NotConnected,
    #[error("document was changed elsewhere (local lock {local:?}, server lock {server:?}); reload or roll back")]
    StaleVersionConflict { local: Option<u64>, server: Option<u64> },
    #[error("save failed: {0}")]
    PersistenceFailure(String),
    #[error("rollback failed: {0}")]
    RollbackFailure(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("load failed: {0}")]
    Load(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
