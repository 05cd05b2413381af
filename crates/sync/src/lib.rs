//! Command synchronization engine.
//!
//! Takes edit commands produced by the AI backend, normalizes them, applies
//! them to the in-process grid engine in conversational order, and keeps the
//! local document consistent with the persistence backend: optimistic lock
//! versions, debounced autosave, and branch rollback.
//!
//! `SyncSession` wires the pieces together. Each piece is usable on its own:
//!
//! ```ignore
//! use sheetpilot_sync::apply::apply_batch;
//!
//! let report = apply_batch(&mut workbook, &commands);
//! if !report.is_clean() {
//!     for failure in &report.failures {
//!         eprintln!("command {}: {}", failure.index, failure.error);
//!     }
//! }
//! ```

pub mod apply;
pub mod autosave;
pub mod chat;
pub mod dirty;
pub mod error;
pub mod events;
pub mod jobs;
pub mod normalize;
pub mod range;
pub mod rollback;
pub mod session;
pub mod store;
pub mod style;
pub mod transport;
pub mod version;

pub use apply::{apply_batch, apply_command, apply_raw, ApplyOutcome, BatchReport, CommandFailure};
pub use autosave::{AutosaveScheduler, AutosaveState};
pub use chat::{ChatLog, ChatMessage, MessageKind, MessageStatus, TurnId, TurnState};
pub use dirty::has_unsaved_changes;
pub use error::{ApplyError, ChatError, NormalizeError, StoreError, SyncError};
pub use events::{ChatEvent, DocumentEvent, EventCategory, JobEvent, PersistenceEvent, SyncEvent};
pub use normalize::normalize;
pub use range::CellRange;
pub use rollback::RollbackCoordinator;
pub use session::{SessionIds, SessionOptions, SyncSession};
pub use store::{DocumentStore, MemoryStore};
pub use transport::{channel_transport, ChannelTransport, Transport, TransportPeer};
pub use version::{DocumentVersionState, VersionManager, VersionPhase};
