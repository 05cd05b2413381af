//! Version & lock manager.
//!
//! Single owner of "which server version is materialized locally". Only
//! confirmed server responses move it forward. A rejected write moves it to
//! `Stale`, where it stays until a load or a rollback installs fresh values.

/// Snapshot of the version state as seen by readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentVersionState {
    pub document_version_id: Option<String>,
    pub lock_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPhase {
    /// Nothing loaded from the server yet.
    Uninitialized,
    /// Local state matches a confirmed server version.
    Synced,
    /// The server holds a newer version than the one we edit on top of.
    Stale { server_lock_version: Option<u64> },
}

impl VersionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            VersionPhase::Uninitialized => "uninitialized",
            VersionPhase::Synced => "synced",
            VersionPhase::Stale { .. } => "stale",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionManager {
    phase: VersionPhase,
    state: DocumentVersionState,
}

impl Default for VersionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionManager {
    pub fn new() -> Self {
        Self { phase: VersionPhase::Uninitialized, state: DocumentVersionState::default() }
    }

    pub fn phase(&self) -> &VersionPhase {
        &self.phase
    }

    pub fn state(&self) -> &DocumentVersionState {
        &self.state
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.phase, VersionPhase::Stale { .. })
    }

    /// Lock version to present with the next write.
    pub fn expected_lock(&self) -> Option<u64> {
        self.state.lock_version
    }

    /// A document was loaded from the server. A missing lock version means
    /// the server has not started counting for this document.
    pub fn on_loaded(&mut self, version_id: Option<String>, lock_version: Option<u64>) {
        self.state = DocumentVersionState { document_version_id: version_id, lock_version };
        self.phase = VersionPhase::Synced;
    }

    /// The server confirmed a write. A response without a lock version means
    /// the server advanced it by one. The lock never moves backwards.
    pub fn confirm_write(&mut self, version_id: Option<String>, lock_version: Option<u64>) {
        let current = self.state.lock_version;
        let next = match (lock_version, current) {
            (Some(new), Some(cur)) => new.max(cur),
            (Some(new), None) => new,
            (None, Some(cur)) => cur + 1,
            (None, None) => 1,
        };
        if let Some(new) = lock_version {
            if current.is_some_and(|cur| new < cur) {
                log::warn!("Ignoring lock version regression {} -> {}", current.unwrap_or(0), new);
            }
        }
        if let Some(id) = version_id {
            self.state.document_version_id = Some(id);
        }
        self.state.lock_version = Some(next);
        self.phase = VersionPhase::Synced;
    }

    /// The server rejected a write for presenting an old lock version.
    pub fn mark_conflict(&mut self, server_lock_version: Option<u64>) {
        self.phase = VersionPhase::Stale { server_lock_version };
    }

    /// Rollback installs server-supplied values unconditionally.
    pub fn reset_from_rollback(&mut self, version_id: String, lock_version: u64) {
        self.state = DocumentVersionState {
            document_version_id: Some(version_id),
            lock_version: Some(lock_version),
        };
        self.phase = VersionPhase::Synced;
    }
}
