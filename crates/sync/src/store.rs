//! Document store seam.
//!
//! `DocumentStore` is what the session persists through. `HubClient` is the
//! production implementation; `MemoryStore` keeps everything in process and
//! enforces the same optimistic locking rules, for headless runs and tests.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use sheetpilot_hub_client::{HubClient, HubError};
use sheetpilot_protocol::rest::{
    ChatHistoryEntry, LoadQuery, LoadResponse, RenameRequest, RenameResponse, RollbackRequest,
    RollbackResponse, SaveRequest, SaveResponse,
};

use crate::error::StoreError;

pub trait DocumentStore {
    fn check_and_load(&self, query: &LoadQuery) -> Result<LoadResponse, StoreError>;
    fn save(&self, req: &SaveRequest) -> Result<SaveResponse, StoreError>;
    fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, StoreError>;
    fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn check_and_load(&self, query: &LoadQuery) -> Result<LoadResponse, StoreError> {
        (**self).check_and_load(query)
    }
    fn save(&self, req: &SaveRequest) -> Result<SaveResponse, StoreError> {
        (**self).save(req)
    }
    fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, StoreError> {
        (**self).rename(req)
    }
    fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, StoreError> {
        (**self).rollback(req)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Rc<S> {
    fn check_and_load(&self, query: &LoadQuery) -> Result<LoadResponse, StoreError> {
        (**self).check_and_load(query)
    }
    fn save(&self, req: &SaveRequest) -> Result<SaveResponse, StoreError> {
        (**self).save(req)
    }
    fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, StoreError> {
        (**self).rename(req)
    }
    fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, StoreError> {
        (**self).rollback(req)
    }
}

impl From<HubError> for StoreError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Conflict { server_lock_version } => StoreError::Conflict { server_lock_version },
            other => StoreError::Failed(other.to_string()),
        }
    }
}

impl DocumentStore for HubClient {
    fn check_and_load(&self, query: &LoadQuery) -> Result<LoadResponse, StoreError> {
        Ok(HubClient::check_and_load(self, query)?)
    }
    fn save(&self, req: &SaveRequest) -> Result<SaveResponse, StoreError> {
        Ok(HubClient::save(self, req)?)
    }
    fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, StoreError> {
        Ok(HubClient::rename(self, req)?)
    }
    fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, StoreError> {
        Ok(HubClient::rollback(self, req)?)
    }
}

// ── In-memory store ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredDocument {
    file_name: Option<String>,
    version_id: String,
    lock_version: u64,
    data: Value,
}

#[derive(Debug, Clone)]
struct BranchPoint {
    parent: Option<String>,
    data: Value,
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<StoredDocument>,
    chat_session_id: Option<String>,
    history: Vec<ChatHistoryEntry>,
    branches: FxHashMap<String, BranchPoint>,
    fail_next: Option<StoreError>,
    saves: usize,
}

/// In-process document store with server-side lock semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing document at `lock_version`.
    pub fn with_document(file_name: &str, data: Value, lock_version: u64) -> Self {
        let store = Self::new();
        {
            let mut s = store.state.borrow_mut();
            s.document = Some(StoredDocument {
                file_name: Some(file_name.to_string()),
                version_id: format!("v{}", lock_version),
                lock_version,
                data,
            });
            s.chat_session_id = Some("session-1".to_string());
        }
        store
    }

    /// Remember the document state at a branch, for later rollback.
    pub fn record_branch(&self, branch_id: &str, parent: Option<&str>, data: Value) {
        self.state.borrow_mut().branches.insert(
            branch_id.to_string(),
            BranchPoint { parent: parent.map(String::from), data },
        );
    }

    pub fn set_history(&self, history: Vec<ChatHistoryEntry>) {
        self.state.borrow_mut().history = history;
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: StoreError) {
        self.state.borrow_mut().fail_next = Some(err);
    }

    /// Simulate a write from another client.
    pub fn bump_lock(&self) {
        if let Some(doc) = self.state.borrow_mut().document.as_mut() {
            doc.lock_version += 1;
            doc.version_id = format!("v{}", doc.lock_version);
        }
    }

    pub fn save_count(&self) -> usize {
        self.state.borrow().saves
    }

    pub fn lock_version(&self) -> Option<u64> {
        self.state.borrow().document.as_ref().map(|d| d.lock_version)
    }

    pub fn document_data(&self) -> Option<Value> {
        self.state.borrow().document.as_ref().map(|d| d.data.clone())
    }

    pub fn file_name(&self) -> Option<String> {
        self.state.borrow().document.as_ref().and_then(|d| d.file_name.clone())
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        match self.state.borrow_mut().fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn check_and_load(&self, _query: &LoadQuery) -> Result<LoadResponse, StoreError> {
        self.take_failure()?;
        let s = self.state.borrow();
        Ok(match &s.document {
            Some(doc) => LoadResponse {
                exists: true,
                file_name: doc.file_name.clone(),
                document_version_id: Some(doc.version_id.clone()),
                lock_version: Some(doc.lock_version),
                document_data: Some(doc.data.clone()),
                chat_session_id: s.chat_session_id.clone(),
                chat_history: Some(s.history.clone()),
            },
            None => LoadResponse {
                exists: false,
                file_name: None,
                document_version_id: None,
                lock_version: None,
                document_data: None,
                chat_session_id: s.chat_session_id.clone(),
                chat_history: None,
            },
        })
    }

    fn save(&self, req: &SaveRequest) -> Result<SaveResponse, StoreError> {
        self.take_failure()?;
        let mut s = self.state.borrow_mut();
        let next = match &s.document {
            Some(doc) if req.lock_version != Some(doc.lock_version) => {
                return Err(StoreError::Conflict { server_lock_version: Some(doc.lock_version) });
            }
            Some(doc) => doc.lock_version + 1,
            None => 1,
        };
        let file_name = req
            .file_name
            .clone()
            .or_else(|| s.document.as_ref().and_then(|d| d.file_name.clone()));
        let version_id = format!("v{}", next);
        s.document = Some(StoredDocument {
            file_name,
            version_id: version_id.clone(),
            lock_version: next,
            data: req.document_data.clone(),
        });
        s.saves += 1;
        Ok(SaveResponse {
            success: true,
            message: "saved".into(),
            document_version_id: Some(version_id),
            lock_version: Some(next),
        })
    }

    fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, StoreError> {
        self.take_failure()?;
        let mut s = self.state.borrow_mut();
        match s.document.as_mut() {
            Some(doc) => {
                doc.file_name = Some(req.file_name.clone());
                Ok(RenameResponse { success: true, message: "renamed".into() })
            }
            None => Err(StoreError::Failed("document does not exist".into())),
        }
    }

    fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, StoreError> {
        self.take_failure()?;
        let mut s = self.state.borrow_mut();
        let branch = s
            .branches
            .get(&req.target_branch_id)
            .cloned()
            .ok_or_else(|| StoreError::Failed(format!("unknown branch {}", req.target_branch_id)))?;
        let next = s.document.as_ref().map_or(1, |d| d.lock_version + 1);
        let version_id = format!("v{}", next);
        let file_name = s.document.as_ref().and_then(|d| d.file_name.clone());
        s.document = Some(StoredDocument {
            file_name,
            version_id: version_id.clone(),
            lock_version: next,
            data: branch.data.clone(),
        });
        Ok(RollbackResponse {
            parent_branch_id: branch.parent,
            new_document_version_id: version_id,
            new_lock_version: next,
            document_snapshot: branch.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn save_req(lock: Option<u64>) -> SaveRequest {
        SaveRequest {
            document_id: "d".into(),
            chat_id: "c".into(),
            user_id: "u".into(),
            file_name: None,
            document_data: json!({"sheets": [{"name": "Sheet1"}]}),
            lock_version: lock,
        }
    }

    #[test]
    fn test_memory_store_enforces_lock() {
        let store = MemoryStore::with_document("Budget", json!({"sheets": [{"name": "Sheet1"}]}), 3);
        let resp = store.save(&save_req(Some(3))).unwrap();
        assert_eq!(resp.lock_version, Some(4));
        assert_eq!(
            store.save(&save_req(Some(3))).unwrap_err(),
            StoreError::Conflict { server_lock_version: Some(4) }
        );
        assert_eq!(store.file_name().as_deref(), Some("Budget"));
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = MemoryStore::new();
        store.fail_next(StoreError::Failed("down".into()));
        assert!(store.save(&save_req(None)).is_err());
        assert!(store.save(&save_req(None)).is_ok());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_hub_conflict_maps_to_store_conflict() {
        let err: StoreError = HubError::Conflict { server_lock_version: Some(2) }.into();
        assert_eq!(err, StoreError::Conflict { server_lock_version: Some(2) });
        let err: StoreError = HubError::Http(503, "busy".into()).into();
        assert_eq!(err, StoreError::Failed("HTTP 503: busy".into()));
    }

    #[test]
    fn test_rc_store_delegates() {
        let store = Rc::new(MemoryStore::new());
        let shared: &dyn DocumentStore = &store;
        shared.save(&save_req(None)).unwrap();
        assert_eq!(store.lock_version(), Some(1));
    }
}
