//! Sync session.
//!
//! One `SyncSession` per open document. It owns the workbook and every state
//! container (versions, autosave, chat, jobs) and is the only writer of each.
//! It runs on a single thread: the caller feeds it time (`Instant`) and drains
//! inbound messages with `pump`; nothing here spawns or sleeps.
//!
//! Command batches apply in conversational order. A batch for a later turn
//! waits in `pending` until every earlier turn has completed or failed.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use serde_json::Value;
use sheetpilot_config::SyncSettings;
use sheetpilot_engine::workbook::Workbook;
use sheetpilot_protocol::rest::{LoadQuery, RenameRequest, RollbackRequest, SaveRequest};
use sheetpilot_protocol::{
    AcknowledgeTaskMessage, AiJobErrorMessage, AiJobResult, ChatMode, ClientMessage,
    ServerMessage, StartAiJobMessage, TaskFeedback,
};

use crate::apply::apply_batch;
use crate::autosave::{AutosaveScheduler, AutosaveState};
use crate::chat::{AssistantPayload, ChatLog, MessageStatus, TurnId, TurnState};
use crate::dirty::has_unsaved_changes;
use crate::error::{Result, StoreError, SyncError};
use crate::events::{
    ChatEvent, DocumentEvent, EventCategory, EventHub, JobEvent, PersistenceEvent, SyncEvent,
};
use crate::jobs::{JobEnd, JobTracker};
use crate::rollback::{RollbackCoordinator, RollbackPlan};
use crate::store::DocumentStore;
use crate::transport::Transport;
use crate::version::{DocumentVersionState, VersionManager, VersionPhase};

/// Identity a session is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIds {
    pub document_id: String,
    pub chat_id: String,
    pub user_id: String,
}

impl SessionIds {
    pub fn new(document_id: &str, chat_id: &str, user_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Persistence needs both a document and a user.
    pub fn is_bound(&self) -> bool {
        !self.document_id.is_empty() && !self.user_id.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub chat_mode: ChatMode,
    pub autosave_quiet: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { chat_mode: ChatMode::Agent, autosave_quiet: Duration::from_millis(2000) }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self { chat_mode: settings.chat_mode, autosave_quiet: settings.autosave_quiet() }
    }
}

pub struct SyncSession<T: Transport, S: DocumentStore> {
    ids: SessionIds,
    chat_mode: ChatMode,
    chat_session_id: Option<String>,
    file_name: Option<String>,
    workbook: Workbook,
    versions: VersionManager,
    autosave: AutosaveScheduler,
    chat: ChatLog,
    jobs: JobTracker,
    /// Executed batches waiting for earlier turns to finish.
    pending: BTreeMap<TurnId, AiJobResult>,
    rollback: RollbackCoordinator,
    events: EventHub,
    transport: T,
    inbound: Receiver<ServerMessage>,
    store: S,
}

impl<T: Transport, S: DocumentStore> SyncSession<T, S> {
    /// New session over a blank workbook. Call `load` to fetch the document.
    pub fn new(
        ids: SessionIds,
        transport: T,
        inbound: Receiver<ServerMessage>,
        store: S,
        options: SessionOptions,
    ) -> Self {
        Self {
            ids,
            chat_mode: options.chat_mode,
            chat_session_id: None,
            file_name: None,
            workbook: Workbook::new(),
            versions: VersionManager::new(),
            autosave: AutosaveScheduler::new(options.autosave_quiet),
            chat: ChatLog::new(),
            jobs: JobTracker::new(),
            pending: BTreeMap::new(),
            rollback: RollbackCoordinator::new(),
            events: EventHub::new(),
            transport,
            inbound,
            store,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn ids(&self) -> &SessionIds {
        &self.ids
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn version_state(&self) -> &DocumentVersionState {
        self.versions.state()
    }

    pub fn version_phase(&self) -> &VersionPhase {
        self.versions.phase()
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn autosave_state(&self) -> AutosaveState {
        self.autosave.state()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn chat_session_id(&self) -> Option<&str> {
        self.chat_session_id.as_deref()
    }

    pub fn chat_mode(&self) -> ChatMode {
        self.chat_mode
    }

    pub fn set_chat_mode(&mut self, mode: ChatMode) {
        self.chat_mode = mode;
    }

    /// Number of executed batches waiting on earlier turns.
    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        has_unsaved_changes(&self.workbook)
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&mut self, category: EventCategory) -> Receiver<SyncEvent> {
        self.events.subscribe(category)
    }

    // ── Document lifecycle ──────────────────────────────────────────

    /// Fetch the document and chat history. Returns whether the document
    /// already existed on the server. On error the session is unchanged.
    pub fn load(&mut self) -> Result<bool> {
        let query = LoadQuery {
            document_id: self.ids.document_id.clone(),
            chat_id: self.ids.chat_id.clone(),
            user_id: self.ids.user_id.clone(),
            document_version_id: self.versions.state().document_version_id.clone(),
        };
        let resp = self
            .store
            .check_and_load(&query)
            .map_err(|e| SyncError::Load(e.to_string()))?;

        let workbook = match resp.document_data.as_ref().filter(|_| resp.exists) {
            Some(data) => Workbook::from_json(data).map_err(|e| SyncError::Load(e.to_string()))?,
            None => Workbook::new(),
        };

        self.workbook = workbook;
        self.autosave.cancel();
        self.pending.clear();
        self.jobs = JobTracker::new();
        if resp.exists {
            self.versions.on_loaded(resp.document_version_id.clone(), resp.lock_version);
        } else {
            self.versions = VersionManager::new();
        }
        self.chat.restore(resp.chat_history.as_deref().unwrap_or(&[]));
        self.chat_session_id = resp.chat_session_id;
        self.file_name = resp.file_name;

        log::info!(
            "Loaded document {} (exists: {}, lock version {:?})",
            self.ids.document_id,
            resp.exists,
            self.versions.expected_lock()
        );
        self.events.publish(SyncEvent::Document(DocumentEvent::Loaded {
            exists: resp.exists,
            file_name: self.file_name.clone(),
        }));
        Ok(resp.exists)
    }

    /// Run a local edit against the workbook. Change events are published and
    /// autosave is armed if the edit left the document dirty.
    pub fn edit<R>(&mut self, now: Instant, f: impl FnOnce(&mut Workbook) -> R) -> R {
        let out = f(&mut self.workbook);
        self.observe_mutation(now);
        out
    }

    fn observe_mutation(&mut self, now: Instant) {
        let changes = self.workbook.drain_events();
        if !changes.is_empty() {
            self.events.publish(SyncEvent::Document(DocumentEvent::Changed(changes)));
        }
        if has_unsaved_changes(&self.workbook) && !self.versions.is_stale() {
            self.autosave.on_mutation(now);
        }
    }

    // ── Chat turns ──────────────────────────────────────────────────

    /// Send a user message to the AI backend and open a turn for it.
    pub fn send_user_message(&mut self, text: &str) -> Result<TurnId> {
        if !self.transport.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let turn = self.chat.begin_turn(text);
        let request_id = uuid::Uuid::new_v4().to_string();
        let msg = ClientMessage::StartAiJob(StartAiJobMessage {
            websocket_client_id: self.transport.client_id().to_string(),
            document_id: self.ids.document_id.clone(),
            chat_id: self.ids.chat_id.clone(),
            user_id: self.ids.user_id.clone(),
            chat_mode: self.chat_mode,
            user_question_message: text.to_string(),
            parsed_sheet_names: self.workbook.sheet_names().into_iter().map(String::from).collect(),
            client_request_id: Some(request_id.clone()),
        });
        if let Err(e) = self.transport.send(&msg) {
            log::warn!("Could not send message for {}: {}", turn, e);
            self.fail_turn(turn, &e.to_string());
            return Err(e);
        }
        self.jobs.register_turn(turn, &request_id);
        self.chat.mark_sent(turn)?;
        self.events.publish(SyncEvent::Chat(ChatEvent::TurnStarted { turn }));
        Ok(turn)
    }

    /// Handle every inbound message queued so far. Returns how many were handled.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.inbound.try_recv() {
            self.handle_message(msg, now);
            handled += 1;
        }
        handled
    }

    pub fn handle_message(&mut self, msg: ServerMessage, now: Instant) {
        match msg {
            ServerMessage::AiJobPlanned(result) => self.on_planned(result),
            ServerMessage::AiTasksExecuted(result) => self.on_executed(result, now),
            ServerMessage::AiJobError(err) => self.on_job_error(err, now),
            ServerMessage::AiJobCancelled(m) => {
                self.end_job(&m.job_id, m.client_request_id.as_deref(), JobEnd::Cancelled, "cancelled", now);
                self.events.publish(SyncEvent::Job(JobEvent::Cancelled { job_id: m.job_id }));
            }
            ServerMessage::AiJobTimeout(m) => {
                let reason = if m.message.is_empty() { "timed out".to_string() } else { m.message.clone() };
                self.end_job(&m.job_id, m.client_request_id.as_deref(), JobEnd::TimedOut, &reason, now);
                self.events.publish(SyncEvent::Job(JobEvent::TimedOut {
                    job_id: m.job_id,
                    message: m.message,
                }));
            }
        }
    }

    fn drop_batch(&mut self, job_id: &str, reason: &str) {
        self.events.publish(SyncEvent::Job(JobEvent::BatchDropped {
            job_id: job_id.to_string(),
            reason: reason.to_string(),
        }));
    }

    fn on_planned(&mut self, result: AiJobResult) {
        if let Some(how) = self.jobs.ended(&result.job_id) {
            log::debug!("Ignoring plan for {} job {}", how.label(), result.job_id);
            self.drop_batch(&result.job_id, how.label());
            return;
        }
        let Some(turn) = self.jobs.bind(&result.job_id, result.client_request_id.as_deref()) else {
            match self.jobs.ended(&result.job_id) {
                Some(how) => self.drop_batch(&result.job_id, how.label()),
                None => log::warn!("Plan for job {} has no waiting turn", result.job_id),
            }
            return;
        };
        if let Err(e) = self.chat.attach_plan(turn, &result.job_id, result.task_manager_output) {
            log::warn!("Could not attach plan for job {}: {}", result.job_id, e);
        }
        self.events.publish(SyncEvent::Job(JobEvent::Planned { job_id: result.job_id, turn }));
    }

    fn on_executed(&mut self, result: AiJobResult, now: Instant) {
        if let Some(how) = self.jobs.ended(&result.job_id) {
            log::debug!("Dropping late batch for {} job {}", how.label(), result.job_id);
            self.drop_batch(&result.job_id, how.label());
            return;
        }
        let Some(turn) = self.jobs.bind(&result.job_id, result.client_request_id.as_deref()) else {
            match self.jobs.ended(&result.job_id) {
                Some(how) => {
                    log::debug!("Dropping batch for {} job {}", how.label(), result.job_id);
                    self.drop_batch(&result.job_id, how.label());
                }
                None => {
                    log::warn!("Batch for job {} has no waiting turn", result.job_id);
                    self.drop_batch(&result.job_id, "no waiting turn");
                }
            }
            return;
        };
        if self.chat.turn_state(turn) != Some(TurnState::Open) || self.pending.contains_key(&turn) {
            log::warn!("Dropping duplicate batch for job {}", result.job_id);
            self.drop_batch(&result.job_id, "duplicate batch");
            return;
        }
        self.pending.insert(turn, result);
        self.drain_ready(now);
    }

    fn on_job_error(&mut self, err: AiJobErrorMessage, now: Instant) {
        log::warn!("AI job error ({}): {}", err.code, err.message);
        match err.job_id.as_deref() {
            Some(job_id) => {
                self.end_job(job_id, err.client_request_id.as_deref(), JobEnd::Failed, &err.message, now)
            }
            None => match self.jobs.take_oldest_unbound() {
                Some(turn) if self.chat.turn_state(turn) == Some(TurnState::Open) => {
                    self.fail_turn(turn, &err.message);
                    self.drain_ready(now);
                }
                _ => self.chat.push_error(&err.message),
            },
        }
        self.events.publish(SyncEvent::Job(JobEvent::Failed {
            job_id: err.job_id,
            message: err.message,
            code: err.code,
        }));
    }

    fn end_job(&mut self, job_id: &str, request_id: Option<&str>, how: JobEnd, reason: &str, now: Instant) {
        if let Some(turn) = self.jobs.end(job_id, request_id, how) {
            self.pending.remove(&turn);
            self.fail_turn(turn, reason);
        }
        self.drain_ready(now);
    }

    fn fail_turn(&mut self, turn: TurnId, reason: &str) {
        if self.chat.turn_state(turn) != Some(TurnState::Open) {
            return;
        }
        if let Err(e) = self.chat.fail_turn(turn, reason) {
            log::warn!("Could not fail {}: {}", turn, e);
        }
        self.events.publish(SyncEvent::Chat(ChatEvent::TurnFinished { turn, status: MessageStatus::Error }));
    }

    /// Apply queued batches whose turn is now at the head of the conversation.
    fn drain_ready(&mut self, now: Instant) {
        while let Some(turn) = self.chat.head_open_turn() {
            let Some(result) = self.pending.remove(&turn) else {
                break;
            };
            self.apply_turn(turn, result, now);
        }
    }

    fn apply_turn(&mut self, turn: TurnId, result: AiJobResult, now: Instant) {
        if let Err(e) = self.chat.start_streaming(turn) {
            log::warn!("Could not stream {}: {}", turn, e);
        }
        let commands = result.data_edit_chat_res.data_edit_commands;
        let report = apply_batch(&mut self.workbook, &commands);
        self.observe_mutation(now);
        log::debug!(
            "Applied batch for job {}: {} applied, {} ignored, {} failed",
            result.job_id,
            report.applied,
            report.ignored,
            report.failures.len()
        );

        let feedback = if report.is_clean() { TaskFeedback::Success } else { TaskFeedback::Failure };
        self.acknowledge(&result.job_id, feedback);

        let branch = result
            .task_manager_output
            .get("branchId")
            .and_then(Value::as_str)
            .map(String::from);
        let payload = AssistantPayload {
            job_id: Some(result.job_id.clone()),
            task_plan: result.task_manager_output,
            commands,
        };
        match self.chat.complete_turn(turn, payload, branch) {
            Ok(_) => self.events.publish(SyncEvent::Chat(ChatEvent::TurnFinished {
                turn,
                status: MessageStatus::Completed,
            })),
            Err(e) => log::warn!("Could not complete {}: {}", turn, e),
        }
        self.events.publish(SyncEvent::Job(JobEvent::BatchApplied { job_id: result.job_id, turn, report }));
    }

    fn acknowledge(&mut self, job_id: &str, feedback: TaskFeedback) {
        if !self.transport.is_connected() {
            log::warn!("Not connected, skipping acknowledgement for job {}", job_id);
            return;
        }
        let msg = ClientMessage::AcknowledgeTask(AcknowledgeTaskMessage { job_id: job_id.to_string(), feedback });
        if let Err(e) = self.transport.send(&msg) {
            log::warn!("Could not acknowledge job {}: {}", job_id, e);
        }
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Advance the autosave timer. Returns the save result when one fired.
    pub fn tick(&mut self, now: Instant) -> Option<Result<()>> {
        if !self.autosave.poll(now) {
            return None;
        }
        let result = if self.versions.is_stale() || !self.ids.is_bound() || !has_unsaved_changes(&self.workbook) {
            None
        } else {
            Some(self.persist())
        };
        self.autosave.complete(now);
        result
    }

    /// Save immediately, skipping the quiet period.
    pub fn save_now(&mut self) -> Result<()> {
        self.autosave.cancel();
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        if let VersionPhase::Stale { server_lock_version } = self.versions.phase() {
            return Err(SyncError::StaleVersionConflict {
                local: self.versions.expected_lock(),
                server: *server_lock_version,
            });
        }
        if !self.ids.is_bound() {
            return Err(SyncError::PersistenceFailure("document id and user id are required".into()));
        }
        let req = SaveRequest {
            document_id: self.ids.document_id.clone(),
            chat_id: self.ids.chat_id.clone(),
            user_id: self.ids.user_id.clone(),
            file_name: self.file_name.clone(),
            document_data: self.workbook.to_json(),
            lock_version: self.versions.expected_lock(),
        };
        match self.store.save(&req) {
            Ok(resp) => {
                self.workbook.clear_pending_changes();
                let changes = self.workbook.drain_events();
                if !changes.is_empty() {
                    self.events.publish(SyncEvent::Document(DocumentEvent::Changed(changes)));
                }
                self.versions.confirm_write(resp.document_version_id, resp.lock_version);
                let state = self.versions.state().clone();
                log::info!("Saved document {} at lock version {:?}", self.ids.document_id, state.lock_version);
                self.events.publish(SyncEvent::Persistence(PersistenceEvent::Saved {
                    document_version_id: state.document_version_id,
                    lock_version: state.lock_version,
                }));
                Ok(())
            }
            Err(StoreError::Conflict { server_lock_version }) => {
                let local = self.versions.expected_lock();
                self.versions.mark_conflict(server_lock_version);
                self.autosave.cancel();
                log::warn!(
                    "Save of {} rejected: local lock {:?}, server lock {:?}",
                    self.ids.document_id,
                    local,
                    server_lock_version
                );
                self.events.publish(SyncEvent::Persistence(PersistenceEvent::Conflict { server_lock_version }));
                Err(SyncError::StaleVersionConflict { local, server: server_lock_version })
            }
            Err(StoreError::Failed(message)) => {
                log::warn!("Save of {} failed: {}", self.ids.document_id, message);
                self.events.publish(SyncEvent::Persistence(PersistenceEvent::Failed { message: message.clone() }));
                Err(SyncError::PersistenceFailure(message))
            }
        }
    }

    pub fn rename(&mut self, file_name: &str) -> Result<()> {
        let req = RenameRequest {
            document_id: self.ids.document_id.clone(),
            user_id: self.ids.user_id.clone(),
            file_name: file_name.to_string(),
        };
        self.store
            .rename(&req)
            .map_err(|e| SyncError::PersistenceFailure(e.to_string()))?;
        self.file_name = Some(file_name.to_string());
        log::info!("Renamed document {} to {:?}", self.ids.document_id, file_name);
        self.events.publish(SyncEvent::Document(DocumentEvent::Renamed { file_name: file_name.to_string() }));
        Ok(())
    }

    // ── Rollback ────────────────────────────────────────────────────

    /// Restore the document to `target_branch_id`. Returns the branch the
    /// next user message continues from. On error nothing local changes.
    pub fn rollback(&mut self, target_branch_id: &str) -> Result<Option<String>> {
        if !self.transport.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let chat_session_id = self
            .chat_session_id
            .clone()
            .ok_or_else(|| SyncError::RollbackFailure("no chat session to roll back".into()))?;
        let req = RollbackRequest {
            document_id: self.ids.document_id.clone(),
            chat_id: self.ids.chat_id.clone(),
            user_id: self.ids.user_id.clone(),
            chat_session_id,
            target_branch_id: target_branch_id.to_string(),
        };
        let boundary = self.chat.next_turn_id();
        match self.rollback.execute(&self.store, self.transport.is_connected(), &req, boundary) {
            Ok(plan) => Ok(self.commit_rollback(plan)),
            Err(e) => {
                log::warn!("Rollback to {} failed: {}", target_branch_id, e);
                self.events.publish(SyncEvent::Chat(ChatEvent::Notice {
                    text: format!("Rollback to {} failed: {}", target_branch_id, e),
                }));
                Err(e)
            }
        }
    }

    fn commit_rollback(&mut self, plan: RollbackPlan) -> Option<String> {
        let RollbackPlan { workbook, response, boundary } = plan;
        self.workbook = workbook;
        self.versions
            .reset_from_rollback(response.new_document_version_id.clone(), response.new_lock_version);
        self.autosave.cancel();

        for turn in self.jobs.supersede_before(boundary) {
            self.pending.remove(&turn);
            self.fail_turn(turn, JobEnd::Superseded.label());
        }
        for turn in self.chat.open_turns().into_iter().filter(|t| *t < boundary) {
            self.fail_turn(turn, JobEnd::Superseded.label());
        }
        self.pending.retain(|turn, _| *turn >= boundary);
        self.chat.set_anchor(response.parent_branch_id.clone());

        log::info!(
            "Rolled back document {} to {} (lock version {})",
            self.ids.document_id,
            response.new_document_version_id,
            response.new_lock_version
        );
        self.events.publish(SyncEvent::Document(DocumentEvent::Replaced {
            document_version_id: response.new_document_version_id,
            lock_version: response.new_lock_version,
        }));
        response.parent_branch_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::{channel_transport, ChannelTransport, TransportPeer};
    use serde_json::json;
    use sheetpilot_protocol::{AiJobCancelledMessage, DataEditChatRes};

    fn session() -> (SyncSession<ChannelTransport, MemoryStore>, TransportPeer) {
        let (transport, peer, inbound) = channel_transport("ws-1");
        let store = MemoryStore::with_document("Budget", json!({"sheets": [{"name": "Sheet1"}]}), 1);
        let mut s = SyncSession::new(
            SessionIds::new("doc-1", "chat-1", "user-1"),
            transport,
            inbound,
            store,
            SessionOptions::default(),
        );
        s.load().unwrap();
        (s, peer)
    }

    fn result(job: &str, commands: Vec<Value>) -> AiJobResult {
        AiJobResult {
            job_id: job.into(),
            client_request_id: None,
            task_manager_output: json!({}),
            data_edit_chat_res: DataEditChatRes { data_edit_commands: commands },
        }
    }

    #[test]
    fn test_send_requires_connection() {
        let (mut s, peer) = session();
        peer.set_connected(false);
        assert!(matches!(s.send_user_message("hi"), Err(SyncError::NotConnected)));
        assert!(s.chat().messages().is_empty());
    }

    #[test]
    fn test_start_message_carries_context() {
        let (mut s, peer) = session();
        s.set_chat_mode(ChatMode::Edit);
        s.send_user_message("Total column B").unwrap();
        match peer.drain_sent().as_slice() {
            [ClientMessage::StartAiJob(m)] => {
                assert_eq!(m.websocket_client_id, "ws-1");
                assert_eq!(m.document_id, "doc-1");
                assert_eq!(m.chat_mode, ChatMode::Edit);
                assert_eq!(m.parsed_sheet_names, vec!["Sheet1".to_string()]);
                assert!(m.client_request_id.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plan_does_not_touch_workbook() {
        let (mut s, _peer) = session();
        let now = Instant::now();
        let turn = s.send_user_message("hi").unwrap();
        let cmd = json!({"sheetIdentifier": 0, "commandType": "value_change", "range": [0, 0], "detailedCommand": "x"});
        s.handle_message(ServerMessage::AiJobPlanned(result("j1", vec![cmd])), now);
        assert_eq!(s.workbook().sheet(0).unwrap().get_raw(0, 0), "");
        assert_eq!(s.chat().turn_state(turn), Some(TurnState::Open));
        assert_eq!(s.jobs().turn_of("j1"), Some(turn));
    }

    #[test]
    fn test_error_without_job_fails_oldest_waiting_turn() {
        let (mut s, _peer) = session();
        let now = Instant::now();
        let a = s.send_user_message("one").unwrap();
        let b = s.send_user_message("two").unwrap();
        s.handle_message(
            ServerMessage::AiJobError(AiJobErrorMessage {
                job_id: None,
                message: "quota".into(),
                code: "E_QUOTA".into(),
                execution_time: None,
                timestamp: None,
                client_request_id: None,
            }),
            now,
        );
        assert_eq!(s.chat().turn_state(a), Some(TurnState::Failed));
        assert_eq!(s.chat().turn_state(b), Some(TurnState::Open));
    }

    #[test]
    fn test_cancel_fails_turn_and_unblocks_next() {
        let (mut s, _peer) = session();
        let now = Instant::now();
        let a = s.send_user_message("one").unwrap();
        let b = s.send_user_message("two").unwrap();
        s.handle_message(ServerMessage::AiJobPlanned(result("ja", vec![])), now);
        s.handle_message(ServerMessage::AiTasksExecuted(result("jb", vec![])), now);
        assert_eq!(s.pending_batches(), 1);

        s.handle_message(
            ServerMessage::AiJobCancelled(AiJobCancelledMessage { job_id: "ja".into(), client_request_id: None }),
            now,
        );
        assert_eq!(s.chat().turn_state(a), Some(TurnState::Failed));
        assert_eq!(s.chat().turn_state(b), Some(TurnState::Completed));
        assert_eq!(s.pending_batches(), 0);
    }

    #[test]
    fn test_echoed_request_id_routes_batch_to_its_turn() {
        let (mut s, peer) = session();
        let now = Instant::now();
        let a = s.send_user_message("one").unwrap();
        let b = s.send_user_message("two").unwrap();
        let request_ids: Vec<String> = peer
            .drain_sent()
            .into_iter()
            .filter_map(|m| match m {
                ClientMessage::StartAiJob(m) => m.client_request_id,
                _ => None,
            })
            .collect();
        assert_eq!(request_ids.len(), 2);

        // b's job reports first; without the echo it would bind to a
        let cmd = json!({"sheetIdentifier": 0, "commandType": "value_change", "range": [0, 0], "detailedCommand": "b"});
        let mut batch = result("jb", vec![cmd]);
        batch.client_request_id = Some(request_ids[1].clone());
        s.handle_message(ServerMessage::AiTasksExecuted(batch), now);
        assert_eq!(s.jobs().turn_of("jb"), Some(b));
        assert_eq!(s.chat().turn_state(a), Some(TurnState::Open));

        let mut batch = result("ja", vec![]);
        batch.client_request_id = Some(request_ids[0].clone());
        s.handle_message(ServerMessage::AiTasksExecuted(batch), now);
        assert_eq!(s.chat().turn_state(a), Some(TurnState::Completed));
        assert_eq!(s.chat().turn_state(b), Some(TurnState::Completed));
        assert_eq!(s.workbook().sheet(0).unwrap().get_raw(0, 0), "b");
    }

    #[test]
    fn test_rollback_without_chat_session() {
        let (transport, _peer, inbound) = channel_transport("ws-1");
        let mut s = SyncSession::new(
            SessionIds::new("doc-1", "chat-1", "user-1"),
            transport,
            inbound,
            MemoryStore::new(),
            SessionOptions::default(),
        );
        assert!(matches!(s.rollback("b1"), Err(SyncError::RollbackFailure(_))));
    }

    #[test]
    fn test_options_from_settings() {
        let settings = SyncSettings { autosave_quiet_ms: 750, chat_mode: ChatMode::Edit, ..Default::default() };
        let opts = SessionOptions::from_settings(&settings);
        assert_eq!(opts.autosave_quiet, Duration::from_millis(750));
        assert_eq!(opts.chat_mode, ChatMode::Edit);
    }
}
