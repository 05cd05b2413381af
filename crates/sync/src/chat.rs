//! Chat message state machine.
//!
//! A turn is one user message plus the assistant reply it produces. Message
//! status only moves forward (`pending → sent → streaming → completed`), and
//! any non-terminal status can drop to `error`. At most one assistant message
//! streams at a time, and turns finish in the order they were started: a
//! later turn's commands wait until every earlier turn is completed or failed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheetpilot_protocol::ChatHistoryEntry;

use crate::error::ChatError;

/// Conversational turn, numbered in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Streaming,
    Completed,
    Error,
}

impl MessageStatus {
    fn rank(self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Streaming => 2,
            MessageStatus::Completed | MessageStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Error)
    }

    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        !self.is_terminal() && (next == MessageStatus::Error || next.rank() > self.rank())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Streaming => "streaming",
            MessageStatus::Completed => "completed",
            MessageStatus::Error => "error",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the AI returned for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantPayload {
    pub job_id: Option<String>,
    pub task_plan: Value,
    pub commands: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageKind {
    User {
        text: String,
        branch_id: String,
        /// Branch this message continues from (set after a rollback).
        parent_branch_id: Option<String>,
    },
    Assistant {
        payload: Option<AssistantPayload>,
        /// Present once the reply is complete; marks a valid rollback target.
        branch_id: Option<String>,
    },
    System { text: String },
    Error { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub turn: Option<TurnId>,
    pub kind: MessageKind,
}

impl ChatMessage {
    pub fn branch_id(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::User { branch_id, .. } => Some(branch_id),
            MessageKind::Assistant { branch_id, .. } => branch_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_rollback_target(&self) -> bool {
        matches!(self.kind, MessageKind::Assistant { branch_id: Some(_), .. })
            && self.status == MessageStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Open,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
struct Turn {
    id: TurnId,
    user_message: usize,
    assistant_message: Option<usize>,
    state: TurnState,
}

#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    turns: Vec<Turn>,
    next_turn: u64,
    /// Parent branch for the next user message.
    anchor: Option<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Id the next `begin_turn` will use.
    pub fn next_turn_id(&self) -> TurnId {
        TurnId(self.next_turn)
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn set_anchor(&mut self, branch: Option<String>) {
        self.anchor = branch;
    }

    /// Add a user message and open its turn.
    pub fn begin_turn(&mut self, text: &str) -> TurnId {
        let id = TurnId(self.next_turn);
        self.next_turn += 1;
        let parent = self.anchor.take().or_else(|| self.last_branch().map(String::from));
        self.messages.push(ChatMessage {
            id: new_id(),
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
            turn: Some(id),
            kind: MessageKind::User {
                text: text.to_string(),
                branch_id: new_id(),
                parent_branch_id: parent,
            },
        });
        self.turns.push(Turn {
            id,
            user_message: self.messages.len() - 1,
            assistant_message: None,
            state: TurnState::Open,
        });
        id
    }

    /// The user message went out over the transport.
    pub fn mark_sent(&mut self, turn: TurnId) -> Result<(), ChatError> {
        let idx = self.turn(turn)?.user_message;
        self.transition(idx, MessageStatus::Sent)
    }

    pub fn turn_state(&self, turn: TurnId) -> Option<TurnState> {
        self.turns.iter().find(|t| t.id == turn).map(|t| t.state)
    }

    /// Oldest turn that is still open. Only this turn may apply commands.
    pub fn head_open_turn(&self) -> Option<TurnId> {
        self.turns.iter().find(|t| t.state == TurnState::Open).map(|t| t.id)
    }

    pub fn open_turns(&self) -> Vec<TurnId> {
        self.turns.iter().filter(|t| t.state == TurnState::Open).map(|t| t.id).collect()
    }

    /// Store the task plan on the turn's assistant message (created pending if absent).
    pub fn attach_plan(&mut self, turn: TurnId, job_id: &str, plan: Value) -> Result<(), ChatError> {
        let idx = self.ensure_assistant(turn)?;
        if let MessageKind::Assistant { payload, .. } = &mut self.messages[idx].kind {
            let p = payload.get_or_insert_with(AssistantPayload::default);
            p.job_id = Some(job_id.to_string());
            p.task_plan = plan;
        }
        Ok(())
    }

    /// Move the turn's assistant message to `streaming`.
    pub fn start_streaming(&mut self, turn: TurnId) -> Result<(), ChatError> {
        let idx = self.ensure_assistant(turn)?;
        if let Some(other) = self.streaming_message() {
            if other.id != self.messages[idx].id {
                return Err(ChatError::AlreadyStreaming(other.id.clone()));
            }
            return Ok(());
        }
        self.transition(idx, MessageStatus::Streaming)
    }

    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.status == MessageStatus::Streaming)
    }

    /// Finish the turn with the AI payload; the user message completes with it.
    ///
    /// Branch ids are assigned by the server. Without one the assistant
    /// message is stored but is not a rollback target.
    pub fn complete_turn(
        &mut self,
        turn: TurnId,
        result: AssistantPayload,
        server_branch: Option<String>,
    ) -> Result<Option<String>, ChatError> {
        let idx = self.ensure_assistant(turn)?;
        self.transition(idx, MessageStatus::Completed)?;
        let user = self.turn(turn)?.user_message;
        if !self.messages[user].status.is_terminal() {
            self.transition(user, MessageStatus::Completed)?;
        }
        if let MessageKind::Assistant { payload, branch_id } = &mut self.messages[idx].kind {
            let plan = payload.take().map(|p| p.task_plan).unwrap_or(Value::Null);
            *payload = Some(AssistantPayload {
                task_plan: if result.task_plan.is_null() { plan } else { result.task_plan },
                ..result
            });
            *branch_id = server_branch.clone();
        }
        self.set_turn_state(turn, TurnState::Completed);
        Ok(server_branch)
    }

    /// Fail the turn: its open messages go to `error` and an error message is appended.
    pub fn fail_turn(&mut self, turn: TurnId, reason: &str) -> Result<(), ChatError> {
        let t = self.turn(turn)?.clone();
        if t.state != TurnState::Open {
            return Ok(());
        }
        for idx in std::iter::once(t.user_message).chain(t.assistant_message) {
            if !self.messages[idx].status.is_terminal() {
                self.transition(idx, MessageStatus::Error)?;
            }
        }
        self.set_turn_state(turn, TurnState::Failed);
        self.push(Some(turn), MessageKind::Error { text: reason.to_string() }, MessageStatus::Completed);
        Ok(())
    }

    pub fn push_system(&mut self, text: &str) {
        self.push(None, MessageKind::System { text: text.to_string() }, MessageStatus::Completed);
    }

    pub fn push_error(&mut self, text: &str) {
        self.push(None, MessageKind::Error { text: text.to_string() }, MessageStatus::Completed);
    }

    /// Branch id of the latest completed assistant message.
    pub fn last_branch(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_rollback_target())
            .and_then(|m| m.branch_id())
    }

    pub fn rollback_targets(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.is_rollback_target())
            .filter_map(|m| m.branch_id())
            .collect()
    }

    /// Replace the log with persisted history. Restored messages are all completed.
    pub fn restore(&mut self, history: &[ChatHistoryEntry]) {
        *self = Self::default();
        for entry in history {
            let timestamp = entry
                .timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            let kind = match entry.role.as_str() {
                "user" => MessageKind::User {
                    text: entry.content.clone(),
                    branch_id: entry.branch_id.clone().unwrap_or_else(new_id),
                    parent_branch_id: None,
                },
                "assistant" => MessageKind::Assistant {
                    payload: None,
                    branch_id: entry.branch_id.clone(),
                },
                "error" => MessageKind::Error { text: entry.content.clone() },
                _ => MessageKind::System { text: entry.content.clone() },
            };
            self.messages.push(ChatMessage {
                id: entry.id.clone(),
                timestamp,
                status: MessageStatus::Completed,
                turn: None,
                kind,
            });
        }
    }

    /// Full session reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn push(&mut self, turn: Option<TurnId>, kind: MessageKind, status: MessageStatus) {
        self.messages.push(ChatMessage { id: new_id(), timestamp: Utc::now(), status, turn, kind });
    }

    fn turn(&self, turn: TurnId) -> Result<&Turn, ChatError> {
        self.turns
            .iter()
            .find(|t| t.id == turn)
            .ok_or_else(|| ChatError::UnknownMessage(turn.to_string()))
    }

    fn set_turn_state(&mut self, turn: TurnId, state: TurnState) {
        if let Some(t) = self.turns.iter_mut().find(|t| t.id == turn) {
            t.state = state;
        }
    }

    fn ensure_assistant(&mut self, turn: TurnId) -> Result<usize, ChatError> {
        if let Some(idx) = self.turn(turn)?.assistant_message {
            return Ok(idx);
        }
        self.push(
            Some(turn),
            MessageKind::Assistant { payload: None, branch_id: None },
            MessageStatus::Pending,
        );
        let idx = self.messages.len() - 1;
        if let Some(t) = self.turns.iter_mut().find(|t| t.id == turn) {
            t.assistant_message = Some(idx);
        }
        Ok(idx)
    }

    fn transition(&mut self, idx: usize, to: MessageStatus) -> Result<(), ChatError> {
        let msg = &mut self.messages[idx];
        if !msg.status.can_transition_to(to) {
            return Err(ChatError::InvalidTransition { id: msg.id.clone(), from: msg.status, to });
        }
        msg.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions() {
        use MessageStatus::*;
        assert!(Pending.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Error));
        assert!(!Streaming.can_transition_to(Sent));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Error.can_transition_to(Completed));
    }

    #[test]
    fn test_turn_lifecycle() {
        let mut log = ChatLog::new();
        let t = log.begin_turn("Bold the header");
        log.mark_sent(t).unwrap();
        log.attach_plan(t, "job-1", json!({"steps": 1})).unwrap();
        log.start_streaming(t).unwrap();
        assert!(log.streaming_message().is_some());

        let branch = log
            .complete_turn(t, AssistantPayload { job_id: Some("job-1".into()), ..Default::default() }, Some("b1".into()))
            .unwrap();
        assert_eq!(branch.as_deref(), Some("b1"));
        assert_eq!(log.turn_state(t), Some(TurnState::Completed));
        let user = log.messages().iter().find(|m| matches!(m.kind, MessageKind::User { .. })).unwrap();
        assert_eq!(user.status, MessageStatus::Completed);
        assert!(log.streaming_message().is_none());
        assert_eq!(log.last_branch(), Some("b1"));

        // Plan from attach_plan survives completion without a new plan
        let assistant = log.messages().iter().find(|m| m.is_rollback_target()).unwrap();
        match &assistant.kind {
            MessageKind::Assistant { payload: Some(p), .. } => assert_eq!(p.task_plan, json!({"steps": 1})),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_user_message_always_has_branch() {
        let mut log = ChatLog::new();
        let t = log.begin_turn("hi");
        let user = log.messages().iter().find(|m| m.turn == Some(t)).unwrap();
        assert!(user.branch_id().is_some());
        assert!(!user.is_rollback_target());
    }

    #[test]
    fn test_single_streaming_message() {
        let mut log = ChatLog::new();
        let a = log.begin_turn("one");
        let b = log.begin_turn("two");
        log.start_streaming(a).unwrap();
        assert!(matches!(log.start_streaming(b), Err(ChatError::AlreadyStreaming(_))));
        // Restarting the streaming turn is a no-op
        log.start_streaming(a).unwrap();
    }

    #[test]
    fn test_head_turn_advances_in_order() {
        let mut log = ChatLog::new();
        let a = log.begin_turn("one");
        let b = log.begin_turn("two");
        assert_eq!(log.head_open_turn(), Some(a));
        log.fail_turn(a, "timed out").unwrap();
        assert_eq!(log.head_open_turn(), Some(b));
        assert!(matches!(log.messages().last().unwrap().kind, MessageKind::Error { .. }));
        log.complete_turn(b, AssistantPayload::default(), None).unwrap();
        assert_eq!(log.head_open_turn(), None);
    }

    #[test]
    fn test_completed_message_is_final() {
        let mut log = ChatLog::new();
        let t = log.begin_turn("x");
        assert_eq!(log.complete_turn(t, AssistantPayload::default(), None).unwrap(), None);
        assert!(matches!(
            log.complete_turn(t, AssistantPayload::default(), None),
            Err(ChatError::InvalidTransition { .. })
        ));
        // Failing a finished turn does nothing
        log.fail_turn(t, "late").unwrap();
        assert_eq!(log.turn_state(t), Some(TurnState::Completed));
    }

    #[test]
    fn test_no_rollback_target_without_server_branch() {
        let mut log = ChatLog::new();
        let t = log.begin_turn("x");
        log.mark_sent(t).unwrap();
        log.complete_turn(t, AssistantPayload::default(), None).unwrap();
        assert!(log.rollback_targets().is_empty());
        assert_eq!(log.last_branch(), None);
        assert!(log.messages().iter().all(|m| m.status == MessageStatus::Completed));
    }

    #[test]
    fn test_anchor_feeds_next_user_message() {
        let mut log = ChatLog::new();
        log.set_anchor(Some("b0".into()));
        let t = log.begin_turn("again");
        let user = log.messages().iter().find(|m| m.turn == Some(t)).unwrap();
        match &user.kind {
            MessageKind::User { parent_branch_id, .. } => assert_eq!(parent_branch_id.as_deref(), Some("b0")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(log.anchor().is_none());
    }

    #[test]
    fn test_restore_history() {
        let mut log = ChatLog::new();
        log.begin_turn("discarded");
        log.restore(&[
            ChatHistoryEntry { id: "m1".into(), role: "user".into(), content: "hi".into(), branch_id: Some("b0".into()), timestamp: None },
            ChatHistoryEntry { id: "m2".into(), role: "assistant".into(), content: "ok".into(), branch_id: Some("b1".into()), timestamp: Some("2026-01-02T03:04:05Z".into()) },
        ]);
        assert_eq!(log.messages().len(), 2);
        assert_eq!(log.rollback_targets(), vec!["b1"]);
        assert_eq!(log.head_open_turn(), None);
    }
}
