//! sheetpilot wire protocol.
//!
//! This crate defines the message contract between the client and the AI job
//! backend (persistent websocket connection, JSON text frames) and the bodies
//! of the persistence REST endpoints. No behavior lives here.
//!
//! Every websocket frame is a JSON object tagged by `type`:
//!
//! ```ignore
//! use sheetpilot_protocol::{ClientMessage, ServerMessage};
//!
//! let frame = serde_json::to_string(&ClientMessage::AcknowledgeTask(ack))?;
//! let inbound: ServerMessage = serde_json::from_str(&text)?;
//! ```

pub mod command;
pub mod rest;

use serde::{Deserialize, Serialize};

pub use command::{
    BorderInfo, CommandType, DetailedCommand, EditCommand, HorizontalAlign, SheetRef,
    StyleCommand, StyleMethod, StyleProperties, VerticalAlign,
};
pub use rest::{
    ChatHistoryEntry, LoadQuery, LoadResponse, RenameRequest, RenameResponse, RollbackRequest,
    RollbackResponse, SaveRequest, SaveResponse,
};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Client → Server Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartAiJob(StartAiJobMessage),
    AcknowledgeTask(AcknowledgeTaskMessage),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// AI plans and executes multi-step tasks
    #[default]
    Agent,
    /// AI only proposes direct edits
    Edit,
}

/// Ask the backend to start an AI job for one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAiJobMessage {
    pub websocket_client_id: String,
    pub document_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub chat_mode: ChatMode,
    pub user_question_message: String,
    pub parsed_sheet_names: Vec<String>,
    /// Correlation id chosen by the client; echoed back on every job message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskFeedback {
    Success,
    Failure,
}

/// Report whether a delivered command batch applied cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeTaskMessage {
    pub job_id: String,
    pub feedback: TaskFeedback,
}

// =============================================================================
// Server → Client Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AiJobPlanned(AiJobResult),
    AiTasksExecuted(AiJobResult),
    AiJobError(AiJobErrorMessage),
    AiJobCancelled(AiJobCancelledMessage),
    AiJobTimeout(AiJobTimeoutMessage),
}

impl ServerMessage {
    /// Job this message belongs to, if it names one.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            ServerMessage::AiJobPlanned(m) | ServerMessage::AiTasksExecuted(m) => Some(&m.job_id),
            ServerMessage::AiJobError(m) => m.job_id.as_deref(),
            ServerMessage::AiJobCancelled(m) => Some(&m.job_id),
            ServerMessage::AiJobTimeout(m) => Some(&m.job_id),
        }
    }

    /// The `clientRequestId` of the `start_ai_job` that started this job,
    /// when the backend echoes it.
    pub fn client_request_id(&self) -> Option<&str> {
        match self {
            ServerMessage::AiJobPlanned(m) | ServerMessage::AiTasksExecuted(m) => m.client_request_id.as_deref(),
            ServerMessage::AiJobError(m) => m.client_request_id.as_deref(),
            ServerMessage::AiJobCancelled(m) => m.client_request_id.as_deref(),
            ServerMessage::AiJobTimeout(m) => m.client_request_id.as_deref(),
        }
    }
}

/// Planning result or executed task batch for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiJobResult {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(default)]
    pub task_manager_output: serde_json::Value,
    #[serde(default)]
    pub data_edit_chat_res: DataEditChatRes,
}

/// Command batch. Elements stay raw JSON until normalized, so one malformed
/// command cannot poison the whole frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataEditChatRes {
    pub data_edit_commands: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiJobErrorMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiJobCancelledMessage {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiJobTimeoutMessage {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_ai_job_wire_shape() {
        let msg = ClientMessage::StartAiJob(StartAiJobMessage {
            websocket_client_id: "ws-1".into(),
            document_id: "doc-1".into(),
            chat_id: "chat-1".into(),
            user_id: "user-1".into(),
            chat_mode: ChatMode::Edit,
            user_question_message: "Bold the header".into(),
            parsed_sheet_names: vec!["Sheet1".into()],
            client_request_id: Some("req-1".into()),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "start_ai_job");
        assert_eq!(value["clientRequestId"], "req-1");
        assert_eq!(value["websocketClientId"], "ws-1");
        assert_eq!(value["chatMode"], "edit");
        assert_eq!(value["parsedSheetNames"], json!(["Sheet1"]));
    }

    #[test]
    fn test_acknowledge_feedback_spelling() {
        let msg = ClientMessage::AcknowledgeTask(AcknowledgeTaskMessage {
            job_id: "j1".into(),
            feedback: TaskFeedback::Failure,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "acknowledge_task", "jobId": "j1", "feedback": "FAILURE"}));
    }

    #[test]
    fn test_tasks_executed_parses_raw_commands() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "ai_tasks_executed",
            "jobId": "j7",
            "taskManagerOutput": {"steps": 2},
            "dataEditChatRes": {"dataEditCommands": [
                {"sheetIdentifier": "Sheet1", "commandType": "value_change", "range": [0, 0], "detailedCommand": "1"},
                {"garbage": true}
            ]}
        }))
        .unwrap();
        match &msg {
            ServerMessage::AiTasksExecuted(res) => {
                assert_eq!(res.data_edit_chat_res.data_edit_commands.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(msg.job_id(), Some("j7"));
    }

    #[test]
    fn test_planned_without_commands() {
        let msg: ServerMessage =
            serde_json::from_value(json!({"type": "ai_job_planned", "jobId": "j1"})).unwrap();
        match msg {
            ServerMessage::AiJobPlanned(res) => {
                assert!(res.data_edit_chat_res.data_edit_commands.is_empty());
                assert!(res.task_manager_output.is_null());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_without_job_id() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "ai_job_error", "message": "quota exceeded", "code": "RATE_LIMIT"
        }))
        .unwrap();
        assert_eq!(msg.job_id(), None);
        assert_eq!(msg.client_request_id(), None);
    }

    #[test]
    fn test_cancel_echoes_request_id() {
        let msg: ServerMessage = serde_json::from_value(json!({
            "type": "ai_job_cancelled", "jobId": "j3", "clientRequestId": "req-9"
        }))
        .unwrap();
        assert_eq!(msg.job_id(), Some("j3"));
        assert_eq!(msg.client_request_id(), Some("req-9"));
    }
}
