//! Persistence REST bodies (`/table-data-json-save/*`).

use serde::{Deserialize, Serialize};

pub const CHECK_AND_LOAD_PATH: &str = "/table-data-json-save/check-and-load";
pub const CREATE_PATH: &str = "/table-data-json-save/create";
pub const RENAME_PATH: &str = "/table-data-json-save/rename-fileName";
pub const ROLLBACK_PATH: &str = "/table-data-json-save/rollback";

/// Query string of `GET check-and-load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    pub document_id: String,
    pub chat_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub exists: bool,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub document_version_id: Option<String>,
    #[serde(default)]
    pub lock_version: Option<u64>,
    #[serde(default)]
    pub document_data: Option<serde_json::Value>,
    #[serde(default)]
    pub chat_session_id: Option<String>,
    #[serde(default)]
    pub chat_history: Option<Vec<ChatHistoryEntry>>,
}

/// One persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryEntry {
    pub id: String,
    /// "user" | "assistant" | "system" | "error"
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Body of `POST create`. `lock_version` is the last version this client observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub document_id: String,
    pub chat_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub document_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document_version_id: Option<String>,
    /// New lock version. Absent means the server advanced it by exactly one.
    #[serde(default)]
    pub lock_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub document_id: String,
    pub user_id: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub document_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub chat_session_id: String,
    pub target_branch_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    /// Branch to anchor the next user message on. None when rolling back to the start.
    #[serde(default)]
    pub parent_branch_id: Option<String>,
    pub new_document_version_id: String,
    pub new_lock_version: u64,
    pub document_snapshot: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_response_minimal() {
        let resp: LoadResponse = serde_json::from_value(json!({"exists": false})).unwrap();
        assert!(!resp.exists);
        assert!(resp.document_data.is_none());
        assert!(resp.chat_history.is_none());
    }

    #[test]
    fn test_save_request_omits_missing_lock() {
        let req = SaveRequest {
            document_id: "d".into(),
            chat_id: "c".into(),
            user_id: "u".into(),
            file_name: None,
            document_data: json!({"sheets": []}),
            lock_version: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("lockVersion").is_none());
        assert!(value.get("fileName").is_none());
        assert_eq!(value["documentId"], "d");
    }

    #[test]
    fn test_rollback_response_shape() {
        let resp: RollbackResponse = serde_json::from_value(json!({
            "parentBranchId": "b0",
            "newDocumentVersionId": "v7",
            "newLockVersion": 7,
            "documentSnapshot": {"sheets": [{"name": "Sheet1"}]}
        }))
        .unwrap();
        assert_eq!(resp.parent_branch_id.as_deref(), Some("b0"));
        assert_eq!(resp.new_lock_version, 7);
    }
}
