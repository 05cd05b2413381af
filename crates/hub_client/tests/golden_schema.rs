//! Golden schema tests for the persistence wire contract.
//!
//! The golden files are the contract with the backend. If a field is added,
//! removed, or renamed on our side, these tests fail before a deploy does.

use sheetpilot_protocol::rest::{LoadResponse, RollbackRequest, RollbackResponse, SaveRequest};

fn read_golden(path: &str) -> serde_json::Value {
    serde_json::from_str(
        &std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Cannot read {}: {}", path, e)),
    )
    .unwrap_or_else(|e| panic!("Cannot parse {}: {}", path, e))
}

/// Every key in the golden JSON must survive a parse + serialize cycle.
fn validate_golden_keys<T>(golden_path: &str)
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let golden = read_golden(golden_path);
    let parsed: T = serde_json::from_value(golden.clone())
        .unwrap_or_else(|e| panic!("{} does not match the type: {}", golden_path, e));
    let serialized = serde_json::to_value(&parsed).unwrap();

    let golden_obj = golden.as_object().expect("golden file should be an object");
    let serial_obj = serialized.as_object().expect("type should serialize as object");
    for key in golden_obj.keys() {
        assert!(
            serial_obj.contains_key(key),
            "Golden key '{}' missing from serialization (file: {})",
            key, golden_path,
        );
    }
}

#[test]
fn test_golden_save_request() {
    validate_golden_keys::<SaveRequest>("tests/golden/save-request.json");
}

#[test]
fn test_golden_load_response() {
    validate_golden_keys::<LoadResponse>("tests/golden/load-response.json");

    let resp: LoadResponse = serde_json::from_value(read_golden("tests/golden/load-response.json")).unwrap();
    let history = resp.chat_history.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].branch_id.as_deref(), Some("b1"));
}

#[test]
fn test_golden_rollback() {
    validate_golden_keys::<RollbackRequest>("tests/golden/rollback-request.json");
    validate_golden_keys::<RollbackResponse>("tests/golden/rollback-response.json");
}

#[test]
fn test_rollback_response_required_fields() {
    // newLockVersion and documentSnapshot are mandatory. Dropping either must fail parsing.
    let mut golden = read_golden("tests/golden/rollback-response.json");
    golden.as_object_mut().unwrap().remove("newLockVersion");
    assert!(serde_json::from_value::<RollbackResponse>(golden).is_err());

    let mut golden = read_golden("tests/golden/rollback-response.json");
    golden.as_object_mut().unwrap().remove("documentSnapshot");
    assert!(serde_json::from_value::<RollbackResponse>(golden).is_err());
}
