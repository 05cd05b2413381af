//! Command normalizer.
//!
//! The AI backend sometimes wraps a command in a redundant single-element
//! `nestedCommands` list. The first nested element is authoritative and the
//! wrapper's own fields are discarded. Wrappers are unwrapped exactly one
//! level; a wrapper whose first element is itself a wrapper is malformed.

use serde_json::Value;
use sheetpilot_protocol::EditCommand;

use crate::error::NormalizeError;

const NESTED_KEY: &str = "nestedCommands";

/// Turn one raw wire element into exactly one canonical command.
pub fn normalize(raw: &Value) -> Result<EditCommand, NormalizeError> {
    let inner = match nested(raw)? {
        Some(first) => {
            if nested(first)?.is_some() {
                return Err(NormalizeError::MalformedCommand(
                    "nestedCommands nested more than one level".into(),
                ));
            }
            first
        }
        None => raw,
    };
    parse_direct(inner)
}

/// Normalize every element of a batch, keeping per-element results in order.
pub fn normalize_batch(raw: &[Value]) -> Vec<Result<EditCommand, NormalizeError>> {
    raw.iter().map(normalize).collect()
}

/// First element of a non-empty `nestedCommands` list. Absent, null or empty means "direct command".
fn nested(raw: &Value) -> Result<Option<&Value>, NormalizeError> {
    let Some(obj) = raw.as_object() else {
        return Err(NormalizeError::MalformedCommand(format!(
            "expected an object, got {}",
            json_kind(raw)
        )));
    };
    match obj.get(NESTED_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(items.first()),
        Some(other) => Err(NormalizeError::MalformedCommand(format!(
            "nestedCommands must be a list, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_direct(raw: &Value) -> Result<EditCommand, NormalizeError> {
    serde_json::from_value(raw.clone()).map_err(|e| NormalizeError::MalformedCommand(e.to_string()))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sheetpilot_protocol::{CommandType, SheetRef};

    fn direct() -> Value {
        json!({
            "sheetIdentifier": "Sheet1",
            "commandType": "value_change",
            "range": [0, 0],
            "detailedCommand": "X"
        })
    }

    #[test]
    fn test_direct_command() {
        let cmd = normalize(&direct()).unwrap();
        assert_eq!(cmd.sheet_identifier, SheetRef::Name("Sheet1".into()));
        assert_eq!(cmd.command_type, CommandType::ValueChange);
    }

    #[test]
    fn test_wrapper_fields_are_discarded() {
        let wrapped = json!({
            "sheetIdentifier": "Other",
            "commandType": "apply_style",
            "range": [9, 9],
            "detailedCommand": "ignored",
            "nestedCommands": [direct(), {"junk": true}]
        });
        assert_eq!(normalize(&wrapped).unwrap(), normalize(&direct()).unwrap());
    }

    #[test]
    fn test_empty_or_null_nested_is_direct() {
        let mut raw = direct();
        raw["nestedCommands"] = json!([]);
        assert!(normalize(&raw).is_ok());
        raw["nestedCommands"] = Value::Null;
        assert!(normalize(&raw).is_ok());
    }

    #[test]
    fn test_double_nesting_is_malformed() {
        let twice = json!({"nestedCommands": [{"nestedCommands": [direct()]}]});
        assert!(matches!(normalize(&twice), Err(NormalizeError::MalformedCommand(_))));
    }

    #[test]
    fn test_bad_shapes_are_malformed() {
        assert!(normalize(&json!("value_change")).is_err());
        assert!(normalize(&json!({"nestedCommands": {"a": 1}})).is_err());
        assert!(normalize(&json!({"commandType": "value_change"})).is_err());
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let results = normalize_batch(&[direct(), json!(42), direct()]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
