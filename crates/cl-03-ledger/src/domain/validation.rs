//! Minimal-schema validation for submitted entries.
//!
//! Rejects garbage at the gate so the consensus and storage layers only
//! ever see well-formed candidates. Semantic checks (submitter eligibility,
//! signature quorum) happen later in the pipeline.

use serde_json::Value;
use shared_types::{reject_floats, to_canonical_bytes, ValidationError};

/// Longest accepted action label.
const MAX_ACTION_LEN: usize = 128;

/// Validate an opaque payload against the minimal schema.
///
/// The payload must be a JSON object, must contain no floating-point
/// numbers anywhere (they have no canonical encoding), and must serialize
/// to at most `max_bytes` canonical bytes.
pub fn validate_payload(payload: &Value, max_bytes: usize) -> Result<(), ValidationError> {
    if !payload.is_object() {
        return Err(ValidationError::PayloadNotObject {
            got: json_kind(payload),
        });
    }
    reject_floats(payload)?;

    let size = to_canonical_bytes(payload)?.len();
    if size > max_bytes {
        return Err(ValidationError::PayloadTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// Validate an action type label.
///
/// Labels are short machine-readable identifiers ("entry.custom",
/// "validator.registered"). Empty, oversized, or whitespace/control
/// bearing labels are rejected.
pub fn validate_action(action: &str) -> Result<(), ValidationError> {
    if action.is_empty() {
        return Err(ValidationError::BadActionLabel("empty".into()));
    }
    if action.len() > MAX_ACTION_LEN {
        return Err(ValidationError::BadActionLabel(format!(
            "{} bytes exceeds {MAX_ACTION_LEN}",
            action.len()
        )));
    }
    if action
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::BadActionLabel(action.to_string()));
    }
    Ok(())
}

/// Validate a submitter identity.
pub fn validate_submitter(submitter: &str) -> Result<(), ValidationError> {
    if submitter.trim().is_empty() {
        return Err(ValidationError::EmptySubmitter);
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_payload_within_cap_passes() {
        let payload = json!({"motion": "adopt budget", "votes_for": 7});
        assert!(validate_payload(&payload, 1024).is_ok());
    }

    #[test]
    fn test_non_object_payloads_rejected_with_kind() {
        for (value, kind) in [
            (json!(null), "null"),
            (json!(true), "boolean"),
            (json!(3), "number"),
            (json!("text"), "string"),
            (json!([1, 2]), "array"),
        ] {
            match validate_payload(&value, 1024) {
                Err(ValidationError::PayloadNotObject { got }) => assert_eq!(got, kind),
                other => panic!("expected PayloadNotObject, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = json!({"blob": "x".repeat(256)});
        match validate_payload(&payload, 64) {
            Err(ValidationError::PayloadTooLarge { size, max }) => {
                assert!(size > 64);
                assert_eq!(max, 64);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_float_in_payload_rejected() {
        let payload = json!({"amount": 1.5});
        assert!(matches!(
            validate_payload(&payload, 1024),
            Err(ValidationError::NonCanonicalNumber)
        ));
    }

    #[test]
    fn test_action_labels() {
        assert!(validate_action("entry.custom").is_ok());
        assert!(validate_action("validator.registered").is_ok());
        assert!(validate_action("").is_err());
        assert!(validate_action("has space").is_err());
        assert!(validate_action("line\nbreak").is_err());
        assert!(validate_action(&"a".repeat(200)).is_err());
    }

    #[test]
    fn test_submitter_must_be_non_blank() {
        assert!(validate_submitter("clerk-01").is_ok());
        assert!(matches!(
            validate_submitter(""),
            Err(ValidationError::EmptySubmitter)
        ));
        assert!(matches!(
            validate_submitter("   "),
            Err(ValidationError::EmptySubmitter)
        ));
    }
}
