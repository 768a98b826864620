//! # Canonical Serialization
//!
//! Produces a single deterministic byte representation of any serializable
//! value so that independent nodes compute identical hashes for identical
//! logical content.
//!
//! The encoding is compact JSON with lexicographically sorted object keys.
//! Sorting comes for free: `serde_json::Map` is backed by a `BTreeMap`, so
//! routing a value through `serde_json::Value` normalizes key order no
//! matter how the input was declared or received.
//!
//! Floating-point numbers are rejected outright. JSON float formatting is
//! not portable across writers, and a single differently-rendered `0.1`
//! would fork the hash chain between nodes. Callers that need fractional
//! values must submit them as scaled integers or strings.

use crate::errors::ValidationError;
use serde::Serialize;
use serde_json::Value;

/// Encode `value` into canonical bytes suitable for hashing.
///
/// Identical logical content yields identical bytes regardless of field or
/// key declaration order. Fails with [`ValidationError::NonCanonicalNumber`]
/// if the value contains any floating-point number anywhere in its tree.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ValidationError> {
    let tree = serde_json::to_value(value)
        .map_err(|e| ValidationError::Serialization(e.to_string()))?;
    reject_floats(&tree)?;
    serde_json::to_vec(&tree).map_err(|e| ValidationError::Serialization(e.to_string()))
}

/// Walk a JSON tree and fail on the first float encountered.
pub fn reject_floats(value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::Number(n) => {
            if n.is_f64() {
                return Err(ValidationError::NonCanonicalNumber);
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                reject_floats(item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for item in map.values() {
                reject_floats(item)?;
            }
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}
