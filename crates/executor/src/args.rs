//! Query arguments from JSON
//!
//! Arguments arrive as one JSON value and are bound positionally as text
//! parameters. `None` binds SQL null.

use asof_core::{AsOfError, Result};
use serde_json::Value as JsonValue;

/// Convert a JSON argument list into text parameters.
///
/// | Input | Result |
/// |-------|--------|
/// | `null`, string, number, bool at the root | no parameters |
/// | object at the root | `InvalidArgument` |
/// | array | one parameter per element |
///
/// Array elements: strings as-is, numbers as their JSON text, booleans as
/// `true`/`false`, null as `None`; nested arrays and objects are rejected.
pub fn json_to_params(args: &JsonValue) -> Result<Vec<Option<String>>> {
    match args {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| element_to_param(i, item))
            .collect(),
        JsonValue::Object(_) => Err(AsOfError::invalid_argument("args must be a JSON array")),
        _ => Ok(Vec::new()),
    }
}

fn element_to_param(index: usize, item: &JsonValue) -> Result<Option<String>> {
    match item {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s.clone())),
        JsonValue::Number(n) => Ok(Some(n.to_string())),
        JsonValue::Bool(b) => Ok(Some(b.to_string())),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(AsOfError::invalid_argument(format!(
            "argument {} must be a string, number, boolean or null",
            index + 1
        ))),
    }
}
