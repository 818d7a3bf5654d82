//! Applying messages pushed in by subscribers.
//!
//! An inbound frame is a JSON object `{ entityId: attributes, ... }`. Each
//! top-level key is treated as an entity id and overwritten wholesale with
//! [`Store::set`], which broadcasts the change to every subscriber,
//! including the one that sent it.

use serde_json::Value;
use tracing::warn;

use crate::error::InboundError;
use crate::store::Store;
use crate::types::EntityId;

/// Outcome of applying one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundReport {
    /// Entities that were set, in key order.
    pub applied: Vec<EntityId>,
    /// Entities skipped because their value was not an object.
    pub skipped: Vec<EntityId>,
}

/// Parse `text` and `set` every entity it carries.
///
/// The whole message is rejected if it is not a JSON object. Within a
/// valid message, an entry whose value is not an object is skipped with a
/// warning and the remaining entries are still applied.
pub fn apply_message(store: &Store, text: &str) -> Result<InboundReport, InboundError> {
    let value: Value = serde_json::from_str(text)?;
    let entries = match value {
        Value::Object(entries) => entries,
        other => {
            return Err(InboundError::NotAnObject {
                found: json_type(&other),
            });
        }
    };

    let mut report = InboundReport::default();
    for (key, value) in entries {
        let id = EntityId::from(key);
        match value {
            Value::Object(attributes) => {
                store.set(id.clone(), attributes);
                report.applied.push(id);
            }
            other => {
                warn!(
                    entity = %id,
                    found = json_type(&other),
                    "ignoring inbound entity whose value is not an object"
                );
                report.skipped.push(id);
            }
        }
    }
    Ok(report)
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
