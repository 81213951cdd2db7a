//! Shared type aliases and small value helpers.

use serde_json::{Map, Value};
use std::sync::Arc;

/// Default entity id field name.
pub const DEFAULT_IDENTIFIER: &str = "uuid";

/// Model transform applied to raw data for a context.
pub type ModelFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Listener invoked with published data.
pub type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// Continuation receiving model-applied refresh results.
pub type Continuation = Arc<dyn Fn(Value) + Send + Sync>;

pub fn identity_model() -> ModelFn {
    Arc::new(|data: Value| data)
}

pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Object and array values count as "present" entities for accessors.
pub fn is_object_like(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Truthiness of an identifier field: null, false, 0 and "" are not ids.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Shallow merge of `updates` into `target`; existing fields are overwritten.
///
/// A non-object target is replaced by the updates when they are an object.
pub fn shallow_merge(target: Value, updates: Value) -> Value {
    match (target, updates) {
        (Value::Object(mut base), Value::Object(changes)) => {
            for (key, value) in changes {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (target, Value::Null) => target,
        (_, updates) => updates,
    }
}
