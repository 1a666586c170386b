//! Workflow state and reducer system
//!
//! The state threaded through a workflow is a heterogeneous JSON mapping.
//! Every key has an associated [`Reducer`] that folds a node's partial update
//! into the current value, so concurrent writes from parallel branches merge
//! deterministically. The reserved keys and their merge behavior:
//!
//! | Key            | Reducer       |
//! |----------------|---------------|
//! | `input`        | frozen after start |
//! | `messages`     | append        |
//! | `intermediate` | shallow-merge |
//! | `output`       | last-write    |
//! | `current_node` | last-write    |
//! | `error`        | last-write    |
//! | `metadata`     | shallow-merge |
//!
//! Keys declared by a workflow's `state_schema` get a reducer selected by
//! their declared JSON-schema type: `array` appends, `object` merges,
//! anything else is last-write.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while folding updates into state.
#[derive(Debug, Error)]
pub enum StateError {
    /// State or update is not a JSON object.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A reducer received values it cannot merge.
    #[error("Reducer error for key '{key}': {message}")]
    ReducerError { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Merge function applied when a key is written.
///
/// Reducers for keys that can be written from parallel branches must be
/// associative and commutative; the executor relies on
/// [`StateSchema::is_commutative`] to decide which sibling writes may merge
/// back into shared state.
pub trait Reducer: Send + Sync {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    fn name(&self) -> &str;
}

/// Keeps the update unless it is `null`, in which case the current value
/// survives. This is the last-write-wins behavior of `output`,
/// `current_node`, and `error`.
#[derive(Debug, Clone)]
pub struct LastValueReducer;

impl Reducer for LastValueReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        if update.is_null() {
            Ok(current.clone())
        } else {
            Ok(update.clone())
        }
    }

    fn name(&self) -> &str {
        "last_value"
    }
}

/// Concatenates arrays; a scalar update is appended as a single element.
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut result = curr.clone();
                result.extend_from_slice(upd);
                Ok(Value::Array(result))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut result = curr.clone();
                result.push(single.clone());
                Ok(Value::Array(result))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            _ => Err(StateError::ReducerError {
                key: String::new(),
                message: "append requires an array on the left".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Shallow-merges objects; keys from the update win on conflict.
#[derive(Debug, Clone)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Object(curr), Value::Object(upd)) => {
                let mut result = curr.clone();
                for (key, value) in upd {
                    result.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(result))
            }
            (Value::Null, Value::Object(upd)) => Ok(Value::Object(upd.clone())),
            _ => Err(StateError::ReducerError {
                key: String::new(),
                message: "merge requires object values".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Reserved key holding the caller-supplied input. Never overwritten after
/// the execution starts.
pub const INPUT_KEY: &str = "input";

/// Map of state field names to reducers, derived from the reserved workflow
/// keys plus any keys a workflow declares in its `state_schema`.
pub struct StateSchema {
    fields: HashMap<String, Arc<dyn Reducer>>,
    default_reducer: Arc<dyn Reducer>,
}

impl StateSchema {
    /// Schema with only the reserved workflow keys.
    pub fn workflow_base() -> Self {
        let mut fields: HashMap<String, Arc<dyn Reducer>> = HashMap::new();
        fields.insert("messages".to_string(), Arc::new(AppendReducer));
        fields.insert("intermediate".to_string(), Arc::new(MergeReducer));
        fields.insert("metadata".to_string(), Arc::new(MergeReducer));
        fields.insert("output".to_string(), Arc::new(LastValueReducer));
        fields.insert("current_node".to_string(), Arc::new(LastValueReducer));
        fields.insert("error".to_string(), Arc::new(LastValueReducer));
        Self {
            fields,
            default_reducer: Arc::new(LastValueReducer),
        }
    }

    /// Base schema extended with the keys declared by a workflow's
    /// `state_schema`. Accepts either a JSON Schema object (keys read from
    /// `properties`) or a flat `{key: {"type": ...}}` map. Declared reserved
    /// keys keep their reserved reducers.
    pub fn from_declared(state_schema: Option<&Value>) -> Self {
        let mut schema = Self::workflow_base();

        let Some(declared) = state_schema else {
            return schema;
        };

        let props = declared
            .get("properties")
            .and_then(Value::as_object)
            .or_else(|| declared.as_object());

        if let Some(props) = props {
            for (key, spec) in props {
                if schema.fields.contains_key(key) || key == INPUT_KEY || key == "type" {
                    continue;
                }
                let reducer: Arc<dyn Reducer> =
                    match spec.get("type").and_then(Value::as_str) {
                        Some("array") => Arc::new(AppendReducer),
                        Some("object") => Arc::new(MergeReducer),
                        _ => Arc::new(LastValueReducer),
                    };
                schema.fields.insert(key.clone(), reducer);
            }
        }

        schema
    }

    /// The initial state for an execution: caller input plus empty
    /// accumulators, with the execution config stored under `metadata`.
    pub fn initial_state(input: Value, metadata: Value) -> Value {
        json!({
            "input": input,
            "messages": [],
            "intermediate": {},
            "metadata": if metadata.is_object() { metadata } else { json!({}) },
        })
    }

    pub fn add_field(&mut self, name: impl Into<String>, reducer: Arc<dyn Reducer>) {
        self.fields.insert(name.into(), reducer);
    }

    fn reducer_for(&self, key: &str) -> &dyn Reducer {
        self.fields
            .get(key)
            .map(|r| r.as_ref())
            .unwrap_or(self.default_reducer.as_ref())
    }

    /// Whether concurrent writes to this key from parallel branches merge
    /// deterministically.
    pub fn is_commutative(&self, key: &str) -> bool {
        matches!(self.reducer_for(key).name(), "append" | "merge")
    }

    /// Fold a node's partial update into `state` key by key.
    ///
    /// `input` is frozen: once set at execution start it cannot be
    /// overwritten by a node update.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let update_obj = match update {
            Value::Object(obj) => obj,
            Value::Null => return Ok(()),
            _ => {
                return Err(StateError::InvalidState(
                    "node update must be an object".to_string(),
                ))
            }
        };

        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        for (key, update_value) in update_obj {
            if key == INPUT_KEY && !state_obj.get(INPUT_KEY).map(Value::is_null).unwrap_or(true) {
                continue;
            }
            let current = state_obj.get(key).cloned().unwrap_or(Value::Null);
            let reduced = self
                .reducer_for(key)
                .reduce(&current, update_value)
                .map_err(|e| match e {
                    StateError::ReducerError { message, .. } => StateError::ReducerError {
                        key: key.clone(),
                        message,
                    },
                    other => other,
                })?;
            state_obj.insert(key.clone(), reduced);
        }

        Ok(())
    }

    /// Field names with an explicit reducer.
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// Render a state value as plain text the way it is fed to agents and joins:
/// strings stay raw, null becomes empty, everything else is compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
