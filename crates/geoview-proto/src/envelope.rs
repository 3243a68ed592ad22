use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key older servers use in place of `task`.
const LEGACY_TASK_KEY: &str = "API";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("envelope is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("envelope is not a json object")]
    NotAnObject,
    #[error("envelope has no task field")]
    MissingTask,
    #[error("envelope task field is not a string")]
    TaskNotString,
}

/// Tagged message unit exchanged over the room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub task: String,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    Value::Object(Map::new())
}

impl Envelope {
    pub fn new(task: impl Into<String>, parameters: Value) -> Self {
        Self {
            task: task.into(),
            parameters,
        }
    }

    /// Parses an inbound text frame. Without a `parameters` field the
    /// remaining top-level fields become the payload, which is how relayed
    /// camera and cursor sync messages arrive.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let task = match object
            .remove("task")
            .or_else(|| object.remove(LEGACY_TASK_KEY))
        {
            Some(Value::String(task)) => task,
            Some(_) => return Err(ProtocolError::TaskNotString),
            None => return Err(ProtocolError::MissingTask),
        };
        let parameters = match object.remove("parameters") {
            Some(parameters) => parameters,
            None => Value::Object(object),
        };
        Ok(Self { task, parameters })
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Serializes `body` with `task` merged in at the top level, the shape used
/// for camera and cursor sync messages.
pub fn flat_message<T: Serialize>(task: &str, body: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(body)?;
    match value.as_object_mut() {
        Some(object) => {
            object.insert("task".to_string(), Value::String(task.to_string()));
        }
        None => {
            value = serde_json::json!({ "task": task, "parameters": value });
        }
    }
    serde_json::to_string(&value)
}

/// Parameters of `initializeSession`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAssignment {
    #[serde(rename = "sessionUUID")]
    pub session_id: String,
}

/// Parameters of `isServerBusy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBusy {
    #[serde(rename = "isBusy")]
    pub busy: bool,
}
