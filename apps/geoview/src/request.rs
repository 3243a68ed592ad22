use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::events::{ClientEvent, EventSender};
use crate::session::SessionIdentity;

const SESSION_FIELD: &str = "sessionUUID";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no session assigned yet")]
    NoSession,
    #[error("request payload must be a json object or array")]
    InvalidPayload,
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("response to {task} is not the expected json: {source}")]
    Decode {
        task: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// Text shown to the user when the caller has nothing more specific.
    pub fn user_message(task: &str) -> String {
        format!("Error: {task}")
    }
}

/// Request/response calls bound to one room and session:
/// `POST <base>/<room>/<task>` with the session stamped into the body.
#[derive(Clone)]
pub struct RequestFacade {
    http: Client,
    base: Url,
    room: String,
    session: SessionIdentity,
    events: Option<EventSender>,
}

impl RequestFacade {
    pub fn new(base: Url, room: impl Into<String>, session: SessionIdentity) -> Self {
        Self {
            http: Client::new(),
            base,
            room: room.into(),
            session,
            events: None,
        }
    }

    /// Failures are also reported as `ClientEvent::RequestFailed`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn task_url(&self, task: &str) -> Result<Url, url::ParseError> {
        self.base.join(&format!("{}/{}", self.room, task))
    }

    /// Resolves with the raw response body on a 2xx status.
    pub async fn call(&self, task: &str, payload: Value) -> Result<String, RequestError> {
        let result = self.send(task, payload).await;
        if let Err(err) = &result {
            warn!(%task, error = %err, "request failed");
            if let Some(events) = &self.events {
                let _ = events.send(ClientEvent::RequestFailed {
                    task: task.to_string(),
                    message: RequestError::user_message(task),
                });
            }
        }
        result
    }

    pub async fn call_json<T: DeserializeOwned>(
        &self,
        task: &str,
        payload: Value,
    ) -> Result<T, RequestError> {
        let body = self.call(task, payload).await?;
        serde_json::from_str(&body).map_err(|source| RequestError::Decode {
            task: task.to_string(),
            source,
        })
    }

    async fn send(&self, task: &str, payload: Value) -> Result<String, RequestError> {
        let body = self.stamp(payload)?;
        let url = self.task_url(task)?;
        debug!(%url, "request");
        let res = self.http.post(url).json(&body).send().await?;

        if res.status().is_success() {
            Ok(res.text().await?)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(RequestError::UnexpectedStatus { status, body })
        }
    }

    fn stamp(&self, payload: Value) -> Result<Value, RequestError> {
        let mut body = match payload {
            Value::Object(body) => body,
            Value::Null => Map::new(),
            // Lists such as plugin selections go out as-is, there is no field to stamp
            list @ Value::Array(_) => return Ok(list),
            _ => return Err(RequestError::InvalidPayload),
        };
        let present = body
            .get(SESSION_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !present {
            let session_id = self.session.get().ok_or(RequestError::NoSession)?;
            body.insert(SESSION_FIELD.to_string(), Value::String(session_id));
        }
        Ok(Value::Object(body))
    }
}
