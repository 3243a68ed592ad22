use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session already assigned as {current}, refusing {offered}")]
    AlreadyAssigned { current: String, offered: String },
    #[error("session identifier is empty")]
    Empty,
    #[error("no session assigned within {0:?}")]
    Timeout(Duration),
}

/// Identifier the server assigns to this connection.
///
/// Assigned once; every clone observes the same value.
#[derive(Clone)]
pub struct SessionIdentity {
    tx: watch::Sender<Option<String>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Records the server-assigned id. Repeating the same id is accepted.
    pub fn assign(&self, session_id: &str) -> Result<(), SessionError> {
        if session_id.is_empty() {
            return Err(SessionError::Empty);
        }
        let mut outcome = Ok(());
        self.tx.send_if_modified(|slot| match slot {
            Some(current) if current == session_id => false,
            Some(current) => {
                outcome = Err(SessionError::AlreadyAssigned {
                    current: current.clone(),
                    offered: session_id.to_string(),
                });
                false
            }
            None => {
                *slot = Some(session_id.to_string());
                true
            }
        });
        match &outcome {
            Ok(()) => debug!(session_id, "session identity assigned"),
            Err(err) => warn!(error = %err, "ignoring session reassignment"),
        }
        outcome
    }

    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_assigned(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolves once an id is assigned.
    pub async fn wait(&self, timeout: Duration) -> Result<String, SessionError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|id| id.clone())
        })
        .await;
        match waited {
            Ok(Some(id)) => Ok(id),
            _ => Err(SessionError::Timeout(timeout)),
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_once() {
        let session = SessionIdentity::new();
        assert_eq!(session.get(), None);
        session.assign("abc").unwrap();
        session.assign("abc").unwrap();
        assert_eq!(
            session.assign("xyz"),
            Err(SessionError::AlreadyAssigned {
                current: "abc".into(),
                offered: "xyz".into()
            })
        );
        assert_eq!(session.get().as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_empty_identifier() {
        let session = SessionIdentity::new();
        assert_eq!(session.assign(""), Err(SessionError::Empty));
        assert!(!session.is_assigned());
    }

    #[tokio::test]
    async fn wait_resolves_after_assignment() {
        let session = SessionIdentity::new();
        let clone = session.clone();
        let waiter = tokio::spawn(async move { clone.wait(Duration::from_secs(1)).await });
        tokio::task::yield_now().await;
        session.assign("late").unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), "late");
    }

    #[tokio::test]
    async fn wait_times_out_without_assignment() {
        let session = SessionIdentity::new();
        let err = session.wait(Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err, SessionError::Timeout(Duration::from_millis(20)));
    }
}
