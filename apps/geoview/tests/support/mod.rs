#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use url::Url;

/// One request the stub room server saw.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub room: String,
    pub task: String,
    pub body: Value,
}

#[derive(Clone, Default)]
struct StubState {
    replies: Arc<Mutex<HashMap<String, (StatusCode, Value)>>>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

/// Room server answering `POST /<room>/<task>` from a canned reply table.
/// Unknown tasks get a 404.
pub struct StubRoomServer {
    pub addr: SocketAddr,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubRoomServer {
    pub async fn start() -> Self {
        let state = StubState::default();
        let router = Router::new()
            .route("/:room/:task", post(handle_task))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener bind");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });
        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("base url")
    }

    pub fn reply(&self, task: &str, body: Value) {
        self.reply_with(task, StatusCode::OK, body);
    }

    pub fn reply_with(&self, task: &str, status: StatusCode, body: Value) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(task.to_string(), (status, body));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.seen.lock().unwrap().clone()
    }

    pub fn requests_for(&self, task: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.task == task)
            .collect()
    }
}

impl Drop for StubRoomServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_task(
    State(state): State<StubState>,
    Path((room, task)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen.lock().unwrap().push(Recorded {
        room,
        task: task.clone(),
        body,
    });
    match state.replies.lock().unwrap().get(&task) {
        Some((status, reply)) => (*status, Json(reply.clone())),
        None => (StatusCode::NOT_FOUND, Json(Value::Null)),
    }
}

/// Polls `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    check()
}
