mod support;

use axum::http::StatusCode;
use geoview_client_core::events::{self, ClientEvent};
use geoview_client_core::plugin::PluginLoader;
use geoview_client_core::request::{RequestError, RequestFacade};
use geoview_client_core::session::SessionIdentity;
use geoview_proto::{MeshErrorInfo, PluginSelection};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use support::StubRoomServer;

fn assigned(id: &str) -> SessionIdentity {
    let session = SessionIdentity::new();
    session.assign(id).unwrap();
    session
}

#[tokio::test]
async fn posts_to_room_task_path_with_session_stamped() {
    let server = StubRoomServer::start().await;
    server.reply("undo", json!({"meshes": {}}));
    let requests = RequestFacade::new(server.base_url(), "bunny", assigned("s-1"));

    let body = requests.call("undo", json!({"steps": 1})).await.unwrap();
    assert_eq!(serde_json::from_str::<serde_json::Value>(&body).unwrap(), json!({"meshes": {}}));

    let seen = server.requests_for("undo");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].room, "bunny");
    assert_eq!(seen[0].body, json!({"steps": 1, "sessionUUID": "s-1"}));
}

#[tokio::test]
async fn explicit_session_is_kept() {
    let server = StubRoomServer::start().await;
    server.reply("redo", json!({}));
    let requests = RequestFacade::new(server.base_url(), "bunny", assigned("s-1"));

    requests
        .call("redo", json!({"sessionUUID": "other"}))
        .await
        .unwrap();
    assert_eq!(server.requests_for("redo")[0].body["sessionUUID"], "other");
}

#[tokio::test]
async fn non_success_status_is_an_error_and_an_event() {
    let server = StubRoomServer::start().await;
    server.reply_with("loadPolygonMesh", StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"}));
    let (tx, mut rx) = events::channel();
    let requests =
        RequestFacade::new(server.base_url(), "bunny", assigned("s-1")).with_events(tx);

    let err = requests
        .call("loadPolygonMesh", json!({}))
        .await
        .unwrap_err();
    match err {
        RequestError::UnexpectedStatus { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        rx.try_recv().unwrap(),
        ClientEvent::RequestFailed {
            task: "loadPolygonMesh".into(),
            message: "Error: loadPolygonMesh".into(),
        }
    );
}

#[tokio::test]
async fn call_without_session_never_reaches_server() {
    let server = StubRoomServer::start().await;
    let requests = RequestFacade::new(server.base_url(), "bunny", SessionIdentity::new());

    let err = requests.call("undo", json!({})).await.unwrap_err();
    assert!(matches!(err, RequestError::NoSession));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn plugin_selection_list_is_sent_unstamped() {
    let server = StubRoomServer::start().await;
    server.reply("updatePlugins", json!("ok"));
    let requests = RequestFacade::new(server.base_url(), "bunny", assigned("s-1"));

    let selections = vec![PluginSelection {
        name: "meshErrorInfo".into(),
        version: "1.2.0".into(),
    }];
    PluginLoader::request_update(&requests, &selections)
        .await
        .unwrap();
    assert_eq!(
        server.requests_for("updatePlugins")[0].body,
        json!([{"name": "meshErrorInfo", "version": "1.2.0"}])
    );
}

#[derive(Debug, Deserialize)]
struct ErrorInfoReply {
    meshes: HashMap<String, MeshErrorInfo>,
}

#[tokio::test]
async fn typed_responses_decode() {
    let server = StubRoomServer::start().await;
    server.reply(
        "meshErrorInfo",
        json!({"meshes": {"m1": {"closed": true, "edgeManifold": true, "vertexManifold": false}}}),
    );
    let requests = RequestFacade::new(server.base_url(), "bunny", assigned("s-1"));

    let reply: ErrorInfoReply = requests
        .call_json("meshErrorInfo", json!({"meshes": ["m1"]}))
        .await
        .unwrap();
    assert!(!reply.meshes["m1"].is_clean());

    let err = requests
        .call_json::<ErrorInfoReply>("missingTask", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::UnexpectedStatus { .. }));
}
