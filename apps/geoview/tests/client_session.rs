mod support;

use std::sync::Arc;
use std::time::Duration;

use geoview_client_core::client::{ClientError, ClientOptions, ViewerClient};
use geoview_client_core::events::{ClientEvent, EventReceiver};
use geoview_client_core::plugin::builtin::builtin_source;
use geoview_client_core::plugin::{BadgeTone, SkipReason};
use geoview_client_core::scene::mesh::encode::triangle_payload;
use geoview_client_core::session::SessionError;
use geoview_client_core::transport::MockTransport;
use geoview_client_core::sync::InteractiveControls;
use geoview_client_core::view::HeadlessView;
use geoview_client_core::view::recording::{RecordingView, ViewCall};
use glam::{Vec2, Vec3};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};

use support::{StubRoomServer, wait_until};

const SESSION: &str = "s-1";

fn triangle(name: &str) -> Value {
    serde_json::to_value(triangle_payload(name)).unwrap()
}

fn stub_room(server: &StubRoomServer) {
    server.reply(
        "listPlugins",
        json!({
            "meshErrorInfo": {"versions": ["1.0.0"], "installedVersion": "1.0.0", "hasModuleJS": true},
            "toggleMeshVisibility": {"versions": ["0.3.0"], "installedVersion": "0.3.0", "hasModuleJS": true},
            "exportMesh": {"versions": ["1.0.0"], "installedVersion": "", "hasModuleJS": true},
            "ghost": {"versions": ["0.1.0"], "installedVersion": "0.1.0", "hasModuleJS": true},
            "undo": {"versions": ["latest", "2.0.0"], "latest": "2.0.0", "installedVersion": "latest", "hasModuleJS": true}
        }),
    );
    server.reply(
        "pullCanvasParameters",
        json!({
            "controls": {"target": {"x": 1.0, "y": 0.0, "z": 0.0}},
            "camera": {
                "position": {"x": 1.0, "y": 0.0, "z": 20.0},
                "up": {"x": 0.0, "y": 1.0, "z": 0.0},
                "zoom": 2.0
            },
            "cursors": {"peer": {"dir": {"x": 4.0, "y": -2.0}, "idx": 3}}
        }),
    );
    server.reply("pullCurrentMeshes", json!({"meshes": {"m1": triangle("cube")}}));
    server.reply(
        "meshErrorInfo",
        json!({"meshes": {
            "m1": {"closed": true, "edgeManifold": true, "vertexManifold": true},
            "m2": {"closed": false, "edgeManifold": true, "vertexManifold": true}
        }}),
    );
}

fn options(server: &StubRoomServer) -> ClientOptions {
    ClientOptions {
        room: "bunny".into(),
        http_base: server.base_url(),
        session_timeout: Duration::from_secs(2),
        frame_interval: Duration::from_millis(5),
    }
}

struct Booted {
    client: ViewerClient,
    events: EventReceiver,
    transport: Arc<MockTransport>,
    view: Arc<Mutex<RecordingView>>,
    /// Everything emitted up to and including `Ready`.
    boot_events: Vec<ClientEvent>,
}

async fn boot(server: &StubRoomServer) -> Booted {
    stub_room(server);
    let transport = Arc::new(MockTransport::new());
    transport.push_inbound(json!({"task": "initializeSession", "parameters": {"sessionUUID": SESSION}}).to_string());
    let view = Arc::new(Mutex::new(RecordingView::default()));
    view.lock().set_cursor(Vec2::new(5.0, 5.0), 7);

    let (client, mut events) = ViewerClient::start(
        transport.clone(),
        view.clone(),
        Arc::new(builtin_source()),
        options(server),
    )
    .await
    .expect("client boots");

    let mut boot_events = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let ready = event == ClientEvent::Ready;
        boot_events.push(event);
        if ready {
            break;
        }
    }
    Booted {
        client,
        events,
        transport,
        view,
        boot_events,
    }
}

async fn next_event(events: &mut EventReceiver) -> ClientEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event within timeout")
        .expect("event channel open")
}

/// Skips events until one matches.
async fn expect_event(events: &mut EventReceiver, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

fn sent_tasks(transport: &MockTransport, task: &str) -> Vec<Value> {
    transport
        .sent_json()
        .into_iter()
        .filter(|msg| msg["task"] == task)
        .collect()
}

#[tokio::test]
async fn boot_joins_loads_plugins_and_pulls_room_state() {
    let server = StubRoomServer::start().await;
    let mut booted = boot(&server).await;
    let client = &booted.client;

    assert_eq!(booted.boot_events[0], ClientEvent::SessionAssigned(SESSION.into()));
    assert!(booted.boot_events.iter().any(|e| matches!(
        e,
        ClientEvent::PluginFailed { name, .. } if name == "ghost"
    )));
    assert!(booted.boot_events.contains(&ClientEvent::PluginsLoaded {
        loaded: vec![
            "meshErrorInfo".into(),
            "toggleMeshVisibility".into(),
            "undo".into()
        ],
    }));
    assert_eq!(client.session_id().as_deref(), Some(SESSION));
    assert!(
        client
            .plugins()
            .skipped
            .contains(&("exportMesh".to_string(), SkipReason::NotInstalled))
    );
    assert_eq!(client.plugins().loaded[2].version, "2.0.0");
    assert!(client.dispatcher().has_handler("undo"));
    assert!(client.dispatcher().has_handler("toggleMeshVisibility"));
    assert!(!client.dispatcher().has_handler("redo"));

    // Requests carry the session and go to the room path
    let listing = server.requests_for("listPlugins");
    assert_eq!(listing[0].room, "bunny");
    assert_eq!(listing[0].body["sessionUUID"], SESSION);

    // Pulled canvas parameters seed the baseline and remote cursors
    let baseline = client.sync().baseline().expect("seeded");
    assert_eq!(baseline.target, Vec3::X);
    assert_eq!(baseline.position, Vec3::new(1.0, 0.0, 20.0));
    assert_eq!(baseline.zoom, 2.0);
    assert_eq!(client.sync().remote_cursors().len(), 1);

    // Pulled meshes are in the scene and framed once
    assert_eq!(client.reconciler().uuids(), vec!["m1".to_string()]);
    {
        let view = booted.view.lock();
        assert_eq!(view.count(|c| matches!(c, ViewCall::Build { .. })), 2);
        assert_eq!(view.count(|c| *c == ViewCall::FitToFrame), 1);
    }

    let entry = match booted
        .boot_events
        .iter()
        .find(|e| matches!(e, ClientEvent::MeshEntryUpdated(_)))
        .cloned()
    {
        Some(event) => event,
        None => {
            expect_event(&mut booted.events, |e| {
                matches!(e, ClientEvent::MeshEntryUpdated(_))
            })
            .await
        }
    };
    let ClientEvent::MeshEntryUpdated(entry) = entry else {
        unreachable!()
    };
    assert_eq!(entry.uuid, "m1");
    assert_eq!(entry.name, "cube");
    assert_eq!(entry.badge.as_ref().map(|b| b.tone), Some(BadgeTone::Ok));
    assert_eq!(entry.controls.len(), 1);
    assert_eq!(entry.controls[0].task, "toggleMeshVisibility");

    booted.client.shutdown().await;
}

#[tokio::test]
async fn inbound_deltas_and_plugin_tasks_reach_the_scene() {
    let server = StubRoomServer::start().await;
    let mut booted = boot(&server).await;

    booted.transport.push_inbound(
        json!({"task": "syncMeshes", "parameters": {"meshes": {"m2": triangle("sphere")}}}).to_string(),
    );
    let event = expect_event(&mut booted.events, |e| {
        matches!(e, ClientEvent::MeshEntryUpdated(entry) if entry.uuid == "m2")
    })
    .await;
    let ClientEvent::MeshEntryUpdated(entry) = event else {
        unreachable!()
    };
    assert_eq!(entry.badge.map(|b| b.tone), Some(BadgeTone::Warning));

    // `undo` is registered by a plugin and feeds the same reconciler
    booted.transport.push_inbound(
        json!({"task": "undo", "parameters": {"meshes": {"m1": {"remove": true}}}}).to_string(),
    );
    expect_event(&mut booted.events, |e| {
        *e == ClientEvent::MeshEntryRemoved { uuid: "m1".into() }
    })
    .await;
    assert_eq!(booted.client.reconciler().uuids(), vec!["m2".to_string()]);

    // Unknown tasks are dropped without disturbing later ones
    booted
        .transport
        .push_inbound(json!({"task": "exportMesh", "parameters": {}}).to_string());
    booted
        .transport
        .push_inbound(json!({"task": "isServerBusy", "parameters": {"isBusy": true}}).to_string());
    expect_event(&mut booted.events, |e| *e == ClientEvent::ServerBusy(true)).await;

    booted.client.shutdown().await;
}

#[tokio::test]
async fn local_camera_changes_are_broadcast_and_remote_ones_are_not_echoed() {
    let server = StubRoomServer::start().await;
    let booted = boot(&server).await;
    let transport = booted.transport.clone();

    // Cursor was set before boot, so the first tick carries nothing
    sleep(Duration::from_millis(30)).await;
    assert!(sent_tasks(&transport, "syncParams").is_empty());
    assert!(sent_tasks(&transport, "syncCursor").is_empty());

    booted.view.lock().orbit(Vec3::new(0.0, 3.0, 0.0));
    assert!(
        wait_until(Duration::from_secs(2), || !sent_tasks(&transport, "syncParams").is_empty()).await
    );
    let params = sent_tasks(&transport, "syncParams");
    assert_eq!(params.len(), 1);
    assert_eq!(params[0]["sessionId"], SESSION);
    assert_eq!(params[0]["pos"], json!({"x": 1.0, "y": 3.0, "z": 20.0}));
    assert!(params[0].get("zoom").is_none());
    assert!(params[0].get("target").is_none());

    booted.view.lock().set_cursor(Vec2::new(-1.0, 2.0), 7);
    assert!(
        wait_until(Duration::from_secs(2), || !sent_tasks(&transport, "syncCursor").is_empty()).await
    );
    let cursor = &sent_tasks(&transport, "syncCursor")[0];
    assert_eq!(cursor["UUID"], SESSION);
    assert_eq!(cursor["cursor"], json!({"dir": {"x": -1.0, "y": 2.0}, "idx": 7}));

    transport.take_sent();
    transport.push_inbound(
        json!({"task": "syncParams", "sessionId": "peer", "timestamp": 1, "zoom": 5.0}).to_string(),
    );
    let view = booted.view.clone();
    assert!(
        wait_until(Duration::from_secs(2), || view.lock().camera().zoom == 5.0).await
    );
    sleep(Duration::from_millis(30)).await;
    assert!(sent_tasks(&transport, "syncParams").is_empty());

    booted.client.shutdown().await;
}

#[tokio::test]
async fn joining_a_populated_room_sends_no_camera_change() {
    let server = StubRoomServer::start().await;
    stub_room(&server);
    let transport = Arc::new(MockTransport::new());
    transport.push_inbound(json!({"task": "initializeSession", "parameters": {"sessionUUID": SESSION}}).to_string());
    let view = Arc::new(Mutex::new(HeadlessView::new(800, 600)));

    let (client, mut events) = ViewerClient::start(
        transport.clone(),
        view.clone(),
        Arc::new(builtin_source()),
        options(&server),
    )
    .await
    .expect("client boots");
    expect_event(&mut events, |e| *e == ClientEvent::Ready).await;
    assert_eq!(client.reconciler().uuids(), vec!["m1".to_string()]);

    // Framing the pulled mesh is overridden by the room's camera
    let camera = view.lock().camera();
    assert_eq!(camera.target, Vec3::X);
    assert_eq!(camera.position, Vec3::new(1.0, 0.0, 20.0));
    assert_eq!(camera.zoom, 2.0);

    sleep(Duration::from_millis(50)).await;
    assert!(sent_tasks(&transport, "syncParams").is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_removes_cursor_and_suppresses_disconnect() {
    let server = StubRoomServer::start().await;
    let mut booted = boot(&server).await;
    let transport = booted.transport.clone();
    let view = booted.view.clone();

    booted.client.shutdown().await;

    let removal = sent_tasks(&transport, "syncCursor")
        .pop()
        .expect("cursor removal sent");
    assert_eq!(removal["UUID"], SESSION);
    assert_eq!(removal["remove"], true);
    assert!(transport.was_closed_gracefully());
    assert!(view.lock().live_handles().is_empty());

    while let Ok(Some(event)) = timeout(Duration::from_millis(50), booted.events.recv()).await {
        assert!(!matches!(event, ClientEvent::Disconnected { .. }));
    }
}

#[tokio::test]
async fn lost_connection_is_reported_once() {
    let server = StubRoomServer::start().await;
    let mut booted = boot(&server).await;

    booted.transport.simulate_disconnect("server gone");
    expect_event(&mut booted.events, |e| {
        *e == ClientEvent::Disconnected {
            reason: "server gone".into(),
        }
    })
    .await;
    assert!(!booted.client.is_connected());

    booted.client.shutdown().await;
}

#[tokio::test]
async fn boot_fails_when_no_session_is_assigned() {
    let server = StubRoomServer::start().await;
    stub_room(&server);
    let transport = Arc::new(MockTransport::new());
    let view = Arc::new(Mutex::new(RecordingView::default()));
    let mut opts = options(&server);
    opts.session_timeout = Duration::from_millis(100);

    let result = ViewerClient::start(transport, view, Arc::new(builtin_source()), opts).await;
    match result {
        Err(ClientError::Session(SessionError::Timeout(_))) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("boot should not succeed without a session"),
    }
    assert!(server.requests().is_empty());
}
