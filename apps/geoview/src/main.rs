use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use geoview_client_core::client::{ClientOptions, ViewerClient};
use geoview_client_core::config::Config;
use geoview_client_core::events::ClientEvent;
use geoview_client_core::plugin::builtin::builtin_source;
use geoview_client_core::telemetry::init_tracing;
use geoview_client_core::transport::{WebSocketConfig, WebSocketTransport};
use geoview_client_core::view::HeadlessView;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "geoview", about = "Headless client for a collaborative geometry room")]
struct Cli {
    /// Room server, `host:port` or an `http(s)://` origin
    #[arg(long, env = "GEOVIEW_SERVER")]
    server: Option<String>,

    #[arg(long, env = "GEOVIEW_ROOM")]
    room: Option<String>,

    /// Tracing filter, e.g. `info,geoview=trace`
    #[arg(long, env = "RUST_LOG")]
    log: Option<String>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(server) = cli.server.as_deref() {
        config = config.with_server(server);
    }
    if let Some(room) = cli.room {
        config.room = room;
    }
    if let Some(filter) = cli.log {
        config.log_filter = filter;
    }
    init_tracing(&config.log_filter);

    let ws_config = WebSocketConfig::from_config(&config).context("invalid room url")?;
    info!(url = %ws_config.url, "connecting");
    let transport = Arc::new(
        WebSocketTransport::connect(ws_config)
            .await
            .context("room channel unavailable")?,
    );

    let mut view = HeadlessView::new(cli.width, cli.height);
    let icon = rand::thread_rng().gen_range(0..10);
    view.pointer_moved(cli.width as f32 / 2.0, cli.height as f32 / 2.0, icon);
    let view = Arc::new(Mutex::new(view));

    let options = ClientOptions::from_config(&config)?;
    let (client, mut events) = ViewerClient::start(
        transport,
        view,
        Arc::new(builtin_source()),
        options,
    )
    .await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, leaving room");
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::Disconnected { reason }) => {
                    error!(%reason, "disconnected from room");
                    break;
                }
                Some(ClientEvent::ReloadRequested) => {
                    warn!("server requested a reload, restart the client");
                    break;
                }
                Some(ClientEvent::RequestFailed { task, message }) => {
                    warn!(%task, "{message}");
                }
                Some(ClientEvent::MeshEntryUpdated(entry)) => {
                    info!(
                        uuid = %entry.uuid,
                        name = %entry.name,
                        vertices = entry.vertex_count,
                        faces = entry.face_count,
                        "mesh entry"
                    );
                }
                Some(event) => info!(?event, "client event"),
                None => break,
            }
        }
    }

    client.shutdown().await;
    info!("left room");
    Ok(())
}
