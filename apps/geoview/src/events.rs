use tokio::sync::mpsc;

use crate::plugin::hooks::MeshEntryUi;

/// Things the embedding UI reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    SessionAssigned(String),
    ServerBusy(bool),
    ReloadRequested,
    /// The room channel closed without the client asking for it. Terminal.
    Disconnected { reason: String },
    /// A request failed; `message` is safe to show to the user.
    RequestFailed { task: String, message: String },
    PluginFailed { name: String, error: String },
    PluginsLoaded { loaded: Vec<String> },
    MeshEntryUpdated(MeshEntryUi),
    MeshEntryRemoved { uuid: String },
    Ready,
}

pub type EventSender = mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
