pub mod client;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod plugin;
pub mod request;
pub mod scene;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod transport;
pub mod view;

pub use client::{ClientError, ClientOptions, ViewerClient};
pub use config::Config;
pub use events::ClientEvent;
