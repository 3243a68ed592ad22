use std::sync::Arc;

use geoview_proto::{PluginDescriptor, PluginSelection, tasks};
use serde_json::{Value, json};
use tracing::{error, info};

use super::source::{ModuleSource, ModuleSpec};
use super::{PluginContext, PluginError};
use crate::events::{ClientEvent, EventSender};
use crate::request::{RequestError, RequestFacade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInstalled,
    NoModule,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ModuleSpec>,
    pub skipped: Vec<(String, SkipReason)>,
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded.iter().map(|spec| spec.name.clone()).collect()
    }
}

pub struct PluginLoader {
    source: Arc<dyn ModuleSource>,
    events: Option<EventSender>,
}

impl PluginLoader {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            source,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Asks the server for the descriptor list, in the order it keeps it.
    pub async fn fetch_descriptors(
        requests: &RequestFacade,
    ) -> Result<Vec<PluginDescriptor>, PluginError> {
        let listing: Value = requests.call_json(tasks::LIST_PLUGINS, json!({})).await?;
        Ok(PluginDescriptor::list_from_value(listing)?)
    }

    /// Records version selections; the server applies them on its next boot.
    pub async fn request_update(
        requests: &RequestFacade,
        selections: &[PluginSelection],
    ) -> Result<String, RequestError> {
        let payload = serde_json::to_value(selections).map_err(|source| RequestError::Decode {
            task: tasks::UPDATE_PLUGINS.to_string(),
            source,
        })?;
        requests.call(tasks::UPDATE_PLUGINS, payload).await
    }

    /// Loads every installed, module-bearing plugin strictly in list order.
    /// Each `init` completes before the next import starts. A failing
    /// plugin is reported and the rest still load.
    pub async fn load_all(
        &self,
        descriptors: &[PluginDescriptor],
        ctx: &PluginContext,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        for descriptor in descriptors {
            if !descriptor.is_installed() {
                report
                    .skipped
                    .push((descriptor.name.clone(), SkipReason::NotInstalled));
                continue;
            }
            if !descriptor.has_module {
                report
                    .skipped
                    .push((descriptor.name.clone(), SkipReason::NoModule));
                continue;
            }
            match self.load_one(descriptor, ctx).await {
                Ok(spec) => {
                    info!(plugin = %spec.name, version = %spec.version, "plugin initialised");
                    report.loaded.push(spec);
                }
                Err(err) => {
                    error!(plugin = %descriptor.name, error = %err, "plugin failed to load");
                    if let Some(events) = &self.events {
                        let _ = events.send(ClientEvent::PluginFailed {
                            name: descriptor.name.clone(),
                            error: err.to_string(),
                        });
                    }
                    report.failed.push((descriptor.name.clone(), err.to_string()));
                }
            }
        }
        report
    }

    async fn load_one(
        &self,
        descriptor: &PluginDescriptor,
        ctx: &PluginContext,
    ) -> Result<ModuleSpec, PluginError> {
        let version = descriptor
            .resolved_version()
            .ok_or_else(|| PluginError::NoVersion {
                name: descriptor.name.clone(),
            })?;
        let spec = ModuleSpec::new(&descriptor.name, version);
        let module = self.source.import(&spec).await?;
        module
            .init(ctx)
            .await
            .map_err(|source| PluginError::Init {
                name: descriptor.name.clone(),
                source,
            })?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{TaskDispatcher, handler_fn};
    use crate::plugin::{MeshEntryHooks, PluginModule, StaticModuleSource};
    use crate::session::SessionIdentity;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use url::Url;

    struct Traced {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl PluginModule for Traced {
        async fn init(&self, ctx: &PluginContext) -> Result<()> {
            self.log.lock().push(format!("start {}", self.name));
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail {
                anyhow::bail!("init rejected");
            }
            ctx.register_task(self.name, handler_fn(|_| async { Ok(()) }));
            self.log.lock().push(format!("done {}", self.name));
            Ok(())
        }
    }

    fn context() -> PluginContext {
        PluginContext {
            dispatcher: TaskDispatcher::new(),
            requests: RequestFacade::new(
                Url::parse("http://127.0.0.1:1/").unwrap(),
                "room",
                SessionIdentity::new(),
            ),
            hooks: MeshEntryHooks::default(),
            mesh_delta: handler_fn(|_| async { Ok(()) }),
        }
    }

    fn installed(name: &str) -> PluginDescriptor {
        PluginDescriptor {
            name: name.into(),
            installed_version: "1.0.0".into(),
            has_module: true,
            ..Default::default()
        }
    }

    fn source(log: &Arc<Mutex<Vec<String>>>, failing: &[&'static str]) -> StaticModuleSource {
        let source = StaticModuleSource::new();
        for name in ["A", "B", "C"] {
            source.register(
                name,
                Arc::new(Traced {
                    name,
                    log: log.clone(),
                    fail: failing.contains(&name),
                }),
            );
        }
        source
    }

    #[tokio::test]
    async fn loads_sequentially_in_list_order_and_skips_uninstalled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loader = PluginLoader::new(Arc::new(source(&log, &[])));
        let ctx = context();
        let mut c = installed("C");
        c.installed_version = String::new();

        let report = loader
            .load_all(&[installed("A"), installed("B"), c], &ctx)
            .await;

        assert_eq!(
            log.lock().as_slice(),
            ["start A", "done A", "start B", "done B"]
        );
        assert_eq!(report.loaded_names(), ["A", "B"]);
        assert_eq!(report.skipped, [("C".to_string(), SkipReason::NotInstalled)]);
        assert!(ctx.dispatcher.has_handler("A") && ctx.dispatcher.has_handler("B"));
        assert!(!ctx.dispatcher.has_handler("C"));
    }

    #[tokio::test]
    async fn failing_plugin_is_isolated_and_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = crate::events::channel();
        let loader = PluginLoader::new(Arc::new(source(&log, &["A"]))).with_events(tx);

        let report = loader
            .load_all(&[installed("A"), installed("B")], &context())
            .await;

        assert_eq!(report.loaded_names(), ["B"]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(ClientEvent::PluginFailed { name, .. }) if name == "A"
        ));
    }

    #[tokio::test]
    async fn missing_module_and_moduleless_plugins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loader = PluginLoader::new(Arc::new(source(&log, &[])));
        let mut no_module = installed("A");
        no_module.has_module = false;

        let report = loader
            .load_all(&[no_module, installed("unknown")], &context())
            .await;
        assert_eq!(report.skipped, [("A".to_string(), SkipReason::NoModule)]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("plugin/unknown_1.0.0/module.js"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn latest_resolves_before_import() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let modules = StaticModuleSource::new();
        let pinned = ModuleSpec::new("A", "2.0.0");
        modules.register_version(
            &pinned,
            Arc::new(Traced {
                name: "A",
                log: log.clone(),
                fail: false,
            }),
        );
        let loader = PluginLoader::new(Arc::new(modules));
        let mut a = installed("A");
        a.installed_version = "latest".into();
        a.latest = Some("2.0.0".into());

        let report = loader.load_all(&[a], &context()).await;
        assert_eq!(report.loaded, [pinned]);
    }
}
