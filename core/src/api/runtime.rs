//! Process wiring
//!
//! [`Interceptor`] owns one instance of every component and connects them:
//! settings load into the state store, host events flow into the engine and
//! session manager, and UI messages go through the [`MessageHandler`].

use crate::api::handler::MessageHandler;
use crate::host::protocol::REQUEST_PAUSED;
use crate::host::{DebuggerHost, HostEvent, PROTOCOL_VERSION};
use crate::intercept::{EventBroadcaster, InterceptionEngine, SessionManager};
use crate::models::BackgroundMessage;
use crate::state::StateStore;
use crate::storage::{SettingsStore, SqliteSettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Directory for the settings database and release-build logs
    pub storage_path: PathBuf,
    /// Debugging protocol version requested on attach
    pub protocol_version: String,
    /// Sender id accepted by [`MessageHandler::handle_raw`]
    pub extension_id: String,
    /// Buffer of the outbound broadcast channel
    pub event_capacity: usize,
    /// Buffer of the host event channel from [`Interceptor::host_channel`]
    pub host_event_capacity: usize,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            extension_id: "netsnare".to_string(),
            event_capacity: 128,
            host_event_capacity: 256,
        }
    }
}

impl InterceptorConfig {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    pub fn with_extension_id(mut self, id: impl Into<String>) -> Self {
        self.extension_id = id.into();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_host_event_capacity(mut self, capacity: usize) -> Self {
        self.host_event_capacity = capacity;
        self
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("netsnare"))
        .unwrap_or_else(|| PathBuf::from("./netsnare_data"))
}

/// Install the global tracing subscriber (call once at startup).
///
/// Debug builds log to stderr. Release builds log to a daily file under
/// `<storage_path>/logs`. A subscriber installed earlier is left in place.
#[allow(unused_variables)]
pub fn init_logging(storage_path: &Path) -> anyhow::Result<()> {
    let level = resolve_log_level();

    #[cfg(debug_assertions)]
    {
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    }

    #[cfg(not(debug_assertions))]
    {
        use anyhow::Context;
        use once_cell::sync::OnceCell;
        use tracing_appender::non_blocking::WorkerGuard;

        static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

        let log_dir = storage_path.join("logs");
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "netsnare_core");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Only the first writer's guard is kept; a second init keeps logging
        // through the first subscriber
        if LOG_GUARD.set(guard).is_ok() {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(non_blocking)
                .try_init();
        }
    }

    tracing::info!("NetSnare core initialized v{}", crate::VERSION);
    Ok(())
}

fn resolve_log_level() -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;

    match std::env::var("RUST_LOG") {
        Ok(val) => match val.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        },
        Err(_) => LevelFilter::INFO,
    }
}

pub struct Interceptor {
    config: InterceptorConfig,
    state: Arc<StateStore>,
    settings: Arc<dyn SettingsStore>,
    sessions: Arc<SessionManager>,
    engine: Arc<InterceptionEngine>,
    events: EventBroadcaster,
    handler: Arc<MessageHandler>,
}

impl Interceptor {
    pub fn new(
        config: InterceptorConfig,
        host: Arc<dyn DebuggerHost>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let state = Arc::new(StateStore::new());
        let events = EventBroadcaster::new(config.event_capacity);
        let sessions = Arc::new(
            SessionManager::new(Arc::clone(&host), Arc::clone(&state))
                .with_protocol_version(config.protocol_version.clone()),
        );
        let engine = Arc::new(InterceptionEngine::new(
            host,
            Arc::clone(&state),
            events.clone(),
        ));
        let handler = Arc::new(MessageHandler::new(
            config.extension_id.clone(),
            Arc::clone(&state),
            Arc::clone(&settings),
            Arc::clone(&sessions),
            Arc::clone(&engine),
            events.clone(),
        ));

        Self {
            config,
            state,
            settings,
            sessions,
            engine,
            events,
            handler,
        }
    }

    /// Interceptor persisting settings in SQLite under the configured storage path
    pub fn open(config: InterceptorConfig, host: Arc<dyn DebuggerHost>) -> anyhow::Result<Self> {
        let settings = SqliteSettingsStore::new(&config.storage_path)?;
        tracing::info!("Settings database at {}", settings.db_path().display());
        Ok(Self::new(config, host, Arc::new(settings)))
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn handler(&self) -> Arc<MessageHandler> {
        Arc::clone(&self.handler)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundMessage> {
        self.events.subscribe()
    }

    /// Channel sized for host events; hand the sender to the host adapter
    pub fn host_channel(&self) -> (mpsc::Sender<HostEvent>, mpsc::Receiver<HostEvent>) {
        mpsc::channel(self.config.host_event_capacity.max(1))
    }

    /// Load settings in the background and start consuming host events.
    ///
    /// The returned task ends once every host event sender is dropped.
    pub fn start(&self, mut host_events: mpsc::Receiver<HostEvent>) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let settings = Arc::clone(&self.settings);
        tokio::spawn(async move {
            state.init(settings.as_ref()).await;
        });

        let state = Arc::clone(&self.state);
        let sessions = Arc::clone(&self.sessions);
        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();

        tokio::spawn(async move {
            while let Some(event) = host_events.recv().await {
                match event {
                    HostEvent::Protocol {
                        tab_id,
                        method,
                        params,
                    } => {
                        if method != REQUEST_PAUSED {
                            tracing::trace!("Ignoring {} from tab {}", method, tab_id);
                            continue;
                        }
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            engine.on_request_paused(tab_id, params).await;
                        });
                    }
                    HostEvent::Detached { tab_id } => {
                        if sessions.handle_host_detached(tab_id) {
                            events.state_updated(state.get());
                        }
                    }
                    HostEvent::TabRemoved { tab_id } => {
                        if sessions.handle_tab_removed(tab_id) {
                            events.state_updated(state.get());
                        }
                    }
                }
            }
            tracing::info!("Host event stream closed");
        })
    }
}
