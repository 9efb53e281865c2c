// ── Hub ──
//
// Lifecycle for one router: the call-monitor pipeline, the device
// poller, and the session they share. Consumers hold a cheap clone and
// observe everything through channels.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fritzmon_api::{AhaClient, ConnectionState, MonitorHandle};

use crate::calls::tracker::is_active_number;
use crate::calls::{CallListener, CallTracker, EmptyPhonebook, EventEmitter, Phonebook, run_pipeline};
use crate::config::HubConfig;
use crate::error::CoreError;
use crate::model::{CallNotification, CallSession, DeviceKind, DeviceSnapshot, DeviceState, unique_id};
use crate::poller::{DevicePoller, PollReport, poll_task};
use crate::router::RouterApi;
use crate::session::{CredentialStore, MemoryCredentialStore, RouterSession};
use crate::store::DeviceTable;
use crate::stream::DeviceStream;

const EVENT_CHANNEL_SIZE: usize = 64;
const CALL_CHANNEL_SIZE: usize = 256;

// ── HubEvent ─────────────────────────────────────────────────────────

/// Lifecycle notifications, separate from call events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// First successful device refresh after (re)authentication.
    RouterAvailable,
    /// The session is gone; new credentials must be registered.
    AuthRequired,
    /// A poll cycle published.
    DevicesRefreshed { devices: usize, failures: usize },
    /// The call-monitor connection changed state.
    CallMonitor(ConnectionState),
}

// ── Builder ──────────────────────────────────────────────────────────

/// Collaborators for a [`Hub`]. Everything has a default.
pub struct HubBuilder {
    config: HubConfig,
    router: Option<Arc<dyn RouterApi>>,
    phonebook: Arc<dyn Phonebook>,
    credential_store: Arc<dyn CredentialStore>,
    listeners: Vec<Arc<dyn CallListener>>,
}

impl HubBuilder {
    /// Use `api` instead of an HTTP client built from the config.
    #[must_use]
    pub fn router_api(mut self, api: Arc<dyn RouterApi>) -> Self {
        self.router = Some(api);
        self
    }

    #[must_use]
    pub fn phonebook(mut self, phonebook: Arc<dyn Phonebook>) -> Self {
        self.phonebook = phonebook;
        self
    }

    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = store;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn CallListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Hub {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (call_tx, _) = broadcast::channel(CALL_CHANNEL_SIZE);
        let (active_call, _) = watch::channel(None);
        let (monitor_state, _) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Hub {
            inner: Arc::new(HubInner {
                config: Mutex::new(self.config),
                router_override: self.router,
                phonebook: self.phonebook,
                credential_store: self.credential_store,
                listeners: self.listeners,
                table: Arc::new(DeviceTable::new()),
                event_tx,
                call_tx,
                active_call,
                monitor_state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                poller: Mutex::new(None),
                monitor: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
            }),
        }
    }
}

// ── Hub ──────────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable. [`start()`](Self::start) spawns the background
/// tasks, [`shutdown()`](Self::shutdown) tears them down exactly once.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: Mutex<HubConfig>,
    router_override: Option<Arc<dyn RouterApi>>,
    phonebook: Arc<dyn Phonebook>,
    credential_store: Arc<dyn CredentialStore>,
    listeners: Vec<Arc<dyn CallListener>>,
    table: Arc<DeviceTable>,
    event_tx: broadcast::Sender<HubEvent>,
    call_tx: broadcast::Sender<Arc<CallNotification>>,
    /// Survives pipeline restarts so `is_call_active` always has an answer.
    active_call: watch::Sender<Option<CallSession>>,
    monitor_state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    /// Cancelled on stop, replaced on start.
    cancel_child: Mutex<CancellationToken>,
    /// Built lazily from the config; dropped on stop so a reconfigure
    /// gets a fresh client and session.
    poller: Mutex<Option<Arc<DevicePoller>>>,
    monitor: Mutex<Option<MonitorHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    shut_down: AtomicBool,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: HubConfig) -> HubBuilder {
        HubBuilder {
            config,
            router: None,
            phonebook: Arc::new(EmptyPhonebook),
            credential_store: Arc::new(MemoryCredentialStore::new()),
            listeners: Vec::new(),
        }
    }

    pub async fn config(&self) -> HubConfig {
        self.inner.config.lock().await.clone()
    }

    pub fn table(&self) -> &Arc<DeviceTable> {
        &self.inner.table
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the call monitor and the device poller.
    ///
    /// A router that cannot be reached or rejects the credentials does
    /// not fail the start: the call monitor keeps running and
    /// `HubEvent::AuthRequired` tells the caller to [`register`](Self::register).
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("hub has been shut down".into()));
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("hub already running");
            return Ok(());
        }

        let config = self.config().await;
        let poller = if config.device_polling_enabled {
            match self.poller().await {
                Ok(poller) => Some(poller),
                Err(e) => {
                    self.inner.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        if config.call_monitor_enabled {
            self.spawn_call_monitor(&config, &child).await;
        }

        if let Some(poller) = poller {
            match self.connect_router().await {
                Ok(report) => info!(
                    devices = report.listed,
                    failed = report.failures.len(),
                    "initial device refresh complete"
                ),
                Err(e) if e.is_auth() => {
                    warn!(error = %e, "router login failed, waiting for registration");
                }
                Err(e) => warn!(error = %e, "router not reachable"),
            }

            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(poll_task(poller, config.poll_interval, child.clone())));
        }

        info!("hub started");
        Ok(())
    }

    async fn spawn_call_monitor(&self, config: &HubConfig, cancel: &CancellationToken) {
        let (monitor, events) = MonitorHandle::spawn(config.monitor(), cancel.clone());

        let tracker = CallTracker::with_channel(self.inner.active_call.clone());
        let mut emitter = EventEmitter::with_sender(
            Arc::clone(&self.inner.phonebook),
            config.unknown_caller_label.clone(),
            self.inner.call_tx.clone(),
        );
        for listener in &self.inner.listeners {
            emitter.add_listener(Arc::clone(listener));
        }

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(run_pipeline(events, tracker, emitter, cancel.clone())));
        handles.push(tokio::spawn(forward_monitor_state(
            monitor.state_changes(),
            self.inner.monitor_state.clone(),
            self.inner.event_tx.clone(),
            cancel.clone(),
        )));
        *self.inner.monitor.lock().await = Some(monitor);
    }

    /// Cancel the background tasks and close the call-monitor socket.
    /// The hub can be started again afterwards.
    async fn stop(&self) {
        self.inner.cancel_child.lock().await.cancel();

        if let Some(monitor) = self.inner.monitor.lock().await.take() {
            monitor.shutdown().await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        if let Some(poller) = self.inner.poller.lock().await.take() {
            poller.session().logout().await;
        }

        self.inner.active_call.send_replace(None);
        self.inner.monitor_state.send_replace(ConnectionState::Disconnected);
        self.inner.running.store(false, Ordering::SeqCst);
        debug!("hub stopped");
    }

    /// Stop everything for good. Only the first call does anything.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            debug!("shutdown already requested");
            return;
        }
        info!("shutting down");
        self.stop().await;
        self.inner.cancel.cancel();
    }

    /// Replace the configuration: stop, swap, and start again if the hub
    /// was running.
    pub async fn reconfigure(&self, config: HubConfig) -> Result<(), CoreError> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("hub has been shut down".into()));
        }
        let was_running = self.inner.running.load(Ordering::SeqCst);
        self.stop().await;
        *self.inner.config.lock().await = config;
        info!("configuration replaced");
        if was_running {
            self.start().await
        } else {
            Ok(())
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    // ── Router ───────────────────────────────────────────────────────

    async fn poller(&self) -> Result<Arc<DevicePoller>, CoreError> {
        let mut slot = self.inner.poller.lock().await;
        if let Some(poller) = slot.as_ref() {
            return Ok(Arc::clone(poller));
        }

        let config = self.config().await;
        let api: Arc<dyn RouterApi> = match &self.inner.router_override {
            Some(api) => Arc::clone(api),
            None => Arc::new(AhaClient::new(config.url.clone(), &config.transport())?),
        };
        let session = Arc::new(RouterSession::new(
            api,
            Arc::clone(&self.inner.credential_store),
            self.inner.event_tx.clone(),
        ));
        let poller = Arc::new(DevicePoller::new(
            session,
            Arc::clone(&self.inner.table),
            self.inner.event_tx.clone(),
            config.device_fetch_timeout,
        ));
        *slot = Some(Arc::clone(&poller));
        Ok(poller)
    }

    /// Authenticate with the configured (or stored) credentials, confirm
    /// the session once, and run the first refresh.
    pub async fn connect_router(&self) -> Result<PollReport, CoreError> {
        let poller = self.poller().await?;
        let credentials = self.inner.config.lock().await.credentials.clone();
        poller.reset_availability();
        poller.session().initialize(credentials).await?;
        poller.poll_once().await
    }

    /// Store new credentials, log in with them, and refresh.
    pub async fn register(
        &self,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<PollReport, CoreError> {
        let poller = self.poller().await?;
        poller.reset_availability();
        poller.session().register(username, password).await?;
        poller.poll_once().await
    }

    /// Run one poll cycle now.
    pub async fn poll_now(&self) -> Result<PollReport, CoreError> {
        self.poller().await?.poll_once().await
    }

    pub async fn is_authenticated(&self) -> bool {
        match self.inner.poller.lock().await.as_ref() {
            Some(poller) => poller.session().is_authenticated(),
            None => false,
        }
    }

    /// Switch a socket and record the state the router reports back.
    pub async fn set_switch(&self, id: &str, on: bool) -> Result<bool, CoreError> {
        let key = unique_id(id);
        let device = self
            .inner
            .table
            .get(&key)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: key.clone(),
            })?;
        if device.kind != DeviceKind::Socket {
            return Err(CoreError::DeviceUnavailable {
                identifier: key,
                reason: format!("{} cannot be switched", device.kind),
            });
        }
        if !device.present {
            return Err(CoreError::DeviceUnavailable {
                identifier: key,
                reason: "device is not present".into(),
            });
        }

        let poller = self.poller().await?;
        let session = poller.session();
        let sid = session.token()?;
        let state = session.observe(session.api().set_switch(&sid, &device.id, on).await)?;
        info!(ain = %key, on = state, "socket switched");

        let mut updated = DeviceSnapshot::clone(&device);
        if let Some(DeviceState::Socket(socket)) = updated.state.as_mut() {
            socket.onoff = state;
        }
        updated.updated_at = Utc::now();
        self.inner.table.upsert(updated);
        self.inner.table.publish();
        Ok(state)
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Is a call with remote number `number` in flight?
    pub fn is_call_active(&self, number: &str) -> bool {
        is_active_number(self.inner.active_call.borrow().as_ref(), number)
    }

    pub fn active_call(&self) -> Option<CallSession> {
        self.inner.active_call.borrow().clone()
    }

    pub fn devices(&self) -> DeviceStream {
        DeviceStream::new(self.inner.table.subscribe())
    }

    pub fn device(&self, id: &str) -> Option<Arc<DeviceSnapshot>> {
        self.inner.table.get(&unique_id(id))
    }

    pub fn subscribe_calls(&self) -> broadcast::Receiver<Arc<CallNotification>> {
        self.inner.call_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn monitor_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.monitor_state.subscribe()
    }
}

/// Mirror the supervisor's state into the hub until cancelled.
async fn forward_monitor_state(
    mut source: watch::Receiver<ConnectionState>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<HubEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = source.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *source.borrow_and_update();
                state.send_replace(current);
                let _ = events.send(HubEvent::CallMonitor(current));
            }
        }
    }
}

// ── Signals ──────────────────────────────────────────────────────────

/// Wait for a termination signal, then shut `hub` down.
pub async fn shutdown_on_signal(hub: Hub) -> Result<(), CoreError> {
    wait_for_signal().await?;
    info!("termination signal received");
    hub.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<(), CoreError> {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind: SignalKind| {
        signal(kind).map_err(|e| CoreError::Internal(format!("cannot install signal handler: {e}")))
    };
    let mut interrupt = install(SignalKind::interrupt())?;
    let mut terminate = install(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => debug!("SIGINT"),
        _ = terminate.recv() => debug!("SIGTERM"),
    }
    Ok(())
}

#[cfg(windows)]
async fn wait_for_signal() -> Result<(), CoreError> {
    use tokio::signal::windows::{ctrl_break, ctrl_c};

    let install_err = |e: std::io::Error| CoreError::Internal(format!("cannot install signal handler: {e}"));
    let mut interrupt = ctrl_c().map_err(install_err)?;
    let mut brk = ctrl_break().map_err(install_err)?;

    tokio::select! {
        _ = interrupt.recv() => debug!("ctrl-c"),
        _ = brk.recv() => debug!("ctrl-break"),
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
async fn wait_for_signal() -> Result<(), CoreError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CoreError::Internal(format!("cannot install signal handler: {e}")))
}
