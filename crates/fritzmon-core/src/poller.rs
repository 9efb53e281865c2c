// ── Device poller / reconciler ──
//
// One cycle: fetch the socket and thermostat listings, fan out one detail
// fetch per device, reconcile each into the table, join, publish once.
// A listing failure aborts the cycle before anything is written.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fritzmon_api::SessionId;

use crate::convert;
use crate::error::CoreError;
use crate::hub::HubEvent;
use crate::model::{DeviceKind, unique_id};
use crate::session::RouterSession;
use crate::store::DeviceTable;

/// One device that could not be refreshed this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    pub unique_id: String,
    pub reason: String,
}

/// Outcome of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Devices named by the listings (after de-duplication).
    pub listed: usize,
    /// Devices whose entry was rewritten.
    pub refreshed: usize,
    pub failures: Vec<DeviceFailure>,
}

/// Polls the router and keeps the [`DeviceTable`] current.
pub struct DevicePoller {
    session: Arc<RouterSession>,
    table: Arc<DeviceTable>,
    events: broadcast::Sender<HubEvent>,
    fetch_timeout: Duration,
    available: AtomicBool,
}

impl DevicePoller {
    pub fn new(
        session: Arc<RouterSession>,
        table: Arc<DeviceTable>,
        events: broadcast::Sender<HubEvent>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            session,
            table,
            events,
            fetch_timeout,
            available: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<RouterSession> {
        &self.session
    }

    pub fn table(&self) -> &Arc<DeviceTable> {
        &self.table
    }

    /// Announce `RouterAvailable` again after the next successful cycle.
    pub fn reset_availability(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    /// Run one full cycle.
    pub async fn poll_once(&self) -> Result<PollReport, CoreError> {
        let sid = self.session.token()?;
        let listed = self.fetch_listing(&sid).await?;

        let fetches = listed
            .iter()
            .map(|(raw_id, kind)| self.refresh_device(&sid, raw_id, *kind));
        let results = join_all(fetches).await;

        let mut report = PollReport {
            listed: listed.len(),
            ..PollReport::default()
        };
        for result in results {
            match result {
                Ok(()) => report.refreshed += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        self.table.publish();
        debug!(
            listed = report.listed,
            refreshed = report.refreshed,
            failed = report.failures.len(),
            "device refresh published"
        );

        let _ = self.events.send(HubEvent::DevicesRefreshed {
            devices: report.listed,
            failures: report.failures.len(),
        });
        if !self.available.swap(true, Ordering::SeqCst) {
            info!(devices = report.listed, "router available");
            let _ = self.events.send(HubEvent::RouterAvailable);
        }

        Ok(report)
    }

    /// Both listings, sockets first. An id present in both keeps the
    /// socket kind.
    async fn fetch_listing(&self, sid: &SessionId) -> Result<Vec<(String, DeviceKind)>, CoreError> {
        let api = self.session.api();
        let listing = async {
            let switches = api.list_switches(sid).await?;
            let thermostats = api.list_thermostats(sid).await?;
            Ok::<_, fritzmon_api::Error>((switches, thermostats))
        };

        let (switches, thermostats) = self.session.observe(listing.await).map_err(|e| {
            warn!(error = %e, "device listing failed, skipping cycle");
            CoreError::ListingFetch {
                reason: e.to_string(),
            }
        })?;

        let mut seen = HashSet::new();
        let listed = switches
            .into_iter()
            .map(|id| (id, DeviceKind::Socket))
            .chain(thermostats.into_iter().map(|id| (id, DeviceKind::Thermostat)))
            .filter(|(id, _)| seen.insert(unique_id(id)))
            .collect();
        Ok(listed)
    }

    async fn refresh_device(
        &self,
        sid: &SessionId,
        raw_id: &str,
        kind: DeviceKind,
    ) -> Result<(), DeviceFailure> {
        let key = unique_id(raw_id);
        let fetch = self.session.api().device_detail(sid, raw_id);

        let device = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => self.session.observe(result),
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: self.fetch_timeout.as_secs(),
            }),
        };

        match device {
            Ok(device) => {
                let previous = self.table.get(&key);
                let snapshot = convert::reconcile(previous.as_deref(), &device, kind);
                if !snapshot.present {
                    debug!(ain = %key, "device not present, keeping last readings");
                }
                self.table.upsert(snapshot);
                Ok(())
            }
            Err(e) => {
                warn!(ain = %key, error = %e, "device fetch failed");
                let failure = CoreError::DeviceFetch {
                    unique_id: key.clone(),
                    reason: e.to_string(),
                };
                Err(DeviceFailure {
                    unique_id: key,
                    reason: failure.to_string(),
                })
            }
        }
    }
}

/// Poll on a fixed interval until cancelled. Cycles are skipped while
/// there is no session.
pub async fn poll_task(poller: Arc<DevicePoller>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // initial load happens on connect

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !poller.session().is_authenticated() {
                    debug!("no router session, skipping device poll");
                    continue;
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = poller.poll_once() => {
                        if let Err(e) = result {
                            warn!(error = %e, "device poll failed");
                        }
                    }
                }
            }
        }
    }
    debug!("device poller exiting");
}
