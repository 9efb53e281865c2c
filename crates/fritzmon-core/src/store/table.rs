// ── Reactive device table ──
//
// Lock-free concurrent storage keyed by unique id, with push-based
// change notification via `watch` channels. Writes are per key and
// silent; `publish()` rebuilds the snapshot once for the whole batch.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::DeviceSnapshot;

/// Snapshot handed to subscribers: every device, sorted by unique id.
pub type DeviceList = Arc<Vec<Arc<DeviceSnapshot>>>;

/// Device table owned by the poller.
///
/// Entries are never removed: a device that disappears or goes absent
/// keeps its last entry so consumers can see the transition.
pub struct DeviceTable {
    by_key: DashMap<String, Arc<DeviceSnapshot>>,

    /// Bumped once per publish.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on publish.
    snapshot: watch::Sender<DeviceList>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTable {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace one entry without notifying. Returns `true` if
    /// the key was new.
    pub(crate) fn upsert(&self, device: DeviceSnapshot) -> bool {
        let key = device.unique_id.clone();
        self.by_key.insert(key, Arc::new(device)).is_none()
    }

    /// Rebuild the snapshot and notify subscribers once.
    pub(crate) fn publish(&self) {
        let mut values: Vec<Arc<DeviceSnapshot>> =
            self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }

    /// Look up a device by unique id (whitespace in `key` is ignored).
    pub fn get(&self, key: &str) -> Option<Arc<DeviceSnapshot>> {
        let key = crate::model::unique_id(key);
        self.by_key.get(&key).map(|r| Arc::clone(r.value()))
    }

    /// The last published snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> DeviceList {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceList> {
        self.snapshot.subscribe()
    }

    /// Number of publishes so far.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
