// ── Reactive device stream ──
//
// Subscription type for consuming device table publishes.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::DeviceList;

/// A subscription to the device table.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed) or by converting to a `Stream`. One
/// poll cycle produces exactly one change.
pub struct DeviceStream {
    current: DeviceList,
    receiver: watch::Receiver<DeviceList>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: watch::Receiver<DeviceList>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &DeviceList {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> DeviceList {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish, returning the new snapshot.
    /// Returns `None` if the table has been dropped.
    pub async fn changed(&mut self) -> Option<DeviceList> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> DeviceWatchStream {
        DeviceWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct DeviceWatchStream {
    inner: WatchStream<DeviceList>,
}

impl Stream for DeviceWatchStream {
    type Item = DeviceList;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
