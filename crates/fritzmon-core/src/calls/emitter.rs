// ── Call event emitter ──
//
// Resolves the caller name and dispatches each derived event to the
// registered listeners and to broadcast subscribers. A failing listener
// is logged and skipped; it never reaches the pipeline.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::phonebook::Phonebook;
use super::tracker::CallTransition;
use crate::model::CallNotification;

const NOTIFICATION_CHANNEL_SIZE: usize = 256;

/// Error type listeners report back. The emitter only logs it.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of call events (the automation trigger registry).
pub trait CallListener: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "listener"
    }

    fn on_call_event(&self, event: &CallNotification) -> Result<(), ListenerError>;
}

/// Dispatches [`CallTransition`]s as [`CallNotification`]s.
pub struct EventEmitter {
    phonebook: Arc<dyn Phonebook>,
    unknown_label: String,
    listeners: Vec<Arc<dyn CallListener>>,
    tx: broadcast::Sender<Arc<CallNotification>>,
}

impl EventEmitter {
    pub fn new(phonebook: Arc<dyn Phonebook>, unknown_label: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        Self::with_sender(phonebook, unknown_label, tx)
    }

    /// Emit into an existing broadcast channel.
    pub fn with_sender(
        phonebook: Arc<dyn Phonebook>,
        unknown_label: impl Into<String>,
        tx: broadcast::Sender<Arc<CallNotification>>,
    ) -> Self {
        Self {
            phonebook,
            unknown_label: unknown_label.into(),
            listeners: Vec::new(),
            tx,
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn CallListener>) {
        self.listeners.push(listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CallNotification>> {
        self.tx.subscribe()
    }

    /// Resolve a number through the phonebook, falling back to the
    /// unknown-caller label (also for withheld numbers).
    pub fn resolve(&self, number: Option<&str>) -> String {
        number
            .and_then(|n| self.phonebook.lookup(n))
            .unwrap_or_else(|| self.unknown_label.clone())
    }

    /// Build the notification and hand it to everyone.
    pub fn emit(&self, transition: CallTransition) -> Arc<CallNotification> {
        let resolved_name = self.resolve(transition.remote_number.as_deref());
        let notification = Arc::new(CallNotification {
            name: transition.name,
            connection_id: transition.connection_id,
            remote_number: transition.remote_number,
            resolved_name,
            timestamp: transition.timestamp,
            duration: transition.duration,
        });

        debug!(
            event = %notification.name,
            remote = notification.remote_number.as_deref().unwrap_or("-"),
            name = %notification.resolved_name,
            "emitting call event"
        );

        for listener in &self.listeners {
            if let Err(e) = listener.on_call_event(&notification) {
                warn!(
                    listener = listener.name(),
                    event = %notification.name,
                    error = %e,
                    "call listener failed"
                );
            }
        }

        // No subscribers is fine.
        let _ = self.tx.send(Arc::clone(&notification));
        notification
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::calls::phonebook::StaticPhonebook;
    use crate::model::CallEventName;

    struct Recorder(Mutex<Vec<CallEventName>>);

    impl CallListener for Recorder {
        fn on_call_event(&self, event: &CallNotification) -> Result<(), ListenerError> {
            self.0.lock().unwrap().push(event.name);
            Ok(())
        }
    }

    struct Broken;

    impl CallListener for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn on_call_event(&self, _event: &CallNotification) -> Result<(), ListenerError> {
            Err("trigger registry unavailable".into())
        }
    }

    fn transition(name: CallEventName, number: Option<&str>) -> CallTransition {
        CallTransition {
            name,
            connection_id: Some("0".into()),
            remote_number: number.map(str::to_owned),
            timestamp: NaiveDate::from_ymd_opt(2016, 9, 22)
                .unwrap()
                .and_hms_opt(19, 3, 31)
                .unwrap(),
            duration: None,
        }
    }

    fn emitter() -> EventEmitter {
        let book: StaticPhonebook = [("555", "Pizza")].into_iter().collect();
        EventEmitter::new(Arc::new(book), "Unbekannt")
    }

    #[test]
    fn resolves_known_and_unknown_numbers() {
        let emitter = emitter();
        assert_eq!(
            emitter.emit(transition(CallEventName::IncomingCall, Some("555"))).resolved_name,
            "Pizza"
        );
        assert_eq!(
            emitter.emit(transition(CallEventName::IncomingCall, Some("666"))).resolved_name,
            "Unbekannt"
        );
        assert_eq!(
            emitter.emit(transition(CallEventName::IncomingCall, None)).resolved_name,
            "Unbekannt"
        );
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let mut emitter = emitter();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        emitter.add_listener(Arc::new(Broken));
        emitter.add_listener(recorder.clone());

        emitter.emit(transition(CallEventName::MissedCall, Some("555")));
        emitter.emit(transition(CallEventName::CallDisconnected, Some("555")));

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![CallEventName::MissedCall, CallEventName::CallDisconnected]
        );
    }

    #[test]
    fn subscribers_receive_notifications() {
        let emitter = emitter();
        let mut rx = emitter.subscribe();
        emitter.emit(transition(CallEventName::OutgoingCall, Some("555")));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.name, CallEventName::OutgoingCall);
        assert_eq!(got.resolved_name, "Pizza");
    }
}
