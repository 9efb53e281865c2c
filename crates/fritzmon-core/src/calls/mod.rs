// ── Call pipeline ──
//
// supervisor ─▶ framer ─▶ parser ─▶ CallTracker ─▶ EventEmitter
//
// The first three stages live in `fritzmon_api::callmonitor`. Here the
// parsed events are consumed one at a time, in arrival order, each fully
// handled before the next is taken off the channel.

pub mod emitter;
pub mod phonebook;
pub mod tracker;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fritzmon_api::CallEvent;

pub use emitter::{CallListener, EventEmitter, ListenerError};
pub use phonebook::{EmptyPhonebook, Phonebook, StaticPhonebook};
pub use tracker::{CallTracker, CallTransition};

/// Feed one parsed event through tracker and emitter.
pub fn process_event(tracker: &mut CallTracker, emitter: &EventEmitter, event: &CallEvent) {
    for transition in tracker.handle(event) {
        emitter.emit(transition);
    }
}

/// Drain `events` until the channel closes or `cancel` fires.
pub async fn run_pipeline(
    mut events: mpsc::Receiver<CallEvent>,
    mut tracker: CallTracker,
    emitter: EventEmitter,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                process_event(&mut tracker, &emitter, &event);
            }
        }
    }
    debug!("call pipeline exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use fritzmon_api::parse_line;

    use super::*;
    use crate::model::CallEventName;

    #[tokio::test]
    async fn pipeline_emits_in_wire_order() {
        let (tx, rx) = mpsc::channel(16);
        let tracker = CallTracker::new();
        let active = tracker.subscribe();
        let emitter = EventEmitter::new(Arc::new(EmptyPhonebook), "unknown");
        let mut notifications = emitter.subscribe();

        let task = tokio::spawn(run_pipeline(rx, tracker, emitter, CancellationToken::new()));

        for line in [
            "22.09.16 19:03:31;RING;0;555;123;SIP0;",
            "22.09.16 19:03:40;DISCONNECT;0;0;",
            "22.09.16 19:05:00;CALL;1;12;123;777;SIP1;",
            "22.09.16 19:05:09;CONNECT;1;12;777;",
            "22.09.16 19:06:09;DISCONNECT;1;60;",
        ] {
            tx.send(parse_line(line)).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let mut seen = Vec::new();
        while let Ok(n) = notifications.try_recv() {
            seen.push(n.name);
        }
        assert_eq!(
            seen,
            vec![
                CallEventName::IncomingCall,
                CallEventName::MissedCall,
                CallEventName::CallDisconnected,
                CallEventName::OutgoingCall,
                CallEventName::CallAnswered,
                CallEventName::CallDisconnected,
            ]
        );
        assert!(active.borrow().is_none());
    }

    #[tokio::test]
    async fn cancel_stops_pipeline() {
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let emitter = EventEmitter::new(Arc::new(EmptyPhonebook), "unknown");
        let task = tokio::spawn(run_pipeline(rx, CallTracker::new(), emitter, cancel.clone()));
        cancel.cancel();
        task.await.unwrap();
    }
}
