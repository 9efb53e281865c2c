// ── Call state tracker ──
//
// Folds parsed call-monitor events into the single call in flight and
// derives the named events listeners care about.
//
//   Idle ──RING──▶ Ringing ──CONNECT──▶ Answered ──DISCONNECT──▶ Idle
//   Idle ──CALL──▶ Dialing ──CONNECT──▶ Answered ──DISCONNECT──▶ Idle
//   Ringing ──DISCONNECT──▶ Idle   (emits MissedCall first)
//
// Only one session is tracked. A RING or CALL while another call is
// active replaces it: the router serializes calls per line and the raw
// protocol gives no way to tell concurrent lines apart.

use chrono::{Local, NaiveDateTime};
use tokio::sync::watch;
use tracing::debug;

use fritzmon_api::{CallDuration, CallEvent, CallEventKind};

use crate::model::{CallDirection, CallEventName, CallPhase, CallSession};

/// One derived event, before phonebook resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTransition {
    pub name: CallEventName,
    pub connection_id: Option<String>,
    pub remote_number: Option<String>,
    pub timestamp: NaiveDateTime,
    pub duration: Option<CallDuration>,
}

/// Owner of the active [`CallSession`].
///
/// The current session is mirrored into a `watch` channel so other tasks
/// can answer "is a call from N active" without going through the pipeline.
pub struct CallTracker {
    active: watch::Sender<Option<CallSession>>,
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CallTracker {
    pub fn new() -> Self {
        let (active, _) = watch::channel(None);
        Self { active }
    }

    /// Track into an existing channel (so the session survives restarts
    /// of the pipeline as a single observable value).
    pub fn with_channel(active: watch::Sender<Option<CallSession>>) -> Self {
        active.send_replace(None);
        Self { active }
    }

    /// The call in flight, if any.
    pub fn active(&self) -> Option<CallSession> {
        self.active.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CallSession>> {
        self.active.subscribe()
    }

    /// Is there an active call whose remote number is `number`?
    pub fn is_call_active(&self, number: &str) -> bool {
        is_active_number(self.active.borrow().as_ref(), number)
    }

    /// Apply one event and return the events it derives, in emission order.
    pub fn handle(&mut self, event: &CallEvent) -> Vec<CallTransition> {
        let timestamp = event
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());

        match &event.kind {
            CallEventKind::Ring => {
                self.start(event, CallDirection::Inbound, CallPhase::Ringing, timestamp);
                vec![transition(CallEventName::IncomingCall, event, timestamp)]
            }
            CallEventKind::Call => {
                self.start(event, CallDirection::Outbound, CallPhase::Dialing, timestamp);
                vec![transition(CallEventName::OutgoingCall, event, timestamp)]
            }
            CallEventKind::Connect => {
                let mut answered = transition(CallEventName::CallAnswered, event, timestamp);
                self.active.send_if_modified(|active| match active {
                    Some(session) if session.connection_id == event.connection_id => {
                        session.phase = CallPhase::Answered;
                        if answered.remote_number.is_none() {
                            answered.remote_number.clone_from(&session.remote_number);
                        }
                        true
                    }
                    _ => {
                        debug!(
                            connection_id = ?event.connection_id,
                            "CONNECT without a matching session"
                        );
                        false
                    }
                });
                vec![answered]
            }
            CallEventKind::Disconnect => self.finish(event, timestamp),
            CallEventKind::Unknown(kind) => {
                debug!(kind = %kind, fields = ?event.raw_fields, "ignoring unknown call monitor event");
                Vec::new()
            }
        }
    }

    fn start(
        &self,
        event: &CallEvent,
        direction: CallDirection,
        phase: CallPhase,
        started_at: NaiveDateTime,
    ) {
        let previous = self.active.send_replace(Some(CallSession {
            connection_id: event.connection_id.clone(),
            remote_number: event.remote_number.clone(),
            direction,
            phase,
            started_at,
        }));
        if let Some(previous) = previous {
            debug!(
                replaced = ?previous.connection_id,
                connection_id = ?event.connection_id,
                "new call replaces the tracked one"
            );
        }
    }

    /// DISCONNECT: clear a matching session, deriving MissedCall for an
    /// inbound call that never got past ringing. No session, no events.
    fn finish(&self, event: &CallEvent, timestamp: NaiveDateTime) -> Vec<CallTransition> {
        let mut ended = None;
        self.active.send_if_modified(|active| {
            if active
                .as_ref()
                .is_some_and(|s| s.connection_id == event.connection_id)
            {
                ended = active.take();
                true
            } else {
                false
            }
        });

        let Some(session) = ended else {
            debug!(
                connection_id = ?event.connection_id,
                "DISCONNECT for an untracked call"
            );
            return Vec::new();
        };

        let remote_number = event
            .remote_number
            .clone()
            .or_else(|| session.remote_number.clone());
        let mut out = Vec::with_capacity(2);

        if session.direction == CallDirection::Inbound && session.phase == CallPhase::Ringing {
            out.push(CallTransition {
                name: CallEventName::MissedCall,
                connection_id: session.connection_id.clone(),
                remote_number: remote_number.clone(),
                timestamp,
                duration: None,
            });
        }

        out.push(CallTransition {
            name: CallEventName::CallDisconnected,
            connection_id: session.connection_id,
            remote_number,
            timestamp,
            duration: event.duration.clone(),
        });
        out
    }
}

/// Shared by the tracker and by holders of a session receiver.
pub fn is_active_number(active: Option<&CallSession>, number: &str) -> bool {
    active
        .and_then(|s| s.remote_number.as_deref())
        .is_some_and(|remote| remote == number)
}

fn transition(name: CallEventName, event: &CallEvent, timestamp: NaiveDateTime) -> CallTransition {
    CallTransition {
        name,
        connection_id: event.connection_id.clone(),
        remote_number: event.remote_number.clone(),
        timestamp,
        duration: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fritzmon_api::parse_line;
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(tracker: &mut CallTracker, line: &str) -> Vec<CallEventName> {
        tracker
            .handle(&parse_line(line))
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    const RING: &str = "22.09.16 19:03:31;RING;1;555;0301234;SIP0;";
    const CONNECT: &str = "22.09.16 19:03:40;CONNECT;1;12;555;";
    const HANGUP_5: &str = "22.09.16 19:03:36;DISCONNECT;1;5;";
    const HANGUP_30: &str = "22.09.16 19:04:10;DISCONNECT;1;30;";

    #[test]
    fn ring_creates_ringing_session() {
        let mut tracker = CallTracker::new();
        assert_eq!(names(&mut tracker, RING), vec![CallEventName::IncomingCall]);

        let session = tracker.active().unwrap();
        assert_eq!(session.phase, CallPhase::Ringing);
        assert_eq!(session.direction, CallDirection::Inbound);
        assert_eq!(session.remote_number.as_deref(), Some("555"));
    }

    #[test]
    fn unanswered_ring_is_missed() {
        let mut tracker = CallTracker::new();
        let mut all = names(&mut tracker, RING);
        all.extend(names(&mut tracker, HANGUP_5));
        assert_eq!(
            all,
            vec![
                CallEventName::IncomingCall,
                CallEventName::MissedCall,
                CallEventName::CallDisconnected
            ]
        );
        assert!(tracker.active().is_none());
    }

    #[test]
    fn answered_call_is_never_missed() {
        let mut tracker = CallTracker::new();
        let mut all = names(&mut tracker, RING);
        all.extend(names(&mut tracker, CONNECT));
        assert_eq!(tracker.active().unwrap().phase, CallPhase::Answered);

        let last = tracker.handle(&parse_line(HANGUP_30));
        all.extend(last.iter().map(|t| t.name));
        assert_eq!(
            all,
            vec![
                CallEventName::IncomingCall,
                CallEventName::CallAnswered,
                CallEventName::CallDisconnected
            ]
        );
        assert_eq!(last[0].duration, Some(CallDuration::Seconds(30)));
        assert_eq!(last[0].remote_number.as_deref(), Some("555"));
    }

    #[test]
    fn tel_number_query_follows_session() {
        let mut tracker = CallTracker::new();
        assert!(!tracker.is_call_active("555"));

        tracker.handle(&parse_line(RING));
        assert!(tracker.is_call_active("555"));
        assert!(!tracker.is_call_active("666"));

        tracker.handle(&parse_line(CONNECT));
        assert!(tracker.is_call_active("555"));

        tracker.handle(&parse_line(HANGUP_30));
        assert!(!tracker.is_call_active("555"));
    }

    #[test]
    fn duplicate_disconnect_is_a_no_op() {
        let mut tracker = CallTracker::new();
        tracker.handle(&parse_line(RING));
        assert_eq!(tracker.handle(&parse_line(HANGUP_5)).len(), 2);
        assert!(tracker.handle(&parse_line(HANGUP_5)).is_empty());
    }

    #[test]
    fn outgoing_call_is_not_missed_when_unanswered() {
        let mut tracker = CallTracker::new();
        let mut all = names(&mut tracker, "15.01.17 12:22:31;CALL;2;12;0301234;777;SIP2;");
        assert_eq!(tracker.active().unwrap().phase, CallPhase::Dialing);
        all.extend(names(&mut tracker, "15.01.17 12:22:50;DISCONNECT;2;0;"));
        assert_eq!(
            all,
            vec![CallEventName::OutgoingCall, CallEventName::CallDisconnected]
        );
    }

    #[test]
    fn new_ring_overwrites_active_session() {
        let mut tracker = CallTracker::new();
        tracker.handle(&parse_line(RING));
        tracker.handle(&parse_line("22.09.16 19:03:33;RING;2;999;0301234;SIP0;"));
        assert!(!tracker.is_call_active("555"));
        assert!(tracker.is_call_active("999"));

        // The overwritten call's hangup no longer matches anything.
        assert!(tracker.handle(&parse_line(HANGUP_5)).is_empty());
        assert!(tracker.is_call_active("999"));
    }

    #[test]
    fn connect_without_session_still_emits_answered() {
        let mut tracker = CallTracker::new();
        assert_eq!(names(&mut tracker, CONNECT), vec![CallEventName::CallAnswered]);
        assert!(tracker.active().is_none());
    }

    #[test]
    fn unknown_kind_emits_nothing() {
        let mut tracker = CallTracker::new();
        tracker.handle(&parse_line(RING));
        assert!(names(&mut tracker, "22.09.16 19:03:35;HOLD;1;").is_empty());
        assert_eq!(tracker.active().unwrap().phase, CallPhase::Ringing);
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let mut tracker = CallTracker::new();
        let out = tracker.handle(&parse_line("garbage;RING;1;555;"));
        assert_eq!(out.len(), 1);
        assert!(out[0].timestamp.and_utc().timestamp() > 0);
    }
}
