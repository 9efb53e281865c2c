//! Business logic between `fritzmon-api` and its consumers.
//!
//! - **[`Hub`]**: lifecycle facade. [`start()`](Hub::start) spawns the
//!   call-monitor pipeline and the device poller;
//!   [`shutdown()`](Hub::shutdown) closes everything exactly once.
//!
//! - **Call pipeline** ([`calls`]): [`CallTracker`] turns the parsed
//!   call-monitor lines into lifecycle events (including missed calls),
//!   [`EventEmitter`] resolves caller names through a [`Phonebook`] and
//!   hands each event to the registered [`CallListener`]s.
//!
//! - **Devices**: [`DevicePoller`] reconciles the router's socket and
//!   thermostat readings into a [`DeviceTable`] (`DashMap` + `watch`),
//!   published once per cycle and observable through [`DeviceStream`].
//!
//! - **Session**: [`RouterSession`] owns the router login and drops it on
//!   any auth-class failure; new credentials arrive through
//!   [`Hub::register`].

pub mod calls;
pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;
pub mod poller;
pub mod router;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use calls::{
    CallListener, CallTracker, CallTransition, EmptyPhonebook, EventEmitter, ListenerError,
    Phonebook, StaticPhonebook,
};
pub use config::{DEFAULT_UNKNOWN_LABEL, HubConfig, TlsVerification};
pub use error::CoreError;
pub use hub::{Hub, HubBuilder, HubEvent, shutdown_on_signal};
pub use poller::{DeviceFailure, DevicePoller, PollReport};
pub use router::RouterApi;
pub use session::{CredentialStore, MemoryCredentialStore, RouterSession};
pub use store::{DeviceList, DeviceTable};
pub use stream::{DeviceStream, DeviceWatchStream};

pub use model::{
    CallDirection, CallEventName, CallNotification, CallPhase, CallSession, DeviceKind,
    DeviceSnapshot, DeviceState, SocketState, ThermostatState,
};

// Transport types consumers need without depending on the api crate.
pub use fritzmon_api::{
    CallDuration, CallEvent, ConnectionState, Credentials, ReconnectConfig, parse_line,
};
