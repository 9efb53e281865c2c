// ── Router API seam ──
//
// The session manager and the poller talk to the router through this
// trait. `AhaClient` is the production implementation; tests plug in
// in-memory fakes.

use async_trait::async_trait;

use fritzmon_api::{AhaClient, AhaDevice, Credentials, Error, SessionId};

/// Fallible async operations the core needs from the router.
#[async_trait]
pub trait RouterApi: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionId, Error>;

    /// `true` if the router still accepts `sid`.
    async fn check_auth(&self, sid: &SessionId) -> Result<bool, Error>;

    /// Identifiers of switchable sockets.
    async fn list_switches(&self, sid: &SessionId) -> Result<Vec<String>, Error>;

    /// Identifiers of radiator thermostats.
    async fn list_thermostats(&self, sid: &SessionId) -> Result<Vec<String>, Error>;

    async fn device_detail(&self, sid: &SessionId, id: &str) -> Result<AhaDevice, Error>;

    /// Switch a socket; returns the state the router reports back.
    async fn set_switch(&self, sid: &SessionId, id: &str, on: bool) -> Result<bool, Error>;

    /// End `sid` on the router. Best effort.
    async fn logout(&self, _sid: &SessionId) -> Result<(), Error> {
        Ok(())
    }
}

#[async_trait]
impl RouterApi for AhaClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionId, Error> {
        self.login(credentials).await
    }

    async fn check_auth(&self, sid: &SessionId) -> Result<bool, Error> {
        self.check_session(sid).await
    }

    async fn list_switches(&self, sid: &SessionId) -> Result<Vec<String>, Error> {
        self.get_switch_list(sid).await
    }

    async fn list_thermostats(&self, sid: &SessionId) -> Result<Vec<String>, Error> {
        self.get_thermostat_list(sid).await
    }

    async fn device_detail(&self, sid: &SessionId, id: &str) -> Result<AhaDevice, Error> {
        self.get_device_infos(sid, id).await
    }

    async fn set_switch(&self, sid: &SessionId, id: &str, on: bool) -> Result<bool, Error> {
        AhaClient::set_switch(self, sid, id, on).await
    }

    async fn logout(&self, sid: &SessionId) -> Result<(), Error> {
        AhaClient::logout(self, sid).await
    }
}
