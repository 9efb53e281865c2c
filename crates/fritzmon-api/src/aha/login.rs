// Router login
//
// Challenge/response session login against `/login_sid.lua`. The router
// hands out a challenge, we answer with an MD5 response, and a non-zero
// SID in the reply means we are in.

use tracing::debug;
use url::Url;

use super::client::AhaClient;
use super::models::{SessionInfo, parse_xml};
use crate::auth::{Credentials, SessionId, challenge_response};
use crate::error::Error;

const LOGIN_PATH: &str = "/login_sid.lua";

impl AhaClient {
    fn login_url(&self, params: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.base_url().join(LOGIN_PATH)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn session_info(&self, url: Url) -> Result<SessionInfo, Error> {
        let resp = self.http().get(url).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("login endpoint failed: {body}"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        parse_xml(&body)
    }

    /// Obtain a session id for `credentials`.
    ///
    /// A router without password protection answers the first request
    /// with a valid SID already; that SID is returned as-is.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionId, Error> {
        let info = self.session_info(self.login_url(&[])?).await?;
        let blocked = info.block_time_secs();
        let sid = SessionId::new(info.sid);
        if sid.is_valid() {
            debug!("router granted a session without login");
            return Ok(sid);
        }

        if blocked > 0 {
            return Err(Error::Authentication {
                message: format!("login blocked for {blocked}s after failed attempts"),
            });
        }

        let response = challenge_response(&info.challenge, &credentials.password);
        debug!(username = %credentials.username, "answering login challenge");

        let url = self.login_url(&[
            ("username", credentials.username.as_str()),
            ("response", response.as_str()),
        ])?;
        let reply = self.session_info(url).await?;
        let sid = SessionId::new(reply.sid);

        if !sid.is_valid() {
            return Err(Error::Authentication {
                message: "invalid username or password".into(),
            });
        }

        debug!("login successful");
        Ok(sid)
    }

    /// Ask the router whether `sid` is still accepted.
    pub async fn check_session(&self, sid: &SessionId) -> Result<bool, Error> {
        if !sid.is_valid() {
            return Ok(false);
        }
        let info = self
            .session_info(self.login_url(&[("sid", sid.as_str())])?)
            .await?;
        Ok(SessionId::new(info.sid).is_valid())
    }

    /// End the session on the router.
    pub async fn logout(&self, sid: &SessionId) -> Result<(), Error> {
        let url = self.login_url(&[("logout", "1"), ("sid", sid.as_str())])?;
        debug!("logging out");
        let _info = self.session_info(url).await?;
        Ok(())
    }
}
