// AHA webservice HTTP client
//
// Wraps `reqwest::Client` with router-specific URL construction and
// status mapping. Login lives in `login.rs` as further inherent methods.
// The client holds no session state: every call takes the `SessionId`
// explicitly, the session manager in the core owns it.

use tracing::debug;
use url::Url;

use super::models::{AhaDevice, DeviceList, parse_xml};
use crate::auth::SessionId;
use crate::error::Error;
use crate::transport::TransportConfig;

const WEBSERVICE_PATH: &str = "/webservices/homeautoswitch.lua";

/// Raw HTTP client for the router's home-automation interface.
#[derive(Debug, Clone)]
pub struct AhaClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AhaClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the router root, e.g. `http://fritz.box`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/webservices/homeautoswitch.lua?switchcmd={cmd}&sid={sid}[&ain={ain}]`
    ///
    /// Whitespace inside the AIN is dropped; the router accepts both forms.
    pub(crate) fn webservice_url(
        &self,
        cmd: &str,
        sid: &SessionId,
        ain: Option<&str>,
    ) -> Result<Url, Error> {
        let mut url = self.base_url.join(WEBSERVICE_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("switchcmd", cmd);
            query.append_pair("sid", sid.as_str());
            if let Some(ain) = ain {
                let compact: String = ain.chars().filter(|c| !c.is_whitespace()).collect();
                query.append_pair("ain", &compact);
            }
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue a webservice command and return the response body.
    async fn command(&self, cmd: &str, sid: &SessionId, ain: Option<&str>) -> Result<String, Error> {
        let url = self.webservice_url(cmd, sid, ain)?;
        debug!(cmd, ain = ain.unwrap_or(""), "GET {}", WEBSERVICE_PATH);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        // The webservice answers 403 for an unknown or expired SID.
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Api {
                status: status.as_u16(),
                message: preview,
            });
        }

        resp.text().await.map_err(Error::Transport)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// AINs of all switchable sockets.
    pub async fn get_switch_list(&self, sid: &SessionId) -> Result<Vec<String>, Error> {
        let body = self.command("getswitchlist", sid, None).await?;
        Ok(body
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|ain| !ain.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Every smart-home device with its full state.
    pub async fn get_device_list_infos(&self, sid: &SessionId) -> Result<Vec<AhaDevice>, Error> {
        let body = self.command("getdevicelistinfos", sid, None).await?;
        let list: DeviceList = parse_xml(&body)?;
        Ok(list.devices)
    }

    /// AINs of all radiator thermostats.
    pub async fn get_thermostat_list(&self, sid: &SessionId) -> Result<Vec<String>, Error> {
        let devices = self.get_device_list_infos(sid).await?;
        Ok(devices
            .into_iter()
            .filter(AhaDevice::is_thermostat)
            .map(|d| d.identifier)
            .collect())
    }

    /// Full state of one device.
    pub async fn get_device_infos(&self, sid: &SessionId, ain: &str) -> Result<AhaDevice, Error> {
        let body = self.command("getdeviceinfos", sid, Some(ain)).await?;
        parse_xml(&body)
    }

    /// Switch a socket and return the state the router reports back.
    pub async fn set_switch(&self, sid: &SessionId, ain: &str, on: bool) -> Result<bool, Error> {
        let cmd = if on { "setswitchon" } else { "setswitchoff" };
        let body = self.command(cmd, sid, Some(ain)).await?;
        match body.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(Error::Api {
                status: 200,
                message: format!("unexpected {cmd} response: {other:?}"),
            }),
        }
    }
}
