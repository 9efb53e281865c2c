use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// The all-zero session id the router hands out when nobody is logged in.
pub const INVALID_SID: &str = "0000000000000000";

/// Username/password pair for the router's login endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Opaque session identifier issued by `/login_sid.lua`.
///
/// Every webservice call carries it as the `sid` query parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    /// The zero session.
    pub fn invalid() -> Self {
        Self(INVALID_SID.to_owned())
    }

    /// `false` for an empty or all-zero id.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().any(|b| b != b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The SID grants full router access: keep it out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.write_str("SessionId(<redacted>)")
        } else {
            f.write_str("SessionId(invalid)")
        }
    }
}

/// Answer a login challenge with the MD5 scheme.
///
/// `response = "<challenge>-" + md5(UTF-16LE("<challenge>-<password>"))`.
/// Code points above U+00FF are replaced by `.` before hashing, matching
/// the router's own implementation.
pub fn challenge_response(challenge: &str, password: &SecretString) -> String {
    let plain = format!("{challenge}-{}", password.expose_secret());
    let mut utf16le = Vec::with_capacity(plain.len() * 2);
    for ch in plain.chars() {
        let unit = u16::try_from(u32::from(ch))
            .ok()
            .filter(|u| *u <= 0xFF)
            .unwrap_or(u16::from(b'.'));
        utf16le.extend_from_slice(&unit.to_le_bytes());
    }
    format!("{challenge}-{:x}", md5::compute(&utf16le))
}
