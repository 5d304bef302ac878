//! Request authorization
//!
//! Two independent schemes, either of which grants access:
//!
//! - HTTP Basic: `Authorization: Basic base64(username:password)`
//! - static API key: `X-API-Key: <key>`
//!
//! Both compare with [`secure_compare`], so a mismatch takes the same time
//! wherever the first differing byte is.

use alloc::vec::Vec;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;

use crate::config::AuthConfig;
use crate::security::{secure_compare, secure_zero};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const API_KEY_HEADER: &str = "X-API-Key";
pub const WWW_AUTHENTICATE_HEADER: &str = "WWW-Authenticate";

const BASIC_PREFIX: &str = "Basic ";

/// Sent with every 401. Does not say which scheme failed.
pub const CHALLENGE: &str = "Basic realm=\"AWCMS IoT\"";
pub const CHALLENGE_MESSAGE: &str = "Authentication Required";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    BasicAuth,
    ApiKey,
}

/// An expected secret for one scheme. Wiped from memory when dropped.
///
/// Only comparable through [`Credential::matches`].
#[derive(Clone)]
pub struct Credential {
    scheme: AuthScheme,
    expected: Vec<u8>,
}

impl Credential {
    /// Expected decoded Basic-Auth payload `username:password`
    pub fn basic(username: &str, password: &str) -> Self {
        let mut expected = Vec::with_capacity(username.len() + 1 + password.len());
        expected.extend_from_slice(username.as_bytes());
        expected.push(b':');
        expected.extend_from_slice(password.as_bytes());

        Self {
            scheme: AuthScheme::BasicAuth,
            expected,
        }
    }

    pub fn api_key(key: &str) -> Self {
        Self {
            scheme: AuthScheme::ApiKey,
            expected: key.as_bytes().to_vec(),
        }
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn matches(&self, presented: &[u8]) -> bool {
        secure_compare(&self.expected, presented)
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("expected", &"<redacted>")
            .finish()
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        secure_zero(&mut self.expected);
    }
}

/// Anything requests carry headers in.
pub trait HeaderSource {
    /// Value of the first header named `name` (case-insensitive).
    fn header(&self, name: &str) -> Option<&str>;
}

/// Rejection returned by [`AccessGuard::require`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChallenge;

impl AuthChallenge {
    pub const fn www_authenticate(&self) -> &'static str {
        CHALLENGE
    }

    pub const fn message(&self) -> &'static str {
        CHALLENGE_MESSAGE
    }
}

/// Gate in front of every sensitive endpoint.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    enabled: bool,
    basic: Credential,
    api_key: Option<Credential>,
}

impl AccessGuard {
    pub fn new(config: &AuthConfig) -> Self {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(Credential::api_key);

        Self {
            enabled: config.enabled,
            basic: Credential::basic(&config.username, &config.password),
            api_key,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check an `Authorization` header value.
    pub fn check_basic(&self, authorization: Option<&str>) -> bool {
        let Some(encoded) = authorization.and_then(|value| value.strip_prefix(BASIC_PREFIX))
        else {
            return false;
        };

        match STANDARD.decode(encoded) {
            Ok(mut decoded) => {
                let ok = self.basic.matches(&decoded);
                secure_zero(&mut decoded);
                ok
            }
            Err(_) => false,
        }
    }

    /// Check an `X-API-Key` header value. Fails closed without a configured key.
    pub fn check_api_key(&self, presented: Option<&str>) -> bool {
        match (&self.api_key, presented) {
            (Some(expected), Some(presented)) => expected.matches(presented.as_bytes()),
            _ => false,
        }
    }

    /// Scheme of the first credential the headers satisfy, ignoring whether
    /// the guard is enabled.
    pub fn authenticate<H: HeaderSource + ?Sized>(&self, headers: &H) -> Option<AuthScheme> {
        if self.check_basic(headers.header(AUTHORIZATION_HEADER)) {
            return Some(self.basic.scheme());
        }
        if self.check_api_key(headers.header(API_KEY_HEADER)) {
            return self.api_key.as_ref().map(Credential::scheme);
        }
        None
    }

    pub fn is_authorized<H: HeaderSource + ?Sized>(&self, headers: &H) -> bool {
        if !self.enabled {
            return true;
        }

        match self.authenticate(headers) {
            Some(scheme) => {
                debug!("Request authorized by {:?}", scheme);
                true
            }
            None => false,
        }
    }

    pub fn require<H: HeaderSource + ?Sized>(&self, headers: &H) -> Result<(), AuthChallenge> {
        if self.is_authorized(headers) {
            Ok(())
        } else {
            Err(AuthChallenge)
        }
    }
}
