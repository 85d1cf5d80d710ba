//! Identities used to authenticate engine connections
//!
//! A [`Credential`] is either a username/password pair or a service account
//! token. Secrets are held in [`SecretString`] and are never printed: both
//! `Debug` and `Display` redact them.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Username and password identity
#[derive(Clone)]
pub struct UsernamePassword {
    pub username: String,
    pub password: SecretString,
}

impl UsernamePassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Service account (bearer) token identity
#[derive(Clone)]
pub struct ServiceAccountToken {
    pub token: SecretString,
    /// Issuer the token is expected to come from
    pub expected_issuer: Option<String>,
    claims: TokenClaims,
}

impl ServiceAccountToken {
    pub fn new(token: impl Into<String>, expected_issuer: Option<String>) -> Self {
        let token = token.into();
        let claims = TokenClaims::peek(&token).unwrap_or_default();
        Self {
            token: SecretString::from(token),
            expected_issuer,
            claims,
        }
    }

    /// Service account id (token subject), when the token is a JWT
    pub fn service_account_id(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    /// Issuer declared by the token, when the token is a JWT
    pub fn issuer(&self) -> Option<&str> {
        self.claims.iss.as_deref()
    }

    /// Expiry declared by the token (unix seconds), when the token is a JWT
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.exp.map(|exp| exp.floor() as i64)
    }
}

/// Unverified JWT claims
///
/// Only read for logging, expiry and issuer checks; signature verification is
/// the engine's job.
#[derive(Debug, Clone, Default, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    /// NumericDate; issuers may send fractional seconds
    #[serde(default)]
    exp: Option<f64>,
}

impl TokenClaims {
    fn peek(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// Identity used to talk to the engine
#[derive(Clone)]
pub enum Credential {
    UsernamePassword(UsernamePassword),
    ServiceAccount(ServiceAccountToken),
}

impl Credential {
    /// Attach this identity to an outgoing engine request
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::UsernamePassword(up) => {
                request.basic_auth(&up.username, Some(up.password.expose_secret()))
            }
            Credential::ServiceAccount(sa) => request.bearer_auth(sa.token.expose_secret()),
        }
    }

    /// Short description safe for logs
    pub fn describe(&self) -> String {
        match self {
            Credential::UsernamePassword(up) => format!("as {}", up.username),
            Credential::ServiceAccount(sa) => format!(
                "using service account {}",
                sa.service_account_id().unwrap_or("<opaque token>")
            ),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::UsernamePassword(up) => f
                .debug_struct("UsernamePassword")
                .field("username", &up.username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credential::ServiceAccount(sa) => f
                .debug_struct("ServiceAccountToken")
                .field("token", &"[REDACTED]")
                .field("service_account_id", &sa.service_account_id())
                .field("expected_issuer", &sa.expected_issuer)
                .finish(),
        }
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::UsernamePassword(up) => write!(f, "{}:***", up.username),
            Credential::ServiceAccount(sa) => write!(
                f,
                "token:***({})",
                sa.service_account_id().unwrap_or("opaque")
            ),
        }
    }
}

impl From<UsernamePassword> for Credential {
    fn from(value: UsernamePassword) -> Self {
        Credential::UsernamePassword(value)
    }
}

impl From<ServiceAccountToken> for Credential {
    fn from(value: ServiceAccountToken) -> Self {
        Credential::ServiceAccount(value)
    }
}

#[cfg(test)]
pub(crate) fn jwt_with_claims(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}
