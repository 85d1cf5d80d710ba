//! Request authentication chain
//!
//! Each incoming MCP HTTP request is run through an ordered list of
//! [`AuthBackend`]s. The first backend that yields a verified token wins and
//! later backends are never consulted. When nothing matches, the caller falls
//! back to the startup default credential (see [`crate::config::GatewayConfig::resolve`]).

use http::request::Parts;

use crate::credentials::{Credential, ServiceAccountToken};

/// Query parameter carrying a service account token
pub const TOKEN_PARAM: &str = "token";

/// Client id reported for service-account authenticated callers
pub const SERVICE_ACCOUNT_CLIENT_ID: &str = "MCP_CLIENT_VIA_SERVICE_ACCOUNT";

/// Scope granted to service-account authenticated callers
pub const SERVICE_ACCOUNT_SCOPE: &str = "MCP_SERVICE_ACCOUNT_SCOPE";

/// Outcome of a successful authentication
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub credential: Credential,
    pub scopes: Vec<String>,
    pub client_id: String,
    /// Unix seconds
    pub expires_at: Option<i64>,
}

impl AuthenticationResult {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(exp) if exp < now)
    }
}

/// Validates raw tokens into [`AuthenticationResult`]s
///
/// Tokens are not cryptographically verified here; the engine does that on
/// every query. The verifier rejects tokens that are already expired or that
/// declare an issuer other than the expected one.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    expected_issuer: Option<String>,
}

impl TokenVerifier {
    pub fn new(expected_issuer: Option<String>) -> Self {
        Self { expected_issuer }
    }

    /// Issuer expected for tokens minted by the cluster at `host`
    pub fn for_host(host: &str) -> Self {
        Self::new(Some(format!("https://{}/config", host)))
    }

    pub fn verify(&self, token: &str) -> Option<AuthenticationResult> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Option<AuthenticationResult> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let sa = ServiceAccountToken::new(token, self.expected_issuer.clone());
        if let (Some(expected), Some(actual)) = (self.expected_issuer.as_deref(), sa.issuer()) {
            if expected != actual {
                log::warn!("Rejecting token issued by {} (expected {})", actual, expected);
                return None;
            }
        }

        let result = AuthenticationResult {
            expires_at: sa.expires_at(),
            credential: Credential::ServiceAccount(sa),
            scopes: vec![SERVICE_ACCOUNT_SCOPE.to_string()],
            client_id: SERVICE_ACCOUNT_CLIENT_ID.to_string(),
        };

        if result.is_expired(now) {
            log::debug!("Rejecting expired token");
            return None;
        }
        Some(result)
    }
}

/// A single way of finding a token on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBackend {
    /// MCP-standard OAuth. Reserved; never matches.
    OAuth,
    /// Token passed as a URL query parameter
    QueryParam { param: &'static str },
    /// `Authorization: Bearer <token>`
    BearerHeader,
}

impl AuthBackend {
    fn extract(&self, parts: &Parts) -> Option<String> {
        match self {
            AuthBackend::OAuth => None,
            AuthBackend::QueryParam { param } => parts.uri.query().and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == param)
                    .map(|(_, value)| value.into_owned())
            }),
            AuthBackend::BearerHeader => parts
                .headers
                .get(http::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| {
                    let (scheme, token) = value.split_once(' ')?;
                    scheme
                        .eq_ignore_ascii_case("bearer")
                        .then(|| token.trim().to_string())
                }),
        }
    }

    fn authenticate(&self, parts: &Parts, verifier: &TokenVerifier) -> Option<AuthenticationResult> {
        let token = self.extract(parts)?;
        verifier.verify(&token)
    }
}

/// Ordered, first-match-wins authentication chain
#[derive(Debug, Clone)]
pub struct AuthChain {
    backends: Vec<AuthBackend>,
    verifier: TokenVerifier,
}

impl AuthChain {
    pub fn new(backends: Vec<AuthBackend>, verifier: TokenVerifier) -> Self {
        Self { backends, verifier }
    }

    /// OAuth, then `?token=`, then the bearer header
    pub fn standard(verifier: TokenVerifier) -> Self {
        Self::new(
            vec![
                AuthBackend::OAuth,
                AuthBackend::QueryParam { param: TOKEN_PARAM },
                AuthBackend::BearerHeader,
            ],
            verifier,
        )
    }

    pub fn backends(&self) -> &[AuthBackend] {
        &self.backends
    }

    pub fn authenticate(&self, parts: &Parts) -> Option<AuthenticationResult> {
        self.backends
            .iter()
            .find_map(|backend| backend.authenticate(parts, &self.verifier))
    }
}
