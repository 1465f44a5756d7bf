use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::OAuthError;

/// Seconds before the literal expiry at which a token is already treated as stale.
pub const STALENESS_MARGIN_SECS: f64 = 60.0;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Source of wall-clock time as fractional seconds since the Unix epoch.
pub type Clock = fn() -> f64;

pub fn system_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds after which `access_token` is unusable.
    pub expires_at: f64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

impl Credential {
    /// Builds a credential from a token endpoint response received at `now`.
    ///
    /// A response without a refresh token keeps `previous_refresh_token`, which
    /// is empty for a fresh code exchange.
    pub fn from_token_response(
        response: TokenResponse,
        now: f64,
        previous_refresh_token: &str,
    ) -> Self {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .unwrap_or_else(|| previous_refresh_token.to_string()),
            expires_at: now + expires_in as f64,
            token_type: response.token_type.unwrap_or_else(default_token_type),
        }
    }

    pub fn is_stale_at(&self, now: f64) -> bool {
        now >= self.expires_at - STALENESS_MARGIN_SECS
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(system_clock())
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub state: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationResponse {
    /// Parses the query string of the redirect the provider sent back to the
    /// local listener.
    pub fn from_query(query: &str) -> Result<Self, OAuthError> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => code = Some(value.to_string()),
                "state" => state = Some(value.to_string()),
                "error" => error = Some(value.to_string()),
                "error_description" => description = Some(value.to_string()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(OAuthError::AuthorizationDenied { error, description });
        }

        match code {
            Some(code) if !code.is_empty() => Ok(Self { code, state }),
            _ => Err(OAuthError::MissingAuthorizationCode),
        }
    }
}
