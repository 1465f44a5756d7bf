use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{FibProvider, OAuthError};

pub const CLIENT_ID_ENV: &str = "FIB_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "FIB_CLIENT_SECRET";
pub const REDIRECT_URI_ENV: &str = "FIB_REDIRECT_URI";
pub const TOKEN_FILE_ENV: &str = "FIB_TOKEN_FILE";
pub const LANGUAGE_ENV: &str = "FIB_LANGUAGE";

pub const DEFAULT_BASE_URL: &str = "https://api.fib.upc.edu/v2";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Registered OAuth application credentials. Fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl ClientIdentity {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() {
            return Err(OAuthError::Configuration(format!("{CLIENT_ID_ENV} is required")));
        }
        if client_secret.trim().is_empty() {
            return Err(OAuthError::Configuration(format!(
                "{CLIENT_SECRET_ENV} is required for OAuth"
            )));
        }
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: FibProvider::default_redirect_uri().to_string(),
        })
    }

    /// Reads `FIB_CLIENT_ID`, `FIB_CLIENT_SECRET` and the optional `FIB_REDIRECT_URI`.
    pub fn from_env() -> Result<Self, OAuthError> {
        let identity = Self::new(
            env::var(CLIENT_ID_ENV).unwrap_or_default(),
            env::var(CLIENT_SECRET_ENV).unwrap_or_default(),
        )?;
        Ok(match non_empty_env(REDIRECT_URI_ENV) {
            Some(redirect_uri) => identity.with_redirect_uri(redirect_uri),
            None => identity,
        })
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }
}

/// Settings for the data API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub client_id: String,
    pub base_url: String,
    pub language: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Reads `FIB_CLIENT_ID` (required) and `FIB_LANGUAGE`.
    pub fn from_env() -> Result<Self, OAuthError> {
        let client_id = non_empty_env(CLIENT_ID_ENV)
            .ok_or_else(|| OAuthError::Configuration(format!("{CLIENT_ID_ENV} is required")))?;
        let config = Self::new(client_id);
        Ok(match non_empty_env(LANGUAGE_ENV) {
            Some(language) => config.with_language(language),
            None => config,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Token file override from `FIB_TOKEN_FILE`, if set.
pub fn token_file_from_env() -> Option<PathBuf> {
    non_empty_env(TOKEN_FILE_ENV).map(PathBuf::from)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_client_id() {
        let result = ClientIdentity::new("", "secret");
        assert!(matches!(
            result,
            Err(OAuthError::Configuration(message)) if message.contains(CLIENT_ID_ENV)
        ));
    }

    #[test]
    fn identity_requires_client_secret() {
        let result = ClientIdentity::new("id", "  ");
        assert!(matches!(
            result,
            Err(OAuthError::Configuration(message)) if message.contains(CLIENT_SECRET_ENV)
        ));
    }

    #[test]
    fn identity_defaults_redirect_uri() {
        let identity = ClientIdentity::new("id", "secret").unwrap();
        assert_eq!(identity.redirect_uri, "http://localhost:8085/callback");
    }

    #[test]
    fn api_config_trims_trailing_slash() {
        let config = ApiConfig::new("id").with_base_url("http://127.0.0.1:9000/v2/");
        assert_eq!(config.base_url, "http://127.0.0.1:9000/v2");
        assert_eq!(config.language, "en");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
