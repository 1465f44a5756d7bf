//! Single-use HTTP listener that captures the OAuth redirect.

mod http;
mod server;

use url::Url;

use crate::OAuthError;

pub use server::LocalServer;

/// Where the provider redirects the browser: `http://host:port/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RedirectTarget {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) path: String,
}

impl RedirectTarget {
    pub(crate) fn parse(redirect_uri: &str) -> Result<Self, OAuthError> {
        let url = Url::parse(redirect_uri)?;
        if url.scheme() != "http" {
            return Err(OAuthError::InvalidRedirectUri(format!(
                "{redirect_uri}: local callback must use the http scheme"
            )));
        }

        let host = url.host_str().ok_or_else(|| {
            OAuthError::InvalidRedirectUri(format!("{redirect_uri}: missing host"))
        })?;
        let port = url.port_or_known_default().ok_or_else(|| {
            OAuthError::InvalidRedirectUri(format!("{redirect_uri}: missing port"))
        })?;

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            path: url.path().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_redirect_target() {
        let target = RedirectTarget::parse("http://localhost:8085/callback").unwrap();
        assert_eq!(target.host, "localhost");
        assert_eq!(target.port, 8085);
        assert_eq!(target.path, "/callback");
    }

    #[test]
    fn defaults_port_and_path() {
        let target = RedirectTarget::parse("http://127.0.0.1").unwrap();
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
    }

    #[test]
    fn rejects_https_redirects() {
        let result = RedirectTarget::parse("https://localhost:8085/callback");
        assert!(matches!(result, Err(OAuthError::InvalidRedirectUri(_))));
    }
}
