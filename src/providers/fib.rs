use crate::OAuthProvider;

const AUTHORIZE_URL: &str = "https://api.fib.upc.edu/v2/o/authorize/";
const TOKEN_URL: &str = "https://api.fib.upc.edu/v2/o/token/";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8085/callback";
const DEFAULT_SCOPES: &[&str] = &["read"];

/// The FIB identity provider (django-oauth-toolkit behind `api.fib.upc.edu`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FibProvider;

impl OAuthProvider for FibProvider {
    fn id(&self) -> &str {
        "fib"
    }

    fn authorize_url(&self) -> &str {
        AUTHORIZE_URL
    }

    fn token_url(&self) -> &str {
        TOKEN_URL
    }

    fn default_scopes(&self) -> &[&'static str] {
        DEFAULT_SCOPES
    }
}

impl FibProvider {
    pub fn default_redirect_uri() -> &'static str {
        DEFAULT_REDIRECT_URI
    }
}
