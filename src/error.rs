use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid redirect uri: {0}")]
    InvalidRedirectUri(String),

    #[error("token endpoint returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("missing authorization code in callback url")]
    MissingAuthorizationCode,

    #[error("authorization denied by provider: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("state mismatch (expected={expected}, received={received})")]
    StateMismatch { expected: String, received: String },

    #[error("an interactive authorization is already in progress")]
    AuthorizationInProgress,

    #[cfg(feature = "local-server")]
    #[error("local server timed out after {timeout:?}")]
    LocalServerTimeout { timeout: std::time::Duration },
}

#[derive(Debug, Error)]
#[error("invalid {record}: field `{field}` {message}")]
pub struct ValidationError {
    pub record: &'static str,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(
        record: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            record,
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {body}")]
    Authentication { body: String },

    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("rate limit exceeded")]
    RateLimited { body: String },

    #[error("api error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json response: {message}")]
    InvalidJson { message: String, body: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("oauth error: {0}")]
    OAuth(OAuthError),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },
}

impl ApiError {
    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(error: OAuthError) -> Self {
        match error {
            OAuthError::AuthRequired => Self::AuthRequired,
            other => Self::OAuth(other),
        }
    }
}
