use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{Client, StatusCode, header::ACCEPT};
use url::Url;

use crate::config::{DEFAULT_AUTHORIZATION_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::credential::{Clock, system_clock};
use crate::state::generate_state;
use crate::{
    AuthorizationRequest, ClientIdentity, Credential, OAuthError, OAuthProvider, TokenResponse,
    TokenStore,
};
#[cfg(feature = "local-server")]
use crate::{AuthorizationResponse, LocalServer};

/// Owns the one credential of the process and hands out bearer tokens.
///
/// The in-memory credential is the source of truth; the [`TokenStore`] only
/// mirrors it. Refreshes are serialized so a rotating refresh token is never
/// spent twice, and only one interactive authorization may run at a time.
pub struct OAuthSession {
    provider: Box<dyn OAuthProvider>,
    identity: ClientIdentity,
    store: TokenStore,
    http: Client,
    clock: Clock,
    authorization_timeout: Duration,
    credential: Mutex<Option<Credential>>,
    refresh_lock: tokio::sync::Mutex<()>,
    authorize_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSession")
            .field("provider", &self.provider.id())
            .field("client_id", &self.identity.client_id)
            .field("redirect_uri", &self.identity.redirect_uri)
            .field("token_file", &self.store.path())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl OAuthSession {
    /// Loads any persisted credential as-is. Use [`open`](Self::open) to also
    /// refresh a stale one.
    pub fn new(
        provider: impl OAuthProvider + 'static,
        identity: ClientIdentity,
        store: TokenStore,
    ) -> Result<Self, OAuthError> {
        let http = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        let credential = store.load();
        if credential.is_some() {
            tracing::debug!(path = %store.path().display(), "loaded persisted credential");
        }

        Ok(Self {
            provider: Box::new(provider),
            identity,
            store,
            http,
            clock: system_clock,
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            credential: Mutex::new(credential),
            refresh_lock: tokio::sync::Mutex::new(()),
            authorize_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub async fn open(
        provider: impl OAuthProvider + 'static,
        identity: ClientIdentity,
        store: TokenStore,
    ) -> Result<Self, OAuthError> {
        let session = Self::new(provider, identity, store)?;
        session.restore().await;
        Ok(session)
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// True when a credential is held, fresh or not.
    pub fn is_authenticated(&self) -> bool {
        self.credential.lock().is_some()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential.lock().clone()
    }

    /// Refreshes a loaded credential once if it is already stale. A failed
    /// refresh leaves the session unauthenticated.
    pub async fn restore(&self) {
        let Some(current) = self.credential() else {
            return;
        };
        if !current.is_stale_at(self.now()) || !current.has_refresh_token() {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        if let Err(error) = self.refresh_locked(&current).await {
            tracing::debug!(%error, "persisted credential could not be refreshed");
        }
    }

    pub async fn get_access_token(&self) -> Result<String, OAuthError> {
        let current = self.credential().ok_or(OAuthError::AuthRequired)?;
        if !current.is_stale_at(self.now()) {
            return Ok(current.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed (or cleared) while we waited.
        let current = self.credential().ok_or(OAuthError::AuthRequired)?;
        if !current.is_stale_at(self.now()) {
            return Ok(current.access_token);
        }

        self.refresh_locked(&current)
            .await
            .map(|credential| credential.access_token)
    }

    pub fn authorization_url(&self, scopes: &[&str]) -> Result<AuthorizationRequest, OAuthError> {
        let state = generate_state()?;
        let scope = if scopes.is_empty() {
            self.provider.default_scopes().join(" ")
        } else {
            scopes.join(" ")
        };

        let mut url = Url::parse(self.provider.authorize_url())?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.provider.authorize_params() {
                pairs.append_pair(&key, &value);
            }
            pairs.append_pair("client_id", &self.identity.client_id);
            pairs.append_pair("redirect_uri", &self.identity.redirect_uri);
            pairs.append_pair("response_type", "code");
            pairs.append_pair("scope", &scope);
            pairs.append_pair("state", &state);
        }

        Ok(AuthorizationRequest {
            authorization_url: url.to_string(),
            state,
            scope,
        })
    }

    /// Runs the browser login: binds the redirect listener, hands the
    /// authorization URL to `on_authorize`, waits for the callback and exchanges
    /// the code.
    ///
    /// Returns `Ok(false)` when no usable callback arrives in time, the callback
    /// carries no code or an error, or the state does not match. A rejected code
    /// exchange is an error.
    #[cfg(feature = "local-server")]
    pub async fn authorize_interactive<F>(
        &self,
        scopes: &[&str],
        on_authorize: F,
    ) -> Result<bool, OAuthError>
    where
        F: FnOnce(&AuthorizationRequest),
    {
        let _guard = self
            .authorize_lock
            .try_lock()
            .map_err(|_| OAuthError::AuthorizationInProgress)?;

        let auth = self.authorization_url(scopes)?;
        let server = LocalServer::new(&self.identity.redirect_uri)?
            .with_timeout(self.authorization_timeout);
        let listener = server.bind()?;

        let handle = tokio::task::spawn_blocking(move || server.listen_with(listener));

        on_authorize(&auth);

        let outcome = handle.await.map_err(|err| OAuthError::InvalidResponse {
            message: err.to_string(),
            body: String::new(),
        })?;

        match outcome {
            Ok(response) => {
                if let Err(error) = check_state(&response, &auth.state) {
                    tracing::warn!(%error, "discarding authorization callback");
                    return Ok(false);
                }
                self.exchange_code(&response.code).await?;
                Ok(true)
            }
            Err(
                error @ (OAuthError::LocalServerTimeout { .. }
                | OAuthError::MissingAuthorizationCode
                | OAuthError::AuthorizationDenied { .. }),
            ) => {
                tracing::warn!(%error, "interactive authorization did not complete");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Trades an authorization code for a new credential, replacing any held one.
    pub async fn exchange_code(&self, code: &str) -> Result<(), OAuthError> {
        let _guard = self.refresh_lock.lock().await;
        let now = self.now();
        let payload = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.identity.redirect_uri.clone()),
        ];

        let response = self.send_token_request(payload).await?;
        let credential = Credential::from_token_response(response, now, "");
        self.replace(credential);
        tracing::info!("authorization code exchanged for a new credential");
        Ok(())
    }

    /// Forgets the credential in memory and on disk. Idempotent. Waits for an
    /// in-flight refresh so it cannot bring the credential back.
    pub async fn logout(&self) -> Result<(), OAuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.credential.lock().take();
        self.store.clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Must be called with `refresh_lock` held; every write to the credential
    /// happens under that lock.
    async fn refresh_locked(&self, current: &Credential) -> Result<Credential, OAuthError> {
        if !current.has_refresh_token() {
            tracing::info!("credential is stale and has no refresh token");
            self.forget();
            return Err(OAuthError::AuthRequired);
        }

        let now = self.now();
        let payload = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), current.refresh_token.clone()),
        ];

        match self.send_token_request(payload).await {
            Ok(response) => {
                let credential =
                    Credential::from_token_response(response, now, &current.refresh_token);
                self.replace(credential.clone());
                tracing::info!(expires_at = credential.expires_at, "access token refreshed");
                Ok(credential)
            }
            Err(error) => {
                tracing::warn!(%error, "token refresh failed, clearing credential");
                self.forget();
                Err(OAuthError::AuthRequired)
            }
        }
    }

    async fn send_token_request(
        &self,
        mut payload: Vec<(String, String)>,
    ) -> Result<TokenResponse, OAuthError> {
        payload.extend(self.provider.token_params());

        let response = self
            .http
            .post(self.provider.token_url())
            .basic_auth(&self.identity.client_id, Some(&self.identity.client_secret))
            .header(ACCEPT, "application/json")
            .form(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(OAuthError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| OAuthError::InvalidResponse {
            message: err.to_string(),
            body,
        })
    }

    fn replace(&self, credential: Credential) {
        if let Err(error) = self.store.save(&credential) {
            tracing::warn!(
                %error,
                path = %self.store.path().display(),
                "failed to persist credential"
            );
        }
        *self.credential.lock() = Some(credential);
    }

    fn forget(&self) {
        self.credential.lock().take();
        if let Err(error) = self.store.clear() {
            tracing::warn!(
                %error,
                path = %self.store.path().display(),
                "failed to delete token file"
            );
        }
    }

    fn now(&self) -> f64 {
        (self.clock)()
    }
}

#[cfg(feature = "local-server")]
fn check_state(response: &AuthorizationResponse, expected: &str) -> Result<(), OAuthError> {
    match response.state.as_deref() {
        Some(received) if received == expected => Ok(()),
        received => Err(OAuthError::StateMismatch {
            expected: expected.to_string(),
            received: received.unwrap_or_default().to_string(),
        }),
    }
}
