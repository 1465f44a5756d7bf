use std::sync::Arc;

use crate::config::token_file_from_env;
use crate::{
    ApiConfig, ApiError, ClientIdentity, FibClient, FibProvider, OAuthError, OAuthSession,
    TokenStore,
};

/// Everything a tool layer needs, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct FibContext {
    client: FibClient,
}

impl FibContext {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }

    /// Without an identity the context is public-only and private calls fail
    /// with [`ApiError::AuthRequired`].
    pub async fn from_parts(
        config: ApiConfig,
        identity: Option<ClientIdentity>,
        store: TokenStore,
    ) -> Result<Self, ApiError> {
        let mut client = FibClient::new(config)?;
        if let Some(identity) = identity {
            let session = OAuthSession::open(FibProvider, identity, store).await?;
            client = client.with_session(Arc::new(session));
        }
        Ok(Self::new(client))
    }

    /// Reads `FIB_CLIENT_ID` (required), `FIB_CLIENT_SECRET`, `FIB_REDIRECT_URI`,
    /// `FIB_TOKEN_FILE` and `FIB_LANGUAGE`.
    pub async fn from_env() -> Result<Self, ApiError> {
        let config = ApiConfig::from_env()?;
        let identity = match ClientIdentity::from_env() {
            Ok(identity) => Some(identity),
            Err(OAuthError::Configuration(reason)) => {
                tracing::debug!(%reason, "oauth not configured, private endpoints disabled");
                None
            }
            Err(other) => return Err(other.into()),
        };
        let store = token_file_from_env()
            .map(TokenStore::new)
            .unwrap_or_default();
        Self::from_parts(config, identity, store).await
    }

    pub fn client(&self) -> &FibClient {
        &self.client
    }

    pub fn session(&self) -> Option<&Arc<OAuthSession>> {
        self.client.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_authenticated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Credential;

    #[tokio::test]
    async fn public_only_context_has_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let context = FibContext::from_parts(
            ApiConfig::new("app-id"),
            None,
            TokenStore::new(dir.path().join("token.json")),
        )
        .await
        .unwrap();
        assert!(context.session().is_none());
        assert!(!context.is_authenticated());
    }

    #[tokio::test]
    async fn context_loads_persisted_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store
            .save(&Credential {
                access_token: "A".to_string(),
                refresh_token: "R".to_string(),
                expires_at: crate::credential::system_clock() + 3600.0,
                token_type: "Bearer".to_string(),
            })
            .unwrap();

        let identity = ClientIdentity::new("app-id", "secret").unwrap();
        let context = FibContext::from_parts(ApiConfig::new("app-id"), Some(identity), store)
            .await
            .unwrap();
        assert!(context.is_authenticated());
        assert_eq!(
            context.session().unwrap().get_access_token().await.unwrap(),
            "A"
        );
    }
}
