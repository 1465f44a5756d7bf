/// Endpoints and defaults of an OAuth 2.0 identity provider.
pub trait OAuthProvider: Send + Sync {
    fn id(&self) -> &str;
    fn authorize_url(&self) -> &str;
    fn token_url(&self) -> &str;
    fn default_scopes(&self) -> &[&'static str];

    fn authorize_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn token_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
