use axum::Router;

use crate::OAuthProvider;

/// Serves `router` on an ephemeral local port and returns its base url.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Identity provider whose endpoints live on a local fake.
#[derive(Debug, Clone)]
pub(crate) struct TestProvider {
    authorize_url: String,
    token_url: String,
}

impl TestProvider {
    pub(crate) fn new(base: &str) -> Self {
        Self {
            authorize_url: format!("{base}/o/authorize/"),
            token_url: format!("{base}/o/token/"),
        }
    }
}

impl OAuthProvider for TestProvider {
    fn id(&self) -> &str {
        "test"
    }

    fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    fn token_url(&self) -> &str {
        &self.token_url
    }

    fn default_scopes(&self) -> &[&'static str] {
        &["read"]
    }
}
