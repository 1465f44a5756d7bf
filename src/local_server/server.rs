use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::{Router, routing::get};
use parking_lot::Mutex;
use tokio::net::TcpListener as TokioTcpListener;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

use crate::config::DEFAULT_AUTHORIZATION_TIMEOUT;
use crate::{AuthorizationResponse, OAuthError};

use super::RedirectTarget;
use super::http::{
    LocalServerState, callback_handler, fallback_handler, send_response, wait_for_response,
};

const SUCCESS_HTML: &str = include_str!("html/success.html");
const ERROR_HTML: &str = include_str!("html/error.html");

/// Waits for exactly one redirect on the callback path, then shuts down.
///
/// Every exit path (callback, timeout, server error) stops the server and drops
/// the socket before returning, so the port is free again afterwards.
#[derive(Debug, Clone)]
pub struct LocalServer {
    target: RedirectTarget,
    timeout: Duration,
}

impl LocalServer {
    pub fn new(redirect_uri: &str) -> Result<Self, OAuthError> {
        Ok(Self {
            target: RedirectTarget::parse(redirect_uri)?,
            timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fails if the redirect port is already taken.
    pub fn bind(&self) -> Result<TcpListener, OAuthError> {
        TcpListener::bind((self.target.host.as_str(), self.target.port)).map_err(OAuthError::from)
    }

    /// Blocking variant. Runs the server on its own thread and runtime, so it is
    /// safe to call from a blocking task inside another runtime.
    pub fn listen_with(&self, listener: TcpListener) -> Result<AuthorizationResponse, OAuthError> {
        let server = self.clone();
        let handle = thread::spawn(move || -> Result<AuthorizationResponse, OAuthError> {
            let runtime = Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(server.listen_with_async(listener))
        });

        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(OAuthError::InvalidResponse {
                message: "local server thread panicked".to_string(),
                body: String::new(),
            }),
        }
    }

    pub async fn listen_with_async(
        &self,
        listener: TcpListener,
    ) -> Result<AuthorizationResponse, OAuthError> {
        let (response_tx, response_rx) =
            oneshot::channel::<Result<AuthorizationResponse, OAuthError>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let response_tx = Arc::new(Mutex::new(Some(response_tx)));

        let state = LocalServerState {
            success_html: SUCCESS_HTML.to_string(),
            error_html: ERROR_HTML.to_string(),
            response_tx: response_tx.clone(),
        };

        let app = Router::new()
            .route(&self.target.path, get(callback_handler))
            .fallback(fallback_handler)
            .with_state(state);

        listener.set_nonblocking(true)?;
        let listener = TokioTcpListener::from_std(listener)?;
        tracing::debug!(
            addr = ?listener.local_addr().ok(),
            path = %self.target.path,
            "waiting for authorization callback"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        let response_tx_for_server = response_tx.clone();
        let server_handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                let error = OAuthError::InvalidResponse {
                    message: err.to_string(),
                    body: String::new(),
                };
                send_response(&response_tx_for_server, Err(error));
            }
        });

        let response = wait_for_response(response_rx, self.timeout).await;

        let _ = shutdown_tx.send(());
        let _ = server_handle.await;

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_on_free_port(timeout: Duration) -> (LocalServer, TcpListener, String) {
        let server = LocalServer::new("http://127.0.0.1:0/callback")
            .unwrap()
            .with_timeout(timeout);
        let listener = server.bind().unwrap();
        let addr = listener.local_addr().unwrap();
        (server, listener, format!("http://{addr}"))
    }

    #[tokio::test]
    async fn captures_code_from_callback() {
        let (server, listener, base) = server_on_free_port(Duration::from_secs(5));
        let wait = tokio::spawn(async move { server.listen_with_async(listener).await });

        let response = reqwest::get(format!("{base}/callback?code=abc&state=xyz"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("Authorization successful"));

        let captured = wait.await.unwrap().unwrap();
        assert_eq!(captured.code, "abc");
        assert_eq!(captured.state.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn other_paths_do_not_consume_the_callback() {
        let (server, listener, base) = server_on_free_port(Duration::from_secs(5));
        let wait = tokio::spawn(async move { server.listen_with_async(listener).await });

        let favicon = reqwest::get(format!("{base}/favicon.ico")).await.unwrap();
        assert_eq!(favicon.status(), 404);

        reqwest::get(format!("{base}/callback?code=later"))
            .await
            .unwrap();
        assert_eq!(wait.await.unwrap().unwrap().code, "later");
    }

    #[tokio::test]
    async fn callback_without_code_is_a_failure() {
        let (server, listener, base) = server_on_free_port(Duration::from_secs(5));
        let wait = tokio::spawn(async move { server.listen_with_async(listener).await });

        let response = reqwest::get(format!("{base}/callback?error=access_denied"))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert!(matches!(
            wait.await.unwrap(),
            Err(OAuthError::AuthorizationDenied { .. })
        ));
    }

    #[tokio::test]
    async fn times_out_and_releases_the_port() {
        let (server, listener, base) = server_on_free_port(Duration::from_millis(100));
        let addr = base.trim_start_matches("http://").to_string();

        let result = server.listen_with_async(listener).await;
        assert!(matches!(result, Err(OAuthError::LocalServerTimeout { .. })));
        assert!(std::net::TcpListener::bind(addr.as_str()).is_ok());
    }

    #[test]
    fn blocking_listen_runs_outside_a_runtime() {
        let (server, listener, _) = server_on_free_port(Duration::from_millis(50));
        let result = server.listen_with(listener);
        assert!(matches!(result, Err(OAuthError::LocalServerTimeout { .. })));
    }
}
