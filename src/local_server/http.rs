use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{AuthorizationResponse, OAuthError};

type ResponseResult = Result<AuthorizationResponse, OAuthError>;
type ResponseSender = oneshot::Sender<ResponseResult>;
type ResponseReceiver = oneshot::Receiver<ResponseResult>;
pub(super) type SharedResponseSender = Arc<Mutex<Option<ResponseSender>>>;

#[derive(Clone)]
pub(super) struct LocalServerState {
    pub(super) success_html: String,
    pub(super) error_html: String,
    pub(super) response_tx: SharedResponseSender,
}

/// Delivers the first outcome; later ones are dropped.
pub(super) fn send_response(response_tx: &SharedResponseSender, response: ResponseResult) -> bool {
    match response_tx.lock().take() {
        Some(sender) => sender.send(response).is_ok(),
        None => false,
    }
}

pub(super) async fn callback_handler(
    State(state): State<LocalServerState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let LocalServerState {
        success_html,
        error_html,
        response_tx,
    } = state;

    let outcome = AuthorizationResponse::from_query(&query.unwrap_or_default());
    let succeeded = outcome.is_ok();
    if let Err(error) = &outcome {
        tracing::debug!(%error, "authorization callback carried no usable code");
    }

    if !send_response(&response_tx, outcome) {
        return (StatusCode::GONE, Html(error_html));
    }

    if succeeded {
        (StatusCode::OK, Html(success_html))
    } else {
        (StatusCode::BAD_REQUEST, Html(error_html))
    }
}

pub(super) async fn fallback_handler(State(state): State<LocalServerState>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(state.error_html))
}

pub(super) async fn wait_for_response(
    response_rx: ResponseReceiver,
    timeout: Duration,
) -> Result<AuthorizationResponse, OAuthError> {
    let result = tokio::time::timeout(timeout, response_rx)
        .await
        .map_err(|_| OAuthError::LocalServerTimeout { timeout })?;
    result.map_err(|_| OAuthError::InvalidResponse {
        message: "local server response channel closed".to_string(),
        body: String::new(),
    })?
}
