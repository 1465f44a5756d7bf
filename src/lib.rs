//! OAuth 2.0 session management and a typed, paginated client for the FIB
//! (Facultat d'Informàtica de Barcelona) REST API.
//!
//! [`OAuthSession`] owns the user's credential: it loads it from a
//! [`TokenStore`], refreshes it before it expires, and runs the browser
//! authorization-code flow through a single-use local callback listener.
//! [`FibClient`] issues public and bearer-authenticated requests on top of it,
//! walks paginated collections and maps HTTP failures to [`ApiError`].

mod client;
pub mod config;
mod context;
pub mod credential;
pub mod envelope;
mod error;
#[cfg(feature = "local-server")]
mod local_server;
pub mod models;
mod providers;
mod session;
mod state;
mod store;
#[cfg(test)]
mod test_support;

pub use client::FibClient;
pub use config::{ApiConfig, ClientIdentity};
pub use context::FibContext;
pub use credential::{AuthorizationRequest, AuthorizationResponse, Credential, TokenResponse};
pub use error::{ApiError, OAuthError, ValidationError};
#[cfg(feature = "local-server")]
pub use local_server::LocalServer;
pub use providers::{FibProvider, OAuthProvider};
pub use session::OAuthSession;
pub use store::TokenStore;
