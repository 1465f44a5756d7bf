mod fib;
mod provider;

pub use fib::FibProvider;
pub use provider::OAuthProvider;
