use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fib_connect::config::{
    CLIENT_ID_ENV, CLIENT_SECRET_ENV, LANGUAGE_ENV, REDIRECT_URI_ENV, TOKEN_FILE_ENV,
};
use fib_connect::envelope::respond;
use fib_connect::{
    ApiConfig, ApiError, ClientIdentity, FibContext, FibProvider, OAuthError, OAuthSession,
    TokenStore,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fib-connect",
    about = "Log in to the FIB API and fetch public or personal data as JSON."
)]
struct Cli {
    #[arg(long, env = CLIENT_ID_ENV, global = true, hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, env = CLIENT_SECRET_ENV, global = true, hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = REDIRECT_URI_ENV, global = true)]
    redirect_uri: Option<String>,

    #[arg(long, env = TOKEN_FILE_ENV, global = true)]
    token_file: Option<PathBuf>,

    #[arg(long, env = LANGUAGE_ENV, global = true, default_value = "en")]
    language: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authorize in the browser and save the token.
    Login {
        /// Requested scope; repeat for several. Defaults to `read`.
        #[arg(long = "scope")]
        scopes: Vec<String>,
        /// Seconds to wait for the browser redirect.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Delete the saved token.
    Logout,
    /// Show whether a token is saved and when it expires.
    Status,
    Courses,
    Course {
        id: String,
    },
    Exams,
    Professors,
    Classrooms,
    Terms,
    News,
    /// Your profile (requires login).
    Me,
    /// Your enrolled courses (requires login).
    MyCourses,
    /// Your timetable (requires login).
    MyClasses,
    /// Notices from your courses (requires login).
    MyNotices,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("authorization did not complete; finish the login in your browser and try again")]
    LoginFailed,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Login {
            ref scopes,
            timeout,
        } => login(&cli, scopes, Duration::from_secs(timeout)).await,
        Command::Logout => {
            stored_session(&cli)?.logout().await?;
            eprintln!("Logged out.");
            Ok(())
        }
        Command::Status => status(&cli).await,
        _ => fetch(&cli).await,
    }
}

async fn login(cli: &Cli, scopes: &[String], timeout: Duration) -> Result<(), CliError> {
    let session = session(cli).await?.with_authorization_timeout(timeout);
    if session.is_authenticated() {
        eprintln!(
            "Already authenticated. Token file: {}",
            session.store().path().display()
        );
        return Ok(());
    }

    let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
    let authorized = session
        .authorize_interactive(&scopes, |auth| {
            eprintln!("Opening browser for FIB authorization...");
            eprintln!("If the browser doesn't open, visit:\n{}", auth.authorization_url);
            if let Err(err) = webbrowser::open(&auth.authorization_url) {
                tracing::warn!(error = %err, "failed to open browser automatically");
            }
        })
        .await?;

    if !authorized {
        return Err(CliError::LoginFailed);
    }
    eprintln!(
        "Authentication successful. Token saved to {}",
        session.store().path().display()
    );
    Ok(())
}

async fn status(cli: &Cli) -> Result<(), CliError> {
    let session = stored_session(cli)?;
    let credential = session.credential();
    let output = json!({
        "authenticated": credential.is_some(),
        "token_file": session.store().path(),
        "expires_at": credential.as_ref().map(|c| c.expires_at),
        "stale": credential.as_ref().map(|c| c.is_stale()),
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    Ok(())
}

async fn fetch(cli: &Cli) -> Result<(), CliError> {
    let context = context(cli).await?;
    let client = context.client();
    let output = match &cli.command {
        Command::Courses => respond(client.courses().await),
        Command::Course { id } => respond(client.course(id).await),
        Command::Exams => respond(client.exams().await),
        Command::Professors => respond(client.professors().await),
        Command::Classrooms => respond(client.classrooms().await),
        Command::Terms => respond(client.academic_terms().await),
        Command::News => respond(client.news().await),
        Command::Me => respond(client.my_profile().await),
        Command::MyCourses => respond(client.my_courses().await),
        Command::MyClasses => respond(client.my_classes().await),
        Command::MyNotices => respond(client.my_notices().await),
        Command::Login { .. } | Command::Logout | Command::Status => return Ok(()),
    };
    println!("{output}");
    Ok(())
}

fn client_id(cli: &Cli) -> Result<String, OAuthError> {
    cli.client_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| OAuthError::Configuration(format!("{CLIENT_ID_ENV} is required")))
}

fn identity(cli: &Cli) -> Result<ClientIdentity, OAuthError> {
    let secret = cli.client_secret.clone().unwrap_or_default();
    let identity = ClientIdentity::new(client_id(cli)?, secret)?;
    Ok(identity.with_redirect_uri(
        cli.redirect_uri
            .clone()
            .unwrap_or_else(|| FibProvider::default_redirect_uri().to_string()),
    ))
}

fn store(cli: &Cli) -> TokenStore {
    cli.token_file.clone().map(TokenStore::new).unwrap_or_default()
}

async fn session(cli: &Cli) -> Result<OAuthSession, OAuthError> {
    OAuthSession::open(FibProvider, identity(cli)?, store(cli)).await
}

/// The saved credential as-is, with no refresh attempt.
fn stored_session(cli: &Cli) -> Result<OAuthSession, OAuthError> {
    OAuthSession::new(FibProvider, identity(cli)?, store(cli))
}

async fn context(cli: &Cli) -> Result<FibContext, ApiError> {
    let config = ApiConfig::new(client_id(cli)?).with_language(&cli.language);
    let identity = match identity(cli) {
        Ok(identity) => Some(identity),
        Err(OAuthError::Configuration(reason)) => {
            tracing::debug!(%reason, "oauth not configured, private endpoints disabled");
            None
        }
        Err(other) => return Err(other.into()),
    };
    Ok(FibContext::from_parts(config, identity, store(cli)).await?)
}
