//! CLI entry point for the booking backend client.
//!
//! Provides subcommands for logging in and out, inspecting the stored
//! session, sending arbitrary authenticated requests, and checking which
//! views the current session may open.

use anyhow::{Context, Result};
use booking_client::config::ClientConfig;
use booking_client::fetch::{ApiRequest, AuthenticatedHttpClient};
use booking_client::infra::backend::BackendClient;
use booking_client::navigation::{LoginRedirect, Navigator, guard_route};
use booking_client::services::account_api::{AccountApi, RegisterRequest, UserType};
use booking_client::session::Session;
use clap::{Parser, Subcommand};
use reqwest::Method;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "booking_client")]
#[command(about = "A command-line client for the booking marketplace backend", long_about = None)]
struct Cli {
    /// Backend origin, e.g. http://127.0.0.1:8000/api/ (overrides BOOKING_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory holding the persisted session (overrides BOOKING_SESSION_DIR)
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Username or email address
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account (does not log in)
    Register {
        username: String,

        #[arg(long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Repeat of the password
        #[arg(long)]
        password_confirm: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long, default_value = "")]
        phone: String,

        /// client, proprietaire_vehicule, proprietaire_residence or proprietaire
        #[arg(long, default_value = "client")]
        user_type: String,

        #[arg(long)]
        wave_number: Option<String>,

        #[arg(long)]
        orange_money_number: Option<String>,

        #[arg(long)]
        mtn_money_number: Option<String>,

        #[arg(long)]
        moov_money_number: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Fetch the logged-in user's profile from the backend
    Whoami,
    /// Show what the stored session holds, without contacting the backend
    Status,
    /// Send an authenticated request and print the response body
    Request {
        /// HTTP method (GET, POST, PATCH, DELETE, ...)
        method: String,

        /// Path relative to the backend origin, e.g. bookings/5/
        path: String,

        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Show whether the current session may open a front-end view
    Route {
        /// View path, e.g. /owner/bookings
        path: String,
    },
}

/// A terminal has no views; a lost session just tells the user to log in again.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn redirect(&self, to: &str) {
        warn!(target_view = to, "Session expired, run `booking_client login` again");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/booking_client.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("booking_client.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(dir) = cli.session_dir.clone() {
        config = config.with_session_dir(Some(dir));
    }

    let session = Arc::new(open_session(&config).await?);

    let http = AuthenticatedHttpClient::from_config(&config, session.clone())?
        .with_auth_failure_hook(Arc::new(LoginRedirect::new(TerminalNavigator)));
    let backend = BackendClient::new(Arc::new(http));

    match cli.command {
        Commands::Login { username, password } => {
            let auth = backend.login(&username, &password).await?;
            info!(
                user_id = auth.user.id,
                user = %auth.user.display_name(),
                user_type = auth.user.user_type.as_deref().unwrap_or("client"),
                "Login successful"
            );
        }
        Commands::Register {
            username,
            email,
            password,
            password_confirm,
            first_name,
            last_name,
            phone,
            user_type,
            wave_number,
            orange_money_number,
            mtn_money_number,
            moov_money_number,
        } => {
            let request = RegisterRequest {
                username,
                email,
                password,
                password_confirm,
                first_name,
                last_name,
                phone,
                user_type: user_type.parse::<UserType>()?,
                wave_number,
                orange_money_number,
                mtn_money_number,
                moov_money_number,
            };
            let auth = backend.register(&request).await?;
            info!(user_id = auth.user.id, "Registration successful, log in to continue");
        }
        Commands::Logout => {
            backend.logout().await?;
        }
        Commands::Whoami => {
            let user = backend.current_user().await.map_err(with_login_hint)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Status => {
            let state = session.snapshot().await;
            info!(
                base_url = %config.base_url,
                has_access_token = state.access_token.is_some(),
                has_refresh_token = state.refresh_token.is_some(),
                user = state.user.as_ref().map(|u| u.username.as_str()).unwrap_or("-"),
                "Session status"
            );
        }
        Commands::Request { method, path, data } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method '{method}'"))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: serde_json::Value =
                    serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.json(&body)?;
            }

            let response = backend.http().send(request).await.map_err(with_login_hint)?;
            let status = response.status();
            let body = response.text().await?;
            info!(status = status.as_u16(), bytes = body.len(), "Response received");
            println!("{body}");
        }
        Commands::Route { path } => {
            let has_token = session.is_authenticated().await;
            let decision = guard_route(&path, has_token);
            info!(path = %path, has_token, decision = ?decision, "Route decision");
            match decision.target() {
                Some(target) => println!("redirect {target}"),
                None => println!("proceed"),
            }
        }
    }

    Ok(())
}

async fn open_session(config: &ClientConfig) -> Result<Session> {
    match &config.session_dir {
        Some(dir) => Session::open_dir(dir)
            .await
            .with_context(|| format!("failed to open session in {}", dir.display())),
        None => Ok(Session::in_memory()),
    }
}

fn with_login_hint(err: booking_client::ClientError) -> anyhow::Error {
    if err.is_unauthenticated() {
        anyhow::Error::new(err).context("not logged in or session expired; run `booking_client login`")
    } else {
        anyhow::Error::new(err)
    }
}
