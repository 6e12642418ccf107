//! ClubHub CLI - sign in against the hosted backend and check where the
//! session resolver would send the user.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and report the resolved role and landing route
//! clubhub login -e student@campus.edu
//!
//! # Sign in, then revoke the session on the backend instead of only
//! # dropping it locally
//! clubhub login -e student@campus.edu --revoke
//!
//! # Show the effective configuration (secrets redacted)
//! clubhub config
//! ```
//!
//! # Commands
//!
//! - `login` - Sign in and resolve the session
//! - `config` - Show effective configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use clubhub_client::ClientConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "clubhub")]
#[command(author, version, about = "ClubHub session tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and report the resolved role and landing route
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "CLUBHUB_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Revoke the session on the backend when done
        #[arg(long)]
        revoke: bool,

        /// Seconds to wait for the session to resolve
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
    },
    /// Show effective configuration
    Config,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry: errors and warnings become events,
/// info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clubhub_client=info,clubhub_cli=info".into());

    // JSON for log shippers, text for terminals
    let json = std::env::var_os("CLUBHUB_LOG_JSON").is_some();
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login {
            email,
            password,
            revoke,
            wait_secs,
        } => {
            let options = commands::login::LoginOptions {
                revoke,
                wait: std::time::Duration::from_secs(wait_secs),
            };
            commands::login::run(config, &email, password, options).await?;
        }
        Commands::Config => commands::config::show(config),
    }
    Ok(())
}
