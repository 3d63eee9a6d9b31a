//! fundportal - command-line front-end for the fund-subscription portal.
//!
//! Register, log in, check the account balance, subscribe to funds and
//! cancel subscriptions. Tokens persist between runs in the configured
//! token store.

mod commands;
mod prompt;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fundportal_core::models::NotificationPreference;
use fundportal_core::{ApiError, Config, PortalClient};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name in cache directory
const LOG_FILE: &str = "fundportal.log";

#[derive(Parser)]
#[command(name = "fundportal")]
#[command(about = "Subscribe to investment funds from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config and FUNDPORTAL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session tokens
    Login {
        /// Username (defaults to the last one used)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create a new account
    Register {
        /// Accept the terms and conditions
        #[arg(long)]
        accept_terms: bool,
    },

    /// End the session on the backend and remove local tokens
    Logout,

    /// Show whether a session is active and who it belongs to
    Status,

    /// Show the account profile and balance
    Account,

    /// List funds available for subscription
    Funds,

    /// Subscribe to a fund
    Subscribe {
        /// Fund identifier
        fund_id: String,

        /// How to be notified: email or sms
        #[arg(short, long, default_value = "email")]
        notify: NotificationPreference,
    },

    /// Cancel a subscription
    Cancel {
        /// Subscription identifier
        subscription_id: String,
    },

    /// Show the subscription history
    Subscriptions {
        /// Only show subscriptions that can still be canceled
        #[arg(long)]
        active: bool,
    },

    /// Account balance and subscriptions in one view
    Dashboard,
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.cache_dir() {
        Ok(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    config.apply_overrides(cli.api_url.clone(), None);

    let _guard = init_tracing(&config);
    debug!(api = %config.api_base_url, "fundportal starting");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    config.validate()?;
    let store = config.token_store()?;
    let portal = PortalClient::from_config(&config, store)?;
    let state = portal.session().rehydrate();
    info!(%state, "Session checked");

    let output = commands::Output { json: cli.json };

    match cli.command {
        Commands::Login { username } => commands::login(&portal, &config, username).await,
        Commands::Register { accept_terms } => commands::register(&portal, accept_terms).await,
        Commands::Logout => commands::logout(&portal).await,
        Commands::Status => commands::status(&portal, &config),
        Commands::Account => commands::account(&portal, output).await,
        Commands::Funds => commands::funds(&portal, output).await,
        Commands::Subscribe { fund_id, notify } => {
            commands::subscribe(&portal, &fund_id, notify, output).await
        }
        Commands::Cancel { subscription_id } => {
            commands::cancel(&portal, &subscription_id, output).await
        }
        Commands::Subscriptions { active } => commands::subscriptions(&portal, active, output).await,
        Commands::Dashboard => commands::dashboard(&portal, output).await,
    }
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<ApiError>() {
        Some(api_error) if api_error.requires_login() => {
            eprintln!("{}", api_error.user_message());
            eprintln!("Run `fundportal login` to start a new session.");
        }
        Some(api_error) => {
            eprintln!("Error: {}", api_error.user_message());
            if let Some(fields) = api_error.field_errors() {
                for (field, messages) in fields {
                    eprintln!("  {}: {}", field, messages.join(", "));
                }
            }
        }
        None => eprintln!("Error: {:#}", e),
    }
}
