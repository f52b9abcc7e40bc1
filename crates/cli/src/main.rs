mod close_commands;
mod config_commands;
mod db_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tickets_config::TicketsConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tickets", about = "Tickets: support ticket closure and archival")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/tickets/).
    #[arg(long, global = true, env = "TICKETS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Close a ticket: capture its transcript, finalize the channel and
    /// notify the opener.
    Close(close_commands::CloseArgs),
    /// Delete a ticket channel without saving a transcript (admin only).
    ForceClose(close_commands::CloseArgs),
    /// Close every stale ticket in a guild.
    Autoclose(close_commands::AutocloseArgs),
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Explicit `--config` must load; discovery falls back to defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<TicketsConfig> {
    Ok(match path {
        Some(path) => tickets_config::load_config(path)?,
        None => tickets_config::discover_and_load(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tickets starting");

    match cli.command {
        Commands::Close(args) => {
            let config = load_config(cli.config.as_deref())?;
            close_commands::handle_close(config, args).await
        },
        Commands::ForceClose(args) => {
            let config = load_config(cli.config.as_deref())?;
            close_commands::handle_force_close(config, args).await
        },
        Commands::Autoclose(args) => {
            let config = load_config(cli.config.as_deref())?;
            close_commands::handle_autoclose(config, args).await
        },
        Commands::Db { action } => {
            let config = load_config(cli.config.as_deref())?;
            db_commands::handle_db(&config, action).await
        },
        Commands::Config { action } => config_commands::handle_config(cli.config.as_deref(), action),
    }
}
