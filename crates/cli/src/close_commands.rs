use std::sync::Arc;

use {
    anyhow::{Context, bail},
    chrono::{Duration, Utc},
    clap::{Args, ValueEnum},
    tickets_channels::{ChannelGateway, DmChannelCache},
    tickets_closure::{
        AutocloseSweep, CloseOutcome, CloseRequest, CloseSource, ClosureCoordinator,
        DirectNotification, RolePermissions,
    },
    tickets_common::{ChannelId, GuildId, UserId},
    tickets_config::TicketsConfig,
    tickets_discord::DiscordRest,
    tickets_metrics::{MetricsHandle, MetricsRecorderConfig, init_metrics},
    tickets_store::store_sqlite::SqliteTicketStore,
    tracing::debug,
};

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Command,
    Button,
    Dashboard,
}

impl From<SourceArg> for CloseSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Command => Self::Command,
            SourceArg::Button => Self::Button,
            SourceArg::Dashboard => Self::Dashboard,
        }
    }
}

#[derive(Args)]
pub struct CloseArgs {
    /// Guild id.
    #[arg(long)]
    guild: GuildId,
    /// Ticket channel id.
    #[arg(long)]
    channel: ChannelId,
    /// User requesting the closure. Omit for a system closure by the bot,
    /// which skips the permission check.
    #[arg(long)]
    requester: Option<UserId>,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long, value_enum, default_value_t = SourceArg::Command)]
    source: SourceArg,
    /// Skip the permission check.
    #[arg(long, default_value_t = false)]
    bypass_permissions: bool,
}

#[derive(Args)]
pub struct AutocloseArgs {
    /// Guild id.
    #[arg(long)]
    guild: GuildId,
    /// Close tickets opened more than this many hours ago (overrides the
    /// guild's `autoclose_after_hours`).
    #[arg(long)]
    older_than_hours: Option<u64>,
    /// Reason recorded on each closed ticket.
    #[arg(long)]
    reason: Option<String>,
}

/// Everything a closure command needs, wired from config.
struct Runtime {
    config: TicketsConfig,
    store: Arc<SqliteTicketStore>,
    coordinator: Arc<ClosureCoordinator>,
    metrics: Option<MetricsHandle>,
}

impl Runtime {
    async fn build(config: TicketsConfig) -> anyhow::Result<Self> {
        if !config.discord.has_token() {
            bail!("discord.token is not set; add it to the config, e.g. token = \"${{DISCORD_TOKEN}}\"");
        }

        let metrics = if config.metrics.enabled {
            Some(init_metrics(MetricsRecorderConfig {
                enabled: true,
                global_labels: Vec::new(),
            })?)
        } else {
            None
        };

        let store = Arc::new(
            SqliteTicketStore::connect(&config.database.url, config.database.max_connections)
                .await
                .with_context(|| format!("failed to open {}", config.database.url))?,
        );
        let gateway: Arc<dyn ChannelGateway> = Arc::new(
            DiscordRest::connect(&config.discord)
                .await
                .context("failed to reach the discord API")?,
        );
        let archive = tickets_archive::from_config(&config.archive)?;
        // A one-shot process has not observed any direct channels, so
        // openers are not messaged from the command line.
        let dm_cache = Arc::new(DmChannelCache::new());

        let coordinator = Arc::new(ClosureCoordinator::new(
            store.clone(),
            gateway.clone(),
            archive,
            Arc::new(RolePermissions::new(gateway)),
            dm_cache,
            config.closure.clone(),
        ));

        Ok(Self {
            config,
            store,
            coordinator,
            metrics,
        })
    }

    fn request(&self, args: CloseArgs) -> CloseRequest {
        let system = args.requester.is_none();
        CloseRequest {
            guild_id: args.guild,
            channel_id: args.channel,
            requester: args
                .requester
                .unwrap_or_else(|| self.coordinator.bot_user_id()),
            reason: args.reason,
            source: args.source.into(),
            bypass_permission_check: args.bypass_permissions || system,
        }
    }

    fn finish(&self) {
        if let Some(handle) = &self.metrics {
            let rendered = handle.render();
            if !rendered.is_empty() {
                debug!(metrics = %rendered, "metrics snapshot");
            }
        }
    }
}

pub async fn handle_close(config: TicketsConfig, args: CloseArgs) -> anyhow::Result<()> {
    let runtime = Runtime::build(config).await?;
    let settings = runtime.config.guild_settings(args.guild);
    let request = runtime.request(args);

    let outcome = runtime.coordinator.close(&request, &settings).await;
    runtime.finish();

    match outcome? {
        CloseOutcome::Closed { ticket_id, notify } => {
            println!("Closed ticket #{ticket_id}.");
            if let Some(record) = notify.archive_message {
                println!("  summary posted in channel {}", record.channel_id);
            }
            match notify.direct {
                DirectNotification::Sent { feedback_offered } => {
                    println!("  opener notified (feedback requested: {feedback_offered})");
                },
                DirectNotification::SkippedSystemOpener
                | DirectNotification::SkippedNoCachedChannel => {
                    println!("  opener not notified");
                },
            }
        },
        CloseOutcome::AlreadyClosed { ticket_id } => {
            println!("Ticket #{ticket_id} is already closed.");
        },
        CloseOutcome::ChannelMissing { ticket_id } => {
            println!("Ticket #{ticket_id} closed; its channel no longer exists.");
        },
        CloseOutcome::Untracked {
            channel_id,
            transcript,
        } => {
            println!("Deleted untracked ticket channel {channel_id}.");
            if let Some(reference) = transcript {
                println!("  transcript stored at {}", reference.location);
            }
        },
    }
    Ok(())
}

pub async fn handle_force_close(config: TicketsConfig, args: CloseArgs) -> anyhow::Result<()> {
    let runtime = Runtime::build(config).await?;
    let settings = runtime.config.guild_settings(args.guild);
    let request = runtime.request(args);

    let closed = runtime.coordinator.force_close(&request, &settings).await;
    runtime.finish();

    match closed? {
        Some(ticket_id) => println!("Force closed ticket #{ticket_id}."),
        None => println!("Deleted untracked ticket channel {}.", request.channel_id),
    }
    Ok(())
}

pub async fn handle_autoclose(config: TicketsConfig, args: AutocloseArgs) -> anyhow::Result<()> {
    let runtime = Runtime::build(config).await?;
    let settings = runtime.config.guild_settings(args.guild);
    let now = Utc::now();

    let cutoff = match args.older_than_hours {
        Some(hours) => now - Duration::hours(i64::try_from(hours)?),
        None => match AutocloseSweep::cutoff(&settings, now) {
            Some(cutoff) => cutoff,
            None => {
                println!("Autoclose is disabled for guild {}.", args.guild);
                return Ok(());
            },
        },
    };

    let mut sweep = AutocloseSweep::new(runtime.coordinator.clone(), runtime.store.clone());
    if let Some(reason) = args.reason {
        sweep = sweep.with_reason(reason);
    }

    let report = sweep.run(args.guild, &settings, cutoff).await;
    runtime.finish();
    let report = report?;

    println!(
        "Autoclose: {} closed, {} already closed, {} failed.",
        report.closed.len(),
        report.already_closed.len(),
        report.failed.len()
    );
    for (ticket_id, error) in &report.failed {
        println!("  #{ticket_id}: {error}");
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        close: CloseArgs,
    }

    #[test]
    fn parses_snowflakes_and_source() {
        let parsed = Harness::try_parse_from([
            "tickets",
            "--guild",
            "5",
            "--channel",
            "1150000000000000000",
            "--source",
            "dashboard",
            "--reason",
            "done",
        ])
        .unwrap();

        assert_eq!(parsed.close.guild, GuildId::new(5));
        assert_eq!(parsed.close.channel, ChannelId::new(1_150_000_000_000_000_000));
        assert!(parsed.close.requester.is_none());
        assert!(matches!(
            CloseSource::from(parsed.close.source),
            CloseSource::Dashboard
        ));
    }

    #[test]
    fn rejects_bad_snowflake() {
        assert!(Harness::try_parse_from(["tickets", "--guild", "abc", "--channel", "1"]).is_err());
    }
}
