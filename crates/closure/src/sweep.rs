//! Automatic closure of stale tickets.

use std::sync::Arc;

use {
    chrono::{DateTime, Duration, Utc},
    tickets_common::{GuildId, TicketId},
    tickets_config::GuildSettings,
    tickets_store::TicketStore,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tickets_metrics::{counter, sweep as sweep_metrics};

use crate::coordinator::{CloseOutcome, CloseRequest, CloseSource, ClosureCoordinator};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub closed: Vec<TicketId>,
    pub already_closed: Vec<TicketId>,
    /// Ticket and rendered error.
    pub failed: Vec<(TicketId, String)>,
}

impl SweepReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.closed.len() + self.already_closed.len() + self.failed.len()
    }
}

pub struct AutocloseSweep {
    coordinator: Arc<ClosureCoordinator>,
    store: Arc<dyn TicketStore>,
    reason: String,
}

impl AutocloseSweep {
    pub fn new(coordinator: Arc<ClosureCoordinator>, store: Arc<dyn TicketStore>) -> Self {
        let reason = coordinator.config().autoclose_reason.clone();
        Self {
            coordinator,
            store,
            reason,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Open-time cutoff for the guild, `None` when autoclose is off.
    #[must_use]
    pub fn cutoff(settings: &GuildSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = i64::try_from(settings.autoclose_after_hours?).ok()?;
        Some(now - Duration::hours(hours))
    }

    /// Close every open, non-excluded ticket opened before `opened_before`,
    /// one at a time. A failing ticket is recorded and the sweep moves on.
    pub async fn run(
        &self,
        guild_id: GuildId,
        settings: &GuildSettings,
        opened_before: DateTime<Utc>,
    ) -> tickets_store::Result<SweepReport> {
        let candidates = self
            .store
            .list_autoclose_candidates(guild_id, opened_before)
            .await?;
        let bot = self.coordinator.bot_user_id();
        let mut report = SweepReport::default();

        #[cfg(feature = "metrics")]
        counter!(sweep_metrics::RUNS_TOTAL).increment(1);

        for ticket in candidates {
            let Some(channel_id) = ticket.channel_id else {
                warn!(%guild_id, ticket_id = %ticket.id, "autoclose candidate has no channel");
                report
                    .failed
                    .push((ticket.id, "ticket has no channel".to_string()));
                #[cfg(feature = "metrics")]
                counter!(sweep_metrics::TICKETS_TOTAL, "result" => "failed").increment(1);
                continue;
            };

            let request = CloseRequest {
                guild_id,
                channel_id,
                requester: bot,
                reason: Some(self.reason.clone()),
                source: CloseSource::Autoclose,
                bypass_permission_check: true,
            };

            let result = match self.coordinator.close(&request, settings).await {
                Ok(CloseOutcome::AlreadyClosed { .. }) => {
                    report.already_closed.push(ticket.id);
                    "already_closed"
                },
                Ok(_) => {
                    report.closed.push(ticket.id);
                    "closed"
                },
                Err(e) => {
                    warn!(%guild_id, ticket_id = %ticket.id, error = %e, "autoclose failed");
                    report.failed.push((ticket.id, e.to_string()));
                    "failed"
                },
            };
            debug!(%guild_id, ticket_id = %ticket.id, result, "autoclose candidate processed");
            #[cfg(feature = "metrics")]
            counter!(sweep_metrics::TICKETS_TOTAL, "result" => result).increment(1);
        }

        info!(
            %guild_id,
            closed = report.closed.len(),
            already_closed = report.already_closed.len(),
            failed = report.failed.len(),
            "autoclose sweep finished"
        );
        Ok(report)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{FailKind, GUILD, Harness},
    };

    fn sweep(harness: &Harness) -> AutocloseSweep {
        AutocloseSweep::new(Arc::new(harness.coordinator()), harness.store.clone())
    }

    #[test]
    fn cutoff_from_settings() {
        let now = Utc::now();
        let mut settings = GuildSettings::default();
        assert_eq!(AutocloseSweep::cutoff(&settings, now), None);

        settings.autoclose_after_hours = Some(24);
        assert_eq!(
            AutocloseSweep::cutoff(&settings, now),
            Some(now - Duration::hours(24))
        );
    }

    #[tokio::test]
    async fn closes_stale_tickets_as_the_bot() {
        let harness = Harness::new();
        harness.open_ticket(1, 300, 7, false);
        harness.open_ticket(2, 301, 8, false);

        let report = sweep(&harness)
            .run(GUILD, &harness.settings, Utc::now() - Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(report.closed, vec![TicketId::new(1), TicketId::new(2)]);
        let metadata = harness
            .store
            .inner()
            .get_close_metadata(GUILD, TicketId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metadata.closed_by, None);
        assert_eq!(
            metadata.reason.as_deref(),
            Some("Automatically closed due to inactivity")
        );
    }

    #[tokio::test]
    async fn skips_excluded_and_recent_tickets() {
        let harness = Harness::new();
        harness.open_ticket(1, 300, 7, false);
        harness.open_ticket(2, 301, 7, false);
        harness
            .store
            .inner()
            .exclude_from_autoclose(GUILD, TicketId::new(1))
            .await
            .unwrap();

        let report = sweep(&harness)
            .with_reason("stale")
            .run(GUILD, &harness.settings, Utc::now() - Duration::hours(72))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);

        let report = sweep(&harness)
            .run(GUILD, &harness.settings, Utc::now())
            .await
            .unwrap();
        assert_eq!(report.closed, vec![TicketId::new(2)]);
        assert!(harness.store.inner().ticket(GUILD, TicketId::new(1)).unwrap().open);
    }

    #[tokio::test]
    async fn continues_after_a_failure() {
        let harness = Harness::new();
        harness.open_ticket(1, 300, 7, false);
        harness.open_ticket(2, 301, 7, false);
        // Ticket 1's channel is unreadable.
        harness.gateway.fail_history_page(0, FailKind::Status(500));

        let report = sweep(&harness)
            .run(GUILD, &harness.settings, Utc::now())
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, TicketId::new(1));
        assert_eq!(report.closed, vec![TicketId::new(2)]);
        // The failed closure excluded its ticket from later sweeps.
        assert!(harness
            .store
            .inner()
            .is_excluded_from_autoclose(GUILD, TicketId::new(1))
            .await
            .unwrap());
        let next = sweep(&harness)
            .run(GUILD, &harness.settings, Utc::now())
            .await
            .unwrap();
        assert_eq!(next.total(), 0);
    }

    #[tokio::test]
    async fn ticket_without_channel_is_reported() {
        let harness = Harness::new();
        let mut ticket = harness.open_ticket(1, 300, 7, false);
        ticket.channel_id = None;
        harness.store.inner().insert_ticket(ticket);

        let report = sweep(&harness)
            .run(GUILD, &harness.settings, Utc::now())
            .await
            .unwrap();

        assert_eq!(report.failed, vec![(
            TicketId::new(1),
            "ticket has no channel".to_string()
        )]);
        assert!(harness.gateway.deleted_channels().is_empty());
    }
}
