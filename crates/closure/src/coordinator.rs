//! The closure workflow.

use std::sync::Arc;

use {
    chrono::Utc,
    tickets_archive::{ArchiveReference, TranscriptArchive},
    tickets_channels::{
        ChannelEdit, ChannelGateway, DirectChannelCache, Embed, EmbedField, OutgoingMessage,
    },
    tickets_common::{ChannelId, GuildId, PermissionLevel, TicketId, UserId},
    tickets_config::{ClosureConfig, GuildSettings},
    tickets_store::{CloseMetadata, Ticket, TicketStore},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use tickets_metrics::{closure as closure_metrics, counter, histogram};

use crate::{
    error::{CloseError, ClosureStage, Result},
    guard::ExclusionGuard,
    notifier::{ArchiveNotifier, NotifyError, NotifyRequest, NotifySummary},
    permissions::PermissionCheck,
    summary::SUCCESS_COLOR,
    transcript::{Transcript, TranscriptCollector},
};

/// Where a closure request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseSource {
    Command,
    Button,
    /// The web dashboard, which may refer to tickets whose channel is gone.
    Dashboard,
    Autoclose,
}

impl CloseSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Button => "button",
            Self::Dashboard => "dashboard",
            Self::Autoclose => "autoclose",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloseRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub requester: UserId,
    pub reason: Option<String>,
    pub source: CloseSource,
    pub bypass_permission_check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed {
        ticket_id: TicketId,
        notify: NotifySummary,
    },
    /// Closed earlier, or by a concurrent attempt that won the race.
    AlreadyClosed { ticket_id: TicketId },
    /// Dashboard request for a ticket whose channel no longer exists; only
    /// the store was updated.
    ChannelMissing { ticket_id: TicketId },
    /// Channel in an allowed category without a ticket record. Its history
    /// was archived under the channel id when transcripts are enabled, then
    /// the channel was deleted. Nothing was written to the ticket store.
    Untracked {
        channel_id: ChannelId,
        transcript: Option<ArchiveReference>,
    },
}

impl CloseOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::AlreadyClosed { .. } => "already_closed",
            Self::ChannelMissing { .. } => "channel_missing",
            Self::Untracked { .. } => "untracked",
        }
    }
}

/// Entry point for closing tickets.
///
/// Runs one closure as a single sequential unit of work. Concurrent attempts
/// on the same ticket are settled by the store's conditional close: exactly
/// one of them finalizes the channel and notifies.
pub struct ClosureCoordinator {
    store: Arc<dyn TicketStore>,
    gateway: Arc<dyn ChannelGateway>,
    archive: Arc<dyn TranscriptArchive>,
    permissions: Arc<dyn PermissionCheck>,
    notifier: ArchiveNotifier,
    config: ClosureConfig,
}

impl ClosureCoordinator {
    pub fn new(
        store: Arc<dyn TicketStore>,
        gateway: Arc<dyn ChannelGateway>,
        archive: Arc<dyn TranscriptArchive>,
        permissions: Arc<dyn PermissionCheck>,
        dm_cache: Arc<dyn DirectChannelCache>,
        config: ClosureConfig,
    ) -> Self {
        let notifier = ArchiveNotifier::new(
            gateway.clone(),
            store.clone(),
            dm_cache,
            permissions.clone(),
            config.clone(),
        );
        Self {
            store,
            gateway,
            archive,
            permissions,
            notifier,
            config,
        }
    }

    #[must_use]
    pub fn bot_user_id(&self) -> UserId {
        self.gateway.bot_user_id()
    }

    #[must_use]
    pub fn config(&self) -> &ClosureConfig {
        &self.config
    }

    pub async fn close(
        &self,
        request: &CloseRequest,
        settings: &GuildSettings,
    ) -> Result<CloseOutcome> {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let result = self.close_inner(request, settings).await;

        match &result {
            Ok(outcome) => {
                info!(
                    guild_id = %request.guild_id,
                    channel_id = %request.channel_id,
                    source = request.source.as_str(),
                    outcome = outcome.as_str(),
                    "closure finished"
                );
                #[cfg(feature = "metrics")]
                counter!(closure_metrics::CLOSURES_TOTAL, "outcome" => outcome.as_str(), "source" => request.source.as_str())
                    .increment(1);
            },
            Err(e) if e.is_user_error() => {
                debug!(
                    guild_id = %request.guild_id,
                    channel_id = %request.channel_id,
                    requester = %request.requester,
                    error = %e,
                    "closure rejected"
                );
                #[cfg(feature = "metrics")]
                counter!(closure_metrics::FAILURES_TOTAL, "kind" => e.kind()).increment(1);
            },
            Err(e) => {
                error!(
                    guild_id = %request.guild_id,
                    channel_id = %request.channel_id,
                    source = request.source.as_str(),
                    stage = ?e.stage(),
                    ticket_closed = e.ticket_closed(),
                    error = %e,
                    "closure failed"
                );
                #[cfg(feature = "metrics")]
                counter!(closure_metrics::FAILURES_TOTAL, "kind" => e.kind()).increment(1);
            },
        }

        #[cfg(feature = "metrics")]
        histogram!(closure_metrics::DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        result
    }

    async fn close_inner(
        &self,
        request: &CloseRequest,
        settings: &GuildSettings,
    ) -> Result<CloseOutcome> {
        let ticket = self
            .store
            .get_ticket_by_channel(request.guild_id, request.channel_id)
            .await
            .map_err(|e| CloseError::store(ClosureStage::Resolve, e))?;

        let Some(ticket) = ticket else {
            return self.close_untracked(request, settings).await;
        };

        if !ticket.open {
            debug!(guild_id = %ticket.guild_id, ticket_id = %ticket.id, "ticket already closed");
            return Ok(CloseOutcome::AlreadyClosed {
                ticket_id: ticket.id,
            });
        }

        let mut guard = ExclusionGuard::arm(self.store.clone(), ticket.guild_id, ticket.id);
        let result = self
            .close_tracked(request, settings, &ticket, &mut guard)
            .await;
        guard.settle().await;
        result
    }

    /// A channel in an allowed category with no ticket record.
    async fn close_untracked(
        &self,
        request: &CloseRequest,
        settings: &GuildSettings,
    ) -> Result<CloseOutcome> {
        self.require_allowed_category(request.channel_id, settings)
            .await?;

        if !request.bypass_permission_check {
            let allowed = self
                .permissions
                .can_close(settings, request.guild_id, request.requester, None)
                .await
                .map_err(|e| CloseError::gateway(ClosureStage::Authorize, e))?;
            if !allowed {
                return Err(CloseError::NoPermission);
            }
        }

        let transcript = if settings.store_transcripts {
            let transcript = self
                .collect_transcript(request.channel_id, request.guild_id, settings)
                .await?;
            let reference = self
                .archive
                .store_channel_transcript(
                    request.guild_id,
                    request.channel_id,
                    &transcript.messages,
                )
                .await
                .map_err(|e| CloseError::archive(ClosureStage::Transcript, e))?;
            Some(reference)
        } else {
            None
        };

        self.gateway
            .delete_channel(request.channel_id)
            .await
            .map_err(finalize_error)?;

        info!(
            guild_id = %request.guild_id,
            channel_id = %request.channel_id,
            archived = transcript.is_some(),
            "untracked ticket channel deleted"
        );
        Ok(CloseOutcome::Untracked {
            channel_id: request.channel_id,
            transcript,
        })
    }

    async fn require_allowed_category(
        &self,
        channel_id: ChannelId,
        settings: &GuildSettings,
    ) -> Result<()> {
        let channel = self
            .gateway
            .get_channel(channel_id)
            .await
            .map_err(|e| CloseError::gateway(ClosureStage::Resolve, e))?;

        match channel.parent_id {
            Some(category) if settings.is_allowed_category(category) => Ok(()),
            _ => Err(CloseError::NotATicketChannel),
        }
    }

    async fn close_tracked(
        &self,
        request: &CloseRequest,
        settings: &GuildSettings,
        ticket: &Ticket,
        guard: &mut ExclusionGuard,
    ) -> Result<CloseOutcome> {
        let (guild_id, ticket_id) = (ticket.guild_id, ticket.id);

        if !request.bypass_permission_check {
            let allowed = self
                .permissions
                .can_close(settings, guild_id, request.requester, Some(ticket))
                .await
                .map_err(|e| CloseError::gateway(ClosureStage::Authorize, e))?;
            if !allowed {
                return Err(CloseError::NoPermission);
            }
        }

        if request.source == CloseSource::Dashboard && !self.channel_exists(ticket).await? {
            let changed = self
                .store
                .set_closed(guild_id, ticket_id)
                .await
                .map_err(|e| CloseError::store(ClosureStage::Commit, e))?;
            guard.commit();
            if !changed {
                info!(%guild_id, %ticket_id, "ticket closed concurrently, stopping");
                return Ok(CloseOutcome::AlreadyClosed { ticket_id });
            }
            self.include_ticket(guild_id, ticket_id).await;
            info!(%guild_id, %ticket_id, "ticket channel already gone, closed in store only");
            return Ok(CloseOutcome::ChannelMissing { ticket_id });
        }

        if settings.store_transcripts {
            self.capture_transcript(request.channel_id, settings, ticket)
                .await?;
        }

        // Commit.
        let bot = self.gateway.bot_user_id();
        let metadata = CloseMetadata {
            reason: request.reason.clone(),
            closed_by: (request.requester != bot).then_some(request.requester),
        };
        self.store
            .set_close_metadata(guild_id, ticket_id, &metadata)
            .await
            .map_err(|e| CloseError::store(ClosureStage::Commit, e))?;
        let changed = self
            .store
            .set_closed(guild_id, ticket_id)
            .await
            .map_err(|e| CloseError::store(ClosureStage::Commit, e))?;
        guard.commit();
        if !changed {
            info!(%guild_id, %ticket_id, "ticket closed concurrently, stopping");
            return Ok(CloseOutcome::AlreadyClosed { ticket_id });
        }
        self.include_ticket(guild_id, ticket_id).await;
        let close_time = Utc::now();

        self.finalize_channel(request, ticket).await?;
        self.cleanup(settings, ticket).await;

        let notify = self
            .notifier
            .notify(&NotifyRequest {
                ticket,
                closed_by: request.requester,
                reason: request.reason.as_deref(),
                close_time,
                settings,
            })
            .await
            .map_err(|e| match e {
                NotifyError::Store(e) => CloseError::store(ClosureStage::Notify, e),
                NotifyError::Gateway(e) => CloseError::gateway(ClosureStage::Notify, e),
            })?;

        Ok(CloseOutcome::Closed { ticket_id, notify })
    }

    /// `false` when the ticket has no channel id or the platform says the
    /// channel is gone.
    async fn channel_exists(&self, ticket: &Ticket) -> Result<bool> {
        let Some(channel_id) = ticket.channel_id else {
            return Ok(false);
        };
        match self.gateway.get_channel(channel_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(CloseError::gateway(ClosureStage::Resolve, e)),
        }
    }

    async fn capture_transcript(
        &self,
        channel_id: ChannelId,
        settings: &GuildSettings,
        ticket: &Ticket,
    ) -> Result<()> {
        let (guild_id, ticket_id) = (ticket.guild_id, ticket.id);
        let transcript = self
            .collect_transcript(channel_id, guild_id, settings)
            .await?;

        self.store
            .add_participants(guild_id, ticket_id, &transcript.participant_ids())
            .await
            .map_err(|e| CloseError::store(ClosureStage::Transcript, e))?;
        let reference = self
            .archive
            .store_transcript(guild_id, ticket_id, &transcript.messages)
            .await
            .map_err(|e| CloseError::archive(ClosureStage::Transcript, e))?;
        self.store
            .set_has_transcript(guild_id, ticket_id, true)
            .await
            .map_err(|e| CloseError::store(ClosureStage::Transcript, e))?;

        debug!(
            %guild_id,
            %ticket_id,
            messages = transcript.messages.len(),
            truncated = transcript.truncated,
            location = %reference.location,
            "transcript archived"
        );
        Ok(())
    }

    async fn collect_transcript(
        &self,
        channel_id: ChannelId,
        guild_id: GuildId,
        settings: &GuildSettings,
    ) -> Result<Transcript> {
        let collector = TranscriptCollector::new(self.gateway.clone())
            .with_page_size(self.config.effective_page_size())
            .with_max_messages(settings.max_transcript_messages);

        match collector.collect(channel_id).await {
            Ok(transcript) => Ok(transcript),
            Err(e) if e.is_access_denied() => {
                if e.is_first_page() {
                    self.exclude_guild(guild_id).await;
                }
                Err(CloseError::access_denied(
                    ClosureStage::Transcript,
                    e.into_source(),
                ))
            },
            Err(e) => Err(CloseError::gateway(
                ClosureStage::Transcript,
                e.into_source(),
            )),
        }
    }

    /// Access to the guild's channels is gone; keep autoclose from retrying
    /// every open ticket.
    async fn exclude_guild(&self, guild_id: GuildId) {
        match self.store.exclude_all_open_from_autoclose(guild_id).await {
            Ok(count) => {
                warn!(%guild_id, excluded = count, "channel access denied, excluded open tickets from autoclose");
                #[cfg(feature = "metrics")]
                counter!(closure_metrics::AUTOCLOSE_EXCLUSIONS_TOTAL, "scope" => "guild").increment(count);
            },
            Err(e) => error!(%guild_id, error = %e, "failed to exclude open tickets from autoclose"),
        }
    }

    async fn exclude_ticket(&self, guild_id: GuildId, ticket_id: TicketId) {
        match self.store.exclude_from_autoclose(guild_id, ticket_id).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                counter!(closure_metrics::AUTOCLOSE_EXCLUSIONS_TOTAL, "scope" => "ticket").increment(1);
            },
            Err(e) => error!(%guild_id, %ticket_id, error = %e, "failed to exclude ticket from autoclose"),
        }
    }

    /// A successful closure lifts any exclusion left by an earlier failed
    /// attempt.
    async fn include_ticket(&self, guild_id: GuildId, ticket_id: TicketId) {
        if let Err(e) = self.store.include_in_autoclose(guild_id, ticket_id).await {
            warn!(%guild_id, %ticket_id, error = %e, "failed to clear autoclose exclusion");
        }
    }

    async fn finalize_channel(&self, request: &CloseRequest, ticket: &Ticket) -> Result<()> {
        let channel_id = request.channel_id;

        if ticket.is_thread {
            let notice = closed_notice(request.requester, request.reason.as_deref());
            if let Err(e) = self.gateway.create_message(channel_id, notice).await {
                warn!(ticket_id = %ticket.id, %channel_id, error = %e, "failed to post closing message");
            }
            // Archiving right after a send is rejected by the platform.
            tokio::time::sleep(self.config.thread_archive_delay()).await;
            self.gateway
                .modify_channel(channel_id, ChannelEdit::archive_and_lock())
                .await
                .map_err(|e| CloseError::gateway(ClosureStage::Finalize, e))?;
            return Ok(());
        }

        match self.gateway.delete_channel(channel_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_access_denied() => {
                self.exclude_ticket(ticket.guild_id, ticket.id).await;
                Err(CloseError::access_denied(ClosureStage::Finalize, e))
            },
            Err(e) => Err(CloseError::gateway(ClosureStage::Finalize, e)),
        }
    }

    /// Best effort; every failure is logged and dropped.
    async fn cleanup(&self, settings: &GuildSettings, ticket: &Ticket) {
        let (guild_id, ticket_id) = (ticket.guild_id, ticket.id);

        if !ticket.is_thread {
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.delete_webhook(guild_id, ticket_id).await {
                    warn!(%guild_id, %ticket_id, error = %e, "failed to delete ticket webhook");
                }
            });
        }

        if let Err(e) = self.store.delete_close_request(guild_id, ticket_id).await {
            warn!(%guild_id, %ticket_id, error = %e, "failed to delete close request");
        }

        if let (true, Some(join_message), Some(notification_channel)) = (
            ticket.is_thread,
            ticket.join_message_id,
            settings.ticket_notification_channel,
        ) {
            if let Err(e) = self
                .gateway
                .delete_message(notification_channel, join_message)
                .await
            {
                debug!(%guild_id, %ticket_id, error = %e, "failed to delete join thread prompt");
            }
            if let Err(e) = self.store.set_join_message(guild_id, ticket_id, None).await {
                warn!(%guild_id, %ticket_id, error = %e, "failed to clear join message id");
            }
        }
    }

    /// Close without a transcript or notifications. Admin only unless
    /// bypassed.
    ///
    /// Returns the ticket id for tracked tickets, `None` for untracked
    /// channels in an allowed category.
    pub async fn force_close(
        &self,
        request: &CloseRequest,
        settings: &GuildSettings,
    ) -> Result<Option<TicketId>> {
        let (guild_id, channel_id) = (request.guild_id, request.channel_id);

        if !request.bypass_permission_check {
            let member = match self
                .gateway
                .get_guild_member(guild_id, request.requester)
                .await
            {
                Ok(member) => Some(member),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(CloseError::gateway(ClosureStage::Authorize, e)),
            };
            let level = self
                .permissions
                .permission_level(settings, member.as_ref())
                .await
                .map_err(|e| CloseError::gateway(ClosureStage::Authorize, e))?;
            if level < PermissionLevel::Admin {
                return Err(CloseError::NoPermission);
            }
        }

        let ticket = self
            .store
            .get_ticket_by_channel(guild_id, channel_id)
            .await
            .map_err(|e| CloseError::store(ClosureStage::Resolve, e))?;
        if ticket.is_none() {
            self.require_allowed_category(channel_id, settings).await?;
        }

        if let Some(ticket) = ticket.as_ref().filter(|t| t.open) {
            let metadata = CloseMetadata {
                reason: request.reason.clone(),
                closed_by: (request.requester != self.gateway.bot_user_id())
                    .then_some(request.requester),
            };
            self.store
                .set_close_metadata(guild_id, ticket.id, &metadata)
                .await
                .map_err(|e| CloseError::store(ClosureStage::Commit, e))?;
            if self
                .store
                .set_closed(guild_id, ticket.id)
                .await
                .map_err(|e| CloseError::store(ClosureStage::Commit, e))?
            {
                self.include_ticket(guild_id, ticket.id).await;
            }
        }

        if let Err(e) = self
            .gateway
            .create_message(channel_id, force_close_notice())
            .await
        {
            warn!(%guild_id, %channel_id, error = %e, "failed to post force close notice");
        }
        tokio::time::sleep(self.config.force_close_delay()).await;

        match self.gateway.delete_channel(channel_id).await {
            Ok(()) => {},
            Err(e) if e.is_not_found() => {
                debug!(%guild_id, %channel_id, "channel already deleted");
            },
            Err(e) if e.is_access_denied() => {
                if let Some(ticket) = &ticket {
                    self.exclude_ticket(guild_id, ticket.id).await;
                }
                return Err(CloseError::access_denied(ClosureStage::Finalize, e));
            },
            Err(e) => return Err(CloseError::gateway(ClosureStage::Finalize, e)),
        }

        if let Some(ticket) = &ticket {
            self.cleanup(settings, ticket).await;
        }

        info!(
            %guild_id,
            %channel_id,
            ticket_id = ?ticket.as_ref().map(|t| t.id),
            requester = %request.requester,
            "ticket force closed"
        );
        Ok(ticket.map(|t| t.id))
    }
}

fn finalize_error(e: tickets_channels::Error) -> CloseError {
    if e.is_access_denied() {
        CloseError::access_denied(ClosureStage::Finalize, e)
    } else {
        CloseError::gateway(ClosureStage::Finalize, e)
    }
}

fn closed_notice(requester: UserId, reason: Option<&str>) -> OutgoingMessage {
    OutgoingMessage::embed(Embed {
        title: Some("Ticket Closed".into()),
        description: Some(format!("This ticket has been closed by <@{requester}>")),
        color: Some(SUCCESS_COLOR),
        fields: reason
            .map(|reason| EmbedField {
                name: "Reason".into(),
                value: format!("```{reason}```"),
                inline: false,
            })
            .into_iter()
            .collect(),
        ..Default::default()
    })
}

fn force_close_notice() -> OutgoingMessage {
    OutgoingMessage::embed(Embed {
        title: Some("Admin".into()),
        description: Some(
            "**Force closing ticket.**\nThis channel will be deleted in a few seconds.\n\n-# Note: A transcript will not be saved for this ticket."
                .into(),
        ),
        color: Some(SUCCESS_COLOR),
        ..Default::default()
    })
}
