//! Post-close notifications: the archive channel summary and the opener's
//! direct message.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tickets_channels::{ChannelGateway, DirectChannelCache, EmbedAuthor, Member},
    tickets_common::{PermissionLevel, UserId},
    tickets_config::{ClosureConfig, GuildSettings},
    tickets_store::{ArchiveRecord, Ticket, TicketStore},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tickets_metrics::{counter, notify as notify_metrics};

use crate::{
    permissions::PermissionCheck,
    summary::{CloseSummary, SummaryElement},
};

const LINK_ROW: &[SummaryElement] = &[SummaryElement::TranscriptLink, SummaryElement::ThreadLink];

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error(transparent)]
    Store(#[from] tickets_store::Error),

    #[error(transparent)]
    Gateway(#[from] tickets_channels::Error),
}

/// A closed ticket about to be announced.
pub struct NotifyRequest<'a> {
    pub ticket: &'a Ticket,
    /// The bot's own id for system-initiated closures.
    pub closed_by: UserId,
    pub reason: Option<&'a str>,
    pub close_time: DateTime<Utc>,
    pub settings: &'a GuildSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectNotification {
    Sent { feedback_offered: bool },
    /// The ticket was opened by the bot itself.
    SkippedSystemOpener,
    /// No direct channel with the opener is known.
    SkippedNoCachedChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifySummary {
    pub archive_message: Option<ArchiveRecord>,
    pub direct: DirectNotification,
}

pub struct ArchiveNotifier {
    gateway: Arc<dyn ChannelGateway>,
    store: Arc<dyn TicketStore>,
    dm_cache: Arc<dyn DirectChannelCache>,
    permissions: Arc<dyn PermissionCheck>,
    closure: ClosureConfig,
}

impl ArchiveNotifier {
    pub fn new(
        gateway: Arc<dyn ChannelGateway>,
        store: Arc<dyn TicketStore>,
        dm_cache: Arc<dyn DirectChannelCache>,
        permissions: Arc<dyn PermissionCheck>,
        closure: ClosureConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            dm_cache,
            permissions,
            closure,
        }
    }

    pub async fn notify(&self, request: &NotifyRequest<'_>) -> Result<NotifySummary, NotifyError> {
        let summary = self.summary(request);
        let archive_message = self.post_to_archive_channel(request, &summary).await?;
        let direct = self.message_opener(request, &summary).await?;
        Ok(NotifySummary {
            archive_message,
            direct,
        })
    }

    fn summary(&self, request: &NotifyRequest<'_>) -> CloseSummary {
        let ticket = request.ticket;
        let transcript_url = request
            .settings
            .store_transcripts
            .then(|| self.closure.transcript_link(ticket.guild_id, ticket.id.get()));
        let thread_url = ticket
            .channel_id
            .filter(|_| ticket.is_thread)
            .map(|channel| CloseSummary::thread_url(ticket.guild_id, channel));

        CloseSummary {
            guild_id: ticket.guild_id,
            ticket_id: ticket.id,
            opener: ticket.user_id,
            closed_by: request.closed_by,
            open_time: ticket.open_time,
            close_time: request.close_time,
            reason: request.reason.map(str::to_string),
            transcript_url,
            thread_url,
        }
    }

    /// A configured but vanished archive channel is skipped, any other
    /// failure is returned.
    async fn post_to_archive_channel(
        &self,
        request: &NotifyRequest<'_>,
        summary: &CloseSummary,
    ) -> Result<Option<ArchiveRecord>, NotifyError> {
        let Some(archive_channel) = request.settings.archive_channel else {
            return Ok(None);
        };
        let ticket = request.ticket;

        if let Err(e) = self.gateway.get_channel(archive_channel).await {
            warn!(
                guild_id = %ticket.guild_id,
                ticket_id = %ticket.id,
                %archive_channel,
                error = %e,
                "archive channel unavailable, skipping summary"
            );
            return Ok(None);
        }

        let sent = self
            .gateway
            .create_message(archive_channel, summary.render(&[LINK_ROW]))
            .await?;
        let record = ArchiveRecord {
            channel_id: archive_channel,
            message_id: sent.id,
        };
        self.store
            .set_archive_message(ticket.guild_id, ticket.id, record)
            .await?;

        debug!(guild_id = %ticket.guild_id, ticket_id = %ticket.id, message_id = %sent.id, "archive summary posted");
        #[cfg(feature = "metrics")]
        counter!(notify_metrics::ARCHIVE_MESSAGES_TOTAL).increment(1);
        Ok(Some(record))
    }

    async fn message_opener(
        &self,
        request: &NotifyRequest<'_>,
        summary: &CloseSummary,
    ) -> Result<DirectNotification, NotifyError> {
        let ticket = request.ticket;
        if ticket.user_id == self.gateway.bot_user_id() {
            return Ok(DirectNotification::SkippedSystemOpener);
        }

        let dm_channel = match self.dm_cache.cached_dm_channel(ticket.user_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                debug!(ticket_id = %ticket.id, user_id = %ticket.user_id, "no cached direct channel, skipping");
                return Ok(DirectNotification::SkippedNoCachedChannel);
            },
            Err(e) => {
                warn!(ticket_id = %ticket.id, user_id = %ticket.user_id, error = %e, "direct channel lookup failed, skipping");
                return Ok(DirectNotification::SkippedNoCachedChannel);
            },
        };

        let guild = self.gateway.get_guild(ticket.guild_id).await?;
        let participated = self
            .store
            .has_participated(ticket.guild_id, ticket.id, ticket.user_id)
            .await?;
        let member = self.opener_member(ticket).await?;
        let level = self
            .permissions
            .permission_level(request.settings, member.as_ref())
            .await?;

        let feedback = request.settings.feedback_enabled;
        let offer_feedback = feedback && participated && level == PermissionLevel::Everyone;
        let note = match (feedback, offer_feedback) {
            (true, false) if level.is_staff() => Some(format!(
                "-# Feedback is not collected from {} staff.",
                guild.name
            )),
            (true, false) => Some(
                "-# You can't rate this ticket because you didn't send any messages in it."
                    .to_string(),
            ),
            _ => None,
        };

        let feedback_row: &[SummaryElement] = if offer_feedback {
            &[SummaryElement::Feedback]
        } else {
            &[]
        };
        let mut message = summary.render(&[LINK_ROW, feedback_row]);
        message.content = note;
        if let Some(embed) = message.embeds.first_mut() {
            embed.author = Some(EmbedAuthor {
                name: guild.name.clone(),
                icon_url: guild.icon_url(),
            });
        }

        self.gateway.create_message(dm_channel, message).await?;

        info!(
            ticket_id = %ticket.id,
            user_id = %ticket.user_id,
            feedback_offered = offer_feedback,
            "closure summary sent to opener"
        );
        #[cfg(feature = "metrics")]
        counter!(notify_metrics::DIRECT_MESSAGES_TOTAL).increment(1);
        Ok(DirectNotification::Sent {
            feedback_offered: offer_feedback,
        })
    }

    /// An opener who left the guild is treated as an ordinary user.
    async fn opener_member(&self, ticket: &Ticket) -> Result<Option<Member>, NotifyError> {
        match self
            .gateway
            .get_guild_member(ticket.guild_id, ticket.user_id)
            .await
        {
            Ok(member) => Ok(Some(member)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
