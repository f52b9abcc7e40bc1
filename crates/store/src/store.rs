//! Persistence port for ticket closure.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tickets_common::{ChannelId, GuildId, MessageId, TicketId, UserId},
};

use crate::{
    Result,
    types::{ArchiveRecord, CloseMetadata, Ticket},
};

/// Everything the closure workflow reads or writes about a ticket.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get_ticket_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>>;

    /// Transition an open ticket to closed and stamp its close time.
    ///
    /// Returns `false` when the ticket was already closed, so concurrent
    /// attempts can tell who won.
    async fn set_closed(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<bool>;

    /// Upsert; replaces metadata left by an aborted earlier attempt.
    async fn set_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        metadata: &CloseMetadata,
    ) -> Result<()>;

    async fn get_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<CloseMetadata>>;

    async fn set_has_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        has_transcript: bool,
    ) -> Result<()>;

    /// Merge `users` into the recorded participant set.
    async fn add_participants(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        users: &[UserId],
    ) -> Result<()>;

    async fn has_participated(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> Result<bool>;

    async fn exclude_from_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()>;

    /// Clear the exclusion marker. Succeeds when none was set.
    async fn include_in_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()>;

    /// Flag every open ticket in the guild. Returns how many were flagged.
    async fn exclude_all_open_from_autoclose(&self, guild_id: GuildId) -> Result<u64>;

    async fn is_excluded_from_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<bool>;

    async fn delete_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()>;

    async fn delete_close_request(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()>;

    async fn set_join_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        message_id: Option<MessageId>,
    ) -> Result<()>;

    async fn set_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        record: ArchiveRecord,
    ) -> Result<()>;

    async fn get_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<ArchiveRecord>>;

    /// Open, non-excluded tickets opened before `opened_before`, oldest
    /// ticket id first.
    async fn list_autoclose_candidates(
        &self,
        guild_id: GuildId,
        opened_before: DateTime<Utc>,
    ) -> Result<Vec<Ticket>>;
}
