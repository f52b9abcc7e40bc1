//! Ticket records and closure bookkeeping.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tickets_common::{ChannelId, GuildId, MessageId, TicketId, UserId},
};

/// A persisted support conversation bound to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub guild_id: GuildId,
    /// `None` once the channel is known to be gone.
    pub channel_id: Option<ChannelId>,
    /// The opener.
    pub user_id: UserId,
    pub open: bool,
    /// Thread-backed tickets are archived on close instead of deleted.
    pub is_thread: bool,
    /// "Join thread" prompt posted in the notification channel.
    pub join_message_id: Option<MessageId>,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub has_transcript: bool,
}

impl Ticket {
    /// A fresh open ticket, as the creation flow would persist it.
    #[must_use]
    pub fn new(
        guild_id: GuildId,
        id: TicketId,
        channel_id: ChannelId,
        user_id: UserId,
        open_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            guild_id,
            channel_id: Some(channel_id),
            user_id,
            open: true,
            is_thread: false,
            join_message_id: None,
            open_time,
            close_time: None,
            has_transcript: false,
        }
    }

    #[must_use]
    pub fn thread(mut self) -> Self {
        self.is_thread = true;
        self
    }
}

/// Why and by whom a ticket was closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseMetadata {
    pub reason: Option<String>,
    /// `None` for system-initiated closures.
    pub closed_by: Option<UserId>,
}

/// Where a ticket's closure summary was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}
