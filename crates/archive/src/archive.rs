//! Archive storage port.

use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    tickets_channels::Message,
    tickets_common::{ChannelId, GuildId, TicketId},
    tickets_config::ArchiveConfig,
};

use crate::{FsArchive, HttpArchive, Result};

/// Where a stored transcript ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReference {
    /// URL or filesystem path, depending on the backend.
    pub location: String,
}

/// The document persisted for one ticket, or for a ticket channel that has
/// no ticket record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub guild_id: GuildId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<TicketId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,
    /// Oldest first.
    pub messages: Vec<Message>,
}

#[async_trait]
pub trait TranscriptArchive: Send + Sync {
    /// Persist `messages` for a ticket. Storing again replaces the earlier
    /// copy.
    async fn store_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        messages: &[Message],
    ) -> Result<ArchiveReference>;

    /// Persist the history of a channel with no ticket record, keyed by
    /// channel so untracked channels never collide with tickets.
    async fn store_channel_transcript(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        messages: &[Message],
    ) -> Result<ArchiveReference>;
}

/// Build the configured backend.
pub fn from_config(config: &ArchiveConfig) -> Result<Arc<dyn TranscriptArchive>> {
    Ok(match config {
        ArchiveConfig::Http { url, auth_token } => {
            let archive = HttpArchive::new(url)?;
            Arc::new(match auth_token {
                Some(token) => archive.with_auth_token(token.expose_secret().clone()),
                None => archive,
            })
        },
        ArchiveConfig::Fs { dir } => Arc::new(FsArchive::new(dir.clone())),
    })
}
