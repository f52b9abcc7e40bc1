//! Filesystem transcript archive.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    tickets_channels::Message,
    tickets_common::{ChannelId, GuildId, TicketId},
    tracing::debug,
};

use crate::{
    Result,
    archive::{ArchiveReference, StoredTranscript, TranscriptArchive},
};

/// Writes `{dir}/{guild}/{ticket}.json`, and
/// `{dir}/{guild}/channels/{channel}.json` for untracked channels.
pub struct FsArchive {
    dir: PathBuf,
}

impl FsArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn transcript_path(&self, guild_id: GuildId, ticket_id: TicketId) -> PathBuf {
        self.dir
            .join(guild_id.to_string())
            .join(format!("{ticket_id}.json"))
    }

    #[must_use]
    pub fn channel_transcript_path(&self, guild_id: GuildId, channel_id: ChannelId) -> PathBuf {
        self.dir
            .join(guild_id.to_string())
            .join("channels")
            .join(format!("{channel_id}.json"))
    }

    /// Read back a stored transcript, if any.
    pub async fn load(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<StoredTranscript>> {
        read_doc(&self.transcript_path(guild_id, ticket_id)).await
    }

    pub async fn load_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<StoredTranscript>> {
        read_doc(&self.channel_transcript_path(guild_id, channel_id)).await
    }
}

async fn read_doc(path: &Path) -> Result<Option<StoredTranscript>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_doc(path: PathBuf, doc: &StoredTranscript) -> Result<ArchiveReference> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_vec_pretty(doc)?;

    // Write-then-rename so readers never see a partial file.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &data).await?;
    tokio::fs::rename(&tmp, &path).await?;

    debug!(path = %path.display(), messages = doc.messages.len(), "transcript written");
    Ok(ArchiveReference {
        location: path.display().to_string(),
    })
}

#[async_trait]
impl TranscriptArchive for FsArchive {
    async fn store_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        messages: &[Message],
    ) -> Result<ArchiveReference> {
        write_doc(self.transcript_path(guild_id, ticket_id), &StoredTranscript {
            guild_id,
            ticket_id: Some(ticket_id),
            channel_id: None,
            messages: messages.to_vec(),
        })
        .await
    }

    async fn store_channel_transcript(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        messages: &[Message],
    ) -> Result<ArchiveReference> {
        write_doc(self.channel_transcript_path(guild_id, channel_id), &StoredTranscript {
            guild_id,
            ticket_id: None,
            channel_id: Some(channel_id),
            messages: messages.to_vec(),
        })
        .await
    }
}
