//! Client for an HTTP archiver service.

use {
    async_trait::async_trait,
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    tickets_channels::Message,
    tickets_common::{ChannelId, GuildId, TicketId},
    tracing::debug,
    url::Url,
};

use crate::{
    Error, Result,
    archive::{ArchiveReference, StoredTranscript, TranscriptArchive},
};

/// Posts each transcript as JSON to `{base}/transcripts/{guild}/{ticket}`,
/// or `{base}/transcripts/{guild}/channels/{channel}` for untracked channels.
pub struct HttpArchive {
    client: Client,
    base: Url,
    auth_token: Option<Secret<String>>,
}

impl HttpArchive {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(Error::config)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            auth_token: None,
        })
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: String) -> Self {
        self.auth_token = Some(Secret::new(token));
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(Error::config)
    }

    async fn upload(&self, url: Url, body: &StoredTranscript) -> Result<ArchiveReference> {
        debug!(%url, messages = body.messages.len(), "uploading transcript");

        let mut request = self.client.post(url.as_str()).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request
            .send()
            .await
            .map_err(|source| Error::external("failed to upload transcript", source))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }

        Ok(ArchiveReference {
            location: url.to_string(),
        })
    }
}

#[async_trait]
impl TranscriptArchive for HttpArchive {
    async fn store_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        messages: &[Message],
    ) -> Result<ArchiveReference> {
        let url = self.endpoint(&format!("transcripts/{guild_id}/{ticket_id}"))?;
        self.upload(url, &StoredTranscript {
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
        let url = self.endpoint(&format!("transcripts/{guild_id}/channels/{channel_id}"))?;
        self.upload(url, &StoredTranscript {
            guild_id,
            ticket_id: None,
            channel_id: Some(channel_id),
            messages: messages.to_vec(),
        })
        .await
    }
}
