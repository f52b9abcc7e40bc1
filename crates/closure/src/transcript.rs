//! Paginated transcript capture.

use std::{collections::BTreeSet, sync::Arc};

use {
    tickets_channels::{ChannelGateway, Message, MessagePage},
    tickets_common::{ChannelId, UserId},
    tickets_config::MAX_PAGE_SIZE,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use tickets_metrics::{counter, transcript as transcript_metrics};

/// Upper bound on messages captured for one ticket unless configured.
pub const DEFAULT_MAX_MESSAGES: usize = 10_000;

/// Complete (or capped) history of a ticket channel.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Oldest first.
    pub messages: Vec<Message>,
    /// Distinct message authors.
    pub participants: BTreeSet<UserId>,
    /// History continued past `max_messages`; only the newest were kept.
    /// Never set when the history holds exactly `max_messages`.
    pub truncated: bool,
    pub pages_fetched: usize,
}

impl Transcript {
    #[must_use]
    pub fn participant_ids(&self) -> Vec<UserId> {
        self.participants.iter().copied().collect()
    }
}

/// A history page could not be fetched.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch transcript page {page}: {source}")]
pub struct TranscriptError {
    /// Zero-based index of the failing page.
    pub page: usize,
    #[source]
    pub source: tickets_channels::Error,
}

impl TranscriptError {
    /// The very first request failed: the bot likely has no access to the
    /// channel at all.
    #[must_use]
    pub fn is_first_page(&self) -> bool {
        self.page == 0
    }

    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.source.is_access_denied()
    }

    #[must_use]
    pub fn into_source(self) -> tickets_channels::Error {
        self.source
    }
}

pub struct TranscriptCollector {
    gateway: Arc<dyn ChannelGateway>,
    page_size: u8,
    max_messages: usize,
}

impl TranscriptCollector {
    pub fn new(gateway: Arc<dyn ChannelGateway>) -> Self {
        Self {
            gateway,
            page_size: MAX_PAGE_SIZE,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages.max(1);
        self
    }

    /// Walk the channel history backwards until a short page.
    ///
    /// A page holding fewer than `page_size` messages is the only end signal,
    /// so history that is an exact multiple of the page size costs one extra
    /// empty request.
    pub async fn collect(&self, channel_id: ChannelId) -> Result<Transcript, TranscriptError> {
        let limit = usize::from(self.page_size);
        let mut messages: Vec<Message> = Vec::new();
        let mut before = None;
        let mut page = 0;
        let mut truncated = false;

        loop {
            let chunk = self
                .gateway
                .get_messages(channel_id, MessagePage {
                    before,
                    limit: self.page_size,
                })
                .await
                .map_err(|source| TranscriptError { page, source })?;
            page += 1;

            let chunk_len = chunk.len();
            if let Some(oldest) = chunk.last() {
                before = Some(oldest.id);
            }
            messages.extend(chunk);

            if messages.len() >= self.max_messages {
                truncated = messages.len() > self.max_messages;
                if !truncated && chunk_len == limit {
                    // Exactly at the cap on a full page: peek for anything older.
                    let older = self
                        .gateway
                        .get_messages(channel_id, MessagePage { before, limit: 1 })
                        .await
                        .map_err(|source| TranscriptError { page, source })?;
                    page += 1;
                    truncated = !older.is_empty();
                }
                messages.truncate(self.max_messages);
                break;
            }
            if chunk_len < limit {
                break;
            }
        }

        if truncated {
            warn!(
                %channel_id,
                max_messages = self.max_messages,
                pages = page,
                "transcript truncated, older messages were not captured"
            );
            #[cfg(feature = "metrics")]
            counter!(transcript_metrics::TRUNCATED_TOTAL).increment(1);
        }

        messages.reverse();
        let participants = messages.iter().map(|m| m.author.id).collect();

        debug!(%channel_id, messages = messages.len(), pages = page, "transcript collected");
        #[cfg(feature = "metrics")]
        {
            counter!(transcript_metrics::PAGES_TOTAL).increment(page as u64);
            counter!(transcript_metrics::MESSAGES_TOTAL).increment(messages.len() as u64);
        }

        Ok(Transcript {
            messages,
            participants,
            truncated,
            pages_fetched: page,
        })
    }
}
