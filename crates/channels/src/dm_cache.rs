use {
    async_trait::async_trait,
    dashmap::DashMap,
    tickets_common::{ChannelId, UserId},
    tracing::debug,
};

use crate::Result;

/// Lookup of already-known direct-message channels.
///
/// Implementations must never open a new direct channel: closing a ticket
/// only notifies users the bot has talked to before.
#[async_trait]
pub trait DirectChannelCache: Send + Sync {
    async fn cached_dm_channel(&self, user_id: UserId) -> Result<Option<ChannelId>>;
}

/// Process-local cache fed by whatever observes direct channels being opened.
#[derive(Default)]
pub struct DmChannelCache {
    channels: DashMap<UserId, ChannelId>,
}

impl DmChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, user_id: UserId, channel_id: ChannelId) {
        debug!(user_id = %user_id, channel_id = %channel_id, "caching direct channel");
        self.channels.insert(user_id, channel_id);
    }

    pub fn forget(&self, user_id: UserId) -> Option<ChannelId> {
        self.channels.remove(&user_id).map(|(_, channel)| channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl DirectChannelCache for DmChannelCache {
    async fn cached_dm_channel(&self, user_id: UserId) -> Result<Option<ChannelId>> {
        Ok(self.channels.get(&user_id).map(|entry| *entry.value()))
    }
}
