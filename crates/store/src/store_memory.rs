//! In-memory store for tests and dry runs.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tickets_common::{ChannelId, GuildId, MessageId, TicketId, UserId},
};

use crate::{
    Error, Result,
    store::TicketStore,
    types::{ArchiveRecord, CloseMetadata, Ticket},
};

type Key = (GuildId, TicketId);

#[derive(Default)]
struct State {
    tickets: BTreeMap<Key, Ticket>,
    close_metadata: HashMap<Key, CloseMetadata>,
    participants: HashMap<Key, HashSet<UserId>>,
    excluded: HashSet<Key>,
    webhooks: HashSet<Key>,
    close_requests: HashSet<Key>,
    archive_messages: HashMap<Key, ArchiveRecord>,
}

/// `Mutex`-guarded maps. No persistence.
#[derive(Default)]
pub struct InMemoryTicketStore {
    state: Mutex<State>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state()
            .tickets
            .insert((ticket.guild_id, ticket.id), ticket);
    }

    pub fn insert_webhook(&self, guild_id: GuildId, ticket_id: TicketId) {
        self.state().webhooks.insert((guild_id, ticket_id));
    }

    pub fn insert_close_request(&self, guild_id: GuildId, ticket_id: TicketId) {
        self.state().close_requests.insert((guild_id, ticket_id));
    }

    pub fn ticket(&self, guild_id: GuildId, ticket_id: TicketId) -> Option<Ticket> {
        self.state().tickets.get(&(guild_id, ticket_id)).cloned()
    }

    pub fn participants(&self, guild_id: GuildId, ticket_id: TicketId) -> HashSet<UserId> {
        self.state()
            .participants
            .get(&(guild_id, ticket_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> bool {
        self.state().webhooks.contains(&(guild_id, ticket_id))
    }

    pub fn has_close_request(&self, guild_id: GuildId, ticket_id: TicketId) -> bool {
        self.state().close_requests.contains(&(guild_id, ticket_id))
    }

    fn with_ticket<T>(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        f: impl FnOnce(&mut Ticket) -> T,
    ) -> Result<T> {
        let mut state = self.state();
        let ticket = state
            .tickets
            .get_mut(&(guild_id, ticket_id))
            .ok_or_else(|| Error::ticket_not_found(guild_id, ticket_id))?;
        Ok(f(ticket))
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get_ticket_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>> {
        Ok(self
            .state()
            .tickets
            .values()
            .find(|t| t.guild_id == guild_id && t.channel_id == Some(channel_id))
            .cloned())
    }

    async fn set_closed(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<bool> {
        self.with_ticket(guild_id, ticket_id, |ticket| {
            if !ticket.open {
                return false;
            }
            ticket.open = false;
            ticket.close_time = Some(Utc::now());
            true
        })
    }

    async fn set_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        metadata: &CloseMetadata,
    ) -> Result<()> {
        self.state()
            .close_metadata
            .insert((guild_id, ticket_id), metadata.clone());
        Ok(())
    }

    async fn get_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<CloseMetadata>> {
        Ok(self
            .state()
            .close_metadata
            .get(&(guild_id, ticket_id))
            .cloned())
    }

    async fn set_has_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        has_transcript: bool,
    ) -> Result<()> {
        self.with_ticket(guild_id, ticket_id, |ticket| {
            ticket.has_transcript = has_transcript;
        })
    }

    async fn add_participants(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        users: &[UserId],
    ) -> Result<()> {
        self.state()
            .participants
            .entry((guild_id, ticket_id))
            .or_default()
            .extend(users.iter().copied());
        Ok(())
    }

    async fn has_participated(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> Result<bool> {
        Ok(self
            .state()
            .participants
            .get(&(guild_id, ticket_id))
            .is_some_and(|users| users.contains(&user_id)))
    }

    async fn exclude_from_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        self.state().excluded.insert((guild_id, ticket_id));
        Ok(())
    }

    async fn include_in_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        self.state().excluded.remove(&(guild_id, ticket_id));
        Ok(())
    }

    async fn exclude_all_open_from_autoclose(&self, guild_id: GuildId) -> Result<u64> {
        let mut state = self.state();
        let open: Vec<Key> = state
            .tickets
            .iter()
            .filter(|(_, t)| t.guild_id == guild_id && t.open)
            .map(|(key, _)| *key)
            .collect();
        let count = open.len() as u64;
        state.excluded.extend(open);
        Ok(count)
    }

    async fn is_excluded_from_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<bool> {
        Ok(self.state().excluded.contains(&(guild_id, ticket_id)))
    }

    async fn delete_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        self.state().webhooks.remove(&(guild_id, ticket_id));
        Ok(())
    }

    async fn delete_close_request(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        self.state().close_requests.remove(&(guild_id, ticket_id));
        Ok(())
    }

    async fn set_join_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        message_id: Option<MessageId>,
    ) -> Result<()> {
        self.with_ticket(guild_id, ticket_id, |ticket| {
            ticket.join_message_id = message_id;
        })
    }

    async fn set_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        record: ArchiveRecord,
    ) -> Result<()> {
        self.state()
            .archive_messages
            .insert((guild_id, ticket_id), record);
        Ok(())
    }

    async fn get_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<ArchiveRecord>> {
        Ok(self
            .state()
            .archive_messages
            .get(&(guild_id, ticket_id))
            .copied())
    }

    async fn list_autoclose_candidates(
        &self,
        guild_id: GuildId,
        opened_before: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let state = self.state();
        Ok(state
            .tickets
            .values()
            .filter(|t| {
                t.guild_id == guild_id
                    && t.open
                    && t.open_time < opened_before
                    && !state.excluded.contains(&(t.guild_id, t.id))
            })
            .cloned()
            .collect())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::Duration};

    const GUILD: GuildId = GuildId::new(1);

    fn ticket(id: u64, channel: u64) -> Ticket {
        Ticket::new(
            GUILD,
            TicketId::new(id),
            ChannelId::new(channel),
            UserId::new(500),
            Utc::now() - Duration::hours(48),
        )
    }

    #[tokio::test]
    async fn set_closed_only_transitions_once() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(ticket(1, 10));

        assert!(store.set_closed(GUILD, TicketId::new(1)).await.unwrap());
        assert!(!store.set_closed(GUILD, TicketId::new(1)).await.unwrap());

        let t = store.ticket(GUILD, TicketId::new(1)).unwrap();
        assert!(!t.open);
        assert!(t.close_time.is_some());
    }

    #[tokio::test]
    async fn set_closed_unknown_ticket_errors() {
        let store = InMemoryTicketStore::new();
        let err = store.set_closed(GUILD, TicketId::new(9)).await.unwrap_err();
        assert!(matches!(err, Error::TicketNotFound { .. }));
    }

    #[tokio::test]
    async fn exclude_all_only_flags_open_tickets() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(ticket(1, 10));
        store.insert_ticket(ticket(2, 20));
        let mut closed = ticket(3, 30);
        closed.open = false;
        store.insert_ticket(closed);

        assert_eq!(store.exclude_all_open_from_autoclose(GUILD).await.unwrap(), 2);
        assert!(store.is_excluded_from_autoclose(GUILD, TicketId::new(2)).await.unwrap());
        assert!(!store.is_excluded_from_autoclose(GUILD, TicketId::new(3)).await.unwrap());
    }

    #[tokio::test]
    async fn include_clears_exclusion() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(ticket(1, 10));
        store.exclude_from_autoclose(GUILD, TicketId::new(1)).await.unwrap();

        store.include_in_autoclose(GUILD, TicketId::new(1)).await.unwrap();
        store.include_in_autoclose(GUILD, TicketId::new(1)).await.unwrap();

        assert!(!store.is_excluded_from_autoclose(GUILD, TicketId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn candidates_skip_excluded_and_recent() {
        let store = InMemoryTicketStore::new();
        store.insert_ticket(ticket(1, 10));
        store.insert_ticket(ticket(2, 20));
        let mut fresh = ticket(3, 30);
        fresh.open_time = Utc::now();
        store.insert_ticket(fresh);
        store.exclude_from_autoclose(GUILD, TicketId::new(2)).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let ids: Vec<_> = store
            .list_autoclose_candidates(GUILD, cutoff)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![TicketId::new(1)]);
    }
}
