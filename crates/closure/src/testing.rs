//! In-process fakes for the closure ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Duration, Utc},
    tickets_archive::{ArchiveReference, TranscriptArchive},
    tickets_channels::{
        Author, Channel, ChannelEdit, ChannelGateway, ChannelKind, DmChannelCache, Error, Guild,
        Member, Message, MessagePage, OutgoingMessage, Result,
    },
    tickets_common::{ChannelId, GuildId, MessageId, RoleId, TicketId, UserId},
    tickets_config::{ClosureConfig, GuildSettings},
    tickets_store::{
        ArchiveRecord, CloseMetadata, Ticket, TicketStore, store_memory::InMemoryTicketStore,
    },
};

use crate::{coordinator::ClosureCoordinator, permissions::RolePermissions};

pub const BOT: UserId = UserId::new(999_000);
pub const GUILD: GuildId = GuildId::new(5);
pub const CATEGORY: ChannelId = ChannelId::new(800);

#[derive(Debug, Clone, Copy)]
pub enum FailKind {
    AccessDenied,
    NotFound,
    Status(u16),
}

impl FailKind {
    fn error(self, context: &str) -> Error {
        match self {
            Self::AccessDenied => Error::access_denied(context),
            Self::NotFound => Error::not_found(context),
            Self::Status(status) => Error::from_status(status, context, "injected"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Call {
    GetChannel(ChannelId),
    GetMessages {
        channel: ChannelId,
        page: MessagePage,
    },
    DeleteChannel(ChannelId),
    ModifyChannel {
        channel: ChannelId,
        edit: ChannelEdit,
        at: Instant,
    },
    CreateMessage {
        channel: ChannelId,
        message: OutgoingMessage,
        at: Instant,
    },
    DeleteMessage {
        channel: ChannelId,
        message: MessageId,
    },
}

#[derive(Default)]
struct GatewayState {
    channels: HashMap<ChannelId, Channel>,
    /// Newest first, per channel.
    history: HashMap<ChannelId, Vec<Message>>,
    members: HashMap<UserId, Member>,
    calls: Vec<Call>,
    history_requests: usize,
    next_message_id: u64,
    fail_history_page: Option<(usize, FailKind)>,
    fail_delete: Option<FailKind>,
    fail_modify: Option<FailKind>,
    fail_member: Option<FailKind>,
    fail_create_in: HashMap<ChannelId, FailKind>,
}

/// Scriptable gateway that records every mutating call.
pub struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState {
                next_message_id: 1_000_000,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state().channels.insert(channel.id, channel);
    }

    pub fn add_member(&self, member: Member) {
        self.state().members.insert(member.user.id, member);
    }

    /// `total` messages with ids `1..=total`; authors cycle through
    /// `1..=authors`.
    pub fn add_history(&self, channel: ChannelId, total: u64, authors: u64) {
        let messages = (1..=total)
            .rev()
            .map(|id| message(channel, id, UserId::new((id - 1) % authors.max(1) + 1)))
            .collect();
        self.state().history.insert(channel, messages);
    }

    pub fn fail_history_page(&self, page: usize, kind: FailKind) {
        self.state().fail_history_page = Some((page, kind));
    }

    pub fn fail_delete(&self, kind: FailKind) {
        self.state().fail_delete = Some(kind);
    }

    pub fn fail_modify(&self, kind: FailKind) {
        self.state().fail_modify = Some(kind);
    }

    pub fn fail_member(&self, kind: FailKind) {
        self.state().fail_member = Some(kind);
    }

    pub fn fail_create_message_in(&self, channel: ChannelId, kind: FailKind) {
        self.state().fail_create_in.insert(channel, kind);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn has_channel(&self, channel: ChannelId) -> bool {
        self.state().channels.contains_key(&channel)
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateMessage {
                    channel: c,
                    message,
                    ..
                } if c == channel => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteChannel(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| !matches!(call, Call::GetChannel(_) | Call::GetMessages { .. }))
            .count()
    }
}

#[async_trait]
impl ChannelGateway for RecordingGateway {
    fn bot_user_id(&self) -> UserId {
        BOT
    }

    async fn get_channel(&self, channel_id: ChannelId) -> Result<Channel> {
        let mut state = self.state();
        state.calls.push(Call::GetChannel(channel_id));
        state
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| Error::not_found("get channel"))
    }

    async fn get_guild(&self, guild_id: GuildId) -> Result<Guild> {
        Ok(Guild {
            id: guild_id,
            name: "Support Hub".into(),
            icon: Some("iconhash".into()),
        })
    }

    async fn get_messages(&self, channel_id: ChannelId, page: MessagePage) -> Result<Vec<Message>> {
        let mut state = self.state();
        state.calls.push(Call::GetMessages {
            channel: channel_id,
            page,
        });
        let index = state.history_requests;
        state.history_requests += 1;
        if let Some((failing, kind)) = state.fail_history_page
            && failing == index
        {
            return Err(kind.error("get messages"));
        }
        Ok(state
            .history
            .get(&channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| page.before.is_none_or(|before| m.id < before))
                    .take(usize::from(page.limit))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteChannel(channel_id));
        if let Some(kind) = state.fail_delete {
            return Err(kind.error("delete channel"));
        }
        state.channels.remove(&channel_id);
        Ok(())
    }

    async fn modify_channel(&self, channel_id: ChannelId, edit: ChannelEdit) -> Result<Channel> {
        let mut state = self.state();
        state.calls.push(Call::ModifyChannel {
            channel: channel_id,
            edit,
            at: Instant::now(),
        });
        if let Some(kind) = state.fail_modify {
            return Err(kind.error("modify channel"));
        }
        state
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| Error::not_found("modify channel"))
    }

    async fn create_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<Message> {
        let mut state = self.state();
        state.calls.push(Call::CreateMessage {
            channel: channel_id,
            message: message.clone(),
            at: Instant::now(),
        });
        if let Some(kind) = state.fail_create_in.get(&channel_id) {
            return Err(kind.error("create message"));
        }
        state.next_message_id += 1;
        let mut sent = self::message(channel_id, state.next_message_id, BOT);
        sent.content = message.content.unwrap_or_default();
        sent.author.bot = true;
        Ok(sent)
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        self.state().calls.push(Call::DeleteMessage {
            channel: channel_id,
            message: message_id,
        });
        Ok(())
    }

    async fn get_guild_member(&self, _guild_id: GuildId, user_id: UserId) -> Result<Member> {
        let state = self.state();
        if let Some(kind) = state.fail_member {
            return Err(kind.error("get guild member"));
        }
        state
            .members
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::not_found("get guild member"))
    }
}

pub fn message(channel: ChannelId, id: u64, author: UserId) -> Message {
    Message {
        id: MessageId::new(id),
        channel_id: channel,
        author: Author {
            id: author,
            username: format!("user{author}"),
            bot: false,
        },
        content: format!("message {id}"),
        timestamp: Utc::now(),
        attachments: Vec::new(),
    }
}

pub fn member(user: u64, roles: &[u64]) -> Member {
    Member {
        user: Author {
            id: UserId::new(user),
            username: format!("user{user}"),
            bot: false,
        },
        roles: roles.iter().copied().map(RoleId::new).collect(),
        nick: None,
    }
}

pub fn channel(id: ChannelId, kind: ChannelKind, parent: Option<ChannelId>) -> Channel {
    Channel {
        id,
        kind,
        guild_id: Some(GUILD),
        parent_id: parent,
        name: Some(format!("ticket-{id}")),
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

/// In-memory store that fails chosen operations on demand.
pub struct FailingStore {
    inner: InMemoryTicketStore,
    failing: Mutex<HashSet<&'static str>>,
    lose_close_race: Mutex<bool>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryTicketStore::new(),
            failing: Mutex::new(HashSet::new()),
            lose_close_race: Mutex::new(false),
        }
    }

    pub fn inner(&self) -> &InMemoryTicketStore {
        &self.inner
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    /// Make `set_closed` behave as if a concurrent attempt closed the ticket
    /// first.
    pub fn lose_close_race(&self) {
        *self.lose_close_race.lock().unwrap() = true;
    }

    fn check(&self, operation: &'static str) -> tickets_store::Result<()> {
        if self.failing.lock().unwrap().contains(operation) {
            return Err(tickets_store::Error::message(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for FailingStore {
    async fn get_ticket_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> tickets_store::Result<Option<Ticket>> {
        self.check("get_ticket_by_channel")?;
        self.inner.get_ticket_by_channel(guild_id, channel_id).await
    }

    async fn set_closed(&self, guild_id: GuildId, ticket_id: TicketId) -> tickets_store::Result<bool> {
        self.check("set_closed")?;
        if *self.lose_close_race.lock().unwrap() {
            self.inner.set_closed(guild_id, ticket_id).await?;
            return Ok(false);
        }
        self.inner.set_closed(guild_id, ticket_id).await
    }

    async fn set_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        metadata: &CloseMetadata,
    ) -> tickets_store::Result<()> {
        self.check("set_close_metadata")?;
        self.inner.set_close_metadata(guild_id, ticket_id, metadata).await
    }

    async fn get_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<Option<CloseMetadata>> {
        self.inner.get_close_metadata(guild_id, ticket_id).await
    }

    async fn set_has_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        has_transcript: bool,
    ) -> tickets_store::Result<()> {
        self.check("set_has_transcript")?;
        self.inner.set_has_transcript(guild_id, ticket_id, has_transcript).await
    }

    async fn add_participants(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        users: &[UserId],
    ) -> tickets_store::Result<()> {
        self.check("add_participants")?;
        self.inner.add_participants(guild_id, ticket_id, users).await
    }

    async fn has_participated(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> tickets_store::Result<bool> {
        self.check("has_participated")?;
        self.inner.has_participated(guild_id, ticket_id, user_id).await
    }

    async fn exclude_from_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<()> {
        self.check("exclude_from_autoclose")?;
        self.inner.exclude_from_autoclose(guild_id, ticket_id).await
    }

    async fn include_in_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<()> {
        self.check("include_in_autoclose")?;
        self.inner.include_in_autoclose(guild_id, ticket_id).await
    }

    async fn exclude_all_open_from_autoclose(&self, guild_id: GuildId) -> tickets_store::Result<u64> {
        self.check("exclude_all_open_from_autoclose")?;
        self.inner.exclude_all_open_from_autoclose(guild_id).await
    }

    async fn is_excluded_from_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<bool> {
        self.inner.is_excluded_from_autoclose(guild_id, ticket_id).await
    }

    async fn delete_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> tickets_store::Result<()> {
        self.check("delete_webhook")?;
        self.inner.delete_webhook(guild_id, ticket_id).await
    }

    async fn delete_close_request(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<()> {
        self.check("delete_close_request")?;
        self.inner.delete_close_request(guild_id, ticket_id).await
    }

    async fn set_join_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        message_id: Option<MessageId>,
    ) -> tickets_store::Result<()> {
        self.check("set_join_message")?;
        self.inner.set_join_message(guild_id, ticket_id, message_id).await
    }

    async fn set_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        record: ArchiveRecord,
    ) -> tickets_store::Result<()> {
        self.check("set_archive_message")?;
        self.inner.set_archive_message(guild_id, ticket_id, record).await
    }

    async fn get_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> tickets_store::Result<Option<ArchiveRecord>> {
        self.inner.get_archive_message(guild_id, ticket_id).await
    }

    async fn list_autoclose_candidates(
        &self,
        guild_id: GuildId,
        opened_before: DateTime<Utc>,
    ) -> tickets_store::Result<Vec<Ticket>> {
        self.check("list_autoclose_candidates")?;
        self.inner.list_autoclose_candidates(guild_id, opened_before).await
    }
}

// ── Archive ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingArchive {
    stored: Mutex<Vec<(TicketId, Vec<MessageId>)>>,
    channels: Mutex<Vec<(ChannelId, Vec<MessageId>)>>,
    fail: Mutex<bool>,
}

impl RecordingArchive {
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn stored(&self) -> Vec<(TicketId, Vec<MessageId>)> {
        self.stored.lock().unwrap().clone()
    }

    /// Transcripts of channels without a ticket record.
    pub fn stored_channels(&self) -> Vec<(ChannelId, Vec<MessageId>)> {
        self.channels.lock().unwrap().clone()
    }

    fn check(&self) -> tickets_archive::Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(tickets_archive::Error::Status {
                status: 503,
                body: "archiver unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TranscriptArchive for RecordingArchive {
    async fn store_transcript(
        &self,
        _guild_id: GuildId,
        ticket_id: TicketId,
        messages: &[Message],
    ) -> tickets_archive::Result<ArchiveReference> {
        self.check()?;
        self.stored
            .lock()
            .unwrap()
            .push((ticket_id, messages.iter().map(|m| m.id).collect()));
        Ok(ArchiveReference {
            location: format!("memory://{ticket_id}"),
        })
    }

    async fn store_channel_transcript(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
        messages: &[Message],
    ) -> tickets_archive::Result<ArchiveReference> {
        self.check()?;
        self.channels
            .lock()
            .unwrap()
            .push((channel_id, messages.iter().map(|m| m.id).collect()));
        Ok(ArchiveReference {
            location: format!("memory://channels/{channel_id}"),
        })
    }
}

// ── Harness ─────────────────────────────────────────────────────────────────

/// Coordinator wired to fakes, with handles to inspect each of them.
pub struct Harness {
    pub gateway: Arc<RecordingGateway>,
    pub store: Arc<FailingStore>,
    pub archive: Arc<RecordingArchive>,
    pub dm_cache: Arc<DmChannelCache>,
    pub settings: GuildSettings,
    pub config: ClosureConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(RecordingGateway::new()),
            store: Arc::new(FailingStore::new()),
            archive: Arc::new(RecordingArchive::default()),
            dm_cache: Arc::new(DmChannelCache::new()),
            settings: GuildSettings {
                allowed_categories: vec![CATEGORY],
                support_roles: vec![RoleId::new(200)],
                admin_roles: vec![RoleId::new(100)],
                ..Default::default()
            },
            config: ClosureConfig {
                thread_archive_delay_ms: 0,
                force_close_delay_ms: 0,
                ..Default::default()
            },
        }
    }

    pub fn coordinator(&self) -> ClosureCoordinator {
        ClosureCoordinator::new(
            self.store.clone(),
            self.gateway.clone(),
            self.archive.clone(),
            Arc::new(RolePermissions::new(self.gateway.clone())),
            self.dm_cache.clone(),
            self.config.clone(),
        )
    }

    /// Open ticket `id` in channel `channel`, opened by `opener` two days ago,
    /// with a live channel of the matching kind.
    pub fn open_ticket(&self, id: u64, channel: u64, opener: u64, thread: bool) -> Ticket {
        let channel_id = ChannelId::new(channel);
        let mut ticket = Ticket::new(
            GUILD,
            TicketId::new(id),
            channel_id,
            UserId::new(opener),
            Utc::now() - Duration::hours(48),
        );
        ticket.is_thread = thread;
        let kind = if thread {
            ChannelKind::PrivateThread
        } else {
            ChannelKind::Text
        };
        self.gateway
            .add_channel(self::channel(channel_id, kind, Some(CATEGORY)));
        self.store.inner().insert_ticket(ticket.clone());
        ticket
    }
}
