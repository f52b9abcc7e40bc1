//! Config schema types (database, discord, archive, closure, guild settings).
use std::{collections::HashMap, path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tickets_common::{ChannelId, GuildId, RoleId, UserId},
};

/// Maximum page size accepted by the message history endpoint.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketsConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub archive: ArchiveConfig,
    pub closure: ClosureConfig,
    pub metrics: MetricsConfig,
    /// Settings applied to every guild unless overridden.
    pub defaults: GuildSettings,
    /// Per-guild overrides keyed by guild id.
    pub guilds: HashMap<String, GuildOverrides>,
}

impl TicketsConfig {
    /// Effective settings for `guild_id`: the defaults with any override for
    /// that guild applied on top.
    #[must_use]
    pub fn guild_settings(&self, guild_id: GuildId) -> GuildSettings {
        let mut settings = self.defaults.clone();
        if let Some(overrides) = self.guilds.get(&guild_id.to_string()) {
            overrides.apply(&mut settings);
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tickets.db?mode=rwc".into(),
            max_connections: 5,
        }
    }
}

/// Chat platform REST credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
    pub api_base: String,
    /// The bot's own user id. Looked up from the API when absent.
    pub bot_user_id: Option<UserId>,
    pub request_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_base: "https://discord.com/api/v10".into(),
            bot_user_id: None,
            request_timeout_secs: 15,
        }
    }
}

impl DiscordConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("bot_user_id", &self.bot_user_id)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_optional_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Where transcripts are stored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ArchiveConfig {
    /// POST transcripts to an archiver service.
    Http {
        url: String,
        #[serde(
            default,
            serialize_with = "serialize_optional_secret",
            skip_serializing_if = "Option::is_none"
        )]
        auth_token: Option<Secret<String>>,
    },
    /// Write one JSON file per ticket below `dir`.
    Fs { dir: PathBuf },
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::Fs {
            dir: PathBuf::from("transcripts"),
        }
    }
}

impl std::fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { url, auth_token } => f
                .debug_struct("Http")
                .field("url", url)
                .field("auth_token", &auth_token.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            Self::Fs { dir } => f.debug_struct("Fs").field("dir", dir).finish(),
        }
    }
}

/// Tunables for the closure workflow itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosureConfig {
    /// Messages requested per history page (1..=100).
    pub page_size: u8,
    /// Pause between the closing message and locking a thread. The platform
    /// rejects an archive issued immediately after a send.
    pub thread_archive_delay_ms: u64,
    /// Pause between the force-close notice and deleting the channel.
    pub force_close_delay_ms: u64,
    /// Link template for the "view transcript" button. `{guild}` and
    /// `{ticket}` are replaced.
    pub transcript_url: String,
    /// Reason recorded for tickets closed by the autoclose sweep.
    pub autoclose_reason: String,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            thread_archive_delay_ms: 250,
            force_close_delay_ms: 5_000,
            transcript_url: "https://dashboard.tickets.bot/manage/{guild}/transcripts/view/{ticket}"
                .into(),
            autoclose_reason: "Automatically closed due to inactivity".into(),
        }
    }
}

impl ClosureConfig {
    #[must_use]
    pub fn thread_archive_delay(&self) -> Duration {
        Duration::from_millis(self.thread_archive_delay_ms)
    }

    #[must_use]
    pub fn force_close_delay(&self) -> Duration {
        Duration::from_millis(self.force_close_delay_ms)
    }

    /// Page size clamped to what the history endpoint accepts.
    #[must_use]
    pub fn effective_page_size(&self) -> u8 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn transcript_link(&self, guild_id: GuildId, ticket_id: u64) -> String {
        self.transcript_url
            .replace("{guild}", &guild_id.to_string())
            .replace("{ticket}", &ticket_id.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Per-guild feature flags and policy passed explicitly into every closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub store_transcripts: bool,
    pub feedback_enabled: bool,
    pub archive_channel: Option<ChannelId>,
    /// Channel holding "join thread" prompts for thread-mode tickets.
    pub ticket_notification_channel: Option<ChannelId>,
    /// Categories whose channels count as tickets even without a store record
    /// (manually created or legacy ticket channels).
    pub allowed_categories: Vec<ChannelId>,
    /// Upper bound on messages collected into one transcript.
    pub max_transcript_messages: usize,
    /// Tickets open longer than this are picked up by the autoclose sweep.
    pub autoclose_after_hours: Option<u64>,
    pub admin_users: Vec<UserId>,
    pub admin_roles: Vec<RoleId>,
    pub support_users: Vec<UserId>,
    pub support_roles: Vec<RoleId>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            store_transcripts: true,
            feedback_enabled: true,
            archive_channel: None,
            ticket_notification_channel: None,
            allowed_categories: Vec::new(),
            max_transcript_messages: 10_000,
            autoclose_after_hours: None,
            admin_users: Vec::new(),
            admin_roles: Vec::new(),
            support_users: Vec::new(),
            support_roles: Vec::new(),
        }
    }
}

impl GuildSettings {
    #[must_use]
    pub fn is_allowed_category(&self, category: ChannelId) -> bool {
        self.allowed_categories.contains(&category)
    }
}

/// Sparse per-guild override; unset fields fall back to `[defaults]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildOverrides {
    pub store_transcripts: Option<bool>,
    pub feedback_enabled: Option<bool>,
    pub archive_channel: Option<ChannelId>,
    pub ticket_notification_channel: Option<ChannelId>,
    pub allowed_categories: Option<Vec<ChannelId>>,
    pub max_transcript_messages: Option<usize>,
    pub autoclose_after_hours: Option<u64>,
    pub admin_users: Option<Vec<UserId>>,
    pub admin_roles: Option<Vec<RoleId>>,
    pub support_users: Option<Vec<UserId>>,
    pub support_roles: Option<Vec<RoleId>>,
}

impl GuildOverrides {
    pub fn apply(&self, settings: &mut GuildSettings) {
        if let Some(v) = self.store_transcripts {
            settings.store_transcripts = v;
        }
        if let Some(v) = self.feedback_enabled {
            settings.feedback_enabled = v;
        }
        if self.archive_channel.is_some() {
            settings.archive_channel = self.archive_channel;
        }
        if self.ticket_notification_channel.is_some() {
            settings.ticket_notification_channel = self.ticket_notification_channel;
        }
        if let Some(v) = &self.allowed_categories {
            settings.allowed_categories = v.clone();
        }
        if let Some(v) = self.max_transcript_messages {
            settings.max_transcript_messages = v;
        }
        if self.autoclose_after_hours.is_some() {
            settings.autoclose_after_hours = self.autoclose_after_hours;
        }
        if let Some(v) = &self.admin_users {
            settings.admin_users = v.clone();
        }
        if let Some(v) = &self.admin_roles {
            settings.admin_roles = v.clone();
        }
        if let Some(v) = &self.support_users {
            settings.support_users = v.clone();
        }
        if let Some(v) = &self.support_roles {
            settings.support_roles = v.clone();
        }
    }
}
