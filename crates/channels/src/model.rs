//! Platform-neutral channel, message and member model.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tickets_common::{ChannelId, GuildId, MessageId, RoleId, UserId},
};

// ── Inbound ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Category,
    PublicThread,
    PrivateThread,
    Direct,
    Other,
}

impl ChannelKind {
    #[must_use]
    pub fn is_thread(self) -> bool {
        matches!(self, Self::PublicThread | Self::PrivateThread)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub guild_id: Option<GuildId>,
    /// Category for text channels, parent channel for threads.
    pub parent_id: Option<ChannelId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub icon: Option<String>,
}

impl Guild {
    #[must_use]
    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/icons/{}/{hash}.png", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// One message as delivered by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: Author,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    pub nick: Option<String>,
}

/// Cursor for one page of channel history, walking backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePage {
    /// Exclusive upper bound; `None` starts from the newest message.
    pub before: Option<MessageId>,
    pub limit: u8,
}

// ── Outbound ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

impl OutgoingMessage {
    #[must_use]
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    /// All buttons across every row, in display order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.components.iter().flat_map(|row| row.buttons.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    pub author: Option<EmbedAuthor>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub style: ButtonStyle,
    /// Interaction id for non-link buttons.
    pub custom_id: Option<String>,
    /// Target for link buttons.
    pub url: Option<String>,
    pub emoji: Option<String>,
}

impl Button {
    #[must_use]
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            style: ButtonStyle::Link,
            custom_id: None,
            url: Some(url.into()),
            emoji: None,
        }
    }

    #[must_use]
    pub fn action(label: impl Into<String>, custom_id: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            label: label.into(),
            style,
            custom_id: Some(custom_id.into()),
            url: None,
            emoji: None,
        }
    }

    #[must_use]
    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

/// Partial channel modification. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

impl ChannelEdit {
    /// Archive and lock a thread so nobody can post in it again.
    #[must_use]
    pub fn archive_and_lock() -> Self {
        Self {
            archived: Some(true),
            locked: Some(true),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_archive(&self) -> bool {
        self.archived == Some(true) || self.locked == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_kinds() {
        assert!(ChannelKind::PrivateThread.is_thread());
        assert!(!ChannelKind::Text.is_thread());
    }

    #[test]
    fn guild_icon_url() {
        let guild = Guild {
            id: GuildId::new(1),
            name: "Support".into(),
            icon: Some("abc".into()),
        };
        assert_eq!(
            guild.icon_url().as_deref(),
            Some("https://cdn.discordapp.com/icons/1/abc.png")
        );
    }

    #[test]
    fn archive_edit_only_sets_flags() {
        let edit = ChannelEdit::archive_and_lock();
        assert!(edit.is_archive());
        assert!(edit.name.is_none() && edit.topic.is_none());
        assert!(!ChannelEdit::default().is_archive());
    }
}
