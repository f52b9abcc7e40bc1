//! Discord JSON payloads and their mapping onto the channel model.

use {
    serde::{Deserialize, Serialize},
    tickets_channels::{
        ActionRow, Button, ButtonStyle, Channel, ChannelKind, Embed, EmbedAuthor, EmbedField,
        OutgoingMessage,
    },
    tickets_common::{ChannelId, GuildId},
};

// ── Inbound ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct WireChannel {
    id: ChannelId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    guild_id: Option<GuildId>,
    #[serde(default)]
    parent_id: Option<ChannelId>,
    #[serde(default)]
    name: Option<String>,
}

impl From<WireChannel> for Channel {
    fn from(wire: WireChannel) -> Self {
        let kind = match wire.kind {
            0 | 5 => ChannelKind::Text,
            1 | 3 => ChannelKind::Direct,
            4 => ChannelKind::Category,
            10 | 11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            _ => ChannelKind::Other,
        };
        Self {
            id: wire.id,
            kind,
            guild_id: wire.guild_id,
            parent_id: wire.parent_id,
            name: wire.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub id: tickets_common::UserId,
}

// ── Outbound ────────────────────────────────────────────────────────────────

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<WireEmbed<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<WireActionRow<'a>>,
}

#[derive(Debug, Serialize)]
struct WireEmbed<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<u32>,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [EmbedField],
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireActionRow<'a> {
    #[serde(rename = "type")]
    kind: u8,
    components: Vec<WireButton<'a>>,
}

#[derive(Debug, Serialize)]
struct WireButton<'a> {
    #[serde(rename = "type")]
    kind: u8,
    style: u8,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emoji: Option<WireEmoji<'a>>,
}

#[derive(Debug, Serialize)]
struct WireEmoji<'a> {
    name: &'a str,
}

fn no_fields(fields: &&[EmbedField]) -> bool {
    fields.is_empty()
}

fn button_style(style: ButtonStyle) -> u8 {
    match style {
        ButtonStyle::Primary => 1,
        ButtonStyle::Secondary => 2,
        ButtonStyle::Success => 3,
        ButtonStyle::Danger => 4,
        ButtonStyle::Link => 5,
    }
}

impl<'a> From<&'a Embed> for WireEmbed<'a> {
    fn from(embed: &'a Embed) -> Self {
        Self {
            title: embed.title.as_deref(),
            description: embed.description.as_deref(),
            color: embed.color,
            fields: &embed.fields,
            author: embed.author.as_ref(),
            timestamp: embed.timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

impl<'a> From<&'a Button> for WireButton<'a> {
    fn from(button: &'a Button) -> Self {
        Self {
            kind: COMPONENT_BUTTON,
            style: button_style(button.style),
            label: &button.label,
            custom_id: button.custom_id.as_deref(),
            url: button.url.as_deref(),
            emoji: button.emoji.as_deref().map(|name| WireEmoji { name }),
        }
    }
}

impl<'a> From<&'a ActionRow> for WireActionRow<'a> {
    fn from(row: &'a ActionRow) -> Self {
        Self {
            kind: COMPONENT_ACTION_ROW,
            components: row.buttons.iter().map(WireButton::from).collect(),
        }
    }
}

impl<'a> From<&'a OutgoingMessage> for WireMessage<'a> {
    fn from(message: &'a OutgoingMessage) -> Self {
        Self {
            content: message.content.as_deref(),
            embeds: message.embeds.iter().map(WireEmbed::from).collect(),
            components: message
                .components
                .iter()
                .filter(|row| !row.buttons.is_empty())
                .map(WireActionRow::from)
                .collect(),
        }
    }
}
