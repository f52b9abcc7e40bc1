//! Closure summary rendering.

use {
    chrono::{DateTime, Utc},
    tickets_channels::{ActionRow, Button, ButtonStyle, Embed, EmbedField, OutgoingMessage},
    tickets_common::{ChannelId, GuildId, TicketId, UserId},
};

pub const SUCCESS_COLOR: u32 = 0x2ECC71;

/// Optional controls attached below a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryElement {
    /// "View Transcript" link. Rendered only when a transcript URL is set.
    TranscriptLink,
    /// "View Thread" link. Rendered only when a thread URL is set.
    ThreadLink,
    /// 1 to 5 star rating buttons.
    Feedback,
}

/// What the archive channel and the opener are told about a closed ticket.
#[derive(Debug, Clone)]
pub struct CloseSummary {
    pub guild_id: GuildId,
    pub ticket_id: TicketId,
    pub opener: UserId,
    pub closed_by: UserId,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub transcript_url: Option<String>,
    pub thread_url: Option<String>,
}

impl CloseSummary {
    #[must_use]
    pub fn thread_url(guild_id: GuildId, channel_id: ChannelId) -> String {
        format!("https://discord.com/channels/{guild_id}/{channel_id}")
    }

    #[must_use]
    pub fn feedback_custom_id(guild_id: GuildId, ticket_id: TicketId, rating: u8) -> String {
        format!("rate_{guild_id}_{ticket_id}_{rating}")
    }

    #[must_use]
    pub fn embed(&self) -> Embed {
        let reason = match &self.reason {
            Some(reason) => format!("```{reason}```"),
            None => "No reason specified".to_string(),
        };
        Embed {
            title: Some("Ticket Closed".into()),
            description: None,
            color: Some(SUCCESS_COLOR),
            fields: vec![
                field("Ticket ID", self.ticket_id.to_string(), true),
                field("Opened By", format!("<@{}>", self.opener), true),
                field("Closed By", format!("<@{}>", self.closed_by), true),
                field("Open Time", discord_timestamp(self.open_time), true),
                field("Close Time", discord_timestamp(self.close_time), true),
                field("Reason", reason, false),
            ],
            author: None,
            timestamp: Some(self.close_time),
        }
    }

    /// Render the embed with one action row per entry in `rows`. Elements
    /// that cannot be rendered are skipped and empty rows are dropped.
    #[must_use]
    pub fn render(&self, rows: &[&[SummaryElement]]) -> OutgoingMessage {
        let components = rows
            .iter()
            .map(|row| ActionRow {
                buttons: row
                    .iter()
                    .flat_map(|element| self.buttons(*element))
                    .collect(),
            })
            .filter(|row| !row.buttons.is_empty())
            .collect();

        OutgoingMessage {
            content: None,
            embeds: vec![self.embed()],
            components,
        }
    }

    fn buttons(&self, element: SummaryElement) -> Vec<Button> {
        match element {
            SummaryElement::TranscriptLink => self
                .transcript_url
                .iter()
                .map(|url| Button::link("View Transcript", url.clone()).with_emoji("📄"))
                .collect(),
            SummaryElement::ThreadLink => self
                .thread_url
                .iter()
                .map(|url| Button::link("View Thread", url.clone()).with_emoji("🧵"))
                .collect(),
            SummaryElement::Feedback => (1..=5)
                .map(|rating| {
                    Button::action(
                        rating.to_string(),
                        Self::feedback_custom_id(self.guild_id, self.ticket_id, rating),
                        ButtonStyle::Primary,
                    )
                    .with_emoji("⭐")
                })
                .collect(),
        }
    }
}

fn field(name: &str, value: String, inline: bool) -> EmbedField {
    EmbedField {
        name: name.into(),
        value,
        inline,
    }
}

fn discord_timestamp(time: DateTime<Utc>) -> String {
    format!("<t:{}:f>", time.timestamp())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    fn summary() -> CloseSummary {
        CloseSummary {
            guild_id: GuildId::new(5),
            ticket_id: TicketId::new(17),
            opener: UserId::new(30),
            closed_by: UserId::new(40),
            open_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            close_time: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
            reason: None,
            transcript_url: Some("https://example.com/5/17".into()),
            thread_url: None,
        }
    }

    #[test]
    fn skips_unavailable_links_and_empty_rows() {
        let message = summary().render(&[
            &[SummaryElement::TranscriptLink, SummaryElement::ThreadLink],
            &[],
        ]);
        assert_eq!(message.components.len(), 1);
        let labels: Vec<_> = message.buttons().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["View Transcript"]);
    }

    #[test]
    fn feedback_row_has_five_ratings() {
        let message = summary().render(&[&[SummaryElement::Feedback]]);
        let ids: Vec<_> = message
            .buttons()
            .map(|b| b.custom_id.clone().unwrap())
            .collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], "rate_5_17_1");
        assert_eq!(ids[4], "rate_5_17_5");
    }

    #[test]
    fn embed_lists_reason() {
        let mut summary = summary();
        let embed = summary.embed();
        let reason = embed.fields.iter().find(|f| f.name == "Reason").unwrap();
        assert_eq!(reason.value, "No reason specified");

        summary.reason = Some("resolved".into());
        let embed = summary.embed();
        let reason = embed.fields.iter().find(|f| f.name == "Reason").unwrap();
        assert_eq!(reason.value, "```resolved```");
        assert!(embed.fields.iter().any(|f| f.value == "<@40>"));
    }
}
