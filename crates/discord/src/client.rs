//! Thin Discord REST client covering the calls ticket closure needs.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, Method, RequestBuilder, Response},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tickets_channels::{
        Channel, ChannelEdit, ChannelGateway, Error, Guild, Member, Message, MessagePage,
        OutgoingMessage, Result,
    },
    tickets_common::{ChannelId, GuildId, MessageId, UserId},
    tickets_config::DiscordConfig,
    tracing::{debug, info},
};

use crate::wire::{WireChannel, WireMessage, WireUser};

const USER_AGENT: &str = concat!(
    "DiscordBot (tickets, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Bot-token authenticated REST gateway.
pub struct DiscordRest {
    client: Client,
    api_base: String,
    token: Secret<String>,
    bot_user_id: UserId,
}

impl DiscordRest {
    /// Build a client. When the config does not carry the bot's user id it is
    /// fetched from `/users/@me`.
    pub async fn connect(config: &DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| Error::external("failed to build HTTP client", source))?;

        let mut rest = Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            bot_user_id: config.bot_user_id.unwrap_or(UserId::new(0)),
        };

        if config.bot_user_id.is_none() {
            let me: WireUser = rest
                .send_json(rest.request(Method::GET, "/users/@me"), "get current user")
                .await?;
            rest.bot_user_id = me.id;
        }
        info!(bot_user_id = %rest.bot_user_id, "discord REST client ready");
        Ok(rest)
    }

    /// Build a client with a known bot identity, without any network call.
    pub fn new(client: Client, api_base: &str, token: Secret<String>, bot_user_id: UserId) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            bot_user_id,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header(
                "Authorization",
                format!("Bot {}", self.token.expose_secret()),
            )
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let resp = request
            .send()
            .await
            .map_err(|source| Error::external(context, source))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), context, "discord request failed");
            return Err(Error::from_status(status.as_u16(), context, body));
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let resp = self.send(request, context).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| Error::external(context, source))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ChannelGateway for DiscordRest {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id
    }

    async fn get_channel(&self, channel_id: ChannelId) -> Result<Channel> {
        let wire: WireChannel = self
            .send_json(
                self.request(Method::GET, &format!("/channels/{channel_id}")),
                "get channel",
            )
            .await?;
        Ok(wire.into())
    }

    async fn get_guild(&self, guild_id: GuildId) -> Result<Guild> {
        self.send_json(
            self.request(Method::GET, &format!("/guilds/{guild_id}")),
            "get guild",
        )
        .await
    }

    async fn get_messages(&self, channel_id: ChannelId, page: MessagePage) -> Result<Vec<Message>> {
        let mut query = vec![("limit", page.limit.to_string())];
        if let Some(before) = page.before {
            query.push(("before", before.to_string()));
        }
        self.send_json(
            self.request(Method::GET, &format!("/channels/{channel_id}/messages"))
                .query(&query),
            "get messages",
        )
        .await
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()> {
        self.send(
            self.request(Method::DELETE, &format!("/channels/{channel_id}")),
            "delete channel",
        )
        .await?;
        Ok(())
    }

    async fn modify_channel(&self, channel_id: ChannelId, edit: ChannelEdit) -> Result<Channel> {
        let wire: WireChannel = self
            .send_json(
                self.request(Method::PATCH, &format!("/channels/{channel_id}"))
                    .json(&edit),
                "modify channel",
            )
            .await?;
        Ok(wire.into())
    }

    async fn create_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<Message> {
        self.send_json(
            self.request(Method::POST, &format!("/channels/{channel_id}/messages"))
                .json(&WireMessage::from(&message)),
            "create message",
        )
        .await
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        self.send(
            self.request(
                Method::DELETE,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            ),
            "delete message",
        )
        .await?;
        Ok(())
    }

    async fn get_guild_member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member> {
        self.send_json(
            self.request(Method::GET, &format!("/guilds/{guild_id}/members/{user_id}")),
            "get guild member",
        )
        .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        mockito::Matcher,
        tickets_channels::{ChannelKind, Embed},
    };

    fn rest(server: &mockito::Server) -> DiscordRest {
        DiscordRest::new(
            Client::new(),
            &server.url(),
            Secret::new("tok".into()),
            UserId::new(1),
        )
    }

    #[tokio::test]
    async fn connect_looks_up_bot_identity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/@me")
            .match_header("authorization", "Bot tok")
            .with_status(200)
            .with_body(r#"{"id":"1150000000000000000","username":"tickets"}"#)
            .create_async()
            .await;

        let config = DiscordConfig {
            token: Secret::new("tok".into()),
            api_base: format!("{}/", server.url()),
            ..Default::default()
        };
        let rest = DiscordRest::connect(&config).await.unwrap();

        assert_eq!(rest.bot_user_id(), UserId::new(1_150_000_000_000_000_000));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_messages_sends_cursor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/channels/9/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("before".into(), "55".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{
                    "id": "54",
                    "channel_id": "9",
                    "author": {"id": "3", "username": "opener", "discriminator": "0"},
                    "content": "hello",
                    "timestamp": "2026-03-01T12:00:00.000000+00:00",
                    "attachments": [],
                    "tts": false
                }]"#,
            )
            .create_async()
            .await;

        let messages = rest(&server)
            .get_messages(ChannelId::new(9), MessagePage {
                before: Some(MessageId::new(55)),
                limit: 100,
            })
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::new(54));
        assert_eq!(messages[0].author.id, UserId::new(3));
        assert!(!messages[0].author.bot);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_maps_to_access_denied() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/channels/9")
            .with_status(403)
            .with_body(r#"{"message":"Missing Access","code":50001}"#)
            .create_async()
            .await;

        let err = rest(&server)
            .delete_channel(ChannelId::new(9))
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[tokio::test]
    async fn missing_member_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/guilds/5/members/3")
            .with_status(404)
            .with_body(r#"{"message":"Unknown Member","code":10007}"#)
            .create_async()
            .await;

        let err = rest(&server)
            .get_guild_member(GuildId::new(5), UserId::new(3))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn archive_edit_patches_flags_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/channels/9")
            .match_body(Matcher::Json(serde_json::json!({
                "archived": true,
                "locked": true
            })))
            .with_status(200)
            .with_body(r#"{"id":"9","type":12,"guild_id":"5","parent_id":"4"}"#)
            .create_async()
            .await;

        let channel = rest(&server)
            .modify_channel(ChannelId::new(9), ChannelEdit::archive_and_lock())
            .await
            .unwrap();
        assert_eq!(channel.kind, ChannelKind::PrivateThread);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_message_posts_embed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/channels/9/messages")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "embeds": [{ "title": "Ticket Closed" }]
            })))
            .with_status(200)
            .with_body(
                r#"{"id":"70","channel_id":"9","author":{"id":"1","username":"tickets","bot":true},
                    "content":"","timestamp":"2026-03-01T12:00:00+00:00"}"#,
            )
            .create_async()
            .await;

        let sent = rest(&server)
            .create_message(
                ChannelId::new(9),
                OutgoingMessage::embed(Embed {
                    title: Some("Ticket Closed".into()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(sent.id, MessageId::new(70));
        assert!(sent.author.bot);
        mock.assert_async().await;
    }
}
