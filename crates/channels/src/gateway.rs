use {
    async_trait::async_trait,
    tickets_common::{ChannelId, GuildId, MessageId, UserId},
};

use crate::{
    Result,
    model::{Channel, ChannelEdit, Guild, Member, Message, MessagePage, OutgoingMessage},
};

/// REST surface of the chat platform consumed by the closure workflow.
///
/// Every call may fail with [`crate::Error::AccessDenied`] or
/// [`crate::Error::NotFound`]; all other failures are generic.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// The bot's own user id. Closures requested by this identity are
    /// system-initiated.
    fn bot_user_id(&self) -> UserId;

    async fn get_channel(&self, channel_id: ChannelId) -> Result<Channel>;

    async fn get_guild(&self, guild_id: GuildId) -> Result<Guild>;

    /// One page of history, newest message first.
    async fn get_messages(&self, channel_id: ChannelId, page: MessagePage) -> Result<Vec<Message>>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<()>;

    async fn modify_channel(&self, channel_id: ChannelId, edit: ChannelEdit) -> Result<Channel>;

    async fn create_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> Result<Message>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;

    async fn get_guild_member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member>;
}
