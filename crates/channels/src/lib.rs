//! Chat platform port.
//!
//! The closure workflow talks to the platform only through
//! [`ChannelGateway`] and [`DirectChannelCache`]; concrete clients (see the
//! `tickets-discord` crate) and test fakes implement them.

pub mod dm_cache;
pub mod error;
pub mod gateway;
pub mod model;

pub use {
    dm_cache::{DirectChannelCache, DmChannelCache},
    error::{Error, Result},
    gateway::ChannelGateway,
    model::{
        ActionRow, Attachment, Author, Button, ButtonStyle, Channel, ChannelEdit, ChannelKind,
        Embed, EmbedAuthor, EmbedField, Guild, Member, Message, MessagePage, OutgoingMessage,
    },
};
