//! Shared identifiers, permission tiers and error helpers used across all
//! tickets crates.

pub mod error;
pub mod ids;
pub mod permission;

pub use {
    error::{Error, FromMessage, Result},
    ids::{ChannelId, GuildId, MessageId, RoleId, TicketId, UserId},
    permission::PermissionLevel,
};
