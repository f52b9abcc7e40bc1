use {
    thiserror::Error,
    tickets_common::{GuildId, TicketId},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("ticket {ticket_id} not found in guild {guild_id}")]
    TicketNotFound {
        guild_id: GuildId,
        ticket_id: TicketId,
    },

    #[error("invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn ticket_not_found(guild_id: GuildId, ticket_id: TicketId) -> Self {
        Self::TicketNotFound {
            guild_id,
            ticket_id,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
