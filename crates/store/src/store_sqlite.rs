//! SQLite-backed ticket store using sqlx.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqlitePoolOptions, SqliteRow},
    },
    tickets_common::{ChannelId, GuildId, MessageId, TicketId, UserId},
    tracing::debug,
};

use crate::{
    Error, Result,
    store::TicketStore,
    types::{ArchiveRecord, CloseMetadata, Ticket},
};

const TICKET_COLUMNS: &str = "guild_id, id, channel_id, user_id, open, is_thread, \
                              join_message_id, open_time_ms, close_time_ms, has_transcript";

/// Persistence for tickets and their closure side tables.
pub struct SqliteTicketStore {
    pool: SqlitePool,
}

impl SqliteTicketStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 5).await
    }

    /// Like [`SqliteTicketStore::new`] with an explicit pool size.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a ticket row. Ticket creation lives outside this workspace;
    /// this is how tooling and tests seed the table.
    pub async fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        sqlx::query(
            "INSERT INTO tickets (guild_id, id, channel_id, user_id, open, is_thread,
                                  join_message_id, open_time_ms, close_time_ms, has_transcript)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(guild_id, id) DO UPDATE SET
                channel_id = excluded.channel_id,
                user_id = excluded.user_id,
                open = excluded.open,
                is_thread = excluded.is_thread,
                join_message_id = excluded.join_message_id,
                open_time_ms = excluded.open_time_ms,
                close_time_ms = excluded.close_time_ms,
                has_transcript = excluded.has_transcript",
        )
        .bind(snowflake(ticket.guild_id.get()))
        .bind(snowflake(ticket.id.get()))
        .bind(ticket.channel_id.map(|c| snowflake(c.get())))
        .bind(snowflake(ticket.user_id.get()))
        .bind(ticket.open)
        .bind(ticket.is_thread)
        .bind(ticket.join_message_id.map(|m| snowflake(m.get())))
        .bind(ticket.open_time.timestamp_millis())
        .bind(ticket.close_time.map(|t| t.timestamp_millis()))
        .bind(ticket.has_transcript)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the webhook a non-thread ticket posts through.
    pub async fn insert_webhook(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        webhook_id: u64,
        token: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhooks (guild_id, ticket_id, webhook_id, token) VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id, ticket_id) DO UPDATE SET
                webhook_id = excluded.webhook_id, token = excluded.token",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .bind(snowflake(webhook_id))
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a pending close request.
    pub async fn insert_close_request(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        user_id: UserId,
        reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO close_requests (guild_id, ticket_id, user_id, close_at_ms, reason)
             VALUES (?, ?, ?, NULL, ?)
             ON CONFLICT(guild_id, ticket_id) DO UPDATE SET
                user_id = excluded.user_id, reason = excluded.reason",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .bind(snowflake(user_id.get()))
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, table: &str, guild_id: GuildId, ticket_id: TicketId) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {table} WHERE guild_id = ? AND ticket_id = ?");
        let row = sqlx::query(&sql)
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn has_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<bool> {
        self.exists("webhooks", guild_id, ticket_id).await
    }

    pub async fn has_close_request(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<bool> {
        self.exists("close_requests", guild_id, ticket_id).await
    }

    fn ensure_updated(
        rows_affected: u64,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<()> {
        if rows_affected == 0 {
            return Err(Error::ticket_not_found(guild_id, ticket_id));
        }
        Ok(())
    }
}

/// Snowflakes use the full u64 range; SQLite integers are i64. The bit
/// pattern round-trips.
fn snowflake(value: u64) -> i64 {
    value as i64
}

fn unsnowflake(value: i64) -> u64 {
    value as u64
}

fn timestamp(column: &'static str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(Error::InvalidValue {
        column,
        value: millis,
    })
}

fn ticket_from_row(row: &SqliteRow) -> Result<Ticket> {
    let close_time = row
        .try_get::<Option<i64>, _>("close_time_ms")?
        .map(|ms| timestamp("close_time_ms", ms))
        .transpose()?;
    Ok(Ticket {
        id: TicketId::new(unsnowflake(row.try_get("id")?)),
        guild_id: GuildId::new(unsnowflake(row.try_get("guild_id")?)),
        channel_id: row
            .try_get::<Option<i64>, _>("channel_id")?
            .map(|v| ChannelId::new(unsnowflake(v))),
        user_id: UserId::new(unsnowflake(row.try_get("user_id")?)),
        open: row.try_get("open")?,
        is_thread: row.try_get("is_thread")?,
        join_message_id: row
            .try_get::<Option<i64>, _>("join_message_id")?
            .map(|v| MessageId::new(unsnowflake(v))),
        open_time: timestamp("open_time_ms", row.try_get("open_time_ms")?)?,
        close_time,
        has_transcript: row.try_get("has_transcript")?,
    })
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn get_ticket_by_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE guild_id = ? AND channel_id = ? LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(channel_id.get()))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn set_closed(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tickets SET open = 0, close_time_ms = ?
             WHERE guild_id = ? AND id = ? AND open = 1",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Zero rows: either already closed or missing altogether.
        let exists = sqlx::query("SELECT 1 FROM tickets WHERE guild_id = ? AND id = ?")
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => {
                debug!(%guild_id, %ticket_id, "ticket already closed");
                Ok(false)
            },
            None => Err(Error::ticket_not_found(guild_id, ticket_id)),
        }
    }

    async fn set_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        metadata: &CloseMetadata,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO close_reasons (guild_id, ticket_id, reason, closed_by) VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id, ticket_id) DO UPDATE SET
                reason = excluded.reason, closed_by = excluded.closed_by",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .bind(metadata.reason.as_deref())
        .bind(metadata.closed_by.map(|u| snowflake(u.get())))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_close_metadata(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<CloseMetadata>> {
        let row = sqlx::query(
            "SELECT reason, closed_by FROM close_reasons WHERE guild_id = ? AND ticket_id = ?",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(CloseMetadata {
            reason: row.try_get("reason")?,
            closed_by: row
                .try_get::<Option<i64>, _>("closed_by")?
                .map(|v| UserId::new(unsnowflake(v))),
        }))
    }

    async fn set_has_transcript(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        has_transcript: bool,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE tickets SET has_transcript = ? WHERE guild_id = ? AND id = ?")
                .bind(has_transcript)
                .bind(snowflake(guild_id.get()))
                .bind(snowflake(ticket_id.get()))
                .execute(&self.pool)
                .await?;
        Self::ensure_updated(result.rows_affected(), guild_id, ticket_id)
    }

    async fn add_participants(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        users: &[UserId],
    ) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for user in users {
            sqlx::query(
                "INSERT OR IGNORE INTO participants (guild_id, ticket_id, user_id) VALUES (?, ?, ?)",
            )
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .bind(snowflake(user.get()))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn has_participated(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        user_id: UserId,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM participants WHERE guild_id = ? AND ticket_id = ? AND user_id = ?",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .bind(snowflake(user_id.get()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn exclude_from_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO autoclose_exclude (guild_id, ticket_id) VALUES (?, ?)")
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn include_in_autoclose(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        sqlx::query("DELETE FROM autoclose_exclude WHERE guild_id = ? AND ticket_id = ?")
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exclude_all_open_from_autoclose(&self, guild_id: GuildId) -> Result<u64> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO autoclose_exclude (guild_id, ticket_id)
             SELECT guild_id, id FROM tickets WHERE guild_id = ? AND open = 1",
        )
        .bind(snowflake(guild_id.get()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn is_excluded_from_autoclose(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<bool> {
        self.exists("autoclose_exclude", guild_id, ticket_id).await
    }

    async fn delete_webhook(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        sqlx::query("DELETE FROM webhooks WHERE guild_id = ? AND ticket_id = ?")
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_close_request(&self, guild_id: GuildId, ticket_id: TicketId) -> Result<()> {
        sqlx::query("DELETE FROM close_requests WHERE guild_id = ? AND ticket_id = ?")
            .bind(snowflake(guild_id.get()))
            .bind(snowflake(ticket_id.get()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_join_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        message_id: Option<MessageId>,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE tickets SET join_message_id = ? WHERE guild_id = ? AND id = ?")
                .bind(message_id.map(|m| snowflake(m.get())))
                .bind(snowflake(guild_id.get()))
                .bind(snowflake(ticket_id.get()))
                .execute(&self.pool)
                .await?;
        Self::ensure_updated(result.rows_affected(), guild_id, ticket_id)
    }

    async fn set_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
        record: ArchiveRecord,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO archive_messages (guild_id, ticket_id, channel_id, message_id)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id, ticket_id) DO UPDATE SET
                channel_id = excluded.channel_id, message_id = excluded.message_id",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .bind(snowflake(record.channel_id.get()))
        .bind(snowflake(record.message_id.get()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_archive_message(
        &self,
        guild_id: GuildId,
        ticket_id: TicketId,
    ) -> Result<Option<ArchiveRecord>> {
        let row = sqlx::query(
            "SELECT channel_id, message_id FROM archive_messages
             WHERE guild_id = ? AND ticket_id = ?",
        )
        .bind(snowflake(guild_id.get()))
        .bind(snowflake(ticket_id.get()))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ArchiveRecord {
            channel_id: ChannelId::new(unsnowflake(row.try_get("channel_id")?)),
            message_id: MessageId::new(unsnowflake(row.try_get("message_id")?)),
        }))
    }

    async fn list_autoclose_candidates(
        &self,
        guild_id: GuildId,
        opened_before: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets t
             WHERE t.guild_id = ? AND t.open = 1 AND t.open_time_ms < ?
               AND NOT EXISTS (
                   SELECT 1 FROM autoclose_exclude e
                   WHERE e.guild_id = t.guild_id AND e.ticket_id = t.id
               )
             ORDER BY t.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(snowflake(guild_id.get()))
            .bind(opened_before.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ticket_from_row).collect()
    }
}
