//! Ticket persistence.
//!
//! [`TicketStore`] is the port the closure workflow writes through.
//! [`store_sqlite::SqliteTicketStore`] is the production backend,
//! [`store_memory::InMemoryTicketStore`] backs tests and dry runs.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    store::TicketStore,
    types::{ArchiveRecord, CloseMetadata, Ticket},
};

/// Run database migrations for the store crate.
///
/// Creates the `tickets` table and the per-ticket side tables. Call at
/// startup before [`store_sqlite::SqliteTicketStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
