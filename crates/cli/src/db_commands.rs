use std::path::PathBuf;

use {clap::Subcommand, tickets_config::TicketsConfig};

#[derive(Subcommand)]
pub enum DbAction {
    /// Delete the SQLite database file (and its WAL/SHM files).
    Reset,
    /// Clear all data from tables but keep the schema intact.
    Clear,
    /// Run all pending database migrations.
    Migrate,
}

/// Child tables first; they reference `tickets`.
const TABLES: &[&str] = &[
    "archive_messages",
    "close_requests",
    "webhooks",
    "autoclose_exclude",
    "participants",
    "close_reasons",
    "tickets",
];

pub async fn handle_db(config: &TicketsConfig, action: DbAction) -> anyhow::Result<()> {
    match action {
        DbAction::Reset => reset_database(&config.database.url),
        DbAction::Clear => clear_database(&config.database.url).await,
        DbAction::Migrate => run_migrations(&config.database.url).await,
    }
}

/// File behind a `sqlite:` URL, `None` for in-memory databases.
fn sqlite_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn reset_database(url: &str) -> anyhow::Result<()> {
    let Some(db) = sqlite_path(url) else {
        anyhow::bail!("{url} is not a file-backed SQLite database");
    };

    let mut deleted = false;
    for suffix in ["", "-wal", "-shm"] {
        let path = PathBuf::from(format!("{}{suffix}", db.display()));
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database files deleted. Run `tickets db migrate` to recreate them.");
    } else {
        println!("No database files found.");
    }

    Ok(())
}

async fn clear_database(url: &str) -> anyhow::Result<()> {
    let pool = sqlx::SqlitePool::connect(url).await?;

    for table in TABLES {
        let query = format!("DELETE FROM {table}");
        if let Err(e) = sqlx::query(&query).execute(&pool).await {
            // Table might not exist if migrations haven't run
            eprintln!("Warning: could not clear {table}: {e}");
        } else {
            println!("Cleared table: {table}");
        }
    }

    pool.close().await;
    println!("Database cleared.");
    Ok(())
}

async fn run_migrations(url: &str) -> anyhow::Result<()> {
    if let Some(parent) = sqlite_path(url).as_deref().and_then(|p| p.parent())
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    println!("Running migrations...");
    let pool = sqlx::SqlitePool::connect(url).await?;
    tickets_store::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("store migrations failed: {e}"))?;
    pool.close().await;

    println!("All migrations complete.");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn sqlite_paths() {
        assert_eq!(
            sqlite_path("sqlite://data/tickets.db?mode=rwc"),
            Some(PathBuf::from("data/tickets.db"))
        );
        assert_eq!(
            sqlite_path("sqlite:/var/lib/tickets.db"),
            Some(PathBuf::from("/var/lib/tickets.db"))
        );
        assert_eq!(sqlite_path("sqlite::memory:"), None);
        assert_eq!(sqlite_path("postgres://localhost/tickets"), None);
    }

    #[test]
    fn reset_deletes_wal_and_shm() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("tickets.db");
        for suffix in ["", "-wal", "-shm"] {
            std::fs::write(format!("{}{suffix}", db.display()), "test").unwrap();
        }

        reset_database(&format!("sqlite://{}?mode=rwc", db.display())).unwrap();

        assert!(!db.exists());
        assert!(!temp.path().join("tickets.db-wal").exists());
        assert!(!temp.path().join("tickets.db-shm").exists());
    }

    #[tokio::test]
    async fn migrations_are_idempotent_and_clearable() {
        let temp = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            temp.path().join("nested/tickets.db").display()
        );

        run_migrations(&url).await.unwrap();
        run_migrations(&url).await.unwrap();

        let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
        for table in TABLES {
            let _: (i64,) = sqlx::query_as(&format!("SELECT count(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
        }
        pool.close().await;

        clear_database(&url).await.unwrap();
    }
}
