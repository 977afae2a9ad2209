use std::{path::Path, str::FromStr};

use sqlx::{
    Error, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Open (creating if needed) the database file and apply pending migrations.
    pub async fn new(database_path: &Path) -> Result<DBService, Error> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!(path = %database_path.display(), "Database ready");
        Ok(DBService { pool })
    }

    /// Private in-memory database; one connection so every query sees the same data.
    pub async fn new_in_memory() -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(DBService { pool })
    }
}

/// True when `err` is a UNIQUE constraint violation (duplicate slug, name, ...).
pub fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
