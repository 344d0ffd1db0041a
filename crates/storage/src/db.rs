use sqlx::sqlite::{self, SqliteConnectOptions, SqlitePool};
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// Opens (creating if missing) the pipeline database inside `data_folder`
/// and applies the schema.
pub async fn connect(data_folder: &str) -> Result<SqlitePool, sqlx::Error> {
    std::fs::create_dir_all(data_folder)?;
    let db_filename = format!("{}/agents.db", data_folder);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_filename))?
        .create_if_missing(true)
        .journal_mode(sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlite::SqliteSynchronous::Normal)
        .busy_timeout(StdDuration::from_secs(30))
        .statement_cache_capacity(100);

    let pool = SqlitePool::connect_with(options).await?;

    let schema = include_str!("../../../sql/schema.sql");
    sqlx::raw_sql(schema).execute(&pool).await?;

    Ok(pool)
}

/// Fresh throwaway database under the system temp dir. Test helper.
pub async fn connect_temp() -> SqlitePool {
    let folder = std::env::temp_dir().join(format!("agents-test-{}", uuid::Uuid::new_v4()));
    connect(folder.to_str().expect("temp path is valid utf-8"))
        .await
        .expect("failed to open temp database")
}
