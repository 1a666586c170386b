//! Database connection management

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Type alias for the database connection pool.
pub type DatabasePool = SqlitePool;

/// Connect to a SQLite database and enforce foreign keys on every
/// connection.
pub async fn connect(database_url: &str) -> Result<DatabasePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}
