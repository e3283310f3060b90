use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use tracing::info;

/// Opens a pool for `url`, creating the database file (and its directory) when missing.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    crate::config::ensure_sqlite_parent_dir(url)?;
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }

    // Parse up-front so a malformed URL fails with a clear message instead of at first use
    SqliteConnectOptions::from_str(url)
        .map_err(|e| anyhow::anyhow!("invalid database.url {}: {}", url, e))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Cascades and the follow constraints rely on this; fail the connection without it
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        )"#,
    )
    .execute(pool)
    .await?;

    // Directed follow edges; (follower_id, followee_id) is unique by construction
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS follows (
            follower_id INTEGER NOT NULL,
            followee_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            PRIMARY KEY (follower_id, followee_id),
            CHECK (follower_id <> followee_id),
            FOREIGN KEY(follower_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(followee_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(post_id) REFERENCES posts(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_users_email", "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email COLLATE NOCASE)"),
        ("idx_follows_followee", "CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id)"),
        ("idx_posts_created", "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC)"),
        ("idx_posts_author_created", "CREATE INDEX IF NOT EXISTS idx_posts_author_created ON posts(author_id, created_at DESC)"),
        ("idx_comments_post_created", "CREATE INDEX IF NOT EXISTS idx_comments_post_created ON comments(post_id, created_at DESC)"),
        ("idx_comments_author", "CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id)"),
        ("idx_comments_created", "CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::error!("Failed to create index {}: {}", name, e);
            return Err(anyhow::anyhow!("Migration failed on {}: {}", name, e));
        }
    }

    Ok(())
}
