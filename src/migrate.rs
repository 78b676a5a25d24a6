use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Append-only bridge log; `id` preserves insertion order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bridges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            bridge TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            record_json TEXT NOT NULL,
            added_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bridges_category ON bridges(category, id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bridges_fingerprint ON bridges(fingerprint)")
        .execute(pool)
        .await?;

    Ok(())
}
