use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const CURSOR_KEY: &str = "center_cursor";

/// Reads the scheduled-batch cursor, defaulting to 0 if unset.
pub async fn get_refresh_cursor(pool: &SqlitePool) -> sqlx::Result<i64> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM refresh_state WHERE key = ?1")
        .bind(CURSOR_KEY)
        .fetch_optional(pool)
        .await?;

    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
}

pub async fn set_refresh_cursor(pool: &SqlitePool, cursor: i64) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_state (key, value, updated_at)
        VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        "#,
    )
    .bind(CURSOR_KEY)
    .bind(cursor.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Reads the cursor row's `(value, updated_at)` for the admin status
/// endpoint. Returns `None` if refresh has never run.
pub async fn get_refresh_state_row(
    pool: &SqlitePool,
) -> sqlx::Result<Option<(String, DateTime<Utc>)>> {
    sqlx::query_as(
        "SELECT value, updated_at FROM refresh_state WHERE key = ?1",
    )
    .bind(CURSOR_KEY)
    .fetch_optional(pool)
    .await
}
