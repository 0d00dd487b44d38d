use sqlx::SqlitePool;

use crate::csv_import::centers::CenterCsvRow;
use crate::models::{Center, CenterListItem};
use crate::repo::UpsertOutcome;

/// `list_centers({tier?, active_only})`, ordered by name.
pub async fn list_centers(
    pool: &SqlitePool,
    tier: Option<&str>,
    active_only: bool,
) -> sqlx::Result<Vec<CenterListItem>> {
    sqlx::query_as::<_, CenterListItem>(
        r#"
        SELECT id, center_code, name, tier, lat, lon, country, region
        FROM centers
        WHERE (?1 IS NULL OR tier = ?1)
          AND (?2 = 0 OR is_active = 1)
        ORDER BY name ASC
        "#,
    )
    .bind(tier)
    .bind(!active_only)
    .fetch_all(pool)
    .await
}

pub async fn get_center_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Center>> {
    sqlx::query_as::<_, Center>(
        r#"
        SELECT id, center_code, name, tier, lat, lon, country, region, source_url,
               is_active, last_csv_sync_token, created_at, updated_at
        FROM centers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Upserts a center by `center_code`, forcing `is_active=1` and stamping
/// `last_csv_sync_token`. Returns whether the row was inserted or updated.
pub async fn upsert_center_from_csv(
    pool: &SqlitePool,
    row: &CenterCsvRow,
    sync_token: &str,
) -> sqlx::Result<UpsertOutcome> {
    let existed: Option<i64> = sqlx::query_scalar("SELECT id FROM centers WHERE center_code = ?1")
        .bind(&row.center_code)
        .fetch_optional(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO centers (center_code, name, tier, lat, lon, country, region, source_url,
                              is_active, last_csv_sync_token, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        ON CONFLICT(center_code) DO UPDATE SET
            name = excluded.name,
            tier = excluded.tier,
            lat = excluded.lat,
            lon = excluded.lon,
            country = excluded.country,
            region = excluded.region,
            source_url = excluded.source_url,
            is_active = 1,
            last_csv_sync_token = excluded.last_csv_sync_token,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        "#,
    )
    .bind(&row.center_code)
    .bind(&row.name)
    .bind(&row.tier)
    .bind(row.lat)
    .bind(row.lon)
    .bind(&row.country)
    .bind(&row.region)
    .bind(&row.source_url)
    .bind(sync_token)
    .execute(pool)
    .await?;

    Ok(if existed.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// Sets `is_active=0` on every active center whose `last_csv_sync_token`
/// does not match the current sync run. Returns the number disabled.
pub async fn disable_centers_missing_from_sync(
    pool: &SqlitePool,
    sync_token: &str,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE centers
        SET is_active = 0, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE is_active = 1
          AND (last_csv_sync_token IS NULL OR last_csv_sync_token != ?1)
        "#,
    )
    .bind(sync_token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
