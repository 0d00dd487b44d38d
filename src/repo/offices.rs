use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::geo::round_coord;
use crate::models::{CandidateOffice, Center, OfficeWithDistance};
use crate::wikidata::EntityFacts;

/// Offices are upserted in chunks of this many rows per transaction, each
/// row contributing an office upsert plus a link upsert (≤80 statements).
const UPSERT_CHUNK_SIZE: usize = 40;

/// `list_offices_for_center`: distance/name/confidence/search-filtered read,
/// ordered nearest-first, with an in-memory post-dedup pass by
/// `(normalized_name, rounded coords)` keeping the first (nearest) hit.
pub async fn list_offices_for_center(
    pool: &SqlitePool,
    center_id: i64,
    radius_m: f64,
    limit: Option<i64>,
    high_confidence_only: bool,
    search: Option<&str>,
) -> sqlx::Result<Vec<OfficeWithDistance>> {
    let like_pattern = search.map(|s| format!("{}%", escape_like_prefix(s)));

    let rows = sqlx::query_as::<_, OfficeWithDistance>(
        r#"
        SELECT
            o.osm_type, o.osm_id, o.name, o.brand, o.operator, o.website, o.wikidata,
            o.wikidata_entity_id, o.employee_count, o.employee_count_as_of, o.market_cap,
            o.market_cap_currency_qid, o.market_cap_as_of, o.wikidata_enriched_at,
            o.lat, o.lon, o.low_confidence, co.distance_m
        FROM center_office co
        JOIN offices o ON o.osm_type = co.osm_type AND o.osm_id = co.osm_id
        WHERE co.center_id = ?1
          AND co.distance_m <= ?2
          AND o.name IS NOT NULL
          AND o.name != ''
          AND NOT EXISTS (
              SELECT 1 FROM banned_offices b
              WHERE b.osm_type = o.osm_type AND b.osm_id = o.osm_id
          )
          AND (?3 = 0 OR o.low_confidence = 0)
          AND (?4 IS NULL OR o.name LIKE ?4 ESCAPE '\' COLLATE NOCASE)
        ORDER BY co.distance_m ASC
        "#,
    )
    .bind(center_id)
    .bind(radius_m)
    .bind(high_confidence_only)
    .bind(&like_pattern)
    .fetch_all(pool)
    .await?;

    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(rows.len());
    for row in rows {
        let key = dedup_key(&row);
        if seen.insert(key) {
            deduped.push(row);
        }
    }

    if let Some(limit) = limit {
        deduped.truncate(limit.max(0) as usize);
    }

    Ok(deduped)
}

fn dedup_key(row: &OfficeWithDistance) -> (String, i64, i64) {
    let normalized_name = row
        .name
        .as_deref()
        .unwrap_or("")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let lat_key = (round_coord(row.lat) * 1_000_000.0).round() as i64;
    let lon_key = (round_coord(row.lon) * 1_000_000.0).round() as i64;
    (normalized_name, lat_key, lon_key)
}

/// Escapes `%`, `_`, and `\` for a `LIKE ... ESCAPE '\'` prefix match and
/// caps the input at 120 chars before escaping.
fn escape_like_prefix(raw: &str) -> String {
    let capped: String = raw.chars().take(120).collect();
    let mut escaped = String::with_capacity(capped.len());
    for c in capped.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Upserts a batch of candidate offices plus their links to `center`,
/// batching ≤[`UPSERT_CHUNK_SIZE`] offices (≤80 statements) per transaction.
pub async fn upsert_offices_and_links(
    pool: &SqlitePool,
    center: &Center,
    offices: &[CandidateOffice],
    seen_at: DateTime<Utc>,
) -> sqlx::Result<i64> {
    let seen_at_str = seen_at.to_rfc3339();

    for chunk in offices.chunks(UPSERT_CHUNK_SIZE) {
        let mut tx = pool.begin().await?;

        for office in chunk {
            let distance_m =
                crate::geo::haversine_meters(center.lat, center.lon, office.lat, office.lon);

            sqlx::query(
                r#"
                INSERT INTO offices (osm_type, osm_id, name, brand, operator, website,
                                      wikidata, wikidata_entity_id, lat, lon, low_confidence,
                                      tags_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                        strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                ON CONFLICT(osm_type, osm_id) DO UPDATE SET
                    name = excluded.name,
                    brand = excluded.brand,
                    operator = excluded.operator,
                    website = excluded.website,
                    wikidata = excluded.wikidata,
                    wikidata_entity_id = excluded.wikidata_entity_id,
                    lat = excluded.lat,
                    lon = excluded.lon,
                    low_confidence = excluded.low_confidence,
                    tags_json = excluded.tags_json,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                "#,
            )
            .bind(office.osm_type.as_str())
            .bind(office.osm_id)
            .bind(&office.name)
            .bind(&office.brand)
            .bind(&office.operator)
            .bind(&office.website)
            .bind(&office.wikidata)
            .bind(&office.wikidata_entity_id)
            .bind(office.lat)
            .bind(office.lon)
            .bind(office.low_confidence)
            .bind(&office.tags_json)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO center_office (center_id, osm_type, osm_id, distance_m, last_seen)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(center_id, osm_type, osm_id) DO UPDATE SET
                    distance_m = excluded.distance_m,
                    last_seen = excluded.last_seen
                "#,
            )
            .bind(center.id)
            .bind(office.osm_type.as_str())
            .bind(office.osm_id)
            .bind(distance_m)
            .bind(&seen_at_str)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
    }

    Ok(offices.len() as i64)
}

/// Deletes links for `center_id` not observed during the refresh run that
/// started at `seen_at`.
pub async fn prune_center_links_not_seen_since(
    pool: &SqlitePool,
    center_id: i64,
    seen_at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM center_office WHERE center_id = ?1 AND last_seen < ?2")
        .bind(center_id)
        .bind(seen_at.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes links for `center_id` older than `stale_days`.
pub async fn prune_stale_center_links(
    pool: &SqlitePool,
    center_id: i64,
    stale_days: i64,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM center_office \
         WHERE center_id = ?1 AND last_seen < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2 || ' days')",
    )
    .bind(center_id)
    .bind(format!("-{stale_days}"))
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Deletes every `center_office` row then every `offices` row, and resets
/// the refresh cursor. Used by full-clean refresh.
pub async fn purge_all_office_points(pool: &SqlitePool) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM center_office").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM offices").execute(&mut *tx).await?;
    sqlx::query(
        "INSERT INTO refresh_state (key, value, updated_at) \
         VALUES ('center_cursor', '0', strftime('%Y-%m-%dT%H:%M:%fZ', 'now')) \
         ON CONFLICT(key) DO UPDATE SET value = '0', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}

/// Out of `ids`, returns those that are either never-enriched or enriched
/// more than `stale_days` ago, capped at `max_ids`.
pub async fn list_stale_wikidata_entity_ids(
    pool: &SqlitePool,
    ids: &[String],
    stale_days: i64,
    max_ids: i64,
) -> sqlx::Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let stale_idx = ids.len() + 1;
    let limit_idx = ids.len() + 2;

    let sql = format!(
        r#"
        SELECT DISTINCT wikidata_entity_id
        FROM offices
        WHERE wikidata_entity_id IN ({})
          AND (
              wikidata_enriched_at IS NULL
              OR wikidata_enriched_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-' || ?{stale_idx} || ' days')
          )
        LIMIT ?{limit_idx}
        "#,
        placeholders.join(", ")
    );

    let mut query = sqlx::query_scalar::<_, String>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query = query.bind(stale_days).bind(max_ids);

    query.fetch_all(pool).await
}

/// Writes enrichment facts for every office whose `wikidata_entity_id`
/// matches `entity_id`, stamping `wikidata_enriched_at = enriched_at`.
/// Returns the number of rows updated.
pub async fn apply_wikidata_update(
    pool: &SqlitePool,
    entity_id: &str,
    facts: &EntityFacts,
    enriched_at: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE offices
        SET employee_count = ?1,
            employee_count_as_of = ?2,
            market_cap = ?3,
            market_cap_currency_qid = ?4,
            market_cap_as_of = ?5,
            wikidata_enriched_at = ?6
        WHERE wikidata_entity_id = ?7
        "#,
    )
    .bind(facts.employee_count)
    .bind(&facts.employee_count_as_of)
    .bind(facts.market_cap)
    .bind(&facts.market_cap_currency_qid)
    .bind(&facts.market_cap_as_of)
    .bind(enriched_at.to_rfc3339())
    .bind(entity_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
