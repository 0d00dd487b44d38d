//! Refresh engine: per-center pipeline composing the Overpass client,
//! normalizer, company matcher, and (optionally) the Wikidata client,
//! ending in a transactional upsert-and-prune against the persistence
//! layer.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::geo::haversine_meters;
use crate::matcher::{self, CompanyIndex};
use crate::models::{Center, OfficeKey};
use crate::normalize;
use crate::overpass;
use crate::repo;
use crate::wikidata;

/// Per-refresh tunables; all bounded per the environment/config surface.
#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub radius_m: i64,
    pub max_offices: Option<i64>,
}

/// Outcome of a single `refresh_center` call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RefreshCounts {
    pub offices_fetched: i64,
    pub offices_matched: i64,
    pub offices_filtered_out_no_company_match: i64,
    pub links_upserted: i64,
    pub pruned_links: i64,
    pub wikidata_entities_fetched: i64,
    pub wikidata_offices_updated: i64,
}

/// Refreshes one center's set of nearby offices end to end.
pub async fn refresh_center(
    pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
    center: &Center,
    opts: RefreshOptions,
    company_index: &CompanyIndex,
    banned_set: &HashSet<OfficeKey>,
) -> anyhow::Result<RefreshCounts> {
    let mut counts = RefreshCounts::default();

    let elements = overpass::fetch_elements(
        client,
        &config.overpass_urls,
        center.lat,
        center.lon,
        opts.radius_m,
    )
    .await?;

    let mut offices = normalize::normalize_elements(elements);
    counts.offices_fetched = offices.len() as i64;

    if let Some(max_offices) = opts.max_offices {
        if offices.len() as i64 > max_offices {
            offices.sort_by(|a, b| {
                let da = haversine_meters(center.lat, center.lon, a.lat, a.lon);
                let db = haversine_meters(center.lat, center.lon, b.lat, b.lon);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
            offices.truncate(max_offices.max(0) as usize);
        }
    }

    let filtered = matcher::filter_offices_with_known_companies(company_index, offices);
    counts.offices_matched = filtered.matched_count as i64;
    counts.offices_filtered_out_no_company_match = filtered.filtered_out_count as i64;

    let survivors: Vec<_> = filtered
        .matched
        .into_iter()
        .map(|(office, _result)| office)
        .filter(|office| {
            !banned_set.contains(&OfficeKey {
                osm_type: office.osm_type,
                osm_id: office.osm_id,
            })
        })
        .collect();

    let seen_at = Utc::now();

    if !survivors.is_empty() {
        counts.links_upserted =
            repo::offices::upsert_offices_and_links(pool, center, &survivors, seen_at).await?;

        if config.wikidata_enrich_enabled {
            let (fetched, updated) =
                enrich_survivors(pool, config, client, &survivors, seen_at).await;
            counts.wikidata_entities_fetched = fetched;
            counts.wikidata_offices_updated = updated;
        }
    }

    let unseen = repo::offices::prune_center_links_not_seen_since(pool, center.id, seen_at).await?;
    let stale =
        repo::offices::prune_stale_center_links(pool, center.id, config.stale_link_days).await?;
    counts.pruned_links = (unseen + stale) as i64;

    Ok(counts)
}

/// Enrichment errors are logged and swallowed; they never fail the refresh.
async fn enrich_survivors(
    pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
    survivors: &[crate::models::CandidateOffice],
    enriched_at: chrono::DateTime<Utc>,
) -> (i64, i64) {
    let mut q_ids: Vec<String> = survivors
        .iter()
        .filter_map(|o| o.wikidata_entity_id.clone())
        .collect();
    q_ids.sort();
    q_ids.dedup();

    if q_ids.is_empty() {
        return (0, 0);
    }

    let stale_ids = match repo::offices::list_stale_wikidata_entity_ids(
        pool,
        &q_ids,
        config.wikidata_enrich_stale_days,
        config.wikidata_enrich_max_ids_per_center,
    )
    .await
    {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list stale wikidata ids, skipping enrichment");
            return (0, 0);
        }
    };

    if stale_ids.is_empty() {
        return (0, 0);
    }

    let throttle = Duration::from_millis(config.wikidata_enrich_throttle_ms);
    let facts_by_entity =
        wikidata::fetch_entity_facts(client, &config.wikidata_api_url, &stale_ids, throttle).await;

    let fetched = facts_by_entity.len() as i64;
    let mut updated = 0i64;

    for (entity_id, facts) in &facts_by_entity {
        match repo::offices::apply_wikidata_update(pool, entity_id, facts, enriched_at).await {
            Ok(rows) => updated += rows as i64,
            Err(e) => {
                tracing::warn!(error = %e, entity_id = %entity_id, "failed to apply wikidata enrichment");
            }
        }
    }

    (fetched, updated)
}

async fn load_banned_set(pool: &SqlitePool) -> anyhow::Result<HashSet<OfficeKey>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT osm_type, osm_id FROM banned_offices")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(t, id)| {
            crate::models::OsmType::parse(&t).map(|osm_type| OfficeKey { osm_type, osm_id: id })
        })
        .collect())
}

/// Outcome of one periodic batch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BatchOutcome {
    pub centers_processed: i64,
    pub centers_failed: i64,
    pub cursor_before: i64,
    pub cursor_after: i64,
    pub counts: RefreshCounts,
}

/// Runs one scheduled batch: the next `BATCH_CENTERS_PER_RUN` active
/// centers by id after the cursor, wrapping to 0 when exhausted.
pub async fn run_scheduled_refresh(
    pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<BatchOutcome> {
    let cursor = repo::refresh_state::get_refresh_cursor(pool).await?;

    let centers: Vec<Center> = sqlx::query_as::<_, Center>(
        r#"
        SELECT id, center_code, name, tier, lat, lon, country, region, source_url,
               is_active, last_csv_sync_token, created_at, updated_at
        FROM centers
        WHERE is_active = 1 AND id > ?1
        ORDER BY id ASC
        LIMIT ?2
        "#,
    )
    .bind(cursor)
    .bind(config.batch_centers_per_run)
    .fetch_all(pool)
    .await?;

    if centers.is_empty() {
        repo::refresh_state::set_refresh_cursor(pool, 0).await?;
        return Ok(BatchOutcome {
            cursor_before: cursor,
            cursor_after: 0,
            ..Default::default()
        });
    }

    let companies = repo::companies::load_company_index(pool).await?;
    let company_index = CompanyIndex::build(&companies);
    let banned_set = load_banned_set(pool).await?;

    let opts = RefreshOptions {
        radius_m: config.default_radius_m,
        max_offices: None,
    };

    let mut outcome = BatchOutcome {
        cursor_before: cursor,
        ..Default::default()
    };
    let mut last_id = cursor;

    for center in &centers {
        match refresh_center(pool, config, client, center, opts, &company_index, &banned_set).await
        {
            Ok(counts) => {
                outcome.centers_processed += 1;
                accumulate(&mut outcome.counts, &counts);
            }
            Err(e) => {
                outcome.centers_failed += 1;
                tracing::warn!(center_id = center.id, error = %e, "center refresh failed, continuing batch");
            }
        }
        last_id = center.id;
        tokio::time::sleep(Duration::from_millis(config.overpass_throttle_ms)).await;
    }

    repo::refresh_state::set_refresh_cursor(pool, last_id).await?;
    outcome.cursor_after = last_id;

    Ok(outcome)
}

/// Options for a full sweep across every active center.
#[derive(Debug, Clone)]
pub struct FullSweepOptions {
    pub throttle_ms: u64,
    pub batch_size: i64,
    pub radius_m: i64,
    pub max_offices: Option<i64>,
    pub full_clean: bool,
    pub center_retry_count: u32,
    pub retry_delay_ms: u64,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FullSweepOutcome {
    pub ok: bool,
    pub centers_processed: i64,
    pub centers_failed: i64,
    pub counts: RefreshCounts,
}

/// Walks every active center in id order, retrying each up to
/// `center_retry_count + 1` times before recording it as failed.
pub async fn run_refresh_all(
    pool: &SqlitePool,
    config: &Config,
    client: &reqwest::Client,
    opts: FullSweepOptions,
) -> anyhow::Result<FullSweepOutcome> {
    if opts.full_clean {
        repo::offices::purge_all_office_points(pool).await?;
    }

    let companies = repo::companies::load_company_index(pool).await?;
    let company_index = CompanyIndex::build(&companies);
    let banned_set = load_banned_set(pool).await?;

    let center_opts = RefreshOptions {
        radius_m: opts.radius_m,
        max_offices: opts.max_offices,
    };

    let mut outcome = FullSweepOutcome::default();
    let mut cursor = 0i64;

    loop {
        let centers: Vec<Center> = sqlx::query_as::<_, Center>(
            r#"
            SELECT id, center_code, name, tier, lat, lon, country, region, source_url,
                   is_active, last_csv_sync_token, created_at, updated_at
            FROM centers
            WHERE is_active = 1 AND id > ?1
            ORDER BY id ASC
            LIMIT ?2
            "#,
        )
        .bind(cursor)
        .bind(opts.batch_size)
        .fetch_all(pool)
        .await?;

        if centers.is_empty() {
            break;
        }

        for center in &centers {
            let mut attempt = 0u32;
            let result = loop {
                attempt += 1;
                match refresh_center(
                    pool,
                    config,
                    client,
                    center,
                    center_opts,
                    &company_index,
                    &banned_set,
                )
                .await
                {
                    Ok(counts) => break Some(counts),
                    Err(e) => {
                        if attempt > opts.center_retry_count {
                            tracing::warn!(center_id = center.id, error = %e, attempts = attempt, "center refresh exhausted retries");
                            break None;
                        }
                        tokio::time::sleep(Duration::from_millis(opts.retry_delay_ms)).await;
                    }
                }
            };

            match result {
                Some(counts) => {
                    outcome.centers_processed += 1;
                    accumulate(&mut outcome.counts, &counts);
                }
                None => outcome.centers_failed += 1,
            }

            cursor = center.id;
            tokio::time::sleep(Duration::from_millis(opts.throttle_ms)).await;
        }

        repo::refresh_state::set_refresh_cursor(pool, cursor).await?;
    }

    outcome.ok = outcome.centers_failed == 0;
    Ok(outcome)
}

fn accumulate(total: &mut RefreshCounts, delta: &RefreshCounts) {
    total.offices_fetched += delta.offices_fetched;
    total.offices_matched += delta.offices_matched;
    total.offices_filtered_out_no_company_match += delta.offices_filtered_out_no_company_match;
    total.links_upserted += delta.links_upserted;
    total.pruned_links += delta.pruned_links;
    total.wikidata_entities_fetched += delta.wikidata_entities_fetched;
    total.wikidata_offices_updated += delta.wikidata_offices_updated;
}
