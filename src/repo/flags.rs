use sqlx::SqlitePool;

use crate::models::{DeletionFlag, FlagStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Outcome of submitting a deletion flag for `(osm_type, osm_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSubmitOutcome {
    Created(i64),
    AlreadyPending(i64),
    AlreadyBanned,
    NotFound,
}

/// Outcome of an admin decision on a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagDecisionOutcome {
    NotFound,
    AlreadyApproved,
    AlreadyRejected,
    Approved {
        deleted_links: u64,
        deleted_offices: u64,
    },
    Rejected,
    /// Rejecting a flag that is already approved — the only combination
    /// that conflicts rather than no-ops.
    CannotRejectApproved,
}

/// Per `(osm_type, osm_id)`: banned wins, then an existing pending flag,
/// else a new pending flag is created.
pub async fn submit_deletion_flag(
    pool: &SqlitePool,
    center_id: Option<i64>,
    osm_type: &str,
    osm_id: i64,
    reason: Option<&str>,
) -> sqlx::Result<FlagSubmitOutcome> {
    let office_exists: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM offices WHERE osm_type = ?1 AND osm_id = ?2",
    )
    .bind(osm_type)
    .bind(osm_id)
    .fetch_optional(pool)
    .await?;

    if office_exists.is_none() {
        return Ok(FlagSubmitOutcome::NotFound);
    }

    if let Some(center_id) = center_id {
        let link_exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM center_office WHERE center_id = ?1 AND osm_type = ?2 AND osm_id = ?3",
        )
        .bind(center_id)
        .bind(osm_type)
        .bind(osm_id)
        .fetch_optional(pool)
        .await?;

        if link_exists.is_none() {
            return Ok(FlagSubmitOutcome::NotFound);
        }
    }

    let banned: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM banned_offices WHERE osm_type = ?1 AND osm_id = ?2",
    )
    .bind(osm_type)
    .bind(osm_id)
    .fetch_optional(pool)
    .await?;

    if banned.is_some() {
        return Ok(FlagSubmitOutcome::AlreadyBanned);
    }

    let existing_pending: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM office_deletion_flags \
         WHERE osm_type = ?1 AND osm_id = ?2 AND status = 'pending'",
    )
    .bind(osm_type)
    .bind(osm_id)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = existing_pending {
        return Ok(FlagSubmitOutcome::AlreadyPending(id));
    }

    let inserted_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO office_deletion_flags (center_id, osm_type, osm_id, reason, status)
        VALUES (?1, ?2, ?3, ?4, 'pending')
        RETURNING id
        "#,
    )
    .bind(center_id)
    .bind(osm_type)
    .bind(osm_id)
    .bind(reason)
    .fetch_one(pool)
    .await?;

    Ok(FlagSubmitOutcome::Created(inserted_id))
}

/// Lists flags, optionally filtered by status, most recently submitted first.
pub async fn list_flags(
    pool: &SqlitePool,
    status: Option<FlagStatus>,
    limit: Option<i64>,
) -> sqlx::Result<Vec<DeletionFlag>> {
    sqlx::query_as::<_, DeletionFlag>(
        r#"
        SELECT id, center_id, osm_type, osm_id, reason, status, submitted_at, reviewed_at
        FROM office_deletion_flags
        WHERE ?1 IS NULL OR status = ?1
        ORDER BY submitted_at DESC
        LIMIT ?2
        "#,
    )
    .bind(status.map(|s| s.as_str()))
    .bind(limit.unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await
}

/// Applies an admin decision to a flag, transitioning its state and
/// (on approval) banning and deleting the office.
pub async fn decide_flag(
    pool: &SqlitePool,
    flag_id: i64,
    decision: Decision,
) -> sqlx::Result<FlagDecisionOutcome> {
    let row: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT status, osm_type, osm_id FROM office_deletion_flags WHERE id = ?1",
    )
    .bind(flag_id)
    .fetch_optional(pool)
    .await?;

    let Some((status, osm_type, osm_id)) = row else {
        return Ok(FlagDecisionOutcome::NotFound);
    };

    match (status.as_str(), decision) {
        ("approved", Decision::Approve) => Ok(FlagDecisionOutcome::AlreadyApproved),
        ("approved", Decision::Reject) => Ok(FlagDecisionOutcome::CannotRejectApproved),
        ("rejected", Decision::Reject) => Ok(FlagDecisionOutcome::AlreadyRejected),
        ("rejected", Decision::Approve) | ("pending", Decision::Approve) => {
            approve(pool, flag_id, &osm_type, osm_id).await
        }
        ("pending", Decision::Reject) => reject(pool, flag_id).await,
        _ => Ok(FlagDecisionOutcome::NotFound),
    }
}

async fn approve(
    pool: &SqlitePool,
    flag_id: i64,
    osm_type: &str,
    osm_id: i64,
) -> sqlx::Result<FlagDecisionOutcome> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE office_deletion_flags \
         SET status = 'approved', reviewed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE id = ?1",
    )
    .bind(flag_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO banned_offices (osm_type, osm_id, approved_flag_id, approved_at)
        VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        ON CONFLICT(osm_type, osm_id) DO UPDATE SET
            approved_flag_id = excluded.approved_flag_id,
            approved_at = excluded.approved_at
        "#,
    )
    .bind(osm_type)
    .bind(osm_id)
    .bind(flag_id)
    .execute(&mut *tx)
    .await?;

    let deleted_links = sqlx::query("DELETE FROM center_office WHERE osm_type = ?1 AND osm_id = ?2")
        .bind(osm_type)
        .bind(osm_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted_offices = sqlx::query("DELETE FROM offices WHERE osm_type = ?1 AND osm_id = ?2")
        .bind(osm_type)
        .bind(osm_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(FlagDecisionOutcome::Approved {
        deleted_links,
        deleted_offices,
    })
}

async fn reject(pool: &SqlitePool, flag_id: i64) -> sqlx::Result<FlagDecisionOutcome> {
    sqlx::query(
        "UPDATE office_deletion_flags \
         SET status = 'rejected', reviewed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE id = ?1",
    )
    .bind(flag_id)
    .execute(pool)
    .await?;

    Ok(FlagDecisionOutcome::Rejected)
}
