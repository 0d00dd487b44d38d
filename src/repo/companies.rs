use sqlx::SqlitePool;

use crate::csv_import::companies::CompanyCsvRow;
use crate::models::Company;
use crate::repo::InsertOutcome;

/// `insert_company_from_csv`: `INSERT ... ON CONFLICT(company_name_normalized) DO NOTHING`.
pub async fn insert_company_from_csv(
    pool: &SqlitePool,
    row: &CompanyCsvRow,
) -> sqlx::Result<InsertOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO companies (company_name, company_name_normalized, known_aliases,
                                hq_country, description, type, geography, industry,
                                suitability_tier)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(company_name_normalized) DO NOTHING
        "#,
    )
    .bind(&row.company_name)
    .bind(&row.company_name_normalized)
    .bind(&row.known_aliases)
    .bind(&row.hq_country)
    .bind(&row.description)
    .bind(&row.company_type)
    .bind(&row.geography)
    .bind(&row.industry)
    .bind(&row.suitability_tier)
    .execute(pool)
    .await?;

    Ok(if result.rows_affected() > 0 {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::Skipped
    })
}

/// Loads the full company table for building an in-memory [`crate::matcher::CompanyIndex`].
pub async fn load_company_index(pool: &SqlitePool) -> sqlx::Result<Vec<Company>> {
    sqlx::query_as::<_, Company>(
        r#"
        SELECT id, company_name, company_name_normalized, known_aliases, hq_country,
               description, type, geography, industry, suitability_tier
        FROM companies
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_company_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Company>> {
    sqlx::query_as::<_, Company>(
        r#"
        SELECT id, company_name, company_name_normalized, known_aliases, hq_country,
               description, type, geography, industry, suitability_tier
        FROM companies
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
