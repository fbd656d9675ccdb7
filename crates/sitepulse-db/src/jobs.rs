//! Crawl job records and their lifecycle transitions.

use crate::codec::{json_column, timestamp, timestamp_column, to_json};
use crate::error::{DatabaseError, Result};
use chrono::Utc;
use sitepulse_core::{
    CrawlJob, CrawlStats, ErrorDetails, JobId, JobStatus, JobSummary, SampleSitemap, Stage,
    WebhookOutcome,
};
use sqlx::sqlite::{SqliteQueryResult, SqliteRow};
use sqlx::{Row, SqlitePool};

const JOB_COLUMNS: &str = "id, url, email, status, verified, cancelled, verify_attempts, \
     homepage, robots_txt, sitemap_xml, sample_sitemap, crawl_stats, crawl_completion_ai, \
     failed_step, error, error_details, created_at, updated_at";

/// Insert a new job. Verified jobs start in `verified`, others in `pending`.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn create_job(
    pool: &SqlitePool,
    url: &str,
    email: &str,
    verified: bool,
) -> Result<CrawlJob> {
    let id = JobId::generate();
    let now = Utc::now();
    let status = if verified {
        JobStatus::Verified
    } else {
        JobStatus::Pending
    };

    sqlx::query(
        "INSERT INTO crawl_jobs (id, url, email, status, verified, cancelled, verify_attempts, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?)",
    )
    .bind(id.as_str())
    .bind(url)
    .bind(email)
    .bind(status.as_str())
    .bind(verified)
    .bind(timestamp(now))
    .bind(timestamp(now))
    .execute(pool)
    .await?;

    Ok(CrawlJob {
        id,
        url: url.to_string(),
        email: email.to_string(),
        status,
        verified,
        cancelled: false,
        verify_attempts: 0,
        homepage: None,
        robots_txt: None,
        sitemap_xml: None,
        sample_sitemap: None,
        crawl_stats: None,
        crawl_completion_ai: None,
        failed_step: None,
        error: None,
        error_details: None,
        created_at: now,
        updated_at: now,
    })
}

/// Fetch a job by ID.
///
/// # Errors
/// Returns an error if the query fails or a stored column cannot be decoded.
pub async fn get_job(pool: &SqlitePool, id: &JobId) -> Result<Option<CrawlJob>> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM crawl_jobs WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Fetch the lightweight status view of a job.
///
/// # Errors
/// Returns an error if the query fails or a stored column cannot be decoded.
pub async fn get_job_summary(pool: &SqlitePool, id: &JobId) -> Result<Option<JobSummary>> {
    let row = sqlx::query(
        "SELECT id, url, email, status, verified, cancelled, created_at, updated_at
         FROM crawl_jobs WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(JobSummary {
        id: job_id_column(&row)?,
        url: row.try_get("url")?,
        email: row.try_get("email")?,
        status: status_column(&row)?,
        verified: row.try_get("verified")?,
        cancelled: row.try_get("cancelled")?,
        created_at: timestamp_column(&row, "created_at")?,
        updated_at: timestamp_column(&row, "updated_at")?,
    }))
}

/// Jobs ready for the pipeline, oldest first.
///
/// # Errors
/// Returns an error if the query fails or a stored column cannot be decoded.
pub async fn find_verified_jobs(pool: &SqlitePool) -> Result<Vec<CrawlJob>> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM crawl_jobs
         WHERE status = 'verified' AND verified = 1 AND cancelled = 0
         ORDER BY created_at ASC, rowid ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Move a ready job into `processing`.
///
/// Returns `false` when the job is missing or no longer ready, leaving it
/// untouched.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn mark_processing(pool: &SqlitePool, id: &JobId) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE crawl_jobs SET status = 'processing', updated_at = ?
         WHERE id = ? AND status = 'verified' AND verified = 1 AND cancelled = 0",
    )
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record the derived homepage.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn set_homepage(pool: &SqlitePool, id: &JobId, homepage: &str) -> Result<()> {
    update_text_column(pool, id, "homepage", Some(homepage)).await
}

/// Record the raw robots.txt, or `None` when the site has none.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn set_robots_txt(pool: &SqlitePool, id: &JobId, robots_txt: Option<&str>) -> Result<()> {
    update_text_column(pool, id, "robots_txt", robots_txt).await
}

/// Record the raw sitemap document, or `None` when none was found.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn set_sitemap_xml(
    pool: &SqlitePool,
    id: &JobId,
    sitemap_xml: Option<&str>,
) -> Result<()> {
    update_text_column(pool, id, "sitemap_xml", sitemap_xml).await
}

/// Persist the crawl sample. A sample is written at most once.
///
/// # Errors
/// Returns `DatabaseError::SampleAlreadyWritten` if the job already has a
/// sample, or `DatabaseError::NotFound` if the job does not exist.
pub async fn set_sample_sitemap(
    pool: &SqlitePool,
    id: &JobId,
    sample: &SampleSitemap,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_jobs SET sample_sitemap = ?, updated_at = ?
         WHERE id = ? AND sample_sitemap IS NULL",
    )
    .bind(to_json(sample)?)
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crawl_jobs WHERE id = ?")
        .bind(id.as_str())
        .fetch_one(pool)
        .await?;
    if exists > 0 {
        Err(DatabaseError::SampleAlreadyWritten(id.to_string()))
    } else {
        Err(not_found(id))
    }
}

/// Store crawl counters and mark the job completed.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn complete_job(pool: &SqlitePool, id: &JobId, stats: &CrawlStats) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_jobs SET status = 'completed', crawl_stats = ?, updated_at = ? WHERE id = ?",
    )
    .bind(to_json(stats)?)
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    ensure_updated(&result, id)
}

/// Mark the job failed at the stage named in `details`.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn fail_job(pool: &SqlitePool, id: &JobId, details: &ErrorDetails) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_jobs
         SET status = 'failed', failed_step = ?, error = ?, error_details = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(details.stage.as_str())
    .bind(&details.message)
    .bind(to_json(details)?)
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    ensure_updated(&result, id)
}

/// Record the completion webhook outcome.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the job does not exist.
pub async fn set_completion_webhook(
    pool: &SqlitePool,
    id: &JobId,
    outcome: &WebhookOutcome,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE crawl_jobs SET crawl_completion_ai = ?, updated_at = ? WHERE id = ?",
    )
    .bind(to_json(outcome)?)
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    ensure_updated(&result, id)
}

async fn update_text_column(
    pool: &SqlitePool,
    id: &JobId,
    column: &'static str,
    value: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(&format!(
        "UPDATE crawl_jobs SET {column} = ?, updated_at = ? WHERE id = ?"
    ))
    .bind(value)
    .bind(timestamp(Utc::now()))
    .bind(id.as_str())
    .execute(pool)
    .await?;

    ensure_updated(&result, id)
}

fn ensure_updated(result: &SqliteQueryResult, id: &JobId) -> Result<()> {
    if result.rows_affected() == 0 {
        Err(not_found(id))
    } else {
        Ok(())
    }
}

fn not_found(id: &JobId) -> DatabaseError {
    DatabaseError::NotFound(format!("crawl job '{id}'"))
}

fn job_id_column(row: &SqliteRow) -> Result<JobId> {
    let raw: String = row.try_get("id")?;
    JobId::new(raw).map_err(|e| DatabaseError::Decode(e.to_string()))
}

fn status_column(row: &SqliteRow) -> Result<JobStatus> {
    let raw: String = row.try_get("status")?;
    raw.parse().map_err(|e: sitepulse_core::SitepulseError| DatabaseError::Decode(e.to_string()))
}

fn job_from_row(row: &SqliteRow) -> Result<CrawlJob> {
    let failed_step: Option<String> = row.try_get("failed_step")?;
    let failed_step = failed_step
        .map(|s| s.parse::<Stage>())
        .transpose()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    Ok(CrawlJob {
        id: job_id_column(row)?,
        url: row.try_get("url")?,
        email: row.try_get("email")?,
        status: status_column(row)?,
        verified: row.try_get("verified")?,
        cancelled: row.try_get("cancelled")?,
        verify_attempts: row.try_get("verify_attempts")?,
        homepage: row.try_get("homepage")?,
        robots_txt: row.try_get("robots_txt")?,
        sitemap_xml: row.try_get("sitemap_xml")?,
        sample_sitemap: json_column(row, "sample_sitemap")?,
        crawl_stats: json_column(row, "crawl_stats")?,
        crawl_completion_ai: json_column(row, "crawl_completion_ai")?,
        failed_step,
        error: row.try_get("error")?,
        error_details: json_column(row, "error_details")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}
