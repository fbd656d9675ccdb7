//! Crawled page records.

use crate::codec::{json_column, optional_timestamp_column, timestamp, timestamp_column, to_json};
use crate::error::{DatabaseError, Result};
use chrono::Utc;
use sitepulse_core::{CrawlPage, JobId, SitemapUrl, WebhookOutcome};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Fields of a page row at crawl time, before any analysis is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPage {
    /// Owning job
    pub crawl_job_id: JobId,
    /// Sampled URL
    pub url: String,
    /// Document title
    pub title: Option<String>,
    /// Rendered HTML
    pub html: Option<String>,
    /// HTTP status, 0 when the fetch never completed
    pub status_code: u16,
    /// Navigation ended on a different URL
    pub redirected: bool,
    /// URL after redirects
    pub final_url: String,
    /// Path depth
    pub level: u32,
    /// Lowercased path
    pub pathname: String,
    /// Path segments
    pub segments: Vec<String>,
    /// Sitemap priority
    pub priority: Option<f64>,
    /// Sitemap change frequency
    pub changefreq: Option<String>,
    /// Sitemap last modification
    pub lastmod: Option<String>,
    /// Crawl error message
    pub error: Option<String>,
}

impl NewPage {
    /// A failed crawl of a sampled URL: status 0, no content, final URL
    /// unchanged.
    #[must_use]
    pub fn failed(job_id: &JobId, url: &SitemapUrl, error: impl Into<String>) -> Self {
        Self {
            crawl_job_id: job_id.clone(),
            url: url.loc.clone(),
            title: None,
            html: None,
            status_code: 0,
            redirected: false,
            final_url: url.loc.clone(),
            level: url.level,
            pathname: url.pathname.clone(),
            segments: url.segments.clone(),
            priority: url.priority,
            changefreq: url.changefreq.clone(),
            lastmod: url.lastmod.clone(),
            error: Some(error.into()),
        }
    }
}

/// Insert a page row.
///
/// # Errors
/// Returns an error if the insert fails, e.g. when the job does not exist.
pub async fn create_page(pool: &SqlitePool, page: &NewPage) -> Result<CrawlPage> {
    let id = uuid::Uuid::new_v4().to_string();
    let crawled_at = Utc::now();

    sqlx::query(
        "INSERT INTO crawl_pages (id, crawl_job_id, url, title, html, status_code, redirected, final_url,
                                  level, pathname, segments, priority, changefreq, lastmod, error, crawled_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(page.crawl_job_id.as_str())
    .bind(&page.url)
    .bind(&page.title)
    .bind(&page.html)
    .bind(page.status_code)
    .bind(page.redirected)
    .bind(&page.final_url)
    .bind(page.level)
    .bind(&page.pathname)
    .bind(to_json(&page.segments)?)
    .bind(page.priority)
    .bind(&page.changefreq)
    .bind(&page.lastmod)
    .bind(&page.error)
    .bind(timestamp(crawled_at))
    .execute(pool)
    .await?;

    Ok(CrawlPage {
        id,
        crawl_job_id: page.crawl_job_id.clone(),
        url: page.url.clone(),
        title: page.title.clone(),
        html: page.html.clone(),
        status_code: page.status_code,
        redirected: page.redirected,
        final_url: page.final_url.clone(),
        level: page.level,
        pathname: page.pathname.clone(),
        segments: page.segments.clone(),
        priority: page.priority,
        changefreq: page.changefreq.clone(),
        lastmod: page.lastmod.clone(),
        error: page.error.clone(),
        ai_processed: false,
        ai_response: None,
        ai_error: None,
        ai_processed_at: None,
        ai_retry_count: 0,
        crawled_at,
    })
}

/// Record the page analysis webhook outcome, including skips.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the page does not exist.
pub async fn record_page_analysis(
    pool: &SqlitePool,
    page_id: &str,
    outcome: &WebhookOutcome,
) -> Result<()> {
    let response = outcome.data.as_ref().map(to_json).transpose()?;

    let result = sqlx::query(
        "UPDATE crawl_pages
         SET ai_processed = 1, ai_response = ?, ai_error = ?, ai_processed_at = ?, ai_retry_count = ?
         WHERE id = ?",
    )
    .bind(response)
    .bind(&outcome.error)
    .bind(timestamp(outcome.attempted_at))
    .bind(outcome.retries)
    .bind(page_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!("crawl page '{page_id}'")));
    }
    Ok(())
}

/// All pages of a job in crawl order.
///
/// # Errors
/// Returns an error if the query fails or a stored column cannot be decoded.
pub async fn list_pages(pool: &SqlitePool, job_id: &JobId) -> Result<Vec<CrawlPage>> {
    let rows = sqlx::query(
        "SELECT id, crawl_job_id, url, title, html, status_code, redirected, final_url, level,
                pathname, segments, priority, changefreq, lastmod, error, ai_processed,
                ai_response, ai_error, ai_processed_at, ai_retry_count, crawled_at
         FROM crawl_pages WHERE crawl_job_id = ?
         ORDER BY crawled_at ASC, rowid ASC",
    )
    .bind(job_id.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(page_from_row).collect()
}

fn page_from_row(row: &SqliteRow) -> Result<CrawlPage> {
    let job_id: String = row.try_get("crawl_job_id")?;

    Ok(CrawlPage {
        id: row.try_get("id")?,
        crawl_job_id: JobId::new(job_id).map_err(|e| DatabaseError::Decode(e.to_string()))?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        html: row.try_get("html")?,
        status_code: row.try_get("status_code")?,
        redirected: row.try_get("redirected")?,
        final_url: row.try_get("final_url")?,
        level: row.try_get("level")?,
        pathname: row.try_get("pathname")?,
        segments: json_column(row, "segments")?.unwrap_or_default(),
        priority: row.try_get("priority")?,
        changefreq: row.try_get("changefreq")?,
        lastmod: row.try_get("lastmod")?,
        error: row.try_get("error")?,
        ai_processed: row.try_get("ai_processed")?,
        ai_response: json_column(row, "ai_response")?,
        ai_error: row.try_get("ai_error")?,
        ai_processed_at: optional_timestamp_column(row, "ai_processed_at")?,
        ai_retry_count: row.try_get("ai_retry_count")?,
        crawled_at: timestamp_column(row, "crawled_at")?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::jobs::create_job;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:")
            .await
            .expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn sample_url(loc: &str) -> SitemapUrl {
        SitemapUrl {
            loc: loc.to_string(),
            lastmod: Some("2024-01-01".to_string()),
            changefreq: None,
            priority: Some(0.8),
            level: 1,
            pathname: "/about".to_string(),
            segments: vec!["about".to_string()],
            link_text: None,
        }
    }

    #[tokio::test]
    async fn test_failed_page_round_trip() {
        let db = setup_test_db().await;
        let job = create_job(db.pool(), "https://example.com", "o@example.com", true)
            .await
            .unwrap();

        let new_page = NewPage::failed(&job.id, &sample_url("https://example.com/about"), "timeout");
        let created = create_page(db.pool(), &new_page).await.unwrap();
        assert!(!created.is_success());

        let pages = list_pages(db.pool(), &job.id).await.unwrap();
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.id, created.id);
        assert_eq!(page.status_code, 0);
        assert_eq!(page.final_url, "https://example.com/about");
        assert!(page.title.is_none());
        assert!(page.html.is_none());
        assert_eq!(page.error.as_deref(), Some("timeout"));
        assert_eq!(page.segments, vec!["about"]);
        assert_eq!(page.priority, Some(0.8));
        assert!(!page.ai_processed);
    }

    #[tokio::test]
    async fn test_record_page_analysis() {
        let db = setup_test_db().await;
        let job = create_job(db.pool(), "https://example.com", "o@example.com", true)
            .await
            .unwrap();

        let mut new_page =
            NewPage::failed(&job.id, &sample_url("https://example.com/about"), "unused");
        new_page.error = None;
        new_page.status_code = 200;
        new_page.title = Some("About".to_string());
        new_page.html = Some("<html></html>".to_string());
        let page = create_page(db.pool(), &new_page).await.unwrap();
        assert!(page.is_success());

        let outcome =
            WebhookOutcome::succeeded(200, Some(serde_json::json!({"score": 7})), 1);
        record_page_analysis(db.pool(), &page.id, &outcome).await.unwrap();

        let stored = list_pages(db.pool(), &job.id).await.unwrap().remove(0);
        assert!(stored.ai_processed);
        assert_eq!(stored.ai_response, Some(serde_json::json!({"score": 7})));
        assert!(stored.ai_error.is_none());
        assert_eq!(stored.ai_retry_count, 1);
        assert!(stored.ai_processed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_skip_marks_processed_with_reason() {
        let db = setup_test_db().await;
        let job = create_job(db.pool(), "https://example.com", "o@example.com", true)
            .await
            .unwrap();
        let page = create_page(
            db.pool(),
            &NewPage::failed(&job.id, &sample_url("https://example.com/a"), "x"),
        )
        .await
        .unwrap();

        record_page_analysis(
            db.pool(),
            &page.id,
            &WebhookOutcome::skipped("page analysis webhook not configured"),
        )
        .await
        .unwrap();

        let stored = list_pages(db.pool(), &job.id).await.unwrap().remove(0);
        assert!(stored.ai_processed);
        assert!(stored.ai_error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_page_requires_existing_job() {
        let db = setup_test_db().await;
        let orphan = NewPage::failed(
            &JobId::generate(),
            &sample_url("https://example.com/a"),
            "x",
        );
        assert!(create_page(db.pool(), &orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_record_analysis_for_missing_page() {
        let db = setup_test_db().await;
        let err = record_page_analysis(db.pool(), "missing", &WebhookOutcome::skipped("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
