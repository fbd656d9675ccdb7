//! SitePulse Database Layer
//!
//! Persists crawl jobs and crawled pages in `SQLite` through `SQLx`, with
//! embedded, versioned migrations.
//!
//! # Architecture
//!
//! - **Jobs**: one row per crawl request; stage outputs are written as the
//!   pipeline advances, structured values as JSON text
//! - **Pages**: one row per sampled URL, including failed fetches
//! - **Store**: [`JobStore`] is the async interface the pipeline depends on
//!
//! # Example
//!
//! ```ignore
//! use sitepulse_db::Database;
//!
//! let db = Database::new("sitepulse.db").await?;
//! db.run_migrations().await?;
//! let ready = sitepulse_db::jobs::find_verified_jobs(db.pool()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod codec;
pub mod connection;
pub mod error;
pub mod jobs;
pub mod migrations;
pub mod pages;
pub mod store;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use pages::NewPage;
pub use store::JobStore;

use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Handle to the job database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path`, or `:memory:`.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Insert a job; intake helper for the verification layer and tests.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn create_job(
        &self,
        url: &str,
        email: &str,
        verified: bool,
    ) -> Result<sitepulse_core::CrawlJob> {
        jobs::create_job(&self.pool, url, email, verified).await
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
