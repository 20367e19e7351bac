use crate::consts::MAX_SPOKEN_JOBS;
use crate::db_types::JobRow;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Pool, Postgres};
use tracing::debug;

/// Read-only projection of a posted job, as much as the menu reads out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub title: String,
    pub title_hi: Option<String>,
    pub company: String,
    pub location: String,
    pub salary: String,
}

impl JobSummary {
    /// Localized title when one exists for `language`, otherwise the default title.
    pub fn title_for(&self, language: &str) -> &str {
        match (language, self.title_hi.as_deref()) {
            ("hi", Some(title)) if !title.is_empty() => title,
            _ => &self.title,
        }
    }
}

impl From<JobRow> for JobSummary {
    fn from(row: JobRow) -> Self {
        Self {
            title: row.title,
            title_hi: row.title_hi,
            company: row.company.unwrap_or_default(),
            location: row.location,
            salary: row.salary.unwrap_or_default(),
        }
    }
}

/// Read access to the job board.  Matches are an exact city plus a case-insensitive keyword found
/// in the title or description, newest posting first, at most `limit` of them.
#[async_trait]
pub trait JobQuery: Send + Sync {
    async fn find_jobs(
        &self,
        city: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<JobSummary>, sqlx::Error>;
}

pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Escape `LIKE` wildcards so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl JobQuery for PgJobRepository {
    async fn find_jobs(
        &self,
        city: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<JobSummary>, sqlx::Error> {
        let limit = limit.min(MAX_SPOKEN_JOBS) as i64;
        let rows = sqlx::query_as::<_, JobRow>(
            "
            select title, title_hi, company, location, salary
            from jobs
            where location = $1
              and (title ilike $2 or description ilike $2)
            order by created_at desc, id desc
            limit $3
            ",
        )
        .bind(city)
        .bind(like_pattern(keyword))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        debug!(city=%city, keyword=%keyword, found=rows.len(), "job query");

        Ok(rows.into_iter().map(JobSummary::from).collect())
    }
}
