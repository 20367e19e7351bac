use sqlx::types::time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub struct CallRow {
    pub call_id: String,
    pub caller_number: Option<String>,
    pub callee_number: Option<String>,
    pub language: String,
    pub current_state: String,
    pub status: String,
    pub selected_city: Option<String>,
    pub selected_job_type: Option<String>,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub duration_seconds: Option<i32>,
}

#[derive(sqlx::FromRow)]
pub struct ActionRow {
    pub call_id: String,
    pub recorded_at: OffsetDateTime,
    pub state: String,
    pub input: Option<String>,
    pub response: Option<String>,
}

#[derive(sqlx::FromRow)]
pub struct StatsRow {
    pub language: String,
    pub status: String,
    pub duration_seconds: Option<i32>,
    pub selected_city: Option<String>,
}

/// Row of the externally owned `jobs` table
#[derive(sqlx::FromRow)]
pub struct JobRow {
    pub title: String,
    pub title_hi: Option<String>,
    pub company: Option<String>,
    pub location: String,
    pub salary: Option<String>,
}
