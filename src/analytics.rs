use crate::session::{CallSession, Language, SessionStatus};

use serde::Serialize;
use std::collections::HashMap;

/// The columns of a session the rollup reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStats {
    pub language: Language,
    pub status: SessionStatus,
    pub duration_seconds: Option<i32>,
    pub selected_city: Option<String>,
}

impl From<&CallSession> for SessionStats {
    fn from(session: &CallSession) -> Self {
        Self {
            language: session.language.clone(),
            status: session.status,
            duration_seconds: session.duration_seconds,
            selected_city: session.selected_city.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: u64,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub count: u64,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_calls: u64,
    pub completed_calls: u64,
    pub average_duration: f64,
    pub language_distribution: Vec<LanguageCount>,
    pub popular_cities: Vec<CityCount>,
}

fn counted<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, u64)> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut counts: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(k, n)| (k.to_string(), n))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Roll up every stored session.  Recomputed on each request.
pub fn summarize(sessions: &[SessionStats]) -> Analytics {
    let durations: Vec<i64> = sessions
        .iter()
        .filter_map(|s| s.duration_seconds)
        .filter(|d| *d > 0)
        .map(i64::from)
        .collect();
    let average_duration = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    };

    Analytics {
        total_calls: sessions.len() as u64,
        completed_calls: sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .count() as u64,
        average_duration,
        language_distribution: counted(sessions.iter().map(|s| s.language.code()))
            .into_iter()
            .map(|(language, count)| LanguageCount { language, count })
            .collect(),
        popular_cities: counted(sessions.iter().filter_map(|s| s.selected_city.as_deref()))
            .into_iter()
            .map(|(city, count)| CityCount { city, count })
            .collect(),
    }
}
