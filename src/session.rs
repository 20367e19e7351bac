use crate::consts::DEFAULT_LANGUAGE;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Language code of a catalog profile, e.g. `hi` or `en`.  Not an enum so that a new language is a
/// catalog change only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node of the voice menu.  Language selection happens inside `Welcome`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuState {
    Welcome,
    MainMenu,
    CitySelect,
    JobTypeSelect,
    JobResults,
    PostResults,
    LegalHelp,
    LoanInfo,
    ReturnToMenu,
    Terminated,
}

impl MenuState {
    pub const ALL: [MenuState; 10] = [
        MenuState::Welcome,
        MenuState::MainMenu,
        MenuState::CitySelect,
        MenuState::JobTypeSelect,
        MenuState::JobResults,
        MenuState::PostResults,
        MenuState::LegalHelp,
        MenuState::LoanInfo,
        MenuState::ReturnToMenu,
        MenuState::Terminated,
    ];

    /// Name used in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuState::Welcome => "welcome",
            MenuState::MainMenu => "main_menu",
            MenuState::CitySelect => "city_select",
            MenuState::JobTypeSelect => "job_type_select",
            MenuState::JobResults => "job_results",
            MenuState::PostResults => "post_results",
            MenuState::LegalHelp => "legal_help",
            MenuState::LoanInfo => "loan_info",
            MenuState::ReturnToMenu => "return_to_menu",
            MenuState::Terminated => "terminated",
        }
    }

    /// Path segment of the state's webhook endpoint.
    pub fn slug(&self) -> &'static str {
        match self {
            MenuState::Welcome => "welcome",
            MenuState::MainMenu => "main-menu",
            MenuState::CitySelect => "city-select",
            MenuState::JobTypeSelect => "job-type-select",
            MenuState::JobResults => "job-results",
            MenuState::PostResults => "post-results",
            MenuState::LegalHelp => "legal-help",
            MenuState::LoanInfo => "loan-info",
            MenuState::ReturnToMenu => "return-to-menu",
            MenuState::Terminated => "terminated",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl fmt::Display for MenuState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MenuState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown menu state '{s}'"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            _ => Err(format!("unknown session status '{s}'")),
        }
    }
}

/// Choices made so far on the job search branch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selections {
    pub city: Option<String>,
    pub job_type: Option<String>,
}

/// One logged step of a call.  Never modified after it is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// State that was active when the keypress arrived
    pub state: MenuState,
    pub input: Option<String>,
    pub response: Option<String>,
}

impl ActionRecord {
    pub fn now(state: MenuState, input: Option<&str>, response: Option<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            state,
            input: input.map(str::to_string),
            response,
        }
    }
}

/// Navigation fields written by the menu.  `None` leaves the stored value as it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuDelta {
    pub language: Option<Language>,
    pub current_state: MenuState,
    pub selected_city: Option<String>,
    pub selected_job_type: Option<String>,
}

/// Completion fields written by the call-status notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: SessionStatus,
    pub duration_seconds: Option<i32>,
    pub ended_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: String,
    pub caller_number: Option<String>,
    pub callee_number: Option<String>,
    pub language: Language,
    pub current_state: MenuState,
    pub status: SessionStatus,
    pub selected_city: Option<String>,
    pub selected_job_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    pub duration_seconds: Option<i32>,
    pub action_log: Vec<ActionRecord>,
}

impl CallSession {
    pub fn new(
        call_id: &str,
        caller_number: Option<String>,
        callee_number: Option<String>,
        started_at: OffsetDateTime,
    ) -> Self {
        Self {
            call_id: call_id.to_string(),
            caller_number,
            callee_number,
            language: Language::default(),
            current_state: MenuState::Welcome,
            status: SessionStatus::Active,
            selected_city: None,
            selected_job_type: None,
            started_at,
            ended_at: None,
            duration_seconds: None,
            action_log: Vec::new(),
        }
    }

    pub fn selections(&self) -> Selections {
        Selections {
            city: self.selected_city.clone(),
            job_type: self.selected_job_type.clone(),
        }
    }

    /// Merge navigation fields and append the record.  Once the call has ended only the record is
    /// kept.
    #[cfg(test)]
    pub fn apply_menu(&mut self, delta: MenuDelta, record: ActionRecord) {
        if !self.status.is_terminal() {
            if let Some(language) = delta.language {
                self.language = language;
            }
            self.current_state = delta.current_state;
            if delta.selected_city.is_some() {
                self.selected_city = delta.selected_city;
            }
            if delta.selected_job_type.is_some() {
                self.selected_job_type = delta.selected_job_type;
            }
        }
        self.action_log.push(record);
    }

    /// Merge completion fields.  Once completed or failed the completion fields are final.
    #[cfg(test)]
    pub fn apply_status(&mut self, update: StatusUpdate) {
        if self.status.is_terminal() {
            return;
        }
        self.status = update.status;
        if update.duration_seconds.is_some() {
            self.duration_seconds = update.duration_seconds;
        }
        if self.ended_at.is_none() {
            self.ended_at = update.ended_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CallSession {
        CallSession::new(
            "CA123",
            Some("+919800000001".to_string()),
            Some("+918000000000".to_string()),
            OffsetDateTime::now_utc(),
        )
    }

    #[test]
    fn menu_state_names_round_trip() {
        for state in MenuState::ALL {
            assert_eq!(state.as_str().parse::<MenuState>(), Ok(state));
            assert_eq!(MenuState::from_slug(state.slug()), Some(state));
        }
        assert!("reading_jobs".parse::<MenuState>().is_err());
        assert_eq!(MenuState::from_slug("nowhere"), None);
    }

    #[test]
    fn new_session_starts_at_welcome_in_hindi() {
        let s = session();
        assert_eq!(s.current_state, MenuState::Welcome);
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.language.code(), "hi");
        assert!(s.action_log.is_empty());
    }

    #[test]
    fn status_update_leaves_navigation_alone() {
        let mut s = session();
        let delta = MenuDelta {
            language: Some(Language::new("en")),
            current_state: MenuState::ReturnToMenu,
            selected_city: None,
            selected_job_type: None,
        };
        s.apply_menu(delta, ActionRecord::now(MenuState::LegalHelp, Some("1"), None));
        let log_before = s.action_log.clone();

        s.apply_status(StatusUpdate {
            status: SessionStatus::Completed,
            duration_seconds: Some(125),
            ended_at: Some(OffsetDateTime::now_utc()),
        });

        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.duration_seconds, Some(125));
        assert_eq!(s.current_state, MenuState::ReturnToMenu);
        assert_eq!(s.action_log, log_before);
    }

    #[test]
    fn late_menu_update_only_appends() {
        let mut s = session();
        s.apply_status(StatusUpdate {
            status: SessionStatus::Failed,
            duration_seconds: None,
            ended_at: Some(OffsetDateTime::now_utc()),
        });
        let delta = MenuDelta {
            language: Some(Language::new("en")),
            current_state: MenuState::MainMenu,
            selected_city: Some("Pune".to_string()),
            selected_job_type: None,
        };
        s.apply_menu(delta, ActionRecord::now(MenuState::Welcome, Some("2"), None));

        assert_eq!(s.current_state, MenuState::Welcome);
        assert_eq!(s.language.code(), "hi");
        assert_eq!(s.selected_city, None);
        assert_eq!(s.action_log.len(), 1);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut s = session();
        s.apply_status(StatusUpdate {
            status: SessionStatus::Completed,
            duration_seconds: Some(40),
            ended_at: Some(OffsetDateTime::now_utc()),
        });
        s.apply_status(StatusUpdate {
            status: SessionStatus::Active,
            duration_seconds: Some(0),
            ended_at: None,
        });
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.duration_seconds, Some(40));
    }

    #[test]
    fn completed_call_is_not_failed_later() {
        let mut s = session();
        let ended = OffsetDateTime::now_utc();
        s.apply_status(StatusUpdate {
            status: SessionStatus::Completed,
            duration_seconds: Some(125),
            ended_at: Some(ended),
        });
        s.apply_status(StatusUpdate {
            status: SessionStatus::Failed,
            duration_seconds: Some(3),
            ended_at: Some(ended + time::Duration::seconds(10)),
        });
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.duration_seconds, Some(125));
        assert_eq!(s.ended_at, Some(ended));
    }
}
