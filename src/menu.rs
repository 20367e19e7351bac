use crate::jobs::JobSummary;
use crate::prompts::{PromptCatalog, PromptId};
use crate::session::{Language, MenuDelta, MenuState, Selections};

const CITIES: &[(&str, &str)] = &[
    ("1", "Mumbai"),
    ("2", "Delhi"),
    ("3", "Bangalore"),
    ("4", "Chennai"),
    ("5", "Hyderabad"),
    ("6", "Pune"),
];

const JOB_TYPES: &[(&str, &str)] = &[
    ("1", "Construction"),
    ("2", "Delivery"),
    ("3", "Security"),
    ("4", "Cleaning"),
    ("5", "Driver"),
];

const MAIN_MENU: &[(&str, MenuState)] = &[
    ("1", MenuState::CitySelect),
    ("2", MenuState::LegalHelp),
    ("3", MenuState::LoanInfo),
];

const LEGAL_FACTS: &[(&str, PromptId, &str)] = &[
    ("1", PromptId::LegalMinimumWage, "minimum_wage"),
    ("2", PromptId::LegalWorkingHours, "working_hours"),
    ("3", PromptId::LegalSafetyRights, "safety_rights"),
];

const LOAN_FACTS: &[(&str, PromptId, &str)] = &[
    ("1", PromptId::LoanEligibility, "eligibility"),
    ("2", PromptId::LoanTypes, "loan_types"),
    ("3", PromptId::LoanApplication, "application_process"),
];

const AGENT_DIGIT: &str = "0";
const STAR: &str = "*";

fn lookup<'a, T: Copy>(table: &'a [(&'a str, T)], digit: Option<&str>) -> Option<T> {
    let digit = digit?;
    table.iter().find(|(d, _)| *d == digit).map(|(_, v)| *v)
}

fn lookup_fact(
    table: &[(&str, PromptId, &'static str)],
    digit: Option<&str>,
) -> Option<(PromptId, &'static str)> {
    let digit = digit?;
    table
        .iter()
        .find(|(d, _, _)| *d == digit)
        .map(|(_, id, name)| (*id, *name))
}

/// Requests the effectful shell carries out for a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    SetLanguage(Language),
    SetCity(String),
    SetJobType(String),
    QueryJobs { city: String, job_type: String },
}

/// What the caller hears next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptKey {
    /// Speak each `preface` prompt, then present `state`'s menu and gather there.
    Menu {
        preface: Vec<PromptId>,
        state: MenuState,
    },
    /// Speak one fact, then offer the way back to the main menu.
    Fact(PromptId),
    /// Read out job matches; an empty listing speaks "no jobs" and redirects to the main menu.
    JobListing(Vec<JobSummary>),
    Goodbye,
}

impl PromptKey {
    /// Prompt that re-presents `state` without any input having been processed.
    pub fn present(state: MenuState) -> Self {
        match state {
            MenuState::Terminated => PromptKey::Goodbye,
            state => PromptKey::Menu {
                preface: Vec::new(),
                state,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: MenuState,
    pub next: MenuState,
    /// Language of the reply, already switched when this transition selects a new one
    pub language: Language,
    pub prompt: PromptKey,
    pub effects: Vec<Effect>,
    /// Derived outcome for the action log
    pub outcome: Option<String>,
}

impl Transition {
    fn new(from: MenuState, next: MenuState, language: &Language, prompt: PromptKey) -> Self {
        Self {
            from,
            next,
            language: language.clone(),
            prompt,
            effects: Vec::new(),
            outcome: None,
        }
    }

    fn outcome(mut self, outcome: &str) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }

    fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// `(city, job_type)` when this transition asks for a job query.
    pub fn job_query(&self) -> Option<(&str, &str)> {
        self.effects.iter().find_map(|e| match e {
            Effect::QueryJobs { city, job_type } => Some((city.as_str(), job_type.as_str())),
            _ => None,
        })
    }

    /// Settle a job query.  No matches (including a failed query) falls back to the main menu.
    pub fn with_jobs(mut self, jobs: Vec<JobSummary>) -> Self {
        if jobs.is_empty() {
            self.next = MenuState::MainMenu;
            self.outcome = Some("no_jobs".to_string());
        } else {
            self.next = MenuState::JobResults;
            self.outcome = Some(format!("jobs:{}", jobs.len()));
        }
        self.prompt = PromptKey::JobListing(jobs);
        self
    }

    /// Navigation fields to persist.
    pub fn delta(&self) -> MenuDelta {
        let mut delta = MenuDelta {
            language: None,
            current_state: self.next,
            selected_city: None,
            selected_job_type: None,
        };
        for effect in &self.effects {
            match effect {
                Effect::SetLanguage(language) => delta.language = Some(language.clone()),
                Effect::SetCity(city) => delta.selected_city = Some(city.clone()),
                Effect::SetJobType(job_type) => delta.selected_job_type = Some(job_type.clone()),
                Effect::QueryJobs { .. } => (),
            }
        }
        delta
    }
}

/// The menu's transition table.  `transition` is pure; it never touches storage or transport.
#[derive(Clone, Debug)]
pub struct MenuMachine {
    /// digit => language, in catalog order starting at "1"
    languages: Vec<(String, Language)>,
}

impl MenuMachine {
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Self {
        let languages = languages
            .into_iter()
            .enumerate()
            .map(|(idx, language)| ((idx + 1).to_string(), language))
            .collect();
        Self { languages }
    }

    pub fn from_catalog(catalog: &PromptCatalog) -> Self {
        Self::new(catalog.profiles().iter().map(|p| p.language.clone()))
    }

    fn language_for(&self, digit: Option<&str>) -> Option<&Language> {
        let digit = digit?;
        self.languages
            .iter()
            .find(|(d, _)| d == digit)
            .map(|(_, language)| language)
    }

    pub fn transition(
        &self,
        state: MenuState,
        language: &Language,
        digit: Option<&str>,
        selections: &Selections,
    ) -> Transition {
        let menu = |preface: Vec<PromptId>, next: MenuState| {
            Transition::new(state, next, language, PromptKey::Menu { preface, state: next })
        };
        let invalid = |next: MenuState| menu(vec![PromptId::InvalidInput], next).outcome("invalid");

        match state {
            MenuState::Welcome => match self.language_for(digit) {
                Some(chosen) => {
                    let mut t = menu(Vec::new(), MenuState::MainMenu)
                        .outcome(chosen.code())
                        .effect(Effect::SetLanguage(chosen.clone()));
                    t.language = chosen.clone();
                    t
                }
                None => invalid(MenuState::Welcome),
            },
            MenuState::MainMenu => match lookup(MAIN_MENU, digit) {
                Some(next) => menu(Vec::new(), next).outcome(next.as_str()),
                None if digit == Some(AGENT_DIGIT) => menu(
                    vec![PromptId::AgentConnecting, PromptId::AgentUnavailable],
                    MenuState::MainMenu,
                )
                .outcome("agent_unavailable"),
                None => invalid(MenuState::MainMenu),
            },
            MenuState::CitySelect => match lookup(CITIES, digit) {
                Some(city) => menu(Vec::new(), MenuState::JobTypeSelect)
                    .outcome(city)
                    .effect(Effect::SetCity(city.to_string())),
                None => invalid(MenuState::MainMenu),
            },
            MenuState::JobTypeSelect => match (lookup(JOB_TYPES, digit), &selections.city) {
                (Some(job_type), Some(city)) => Transition::new(
                    state,
                    MenuState::JobResults,
                    language,
                    PromptKey::JobListing(Vec::new()),
                )
                .outcome(job_type)
                .effect(Effect::SetJobType(job_type.to_string()))
                .effect(Effect::QueryJobs {
                    city: city.clone(),
                    job_type: job_type.to_string(),
                }),
                // A job type without a city cannot be searched; ask for the city again.
                (Some(_), None) => menu(Vec::new(), MenuState::CitySelect).outcome("missing_city"),
                (None, _) => invalid(MenuState::CitySelect),
            },
            // The listing already closed with the post-results prompt, so the key pressed after it
            // is post-results input and settles straight to the main menu.
            MenuState::JobResults => menu(Vec::new(), MenuState::MainMenu).outcome("post_results"),
            // Every key here, "*" included, goes back to the main menu.
            MenuState::PostResults => menu(Vec::new(), MenuState::MainMenu).outcome("main_menu"),
            MenuState::LegalHelp => match lookup_fact(LEGAL_FACTS, digit) {
                Some((fact, name)) => Transition::new(
                    state,
                    MenuState::ReturnToMenu,
                    language,
                    PromptKey::Fact(fact),
                )
                .outcome(name),
                None => invalid(MenuState::LegalHelp),
            },
            MenuState::LoanInfo => match lookup_fact(LOAN_FACTS, digit) {
                Some((fact, name)) => Transition::new(
                    state,
                    MenuState::ReturnToMenu,
                    language,
                    PromptKey::Fact(fact),
                )
                .outcome(name),
                None => invalid(MenuState::LoanInfo),
            },
            // Wrong key and no input both end the call here.
            MenuState::ReturnToMenu => match digit {
                Some(STAR) => menu(Vec::new(), MenuState::MainMenu).outcome("main_menu"),
                _ => Transition::new(state, MenuState::Terminated, language, PromptKey::Goodbye)
                    .outcome("goodbye"),
            },
            MenuState::Terminated => {
                Transition::new(state, MenuState::Terminated, language, PromptKey::Goodbye)
                    .outcome("goodbye")
            }
        }
    }
}
