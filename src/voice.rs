use crate::consts::{FACT_PAUSE_SECS, JOB_PAUSE_SECS};
use crate::menu::{PromptKey, Transition};
use crate::prompts::{PromptCatalog, PromptId};
use crate::session::{Language, MenuState, Selections};

use serde::{Deserialize, Serialize};

/// Something spoken (or silent) before the terminal directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Speak {
        text: String,
        voice: String,
        locale: String,
    },
    Pause {
        seconds: u16,
    },
}

/// What the call does once the segments have played.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Collect one key and notify the state's endpoint
    Gather(MenuState),
    /// Fetch the state's prompt without any input
    Redirect(MenuState),
    Hangup,
}

/// Conversation context echoed in action URLs.  Only a hint: handlers act on the stored session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
}

impl ContextHints {
    pub fn new(language: &Language, selections: &Selections) -> Self {
        Self {
            lang: Some(language.code().to_string()),
            city: selections.city.clone(),
            job_type: selections.job_type.clone(),
        }
    }
}

/// Provider-neutral voice response: segments, then exactly one directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceResponse {
    pub segments: Vec<Segment>,
    pub directive: Directive,
    pub hints: ContextHints,
}

impl VoiceResponse {
    /// Spoken text only, in order.
    #[cfg(test)]
    pub fn spoken(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Speak { text, .. } => Some(text.as_str()),
                Segment::Pause { .. } => None,
            })
            .collect()
    }
}

/// Builds voice responses from catalog text.
pub struct Encoder<'a> {
    catalog: &'a PromptCatalog,
    language: Language,
    segments: Vec<Segment>,
}

impl<'a> Encoder<'a> {
    pub fn new(catalog: &'a PromptCatalog, language: &Language) -> Self {
        Self {
            catalog,
            language: language.clone(),
            segments: Vec::new(),
        }
    }

    fn say_in(&mut self, text: String, language: &Language) {
        let profile = self.catalog.profile(language);
        self.segments.push(Segment::Speak {
            text,
            voice: profile.voice.clone(),
            locale: profile.locale.clone(),
        });
    }

    fn say(&mut self, id: PromptId) {
        let text = self.catalog.text(id, &self.language).to_string();
        let language = self.language.clone();
        self.say_in(text, &language);
    }

    fn say_text(&mut self, text: String) {
        let language = self.language.clone();
        self.say_in(text, &language);
    }

    fn pause(&mut self, seconds: u16) {
        self.segments.push(Segment::Pause { seconds });
    }

    /// Present a state's own menu.  Welcome is spoken once per catalog language.
    fn present(&mut self, state: MenuState) {
        match state {
            MenuState::Welcome => {
                let catalog = self.catalog;
                for profile in catalog.profiles() {
                    let text = catalog.text(PromptId::Welcome, &profile.language).to_string();
                    self.say_in(text, &profile.language);
                }
            }
            MenuState::MainMenu => self.say(PromptId::MainMenu),
            MenuState::CitySelect => self.say(PromptId::CitySelection),
            MenuState::JobTypeSelect => self.say(PromptId::JobTypeSelection),
            MenuState::JobResults | MenuState::PostResults => self.say(PromptId::PostResults),
            MenuState::LegalHelp => self.say(PromptId::LegalHelp),
            MenuState::LoanInfo => self.say(PromptId::LoanInfo),
            MenuState::ReturnToMenu => self.say(PromptId::ReturnHint),
            MenuState::Terminated => self.say(PromptId::Goodbye),
        }
    }

    fn finish(self, directive: Directive, hints: ContextHints) -> VoiceResponse {
        VoiceResponse {
            segments: self.segments,
            directive,
            hints,
        }
    }

    /// Encode a prompt key.  `hints` are the selections the call has after this step.
    pub fn encode(mut self, prompt: &PromptKey, hints: ContextHints) -> VoiceResponse {
        match prompt {
            PromptKey::Menu { preface, state } => {
                for id in preface {
                    self.say(*id);
                }
                self.present(*state);
                let directive = match state {
                    MenuState::Terminated => Directive::Hangup,
                    state => Directive::Gather(*state),
                };
                self.finish(directive, hints)
            }
            PromptKey::Fact(fact) => {
                self.say(*fact);
                self.pause(FACT_PAUSE_SECS);
                self.say(PromptId::ReturnHint);
                self.finish(Directive::Gather(MenuState::ReturnToMenu), hints)
            }
            PromptKey::JobListing(jobs) if jobs.is_empty() => {
                self.say(PromptId::NoJobs);
                self.pause(JOB_PAUSE_SECS);
                self.finish(Directive::Redirect(MenuState::MainMenu), hints)
            }
            PromptKey::JobListing(jobs) => {
                let count = jobs.len().to_string();
                let intro = self
                    .catalog
                    .render(PromptId::JobsIntro, &self.language, &[("count", count.as_str())]);
                self.say_text(intro);
                self.pause(JOB_PAUSE_SECS);
                for (idx, job) in jobs.iter().enumerate() {
                    let index = (idx + 1).to_string();
                    let line = self.catalog.render(
                        PromptId::JobLine,
                        &self.language,
                        &[
                            ("index", index.as_str()),
                            ("title", job.title_for(self.language.code())),
                            ("company", job.company.as_str()),
                            ("salary", job.salary.as_str()),
                        ],
                    );
                    self.say_text(line);
                    self.pause(JOB_PAUSE_SECS);
                }
                self.say(PromptId::PostResults);
                self.finish(Directive::Gather(MenuState::JobResults), hints)
            }
            PromptKey::Goodbye => {
                self.say(PromptId::Goodbye);
                self.finish(Directive::Hangup, hints)
            }
        }
    }
}

/// Encode the reply for a settled transition.
pub fn encode_transition(
    catalog: &PromptCatalog,
    transition: &Transition,
    selections: &Selections,
) -> VoiceResponse {
    let hints = ContextHints::new(&transition.language, selections);
    Encoder::new(catalog, &transition.language).encode(&transition.prompt, hints)
}

/// Response for when nothing else can be produced: an apology in every language, then hang up.
pub fn safe_response(catalog: &PromptCatalog) -> VoiceResponse {
    let mut encoder = Encoder::new(catalog, &Language::default());
    for profile in catalog.profiles() {
        let text = catalog.text(PromptId::SystemError, &profile.language).to_string();
        encoder.say_in(text, &profile.language);
    }
    encoder.finish(Directive::Hangup, ContextHints::default())
}
