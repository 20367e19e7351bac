pub fn wrap_twiml(twiml: String) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{twiml}")
}

mod twiml {
    use xmlserde_derives::XmlSerialize;

    #[derive(PartialEq, Eq, XmlSerialize)]
    #[xmlserde(root = b"Response")]
    pub struct Response {
        #[xmlserde(ty = "untag")]
        pub actions: Vec<ResponseAction>,
    }

    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum ResponseAction {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Pause")]
        Pause(PauseAction),
        #[xmlserde(name = b"Gather")]
        Gather(GatherAction),
        #[xmlserde(name = b"Redirect")]
        Redirect(RedirectAction),
        #[xmlserde(name = b"Hangup")]
        Hangup(HangupAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct SayAction {
        #[xmlserde(ty = "text")]
        pub text: String,
        #[xmlserde(name = b"voice", ty = "attr")]
        pub voice: Option<String>,
        #[xmlserde(name = b"loop", ty = "attr")]
        pub lp: Option<u16>,
        #[xmlserde(name = b"language", ty = "attr")]
        pub language: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct PauseAction {
        #[xmlserde(name = b"length", ty = "attr")]
        pub length: Option<u16>,
    }

    /// Nested verbs Twilio plays while a Gather waits for input
    #[derive(PartialEq, Eq, XmlSerialize)]
    pub enum GatherPrompt {
        #[xmlserde(name = b"Say")]
        Say(SayAction),
        #[xmlserde(name = b"Pause")]
        Pause(PauseAction),
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct GatherAction {
        #[xmlserde(name = b"numDigits", ty = "attr")]
        pub num_digits: Option<u16>,
        #[xmlserde(name = b"action", ty = "attr")]
        pub action: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
        #[xmlserde(name = b"timeout", ty = "attr")]
        pub timeout: Option<u16>,
        #[xmlserde(name = b"actionOnEmptyResult", ty = "attr")]
        pub action_on_empty_result: Option<String>,
        #[xmlserde(ty = "untag")]
        pub prompts: Vec<GatherPrompt>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct RedirectAction {
        #[xmlserde(ty = "text")]
        pub url: String,
        #[xmlserde(name = b"method", ty = "attr")]
        pub method: Option<String>,
    }

    #[derive(PartialEq, Eq, XmlSerialize, Default)]
    pub struct HangupAction {}
}
pub use twiml::*;

mod webhook {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "kebab-case")]
    pub enum CallStatus {
        Initiated,
        Queued,
        Ringing,
        InProgress,
        Completed,
        Busy,
        Failed,
        NoAnswer,
        Canceled,
    }

    /// Fields of a voice webhook (incoming call or Gather callback) that the menu reads.  Twilio
    /// sends many more; they are ignored.
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioVoicePayload {
        pub call_sid: String,
        pub from: Option<String>,
        pub to: Option<String>,
        pub digits: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "PascalCase")]
    pub struct TwilioStatusPayload {
        pub call_sid: String,
        pub call_status: CallStatus,
        pub call_duration: Option<String>,
    }
}
pub use webhook::*;

use crate::consts::IVR_ROUTE_PREFIX;
use crate::session::{MenuState, SessionStatus};
use crate::voice::{ContextHints, Directive, Segment, VoiceResponse};

impl From<CallStatus> for SessionStatus {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Completed => SessionStatus::Completed,
            CallStatus::Busy | CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Canceled => {
                SessionStatus::Failed
            }
            CallStatus::Initiated
            | CallStatus::Queued
            | CallStatus::Ringing
            | CallStatus::InProgress => SessionStatus::Active,
        }
    }
}

/// Endpoint URL for `state` under `kind` (`menu` or `prompt`).  Only the language is echoed as a
/// query hint, which keeps the URL free of characters that would need escaping in an attribute.
fn state_url(kind: &str, state: MenuState, hints: &ContextHints) -> String {
    let base = format!("{IVR_ROUTE_PREFIX}/{kind}/{}", state.slug());
    let lang_only = ContextHints {
        lang: hints.lang.clone(),
        ..Default::default()
    };
    match serde_urlencoded::to_string(&lang_only) {
        Ok(query) if !query.is_empty() => format!("{base}?{query}"),
        _ => base,
    }
}

fn say(text: &str, voice: &str, locale: &str) -> SayAction {
    SayAction {
        text: text.to_string(),
        voice: Some(voice.to_string()),
        language: Some(locale.to_string()),
        ..Default::default()
    }
}

fn spoken_actions(segments: &[Segment]) -> Vec<ResponseAction> {
    segments
        .iter()
        .map(|s| match s {
            Segment::Speak {
                text,
                voice,
                locale,
            } => ResponseAction::Say(say(text, voice, locale)),
            Segment::Pause { seconds } => ResponseAction::Pause(PauseAction {
                length: Some(*seconds),
            }),
        })
        .collect()
}

/// Render a voice response as a complete TwiML document.  For a Gather the segments are nested in
/// it so a caller may key ahead while the prompt plays.
pub fn render_twiml(response: &VoiceResponse, gather_timeout: u16) -> String {
    let actions = match &response.directive {
        Directive::Gather(state) => {
            let prompts = response
                .segments
                .iter()
                .map(|s| match s {
                    Segment::Speak {
                        text,
                        voice,
                        locale,
                    } => GatherPrompt::Say(say(text, voice, locale)),
                    Segment::Pause { seconds } => GatherPrompt::Pause(PauseAction {
                        length: Some(*seconds),
                    }),
                })
                .collect();
            vec![ResponseAction::Gather(GatherAction {
                num_digits: Some(1),
                action: state_url("menu", *state, &response.hints),
                method: Some("POST".to_string()),
                timeout: Some(gather_timeout),
                action_on_empty_result: Some("true".to_string()),
                prompts,
            })]
        }
        Directive::Redirect(state) => {
            let mut actions = spoken_actions(&response.segments);
            actions.push(ResponseAction::Redirect(RedirectAction {
                url: state_url("prompt", *state, &response.hints),
                method: Some("POST".to_string()),
            }));
            actions
        }
        Directive::Hangup => {
            let mut actions = spoken_actions(&response.segments);
            actions.push(ResponseAction::Hangup(HangupAction {}));
            actions
        }
    };

    wrap_twiml(xmlserde::xml_serialize(Response { actions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Language;

    fn speak(text: &str) -> Segment {
        Segment::Speak {
            text: text.to_string(),
            voice: "Google.en-IN-Standard-A".to_string(),
            locale: "en-IN".to_string(),
        }
    }

    fn hints() -> ContextHints {
        ContextHints {
            lang: Some("en".to_string()),
            city: Some("Delhi".to_string()),
            job_type: None,
        }
    }

    #[test]
    fn twilio_statuses_map_to_session_status() {
        assert_eq!(SessionStatus::from(CallStatus::Completed), SessionStatus::Completed);
        assert_eq!(SessionStatus::from(CallStatus::NoAnswer), SessionStatus::Failed);
        assert_eq!(SessionStatus::from(CallStatus::Canceled), SessionStatus::Failed);
        assert_eq!(SessionStatus::from(CallStatus::InProgress), SessionStatus::Active);
        assert_eq!(SessionStatus::from(CallStatus::Initiated), SessionStatus::Active);
    }

    #[test]
    fn payloads_parse_from_form_bodies() {
        let body = "AccountSid=AC1&CallSid=CA9&From=%2B919800000001&To=%2B918000000000&Digits=%2A";
        let payload: TwilioVoicePayload = serde_urlencoded::from_str(body).unwrap();
        assert_eq!(payload.call_sid, "CA9");
        assert_eq!(payload.from.as_deref(), Some("+919800000001"));
        assert_eq!(payload.digits.as_deref(), Some("*"));

        let body = "CallSid=CA9&CallStatus=no-answer&CallDuration=0";
        let payload: TwilioStatusPayload = serde_urlencoded::from_str(body).unwrap();
        assert_eq!(payload.call_status, CallStatus::NoAnswer);
        assert_eq!(payload.call_duration.as_deref(), Some("0"));

        let payload: TwilioStatusPayload =
            serde_urlencoded::from_str("CallSid=CA9&CallStatus=initiated").unwrap();
        assert_eq!(payload.call_status, CallStatus::Initiated);
        assert_eq!(payload.call_duration, None);
    }

    #[test]
    fn gather_nests_prompts() {
        let response = VoiceResponse {
            segments: vec![speak("Main menu.")],
            directive: Directive::Gather(MenuState::MainMenu),
            hints: hints(),
        };
        let xml = render_twiml(&response, 5);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>"));
        assert!(xml.contains("numDigits=\"1\""));
        assert!(xml.contains("action=\"/api/ivr/menu/main-menu?lang=en\""));
        assert!(xml.contains("actionOnEmptyResult=\"true\""));
        assert!(xml.contains("timeout=\"5\""));
        let gather = xml.find("<Gather").unwrap();
        let say = xml.find("<Say").unwrap();
        assert!(gather < say);
        assert!(xml.contains("Main menu.</Say></Gather></Response>"));
    }

    #[test]
    fn redirect_follows_segments() {
        let response = VoiceResponse {
            segments: vec![speak("Sorry, no jobs."), Segment::Pause { seconds: 1 }],
            directive: Directive::Redirect(MenuState::MainMenu),
            hints: hints(),
        };
        let xml = render_twiml(&response, 5);
        assert!(!xml.contains("<Gather"));
        let say = xml.find("<Say").unwrap();
        let pause = xml.find("<Pause length=\"1\"").unwrap();
        let redirect = xml.find("<Redirect").unwrap();
        assert!(say < pause && pause < redirect);
        assert!(xml.contains(">/api/ivr/prompt/main-menu?lang=en</Redirect>"));
    }

    #[test]
    fn hangup_is_last() {
        let response = VoiceResponse {
            segments: vec![speak("Goodbye!")],
            directive: Directive::Hangup,
            hints: ContextHints::new(&Language::new("en"), &Default::default()),
        };
        let xml = render_twiml(&response, 5);
        assert!(xml.contains("<Hangup"));
        assert!(xml.find("<Say").unwrap() < xml.find("<Hangup").unwrap());
        assert_eq!(xml.matches("<Hangup").count(), 1);
        assert!(!xml.contains("<Gather") && !xml.contains("<Redirect"));
    }
}
