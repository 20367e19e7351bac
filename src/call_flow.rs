use crate::consts::MAX_SPOKEN_JOBS;
use crate::error::AppError;
use crate::menu::PromptKey;
use crate::session::{ActionRecord, CallSession, MenuState, SessionStatus, StatusUpdate};
use crate::twilio_types::{TwilioStatusPayload, TwilioVoicePayload};
use crate::types::AppState;
use crate::voice::{encode_transition, ContextHints, Encoder, VoiceResponse};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Compare what the request claims about the call with what is stored.  The stored session wins.
fn reconcile(session: &CallSession, path_state: Option<MenuState>, hints: &ContextHints) {
    if let Some(claimed) = path_state {
        if claimed != session.current_state {
            warn!(
                call_sid=%session.call_id,
                claimed=claimed.as_str(),
                stored=session.current_state.as_str(),
                "notification for a state the call is not in"
            );
        }
    }
    let mismatched = |hint: &Option<String>, stored: Option<&str>| {
        hint.as_deref().map_or(false, |h| Some(h) != stored)
    };
    if mismatched(&hints.lang, Some(session.language.code()))
        || mismatched(&hints.city, session.selected_city.as_deref())
        || mismatched(&hints.job_type, session.selected_job_type.as_deref())
    {
        debug!(call_sid=%session.call_id, ?hints, "query hints disagree with stored session");
    }
}

/// Start (or restart) a call at Welcome.
pub async fn incoming_call(
    app_state: &AppState,
    payload: TwilioVoicePayload,
) -> Result<VoiceResponse, AppError> {
    let session = app_state
        .store
        .create_or_replace(&payload.call_sid, payload.from, payload.to)
        .await?;
    info!(call_sid=%session.call_id, "incoming call");
    let hints = ContextHints::new(&session.language, &session.selections());

    Ok(Encoder::new(&app_state.catalog, &session.language)
        .encode(&PromptKey::present(MenuState::Welcome), hints))
}

/// Load, decide, persist, encode.
pub async fn menu_input(
    app_state: &AppState,
    path_state: Option<MenuState>,
    hints: ContextHints,
    payload: TwilioVoicePayload,
) -> Result<VoiceResponse, AppError> {
    let session = app_state.store.get(&payload.call_sid).await?;
    reconcile(&session, path_state, &hints);

    let digit = payload
        .digits
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let mut selections = session.selections();
    let mut transition = app_state.machine.transition(
        session.current_state,
        &session.language,
        digit,
        &selections,
    );

    let mut found = None;
    if let Some((city, job_type)) = transition.job_query() {
        found = Some(
            match app_state.jobs.find_jobs(city, job_type, MAX_SPOKEN_JOBS).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(call_sid=%session.call_id, error=%e, city, job_type, "job query failed");
                    Vec::new()
                }
            },
        );
    }
    if let Some(jobs) = found {
        transition = transition.with_jobs(jobs);
    }

    let delta = transition.delta();
    if delta.selected_city.is_some() {
        selections.city = delta.selected_city.clone();
    }
    if delta.selected_job_type.is_some() {
        selections.job_type = delta.selected_job_type.clone();
    }
    let record = ActionRecord::now(session.current_state, digit, transition.outcome.clone());
    app_state
        .store
        .apply_menu_update(&session.call_id, delta, record)
        .await?;
    info!(
        call_sid=%session.call_id,
        state=transition.from.as_str(),
        digit=digit.unwrap_or(""),
        next=transition.next.as_str(),
        "menu input"
    );

    Ok(encode_transition(&app_state.catalog, &transition, &selections))
}

/// Re-present the stored state.  Read only.
pub async fn present_prompt(
    app_state: &AppState,
    path_state: Option<MenuState>,
    hints: ContextHints,
    call_sid: &str,
) -> Result<VoiceResponse, AppError> {
    let session = app_state.store.get(call_sid).await?;
    reconcile(&session, path_state, &hints);
    let hints = ContextHints::new(&session.language, &session.selections());

    Ok(Encoder::new(&app_state.catalog, &session.language)
        .encode(&PromptKey::present(session.current_state), hints))
}

fn status_update(payload: &TwilioStatusPayload, now: OffsetDateTime) -> StatusUpdate {
    let status = SessionStatus::from(payload.call_status);
    let duration_seconds = payload
        .call_duration
        .as_deref()
        .and_then(|d| d.trim().parse::<i32>().ok());
    StatusUpdate {
        status,
        duration_seconds,
        ended_at: status.is_terminal().then_some(now),
    }
}

pub async fn call_status(
    app_state: &AppState,
    payload: TwilioStatusPayload,
) -> Result<(), AppError> {
    let update = status_update(&payload, OffsetDateTime::now_utc());
    info!(
        call_sid=%payload.call_sid,
        status=update.status.as_str(),
        duration=?update.duration_seconds,
        "call status"
    );
    app_state
        .store
        .apply_status_update(&payload.call_sid, update)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twilio_types::CallStatus;

    fn payload(status: CallStatus, duration: Option<&str>) -> TwilioStatusPayload {
        TwilioStatusPayload {
            call_sid: "CA1".to_string(),
            call_status: status,
            call_duration: duration.map(str::to_string),
        }
    }

    #[test]
    fn terminal_status_stamps_end() {
        let now = OffsetDateTime::now_utc();
        let update = status_update(&payload(CallStatus::Completed, Some("125")), now);
        assert_eq!(update.status, SessionStatus::Completed);
        assert_eq!(update.duration_seconds, Some(125));
        assert_eq!(update.ended_at, Some(now));

        let update = status_update(&payload(CallStatus::InProgress, None), now);
        assert_eq!(update.status, SessionStatus::Active);
        assert_eq!(update.ended_at, None);
    }

    #[test]
    fn malformed_duration_is_dropped() {
        let update = status_update(
            &payload(CallStatus::Busy, Some("abc")),
            OffsetDateTime::now_utc(),
        );
        assert_eq!(update.status, SessionStatus::Failed);
        assert_eq!(update.duration_seconds, None);
    }
}
