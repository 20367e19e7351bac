use crate::analytics::{summarize, Analytics};
use crate::call_flow;
use crate::consts::IVR_ROUTE_PREFIX;
use crate::error::{handle_error, AppError, StoreError};
use crate::session::{CallSession, MenuState};
use crate::twilio_types::{TwilioStatusPayload, TwilioVoicePayload};
use crate::types::AppState;
use crate::utils::{safe_twiml, twiml_response, xml_headers};
use crate::voice::{safe_response, ContextHints, VoiceResponse};

use axum::{
    body::{Bytes, Full},
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, trace, warn};

/// Webhooks always answer with a playable document; failures become the apology.
fn respond(app_state: &AppState, result: Result<VoiceResponse, AppError>) -> Response {
    let response = result.unwrap_or_else(|e| {
        handle_error(&e);
        safe_response(&app_state.catalog)
    });
    twiml_response(app_state, &response)
}

fn parse_hints(query: Option<String>) -> ContextHints {
    let query = query.unwrap_or_default();
    serde_urlencoded::from_str(&query).unwrap_or_else(|e| {
        debug!(error=%e, query=%query, "ignoring malformed query hints");
        ContextHints::default()
    })
}

fn parse_state(slug: &str) -> Option<MenuState> {
    let state = MenuState::from_slug(slug);
    if state.is_none() {
        warn!(slug, "unknown menu state in path");
    }
    state
}

fn voice_payload(body: &str) -> Result<TwilioVoicePayload, AppError> {
    trace!(body=%body, "voice webhook body");
    Ok(serde_urlencoded::from_str(body)?)
}

pub async fn incoming(State(app_state): State<Arc<AppState>>, body: String) -> Response {
    let result = match voice_payload(&body) {
        Ok(payload) => call_flow::incoming_call(&app_state, payload).await,
        Err(e) => Err(e),
    };
    respond(&app_state, result)
}

pub async fn menu(
    State(app_state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
    body: String,
) -> Response {
    let result = match voice_payload(&body) {
        Ok(payload) => {
            call_flow::menu_input(&app_state, parse_state(&slug), parse_hints(query), payload)
                .await
        }
        Err(e) => Err(e),
    };
    respond(&app_state, result)
}

pub async fn prompt(
    State(app_state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
    body: String,
) -> Response {
    let result = match voice_payload(&body) {
        Ok(payload) => {
            call_flow::present_prompt(
                &app_state,
                parse_state(&slug),
                parse_hints(query),
                &payload.call_sid,
            )
            .await
        }
        Err(e) => Err(e),
    };
    respond(&app_state, result)
}

pub async fn call_status(State(app_state): State<Arc<AppState>>, body: String) -> StatusCode {
    trace!(body=%body, "status webhook body");
    let payload = match serde_urlencoded::from_str::<TwilioStatusPayload>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error=%e, "failed to deserialize Twilio status payload");
            return StatusCode::BAD_REQUEST;
        }
    };
    match call_flow::call_status(&app_state, payload).await {
        Ok(()) => StatusCode::OK,
        Err(AppError::Store(StoreError::NotFound(call_sid))) => {
            warn!(call_sid=%call_sid, "status for unknown call");
            StatusCode::OK
        }
        Err(e) => {
            handle_error(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Deserialize)]
pub struct HistoryParams {
    limit: Option<u32>,
}

pub async fn call_history(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<CallSession>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(app_state.history_limit)
        .min(app_state.history_limit);
    Ok(Json(app_state.store.list_recent(limit).await?))
}

pub async fn call_detail(
    State(app_state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<Json<CallSession>, AppError> {
    Ok(Json(app_state.store.get(&call_id).await?))
}

pub async fn analytics(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Analytics>, AppError> {
    let stats = app_state.store.stats().await?;
    Ok(Json(summarize(&stats)))
}

pub fn router(app_state: Arc<AppState>) -> Router {
    let safe = safe_twiml(&app_state);
    let on_panic = move |_: Box<dyn Any + Send + 'static>| {
        error!("panic while answering a webhook; sending safe response");
        let mut response = axum::http::Response::new(Full::<Bytes>::from(safe.clone()));
        *response.headers_mut() = xml_headers();
        response
    };
    let webhooks = Router::new()
        .route("/incoming", post(incoming))
        .route("/menu/:state", post(menu))
        .route("/prompt/:state", post(prompt))
        .layer(CatchPanicLayer::custom(on_panic));
    let reports = Router::new()
        .route("/status", post(call_status))
        .route("/call-history", get(call_history))
        .route("/calls/:call_id", get(call_detail))
        .route("/analytics", get(analytics));

    Router::new()
        .nest(IVR_ROUTE_PREFIX, webhooks.merge(reports))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
