use crate::twilio_types::render_twiml;
use crate::types::AppState;
use crate::voice::{safe_response, VoiceResponse};

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::trace;

pub fn xml_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    headers
}

/// Serve a voice response as TwiML.  Always 200 so Twilio plays whatever we return.
pub fn twiml_response(app_state: &AppState, response: &VoiceResponse) -> Response {
    let twiml = render_twiml(response, app_state.gather_timeout_secs);
    trace!("twiml: '{}'", twiml);
    (StatusCode::OK, xml_headers(), twiml).into_response()
}

/// Apology and hang up, rendered once for the panic handler.
pub fn safe_twiml(app_state: &AppState) -> String {
    render_twiml(
        &safe_response(&app_state.catalog),
        app_state.gather_timeout_secs,
    )
}
