//! Minimal TwiML rendering for voice responses.
//!
//! Twilio only needs a handful of verbs from us: speak, gather speech, hang
//! up. Building the XML by hand keeps the adapter dependency-free and easy
//! to assert against in tests.

use axum::http::header;
use axum::response::{IntoResponse, Response};

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn say(text: &str) -> String {
    format!("<Say>{}</Say>", escape(text))
}

/// A speech gather posting the transcription to `action`.
pub fn gather_speech(action: &str, inner: &str) -> String {
    format!(
        r#"<Gather input="speech" action="{}" method="POST" speechTimeout="auto">{}</Gather>"#,
        escape(action),
        inner
    )
}

pub fn hangup() -> &'static str {
    "<Hangup/>"
}

pub fn document(body: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><Response>{body}</Response>"#)
}

pub fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}
