use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::errors::AppError;
use crate::handlers::twiml;
use crate::models::NextAction;
use crate::services::store::{self, SessionStore};
use crate::services::{dialogue, reservations};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
}

#[derive(Deserialize)]
pub struct SpeechWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(&str, &str)],
) -> bool {
    // Build the data to sign: URL + sorted params concatenated
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    let expected = base64::engine::general_purpose::STANDARD.encode(result);

    expected == signature
}

/// Check the X-Twilio-Signature header against the reconstructed webhook URL.
/// Skipped entirely when no auth token is configured — dev mode.
fn verify_request(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    params: &[(&str, &str)],
) -> Result<(), AppError> {
    if state.config.twilio_auth_token.is_empty() {
        return Ok(());
    }

    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!("missing X-Twilio-Signature header");
        return Err(AppError::Forbidden("missing signature".to_string()));
    }

    // Reconstruct webhook URL — use X-Forwarded-Proto/Host if behind proxy
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("{proto}://{host}{path}");

    if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, params) {
        tracing::warn!("invalid Twilio signature");
        return Err(AppError::Forbidden("invalid signature".to_string()));
    }
    Ok(())
}

/// A new call: open the session and greet inside a speech gather.
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<VoiceWebhookForm>,
) -> Result<Response, AppError> {
    let (Some(call_sid), Some(from)) = (form.call_sid.clone(), form.from.clone()) else {
        return Err(AppError::BadRequest("invalid Twilio request".to_string()));
    };

    let params = [
        ("CallSid", call_sid.as_str()),
        ("From", from.as_str()),
        ("To", form.to.as_deref().unwrap_or("")),
    ];
    verify_request(&state, &headers, "/webhook/voice", &params)?;

    tracing::info!(call_sid = %call_sid, from = %from, "incoming call");

    let session = store::session_key(&call_sid);
    let opened = async {
        state.store.set(&session, "from_number", &from).await?;
        state.store.set(&session, "status", "in-progress").await?;
        state
            .store
            .set(&session, "conversation_state", "initial")
            .await
    }
    .await;

    if let Err(e) = opened {
        tracing::error!(error = %e, call_sid = %call_sid, "failed to open call session");
        return Ok(apology_hangup());
    }

    let welcome = format!(
        "Welcome to {}. I can help you make a reservation, check an existing \
         reservation, or cancel a reservation. How may I help you today?",
        state.config.restaurant_name
    );
    Ok(gather_and_speak(&welcome))
}

/// One dialogue turn: transcription in, TwiML out.
pub async fn speech(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<SpeechWebhookForm>,
) -> Result<Response, AppError> {
    let Some(call_sid) = form.call_sid.clone() else {
        return Err(AppError::BadRequest("invalid Twilio request".to_string()));
    };

    let utterance = form.speech_result.clone().unwrap_or_default();
    let params = [
        ("CallSid", call_sid.as_str()),
        ("SpeechResult", utterance.as_str()),
        ("Confidence", form.confidence.as_deref().unwrap_or("")),
    ];
    verify_request(&state, &headers, "/webhook/speech", &params)?;

    tracing::info!(
        call_sid = %call_sid,
        utterance = %utterance,
        stt_confidence = form.confidence.as_deref().unwrap_or(""),
        "speech received"
    );

    let turn = match dialogue::process_user_input(state.store.as_ref(), &call_sid, &utterance).await
    {
        Ok(turn) => turn,
        Err(e) => {
            tracing::error!(error = %e, call_sid = %call_sid, "dialogue turn failed");
            return Ok(apology_hangup());
        }
    };

    tracing::info!(
        call_sid = %call_sid,
        intent = turn.intent.as_str(),
        next_action = turn.next_action.as_str(),
        needs_more_info = turn.needs_more_info,
        "turn processed"
    );

    match turn.next_action {
        NextAction::Hangup => Ok(twiml::xml_response(twiml::document(&format!(
            "{}{}",
            twiml::say(&turn.response_text),
            twiml::hangup()
        )))),
        NextAction::ConfirmReservation => {
            match reservations::finalize_reservation(state.store.as_ref(), &call_sid).await {
                Ok(reservation) => {
                    let text = format!(
                        "{} Your reservation ID is {}. Please keep it for your records.",
                        turn.response_text,
                        reservations::format_id_for_speech(&reservation.reservation_id)
                    );
                    Ok(gather_and_speak(&text))
                }
                Err(e) => {
                    tracing::error!(error = %e, call_sid = %call_sid, "failed to record reservation");
                    Ok(apology_hangup())
                }
            }
        }
        _ => Ok(gather_and_speak(&turn.response_text)),
    }
}

/// Call teardown: the session and its draft die with the call.
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StatusWebhookForm>,
) -> Result<Response, AppError> {
    let Some(call_sid) = form.call_sid.clone() else {
        return Err(AppError::BadRequest("invalid Twilio request".to_string()));
    };
    let call_status = form.call_status.clone().unwrap_or_default();

    let params = [
        ("CallSid", call_sid.as_str()),
        ("CallStatus", call_status.as_str()),
    ];
    verify_request(&state, &headers, "/webhook/status", &params)?;

    if matches!(
        call_status.as_str(),
        "completed" | "failed" | "busy" | "no-answer" | "canceled"
    ) {
        cleanup_call(state.store.as_ref(), &call_sid)
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;
        tracing::info!(call_sid = %call_sid, call_status = %call_status, "call session cleaned up");
    }

    Ok(twiml::xml_response(twiml::document("")))
}

async fn cleanup_call(store: &dyn SessionStore, call_sid: &str) -> anyhow::Result<()> {
    store.delete_key(&store::session_key(call_sid)).await?;
    store.delete_key(&store::draft_key(call_sid)).await?;
    Ok(())
}

/// Speak inside a gather so the caller can answer; if they stay silent the
/// flow falls through to a goodbye and hangup.
fn gather_and_speak(text: &str) -> Response {
    let body = format!(
        "{}{}{}",
        twiml::gather_speech("/webhook/speech", &twiml::say(text)),
        twiml::say("We did not receive any input. Goodbye."),
        twiml::hangup()
    );
    twiml::xml_response(twiml::document(&body))
}

fn apology_hangup() -> Response {
    let body = format!(
        "{}{}",
        twiml::say("Sorry, we are having trouble right now. Please call again later."),
        twiml::hangup()
    );
    twiml::xml_response(twiml::document(&body))
}
