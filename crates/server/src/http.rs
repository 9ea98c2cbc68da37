//! HTTP endpoints
//!
//! Twilio webhooks for transcript mode, the media-stream WebSocket
//! upgrade for streaming mode, plus health and metrics.

use axum::{
    extract::{Form, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use sofia_config::{prompts, BridgeMode};

use crate::bridge::CallState;
use crate::media::media_stream_handler;
use crate::metrics::{metrics_handler, record_active_sessions, record_call, record_turn};
use crate::state::AppState;
use crate::twiml::VoiceResponse;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Twilio voice webhooks
        .route("/incoming-call", post(incoming_call))
        .route("/process-speech", post(process_speech))
        // Streaming-mode media WebSocket
        .route("/media-stream", get(media_stream_handler))
        // Health and metrics
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Form fields Twilio posts to voice webhooks. Unused fields ignored.
#[derive(Debug, Deserialize)]
pub struct TwilioWebhook {
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: String,
}

fn xml_response(twiml: VoiceResponse) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml.to_xml(),
    )
        .into_response()
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "Restaurant AI is running." }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Answer an inbound call: create the session, speak the greeting, then
/// either gather speech (transcript mode) or open the media stream
/// (streaming mode).
async fn incoming_call(State(state): State<AppState>, Form(form): Form<TwilioWebhook>) -> Response {
    let caller = if form.from.is_empty() {
        "unknown".to_string()
    } else {
        form.from
    };
    record_call();

    let session = match state.registry.get_or_create(&caller, &state.system_message) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(caller, "Could not answer call: {}", e);
            return xml_response(
                VoiceResponse::new()
                    .say("We are unable to take your call right now. Goodbye.")
                    .hangup(),
            );
        }
    };
    record_active_sessions(state.registry.count());
    tracing::info!(caller, mode = ?state.settings.bridge_mode, "Answering call");

    let twiml = match state.settings.bridge_mode {
        BridgeMode::Transcript => VoiceResponse::new()
            .say(prompts::GREETING)
            .gather("/process-speech", prompts::GATHER_PROMPT)
            .say(prompts::NO_INPUT_GOODBYE)
            .hangup(),
        // The stream's start event does not carry the webhook's From
        // field, so the caller number rides along as a stream parameter;
        // the media handler needs it to evict the session on stop.
        BridgeMode::Streaming => VoiceResponse::new()
            .say(prompts::GREETING)
            .pause(1)
            .connect_stream_with(
                format!("wss://{}/media-stream", state.settings.server.public_host),
                vec![("caller".to_string(), caller.clone())],
            ),
    };

    session.set_state(CallState::AwaitingInput);
    xml_response(twiml)
}

/// One transcript-mode turn: Twilio posts the transcribed utterance and
/// we reply with TwiML that speaks the answer and gathers again, or
/// hangs up.
async fn process_speech(
    State(state): State<AppState>,
    Form(form): Form<TwilioWebhook>,
) -> Response {
    let caller = if form.from.is_empty() {
        "unknown".to_string()
    } else {
        form.from
    };
    let utterance = form.speech_result.trim().to_string();

    // Empty or unintelligible input is not retried; apologize and hang up.
    if utterance.is_empty() {
        state.registry.remove(&caller);
        return xml_response(
            VoiceResponse::new()
                .say(prompts::UNINTELLIGIBLE_GOODBYE)
                .hangup(),
        );
    }

    let session = match state.registry.get_or_create(&caller, &state.system_message) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(caller, "No session for turn: {}", e);
            return xml_response(
                VoiceResponse::new()
                    .say("We are unable to take your call right now. Goodbye.")
                    .hangup(),
            );
        }
    };

    session.set_state(CallState::Processing);
    session.touch();

    let reply = {
        let mut history = session.history.lock().await;
        state.engine.take_turn(&caller, &mut history, &utterance).await
    };
    record_turn();

    if reply.end_call {
        state.registry.remove(&caller);
        record_active_sessions(state.registry.count());
        xml_response(
            VoiceResponse::new()
                .say(format!("{}\n{}", reply.text, prompts::FAREWELL))
                .hangup(),
        )
    } else {
        session.set_state(CallState::AwaitingInput);
        xml_response(
            VoiceResponse::new()
                .gather("/process-speech", reply.text)
                .say(prompts::NO_INPUT_GOODBYE)
                .hangup(),
        )
    }
}
