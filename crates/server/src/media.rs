//! Twilio media-stream WebSocket handler
//!
//! Accepts the bidirectional audio stream Twilio opens after the
//! `<Connect><Stream>` verb, opens a realtime AI speech session, and
//! relays frames both ways under the `Relay` state machine. Malformed
//! control payloads are logged and dropped; the stream continues.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use sofia_core::decode_media_payload;
use sofia_llm::{RealtimeConfig, RealtimeHandle, RealtimeSession};

use crate::bridge::{Relay, RelayAction, StreamState};
use crate::state::AppState;

/// Inbound control events on the media stream
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
enum TwilioMessage {
    Connected {},
    Start { start: StartMeta },
    Media { media: MediaMeta },
    Mark {},
    Stop {},
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, PartialEq)]
struct StartMeta {
    #[serde(rename = "streamSid")]
    stream_sid: String,
    /// `<Parameter>` values from the Connect/Stream TwiML, echoed back
    /// by Twilio. Carries the caller number for session eviction.
    #[serde(rename = "customParameters", default)]
    custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct MediaMeta {
    /// Base64 mu-law audio
    payload: String,
}

/// Upgrade the `/media-stream` request
pub async fn media_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(mut socket: WebSocket, state: AppState) {
    // Twilio sends `connected` then `start`; nothing useful happens
    // before the start event carries the stream SID.
    let start = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match parse_message(&text) {
                Some(TwilioMessage::Start { start }) => break start,
                Some(TwilioMessage::Connected {}) => {}
                Some(other) => {
                    tracing::debug!(?other, "Event before start ignored");
                }
                None => {}
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("Media stream closed before start");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!("Media stream error before start: {}", e);
                return;
            }
        }
    };
    let stream_sid = start.stream_sid;
    let caller = start.custom_parameters.get("caller").cloned();
    tracing::info!(stream_sid, caller = ?caller, "Media stream started");

    let config = RealtimeConfig {
        voice: state.settings.openai.voice.clone(),
        instructions: state.system_message.as_str().to_string(),
        temperature: state.settings.openai.temperature,
        ..RealtimeConfig::new(
            state.settings.openai.api_key.clone(),
            state.settings.openai.realtime_model.clone(),
        )
    };

    let (handle, mut events) = match RealtimeSession::connect(config).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(stream_sid, "Realtime session handshake failed: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            evict_session(&state, caller.as_deref());
            return;
        }
    };

    let mut relay = Relay::new();
    relay.on_start(stream_sid);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let actions = match parse_message(&text) {
                            // A payload that does not decode cannot be
                            // relayed losslessly; drop the frame, keep the
                            // stream.
                            Some(TwilioMessage::Media { media }) => {
                                match decode_media_payload(&media.payload) {
                                    Ok(_) => relay.on_caller_media(media.payload),
                                    Err(e) => {
                                        metrics::counter!("sofia_malformed_payloads_total")
                                            .increment(1);
                                        tracing::debug!("Dropped media frame: {}", e);
                                        Vec::new()
                                    }
                                }
                            }
                            Some(TwilioMessage::Stop {}) => relay.on_stop(),
                            Some(_) => Vec::new(),
                            None => Vec::new(),
                        };
                        apply_actions(actions, &mut socket, &handle, &relay).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // Unclean transport disconnect is the cancellation
                        // signal for the AI session.
                        let actions = relay.on_stop();
                        apply_actions(actions, &mut socket, &handle, &relay).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Media stream receive error: {}", e);
                        let actions = relay.on_stop();
                        apply_actions(actions, &mut socket, &handle, &relay).await;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        let actions = relay.on_ai_event(event);
                        apply_actions(actions, &mut socket, &handle, &relay).await;
                    }
                    None => {
                        let actions = relay.on_stop();
                        apply_actions(actions, &mut socket, &handle, &relay).await;
                    }
                }
            }
        }

        if relay.state() == StreamState::Terminated {
            break;
        }
    }

    // A stopped stream is the end of the call; the session must not
    // outlive it.
    evict_session(&state, caller.as_deref());
    tracing::info!("Media stream ended");
}

/// Remove the call session once the stream tears down. A stream whose
/// TwiML did not carry a caller parameter is left to the idle cleanup
/// task.
fn evict_session(state: &AppState, caller: Option<&str>) {
    match caller {
        Some(caller) => {
            state.registry.remove(caller);
            crate::metrics::record_active_sessions(state.registry.count());
        }
        None => tracing::warn!("Stream carried no caller parameter; session left to idle cleanup"),
    }
}

/// Execute relay actions in order. Ordering is load-bearing: a barge-in
/// emits CancelResponse then SendClear, and no later media frame may be
/// sent before the clear.
async fn apply_actions(
    actions: Vec<RelayAction>,
    socket: &mut WebSocket,
    handle: &RealtimeHandle,
    relay: &Relay,
) {
    let stream_sid = relay.stream_sid().unwrap_or_default().to_string();

    for action in actions {
        let result = match action {
            RelayAction::AppendAudio(payload) => handle
                .append_audio(payload)
                .await
                .map_err(|e| e.to_string()),
            RelayAction::CancelResponse => {
                handle.cancel_response().await.map_err(|e| e.to_string())
            }
            RelayAction::SendClear => send_json(
                socket,
                json!({ "event": "clear", "streamSid": stream_sid }),
            )
            .await,
            RelayAction::SendMedia(payload) => send_json(
                socket,
                json!({
                    "event": "media",
                    "streamSid": stream_sid,
                    "media": { "payload": payload },
                }),
            )
            .await,
            RelayAction::SendMark(name) => send_json(
                socket,
                json!({
                    "event": "mark",
                    "streamSid": stream_sid,
                    "mark": { "name": name },
                }),
            )
            .await,
            RelayAction::CloseSession => {
                handle.close().await;
                let _ = socket.send(Message::Close(None)).await;
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!("Relay action failed: {}", e);
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> Result<(), String> {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .map_err(|e| e.to_string())
}

/// Parse one control payload. Undecodable JSON is dropped with a log
/// line, never fatal to the stream.
fn parse_message(text: &str) -> Option<TwilioMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!("Undecodable media-stream event dropped: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let message = parse_message(
            r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ123","accountSid":"AC1"},"streamSid":"MZ123"}"#,
        );
        assert_eq!(
            message,
            Some(TwilioMessage::Start {
                start: StartMeta {
                    stream_sid: "MZ123".to_string(),
                    custom_parameters: HashMap::new(),
                }
            })
        );
    }

    #[test]
    fn test_parse_start_carries_custom_parameters() {
        let message = parse_message(
            r#"{"event":"start","start":{"streamSid":"MZ123","customParameters":{"caller":"+15551234567"}}}"#,
        );
        match message {
            Some(TwilioMessage::Start { start }) => {
                assert_eq!(
                    start.custom_parameters.get("caller").map(String::as_str),
                    Some("+15551234567")
                );
            }
            other => panic!("expected start event, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_end_evicts_the_call_session() {
        let mut settings = sofia_config::Settings::default();
        settings.openai.api_key = "sk-test".to_string();
        let state = AppState::new(settings, sofia_config::RestaurantConfig::default()).unwrap();
        state
            .registry
            .get_or_create("+15551234567", "You are Sofia.")
            .unwrap();

        evict_session(&state, Some("+15551234567"));
        assert!(state.registry.get("+15551234567").is_none());
    }

    #[test]
    fn test_stream_without_caller_leaves_registry_to_idle_cleanup() {
        let mut settings = sofia_config::Settings::default();
        settings.openai.api_key = "sk-test".to_string();
        let state = AppState::new(settings, sofia_config::RestaurantConfig::default()).unwrap();
        state
            .registry
            .get_or_create("+15551234567", "You are Sofia.")
            .unwrap();

        evict_session(&state, None);
        assert!(state.registry.get("+15551234567").is_some());
    }

    #[test]
    fn test_parse_media_event() {
        let message = parse_message(
            r#"{"event":"media","media":{"track":"inbound","chunk":"2","timestamp":"5","payload":"AAAA"}}"#,
        );
        assert_eq!(
            message,
            Some(TwilioMessage::Media {
                media: MediaMeta {
                    payload: "AAAA".to_string()
                }
            })
        );
    }

    #[test]
    fn test_parse_stop_and_connected() {
        assert_eq!(
            parse_message(r#"{"event":"stop","stop":{"callSid":"CA1"}}"#),
            Some(TwilioMessage::Stop {})
        );
        assert_eq!(
            parse_message(r#"{"event":"connected","protocol":"Call"}"#),
            Some(TwilioMessage::Connected {})
        );
    }

    #[test]
    fn test_unknown_event_is_tolerated() {
        assert_eq!(
            parse_message(r#"{"event":"dtmf","dtmf":{"digit":"1"}}"#),
            Some(TwilioMessage::Unknown)
        );
    }

    #[test]
    fn test_malformed_payload_dropped() {
        assert_eq!(parse_message("not json"), None);
        assert_eq!(parse_message(r#"{"no_event":true}"#), None);
    }
}
