//! Realtime speech session client
//!
//! Opens a speech-to-speech session against the OpenAI realtime API and
//! exposes it as a command handle plus a typed event stream. An internal
//! task owns the socket, so audio can be appended while events are being
//! drained concurrently — the relay needs both directions live at once.
//! Dropping the handle (or calling `close`) tears the socket down, which
//! is how a transport disconnect cancels an in-flight session.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;

use crate::LlmError;

/// Realtime session configuration, fixed for the session's lifetime.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint base
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Realtime model name
    pub model: String,
    /// Voice for speech output
    pub voice: String,
    /// Persona instructions
    pub instructions: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl RealtimeConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: "wss://api.openai.com/v1/realtime".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            voice: "alloy".to_string(),
            instructions: String::new(),
            temperature: 0.7,
        }
    }

    fn url(&self) -> String {
        format!("{}?model={}", self.endpoint, self.model)
    }

    /// The session.update payload sent immediately after connecting.
    /// Telephony audio is G.711 mu-law in both directions; turn detection
    /// runs server-side so the relay learns about caller speech through
    /// `speech_started` events.
    fn session_update(&self) -> Value {
        json!({
            "type": "session.update",
            "session": {
                "turn_detection": { "type": "server_vad" },
                "input_audio_format": "g711_ulaw",
                "output_audio_format": "g711_ulaw",
                "voice": self.voice,
                "instructions": self.instructions,
                "modalities": ["text", "audio"],
                "temperature": self.temperature,
            }
        })
    }
}

/// Events surfaced to the relay. Anything the relay does not need is
/// swallowed inside the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Session handshake acknowledged
    SessionCreated,
    /// Server VAD detected the caller starting to speak
    SpeechStarted,
    /// Server VAD detected the caller going quiet
    SpeechStopped,
    /// A chunk of assistant audio (base64 mu-law) to relay outbound
    AudioDelta {
        item_id: Option<String>,
        payload: String,
    },
    /// The assistant finished (or aborted) a response
    ResponseDone,
    /// Server-side error; the session usually survives
    Error(String),
    /// The socket closed
    Closed,
}

/// Commands accepted by the session task
#[derive(Debug)]
enum Command {
    AppendAudio(String),
    CancelResponse,
    Close,
}

/// Cloneable command handle for a live session
#[derive(Clone)]
pub struct RealtimeHandle {
    tx: mpsc::Sender<Command>,
}

impl RealtimeHandle {
    /// Forward one inbound media frame (base64 mu-law) to the session.
    pub async fn append_audio(&self, payload: String) -> Result<(), LlmError> {
        self.tx
            .send(Command::AppendAudio(payload))
            .await
            .map_err(|_| LlmError::WebSocket("session task gone".to_string()))
    }

    /// Abort the in-flight response (barge-in).
    pub async fn cancel_response(&self) -> Result<(), LlmError> {
        self.tx
            .send(Command::CancelResponse)
            .await
            .map_err(|_| LlmError::WebSocket("session task gone".to_string()))
    }

    /// Close the session cleanly.
    pub async fn close(&self) {
        let _ = self.tx.send(Command::Close).await;
    }
}

/// A live realtime session
pub struct RealtimeSession;

impl RealtimeSession {
    /// Connect, send the session configuration, and spawn the socket task.
    ///
    /// Returns the command handle and the event receiver. The task exits
    /// when the socket closes or every handle is dropped.
    pub async fn connect(
        config: RealtimeConfig,
    ) -> Result<(RealtimeHandle, mpsc::Receiver<RealtimeEvent>), LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration("API key required".to_string()));
        }

        let mut request = config.url().into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", config.api_key)
                .parse()
                .map_err(|_| LlmError::Configuration("invalid API key header".to_string()))?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse().expect("static header"));

        let (mut ws, _) = connect_async(request).await?;

        // Configure the session before any audio flows.
        let update = config.session_update().to_string();
        ws.send(Message::Text(update)).await?;

        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
        let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(256);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(Command::AppendAudio(payload)) => {
                                let frame = json!({
                                    "type": "input_audio_buffer.append",
                                    "audio": payload,
                                })
                                .to_string();
                                if ws.send(Message::Text(frame)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Command::CancelResponse) => {
                                let cancel = json!({ "type": "response.cancel" }).to_string();
                                if ws.send(Message::Text(cancel)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Command::Close) | None => {
                                let _ = ws.close(None).await;
                                break;
                            }
                        }
                    }
                    msg = ws.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = parse_event(&text) {
                                    if event_tx.send(event).await.is_err() {
                                        // Receiver gone: the call ended.
                                        let _ = ws.close(None).await;
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = ws.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("Realtime socket error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
            let _ = event_tx.send(RealtimeEvent::Closed).await;
            tracing::debug!("Realtime session task ended");
        });

        Ok((RealtimeHandle { tx: cmd_tx }, event_rx))
    }
}

/// Map a raw server event to the relay's vocabulary.
///
/// Unknown event types return `None` and are dropped; a payload that is
/// not JSON at all is also dropped (logged at debug), matching the
/// drop-and-continue policy for malformed control traffic.
fn parse_event(text: &str) -> Option<RealtimeEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Undecodable realtime event dropped: {}", e);
            return None;
        }
    };

    let event_type = value.get("type").and_then(|t| t.as_str())?;
    match event_type {
        "session.created" => Some(RealtimeEvent::SessionCreated),
        "input_audio_buffer.speech_started" => Some(RealtimeEvent::SpeechStarted),
        "input_audio_buffer.speech_stopped" => Some(RealtimeEvent::SpeechStopped),
        "response.audio.delta" => {
            let payload = value.get("delta").and_then(|d| d.as_str())?.to_string();
            let item_id = value
                .get("item_id")
                .and_then(|i| i.as_str())
                .map(String::from);
            Some(RealtimeEvent::AudioDelta { item_id, payload })
        }
        "response.done" => Some(RealtimeEvent::ResponseDone),
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string();
            Some(RealtimeEvent::Error(message))
        }
        other => {
            tracing::trace!(event = other, "Ignoring realtime event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speech_started() {
        let event = parse_event(r#"{"type":"input_audio_buffer.speech_started"}"#);
        assert_eq!(event, Some(RealtimeEvent::SpeechStarted));
    }

    #[test]
    fn test_parse_audio_delta() {
        let event = parse_event(r#"{"type":"response.audio.delta","item_id":"item_1","delta":"AAAA"}"#);
        assert_eq!(
            event,
            Some(RealtimeEvent::AudioDelta {
                item_id: Some("item_1".to_string()),
                payload: "AAAA".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_error_event() {
        let event = parse_event(r#"{"type":"error","error":{"message":"rate limited"}}"#);
        assert_eq!(event, Some(RealtimeEvent::Error("rate limited".to_string())));
    }

    #[test]
    fn test_unknown_and_malformed_events_dropped() {
        assert_eq!(parse_event(r#"{"type":"rate_limits.updated"}"#), None);
        assert_eq!(parse_event("not json at all"), None);
        assert_eq!(parse_event(r#"{"no_type":true}"#), None);
    }

    #[test]
    fn test_session_update_shape() {
        let config = RealtimeConfig {
            instructions: "You are Sofia.".to_string(),
            ..RealtimeConfig::new("sk-test", "gpt-4o-realtime-preview")
        };
        let update = config.session_update();
        assert_eq!(update["type"], "session.update");
        assert_eq!(update["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(update["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(update["session"]["output_audio_format"], "g711_ulaw");
        assert_eq!(update["session"]["instructions"], "You are Sofia.");
    }

    #[test]
    fn test_url_includes_model() {
        let config = RealtimeConfig::new("sk-test", "gpt-4o-realtime-preview");
        assert_eq!(
            config.url(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }
}
