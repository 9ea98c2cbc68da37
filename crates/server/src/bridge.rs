//! Call session bridge state machines
//!
//! `CallState` tracks the outer call lifecycle shared by both transport
//! modes. `Relay` is the streaming-mode sub-state machine: a pure
//! transition function from transport/AI events to `RelayAction`s, kept
//! free of I/O so barge-in ordering is directly testable. The media
//! handler executes the actions against the socket and the realtime
//! session.

use sofia_llm::RealtimeEvent;

/// Outer call lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Session created, greeting not yet sent
    Ringing,
    /// Prompt issued, waiting for caller input
    AwaitingInput,
    /// Input received, turn in progress
    Processing,
    /// Terminal
    Terminated,
}

/// Streaming relay sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// AI speech session handshake in flight
    Connecting,
    /// Frames flowing both directions
    Relaying,
    /// Caller spoke over the AI; outbound relay truncated
    BargeIn,
    /// Transport stop received, tearing down
    Closing,
    /// Terminal
    Terminated,
}

/// Side effects the media handler must perform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Forward caller audio (base64 mu-law) to the AI session
    AppendAudio(String),
    /// Abort the AI's in-flight response
    CancelResponse,
    /// Tell the transport to discard audio it has buffered but not played
    SendClear,
    /// Send an AI audio chunk outbound as a media frame
    SendMedia(String),
    /// Send a playback mark after a completed response
    SendMark(String),
    /// Close the AI session and the socket
    CloseSession,
}

/// Streaming relay state machine.
///
/// Tracks which AI response item is currently being relayed so that a
/// barge-in can drop the remainder of the aborted item while letting the
/// next response through untouched.
pub struct Relay {
    state: StreamState,
    stream_sid: Option<String>,
    /// Item id of the response currently relaying outbound, when the AI
    /// tags its deltas with one
    current_item: Option<String>,
    /// Whether assistant audio has been relayed since the last
    /// `response.done`; deltas are not guaranteed to carry an item id,
    /// so barge-in detection cannot rely on `current_item` alone
    audio_in_flight: bool,
    /// Item id truncated by the last barge-in; its stragglers are dropped
    barged_item: Option<String>,
    marks_sent: u64,
}

impl Relay {
    pub fn new() -> Self {
        Self {
            state: StreamState::Connecting,
            stream_sid: None,
            current_item: None,
            audio_in_flight: false,
            barged_item: None,
            marks_sent: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    /// Transport `start`: the AI session handshake succeeded and frames
    /// may now flow.
    pub fn on_start(&mut self, stream_sid: String) -> Vec<RelayAction> {
        self.stream_sid = Some(stream_sid);
        self.state = StreamState::Relaying;
        Vec::new()
    }

    /// Inbound caller media frame: forwarded immediately, never batched.
    pub fn on_caller_media(&mut self, payload: String) -> Vec<RelayAction> {
        match self.state {
            StreamState::Relaying | StreamState::BargeIn => {
                vec![RelayAction::AppendAudio(payload)]
            }
            _ => Vec::new(),
        }
    }

    /// Transport `stop`: force teardown regardless of sub-state.
    pub fn on_stop(&mut self) -> Vec<RelayAction> {
        self.state = StreamState::Closing;
        let actions = vec![RelayAction::CloseSession];
        self.state = StreamState::Terminated;
        actions
    }

    /// One event from the AI session.
    pub fn on_ai_event(&mut self, event: RealtimeEvent) -> Vec<RelayAction> {
        if matches!(self.state, StreamState::Closing | StreamState::Terminated) {
            return Vec::new();
        }

        match event {
            RealtimeEvent::SpeechStarted => self.on_speech_started(),
            RealtimeEvent::SpeechStopped => Vec::new(),
            RealtimeEvent::AudioDelta { item_id, payload } => {
                self.on_audio_delta(item_id, payload)
            }
            RealtimeEvent::ResponseDone => self.on_response_done(),
            RealtimeEvent::SessionCreated => Vec::new(),
            RealtimeEvent::Error(message) => {
                tracing::warn!(message, "Realtime session error; relay continues");
                Vec::new()
            }
            RealtimeEvent::Closed => {
                self.state = StreamState::Terminated;
                vec![RelayAction::CloseSession]
            }
        }
    }

    /// Caller started speaking. If an AI response is still relaying this
    /// is a barge-in: cancel the response, then clear the transport's
    /// playback buffer, and drop the aborted item's remaining frames.
    fn on_speech_started(&mut self) -> Vec<RelayAction> {
        if self.state == StreamState::Relaying && self.audio_in_flight {
            self.barged_item = self.current_item.take();
            self.audio_in_flight = false;
            self.state = StreamState::BargeIn;
            metrics::counter!("sofia_barge_ins_total").increment(1);
            tracing::debug!(item = ?self.barged_item, "Barge-in, truncating outbound relay");
            return vec![RelayAction::CancelResponse, RelayAction::SendClear];
        }
        Vec::new()
    }

    fn on_audio_delta(&mut self, item_id: Option<String>, payload: String) -> Vec<RelayAction> {
        // Stragglers from an aborted response are dropped, not relayed.
        // An untagged delta during a barge-in belongs to the aborted
        // response; only a delta tagged with a different item id proves
        // the next response has started.
        if self.state == StreamState::BargeIn {
            if item_id.is_none() || item_id == self.barged_item {
                metrics::counter!("sofia_dropped_frames_total").increment(1);
                return Vec::new();
            }
            self.state = StreamState::Relaying;
            self.barged_item = None;
        }

        self.current_item = item_id;
        self.audio_in_flight = true;
        vec![RelayAction::SendMedia(payload)]
    }

    /// Response finished. A `response.done` for the item we truncated is
    /// bookkeeping for the abort, not a playable response; it gets no
    /// mark.
    fn on_response_done(&mut self) -> Vec<RelayAction> {
        if self.state == StreamState::BargeIn {
            self.state = StreamState::Relaying;
            self.barged_item = None;
            return Vec::new();
        }

        self.current_item = None;
        self.audio_in_flight = false;
        self.marks_sent += 1;
        vec![RelayAction::SendMark(format!("response-{}", self.marks_sent))]
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(item: &str, payload: &str) -> RealtimeEvent {
        RealtimeEvent::AudioDelta {
            item_id: Some(item.to_string()),
            payload: payload.to_string(),
        }
    }

    fn untagged_delta(payload: &str) -> RealtimeEvent {
        RealtimeEvent::AudioDelta {
            item_id: None,
            payload: payload.to_string(),
        }
    }

    fn started_relay() -> Relay {
        let mut relay = Relay::new();
        relay.on_start("MZ123".to_string());
        relay
    }

    #[test]
    fn test_start_transitions_to_relaying() {
        let relay = started_relay();
        assert_eq!(relay.state(), StreamState::Relaying);
        assert_eq!(relay.stream_sid(), Some("MZ123"));
    }

    #[test]
    fn test_caller_media_forwards_frame_at_a_time() {
        let mut relay = started_relay();
        let actions = relay.on_caller_media("AAAA".to_string());
        assert_eq!(actions, vec![RelayAction::AppendAudio("AAAA".to_string())]);
    }

    #[test]
    fn test_ai_audio_relayed_outbound() {
        let mut relay = started_relay();
        let actions = relay.on_ai_event(delta("item_1", "BBBB"));
        assert_eq!(actions, vec![RelayAction::SendMedia("BBBB".to_string())]);
    }

    #[test]
    fn test_barge_in_cancels_then_clears() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));

        let actions = relay.on_ai_event(RealtimeEvent::SpeechStarted);
        assert_eq!(
            actions,
            vec![RelayAction::CancelResponse, RelayAction::SendClear]
        );
        assert_eq!(relay.state(), StreamState::BargeIn);
    }

    #[test]
    fn test_barge_in_drops_stragglers_of_aborted_item() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));
        relay.on_ai_event(RealtimeEvent::SpeechStarted);

        // frames from the aborted item are not sent
        assert!(relay.on_ai_event(delta("item_1", "CCCC")).is_empty());

        // the next response relays normally
        let actions = relay.on_ai_event(delta("item_2", "DDDD"));
        assert_eq!(actions, vec![RelayAction::SendMedia("DDDD".to_string())]);
        assert_eq!(relay.state(), StreamState::Relaying);
    }

    #[test]
    fn test_aborted_response_done_gets_no_mark() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));
        relay.on_ai_event(RealtimeEvent::SpeechStarted);

        assert!(relay.on_ai_event(RealtimeEvent::ResponseDone).is_empty());
        assert_eq!(relay.state(), StreamState::Relaying);

        // a completed response afterwards does get its mark
        relay.on_ai_event(delta("item_2", "DDDD"));
        let actions = relay.on_ai_event(RealtimeEvent::ResponseDone);
        assert_eq!(actions, vec![RelayAction::SendMark("response-1".to_string())]);
    }

    #[test]
    fn test_barge_in_over_untagged_audio_still_cancels() {
        let mut relay = started_relay();
        relay.on_ai_event(untagged_delta("BBBB"));

        let actions = relay.on_ai_event(RealtimeEvent::SpeechStarted);
        assert_eq!(
            actions,
            vec![RelayAction::CancelResponse, RelayAction::SendClear]
        );
        assert_eq!(relay.state(), StreamState::BargeIn);
    }

    #[test]
    fn test_untagged_straggler_belongs_to_aborted_response() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));
        relay.on_ai_event(RealtimeEvent::SpeechStarted);

        // an untagged frame during the barge-in is dropped, not a resume
        assert!(relay.on_ai_event(untagged_delta("CCCC")).is_empty());
        assert_eq!(relay.state(), StreamState::BargeIn);

        // only a frame tagged with a new item resumes the relay
        let actions = relay.on_ai_event(delta("item_2", "DDDD"));
        assert_eq!(actions, vec![RelayAction::SendMedia("DDDD".to_string())]);
        assert_eq!(relay.state(), StreamState::Relaying);
    }

    #[test]
    fn test_no_barge_in_after_response_done() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));
        relay.on_ai_event(RealtimeEvent::ResponseDone);

        // nothing is in flight anymore, so speech is an ordinary turn
        assert!(relay.on_ai_event(RealtimeEvent::SpeechStarted).is_empty());
        assert_eq!(relay.state(), StreamState::Relaying);
    }

    #[test]
    fn test_speech_start_while_idle_is_not_barge_in() {
        let mut relay = started_relay();
        assert!(relay.on_ai_event(RealtimeEvent::SpeechStarted).is_empty());
        assert_eq!(relay.state(), StreamState::Relaying);
    }

    #[test]
    fn test_stop_forces_teardown_from_any_state() {
        let mut relay = started_relay();
        relay.on_ai_event(delta("item_1", "BBBB"));
        relay.on_ai_event(RealtimeEvent::SpeechStarted);

        let actions = relay.on_stop();
        assert_eq!(actions, vec![RelayAction::CloseSession]);
        assert_eq!(relay.state(), StreamState::Terminated);

        // nothing flows after termination
        assert!(relay.on_caller_media("AAAA".to_string()).is_empty());
        assert!(relay.on_ai_event(delta("item_2", "DDDD")).is_empty());
    }
}
