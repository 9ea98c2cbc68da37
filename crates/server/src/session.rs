//! Call session management
//!
//! One `CallSession` per active caller, keyed by phone number. Sessions
//! are created on the first webhook for a caller and removed on hangup;
//! a background cleanup task reaps sessions whose transport disconnected
//! without a clean stop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};

use sofia_core::ConversationHistory;

use crate::bridge::CallState;
use crate::ServerError;

/// State for one active call
pub struct CallSession {
    /// Caller phone number (E.164)
    pub caller: String,
    /// Conversation transcript, appended to by the turn engine
    pub history: Mutex<ConversationHistory>,
    /// Call state machine position
    state: RwLock<CallState>,
    /// Creation time
    pub created_at: Instant,
    /// Last activity, for idle garbage collection
    last_activity: RwLock<Instant>,
}

impl CallSession {
    /// Create a session in `Ringing` with the persona system message
    /// already seeded into the history.
    pub fn new(caller: impl Into<String>, system_message: &str) -> Self {
        Self {
            caller: caller.into(),
            history: Mutex::new(ConversationHistory::with_system(system_message)),
            state: RwLock::new(CallState::Ringing),
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    pub fn state(&self) -> CallState {
        *self.state.read()
    }

    pub fn set_state(&self, state: CallState) {
        let previous = {
            let mut guard = self.state.write();
            std::mem::replace(&mut *guard, state)
        };
        if previous != state {
            tracing::debug!(caller = %self.caller, ?previous, ?state, "Call state transition");
        }
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Whether the session has been idle longer than `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }
}

/// Registry of active call sessions
pub struct CallRegistry {
    sessions: RwLock<HashMap<String, Arc<CallSession>>>,
    max_sessions: usize,
    idle_timeout: Duration,
    cleanup_interval: Duration,
}

impl CallRegistry {
    pub fn new(max_sessions: usize, idle_timeout: Duration, cleanup_interval: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            idle_timeout,
            cleanup_interval,
        }
    }

    /// Fetch the caller's session, creating it in `Ringing` if absent.
    /// Fails when the registry is at capacity even after reaping idle
    /// sessions.
    pub fn get_or_create(
        &self,
        caller: &str,
        system_message: &str,
    ) -> Result<Arc<CallSession>, ServerError> {
        let mut sessions = self.sessions.write();

        if let Some(session) = sessions.get(caller) {
            session.touch();
            return Ok(Arc::clone(session));
        }

        if sessions.len() >= self.max_sessions {
            self.cleanup_expired_internal(&mut sessions);
            if sessions.len() >= self.max_sessions {
                return Err(ServerError::Session("Max sessions reached".to_string()));
            }
        }

        let session = Arc::new(CallSession::new(caller, system_message));
        sessions.insert(caller.to_string(), Arc::clone(&session));
        tracing::info!(caller, active = sessions.len(), "Created call session");
        Ok(session)
    }

    /// Get a session by caller
    pub fn get(&self, caller: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().get(caller).cloned()
    }

    /// Remove a session (clean hangup or transport disconnect)
    pub fn remove(&self, caller: &str) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.remove(caller) {
            session.set_state(CallState::Terminated);
            tracing::info!(caller, active = sessions.len(), "Removed call session");
        }
    }

    /// Active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Reap sessions idle past the timeout
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<CallSession>>) {
        let timeout = self.idle_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(timeout))
            .map(|(caller, _)| caller.clone())
            .collect();

        for caller in expired {
            if let Some(session) = sessions.remove(&caller) {
                session.set_state(CallState::Terminated);
                tracing::info!(caller, "Expired call session");
            }
        }
    }

    /// Start the periodic cleanup task. Returns a shutdown sender; send
    /// `true` to stop the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = registry.cleanup_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let before = registry.count();
                        registry.cleanup_expired();
                        let after = registry.count();
                        if before != after {
                            tracing::info!(
                                removed = before - after,
                                remaining = after,
                                "Session cleanup"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
