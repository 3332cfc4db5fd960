//! WebSocket emulation over long polling.
//!
//! A client that can not upgrade opens a session with `?socket=poll&command=open` and then
//! talks to it with `command=send` (one base64 message in `messages`), `command=poll`
//! (fetch queued outgoing messages) and `command=close`, each carrying the session `id`.
//! Sessions live in a [`SessionStore`] owned by the server.

use crate::protocol::{ParseError, RequestHead};
use base64::prelude::*;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout};
use tracing::{debug, info};

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<PollSession>>>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore").field("len", &self.len()).finish()
    }
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a session under a fresh random id.
    pub fn open(self: &Arc<Self>, keep_alive: Duration) -> Arc<PollSession> {
        let mut sessions = self.swept();
        let id = loop {
            let id = format!("{:032x}", rand::random::<u128>());
            if !sessions.contains_key(&id) {
                break id;
            }
        };
        let session = Arc::new(PollSession {
            id: id.clone(),
            keep_alive,
            state: Mutex::new(PollState {
                last_seen: Instant::now(),
                closed: false,
                inbox: VecDeque::new(),
                outbox: VecDeque::new(),
            }),
            notify: Notify::new(),
            store: Arc::downgrade(self),
        });
        sessions.insert(id, Arc::clone(&session));
        info!(id = %session.id, sessions = sessions.len(), "opened poll session");
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<PollSession>> {
        self.swept().get(id).cloned()
    }

    /// The live session a `poll`, `send` or `close` request is addressed to.
    pub fn lookup(&self, request: &RequestHead) -> Option<Arc<PollSession>> {
        if request.query("socket") != Some("poll") {
            return None;
        }
        if !matches!(request.query("command"), Some("poll" | "send" | "close")) {
            return None;
        }
        self.get(request.query("id")?)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<PollSession>> {
        let removed = self.sessions.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
        if removed.is_some() {
            debug!(id, "removed poll session");
        }
        removed
    }

    /// Number of live sessions, after dropping the expired ones.
    pub fn len(&self) -> usize {
        self.swept().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues `text` for every live session.
    pub fn broadcast(&self, text: &str) {
        let sessions: Vec<_> = self.swept().values().cloned().collect();
        for session in &sessions {
            session.send(text);
        }
    }

    /// Locks the map after removing every closed or idle session.
    fn swept(&self) -> MutexGuard<'_, HashMap<String, Arc<PollSession>>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|id, session| {
            let expired = session.expire_if_idle();
            if expired {
                debug!(id = %id, "swept poll session");
            }
            !expired
        });
        sessions
    }
}

struct PollState {
    last_seen: Instant,
    closed: bool,
    inbox: VecDeque<String>,
    outbox: VecDeque<String>,
}

/// One emulated socket. Text only.
pub struct PollSession {
    id: String,
    keep_alive: Duration,
    state: Mutex<PollState>,
    notify: Notify,
    store: Weak<SessionStore>,
}

impl fmt::Debug for PollSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSession").field("id", &self.id).field("keep_alive", &self.keep_alive).finish_non_exhaustive()
    }
}

impl PollSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Body of the answer to the opening request.
    pub fn open_response(&self) -> Value {
        json!({"status": "open", "id": self.id, "keepAliveInterval": self.keep_alive.as_secs_f64()})
    }

    /// Waits for the next message from the client.
    ///
    /// Returns `None` once the session is closed, or when the client has not polled for two
    /// keep-alive intervals; either way the session leaves the store.
    pub async fn receive(&self) -> Option<String> {
        loop {
            {
                let mut state = self.lock();
                if let Some(message) = state.inbox.pop_front() {
                    return Some(message);
                }
                if !state.closed && state.last_seen.elapsed() >= self.keep_alive * 2 {
                    info!(id = %self.id, "poll session expired");
                    state.closed = true;
                }
                if state.closed {
                    drop(state);
                    self.detach();
                    return None;
                }
            }
            // a timeout only means it is time to look at the expiry again
            let _ = timeout(self.keep_alive, self.notify.notified()).await;
        }
    }

    /// Queues a message for the next `poll`.
    pub fn send(&self, text: &str) {
        self.lock().outbox.push_back(text.to_string());
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
        self.detach();
    }

    /// Answers one `send`, `poll` or `close` request.
    pub fn process(&self, request: &RequestHead) -> Result<Value, ParseError> {
        match request.query("command") {
            Some("send") => {
                if let Some(encoded) = request.query("messages") {
                    let decoded = BASE64_STANDARD
                        .decode(encoded)
                        .map_err(|e| ParseError::protocol_violation(format!("invalid base64 message: {e}")))?;
                    let message = String::from_utf8(decoded)
                        .map_err(|e| ParseError::protocol_violation(format!("message is not utf-8: {e}")))?;
                    self.lock().inbox.push_back(message);
                    self.notify.notify_one();
                }
                Ok(json!({"status": "open"}))
            }
            Some("poll") => {
                let messages: Vec<String> = {
                    let mut state = self.lock();
                    state.last_seen = Instant::now();
                    state.outbox.drain(..).map(|m| BASE64_STANDARD.encode(m)).collect()
                };
                Ok(json!({"status": "open", "messages": messages}))
            }
            Some("close") => {
                self.close();
                Ok(json!({"status": "closed"}))
            }
            other => Err(ParseError::protocol_violation(format!("unknown poll command {other:?}"))),
        }
    }

    /// Closes the session once the client has not polled for two keep-alive intervals.
    /// Returns whether it is closed.
    fn expire_if_idle(&self) -> bool {
        let mut state = self.lock();
        if !state.closed && state.last_seen.elapsed() >= self.keep_alive * 2 {
            info!(id = %self.id, "poll session expired");
            state.closed = true;
            drop(state);
            self.notify.notify_one();
            return true;
        }
        state.closed
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self) {
        if let Some(store) = self.store.upgrade() {
            store.remove(&self.id);
        }
    }
}
