use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use garcon_core::domain::message::ChannelId;
use garcon_core::domain::session::Session;
use garcon_core::flows::Stage;
use tokio::sync::Mutex as SessionLock;

pub type SharedSession = Arc<SessionLock<Session>>;

/// One conversation per channel, created lazily in `uninitiated`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ChannelId, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, channel: &ChannelId, self_id: &str) -> SharedSession {
        let mut sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .entry(channel.clone())
            .or_insert_with(|| Arc::new(SessionLock::new(Session::new(self_id))))
            .clone()
    }

    /// Replaces whatever conversation the channel had.
    pub fn insert(&self, channel: ChannelId, session: Session) {
        let mut sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.insert(channel, Arc::new(SessionLock::new(session)));
    }

    pub fn get(&self, channel: &ChannelId) -> Option<SharedSession> {
        let sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.get(channel).cloned()
    }

    pub async fn snapshot(&self, channel: &ChannelId) -> Option<Session> {
        let session = self.get(channel)?;
        let guard = session.lock().await;
        Some(guard.clone())
    }

    /// Channels with a conversation past `uninitiated`.
    pub async fn active_count(&self) -> usize {
        let sessions = self.all();
        let mut active = 0;
        for session in sessions {
            if session.lock().await.stage != Stage::Uninitiated {
                active += 1;
            }
        }
        active
    }

    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(sessions) => sessions.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> Vec<SharedSession> {
        match self.sessions.lock() {
            Ok(sessions) => sessions.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }
}
