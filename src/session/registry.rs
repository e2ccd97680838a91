use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::study::{SessionError, StudySession};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);

pub type SharedSession = Arc<Mutex<StudySession>>;

/// Live study sessions, keyed by id. Nothing here is persisted.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, (String, SharedSession)>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub async fn insert(&self, session: StudySession) -> SharedSession {
        let id = session.id();
        let owner = session.user_id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, (owner, shared.clone()));
        shared
    }

    /// Sessions of other users are reported as missing.
    pub async fn get(&self, id: Uuid, user_id: &str) -> Result<SharedSession, SessionError> {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some((owner, session)) if owner == user_id => Ok(session.clone()),
            _ => Err(SessionError::NotFound(id)),
        }
    }

    pub async fn remove(&self, id: Uuid, user_id: &str) -> Result<SharedSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&id) {
            Some((owner, _)) if owner == user_id => {}
            _ => return Err(SessionError::NotFound(id)),
        }
        sessions
            .remove(&id)
            .map(|(_, session)| session)
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for longer than the TTL, finished or not.
    /// Sessions busy with a call are kept.
    pub async fn sweep_idle(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.idle_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, (_, session)| match session.try_lock() {
            Ok(guard) => {
                let keep = guard.last_activity() > cutoff;
                if !keep {
                    debug!(session_id = %id, phase = guard.phase().as_str(), "dropping idle session");
                }
                keep
            }
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "idle study sessions swept");
        }
        removed
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep_idle().await;
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL)
    }
}
