use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as TokioMutex, RwLock};
use uuid::Uuid;

/// A conversation session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Source channel + chat/user ID.
    pub channel: Option<String>,
    pub target: Option<String>,
    pub active: bool,
    pub message_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: None,
            target: None,
            active: true,
            message_count: 0,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_channel(mut self, channel: &str, target: &str) -> Self {
        self.channel = Some(channel.to_string());
        self.target = Some(target.to_string());
        self
    }
}

/// Manages all active sessions.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    /// Per-session run locks — prevents concurrent agent runs on the same session.
    run_locks: Arc<RwLock<HashMap<Uuid, Arc<TokioMutex<()>>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Increment message count for a session.
    pub async fn record_message(&self, id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.message_count += 1;
        }
    }

    /// Find a session for a given channel + target, or create one.
    pub async fn find_or_create(&self, channel: &str, target: &str) -> Uuid {
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.channel.as_deref() == Some(channel)
                    && session.target.as_deref() == Some(target)
                    && session.active
                {
                    return *id;
                }
            }
        }
        let session = Session::new().with_channel(channel, target);
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    pub async fn close(&self, id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.active = false;
        }
    }

    /// Get the per-session run lock. Callers hold the guard for the
    /// duration of their agent run to serialize runs on one session.
    pub async fn run_lock(&self, session_id: Uuid) -> Arc<TokioMutex<()>> {
        {
            let locks = self.run_locks.read().await;
            if let Some(lock) = locks.get(&session_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.run_locks.write().await;
        Arc::clone(
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_reuses_active_sessions() {
        let mgr = SessionManager::new();
        let a = mgr.find_or_create("telegram", "123").await;
        let b = mgr.find_or_create("telegram", "123").await;
        assert_eq!(a, b);

        let other = mgr.find_or_create("telegram", "456").await;
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn closed_sessions_are_not_reused() {
        let mgr = SessionManager::new();
        let a = mgr.find_or_create("discord", "9").await;
        mgr.close(a).await;
        let b = mgr.find_or_create("discord", "9").await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn run_lock_is_stable_per_session() {
        let mgr = SessionManager::new();
        let id = mgr.create().await;
        let l1 = mgr.run_lock(id).await;
        let l2 = mgr.run_lock(id).await;
        assert!(Arc::ptr_eq(&l1, &l2));
    }
}
