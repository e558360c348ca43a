//! Live sessions, keyed by user and by chat. Entries are owned by the
//! connection that registered them and removed by it on disconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;
use uuid::Uuid;

use circle_types::RecordId;
use circle_types::events::CloseCode;

/// What a connection's send task writes to the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close(CloseCode),
}

/// Sending half of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SessionHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue an event. Returns `false` if the connection is gone.
    pub fn push<E: Serialize>(&self, event: &E) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.tx.send(Outbound::Text(text)).is_ok(),
            Err(e) => {
                error!("Failed to encode event for {}: {}", self.conn_id, e);
                false
            }
        }
    }

    /// Ask the send task to close the socket with `code`.
    pub fn close(&self, code: CloseCode) -> bool {
        self.tx.send(Outbound::Close(code)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("already logged in")]
pub struct AlreadyRegistered;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps stay consistent across a panicking holder: every critical
    // section is a single insert or remove.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// `user_id -> session` for the user channel.
#[derive(Default)]
pub struct UserGroup {
    sessions: Mutex<HashMap<RecordId, SessionHandle>>,
}

impl UserGroup {
    /// Register a session. A live session for the same user wins; one whose
    /// connection already dropped is replaced.
    pub fn add(&self, user_id: &str, handle: SessionHandle) -> Result<(), AlreadyRegistered> {
        let mut sessions = lock(&self.sessions);
        if sessions.get(user_id).is_some_and(|h| !h.is_closed()) {
            return Err(AlreadyRegistered);
        }
        sessions.insert(user_id.to_string(), handle);
        Ok(())
    }

    /// Remove the user's session if it still belongs to `conn_id`.
    pub fn remove(&self, user_id: &str, conn_id: Uuid) -> bool {
        let mut sessions = lock(&self.sessions);
        if sessions.get(user_id).is_some_and(|h| h.conn_id == conn_id) {
            sessions.remove(user_id);
            return true;
        }
        false
    }

    pub fn has(&self, user_id: &str) -> bool {
        lock(&self.sessions).contains_key(user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<SessionHandle> {
        lock(&self.sessions).get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `chat_id -> user_id -> session` for the chat channel.
#[derive(Default)]
pub struct ChatGroup {
    chats: Mutex<HashMap<RecordId, HashMap<RecordId, SessionHandle>>>,
}

impl ChatGroup {
    pub fn add(
        &self,
        chat_id: &str,
        user_id: &str,
        handle: SessionHandle,
    ) -> Result<(), AlreadyRegistered> {
        let mut chats = lock(&self.chats);
        let members = chats.entry(chat_id.to_string()).or_default();
        if members.get(user_id).is_some_and(|h| !h.is_closed()) {
            return Err(AlreadyRegistered);
        }
        members.insert(user_id.to_string(), handle);
        Ok(())
    }

    /// Remove one member's session if it still belongs to `conn_id`. The chat
    /// entry goes with its last member.
    pub fn remove(&self, chat_id: &str, user_id: &str, conn_id: Uuid) -> bool {
        let mut chats = lock(&self.chats);
        let Some(members) = chats.get_mut(chat_id) else {
            return false;
        };
        if !members.get(user_id).is_some_and(|h| h.conn_id == conn_id) {
            return false;
        }
        members.remove(user_id);
        if members.is_empty() {
            chats.remove(chat_id);
        }
        true
    }

    pub fn has(&self, chat_id: &str, user_id: &str) -> bool {
        lock(&self.chats)
            .get(chat_id)
            .is_some_and(|members| members.contains_key(user_id))
    }

    pub fn get(&self, chat_id: &str, user_id: &str) -> Option<SessionHandle> {
        lock(&self.chats)
            .get(chat_id)
            .and_then(|members| members.get(user_id))
            .cloned()
    }

    /// Every session currently bound to `chat_id`.
    pub fn members(&self, chat_id: &str) -> Vec<SessionHandle> {
        lock(&self.chats)
            .get(chat_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of chats with at least one live member.
    pub fn len(&self) -> usize {
        lock(&self.chats).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Both groupings behind one cheap-to-clone handle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    users: UserGroup,
    chats: ChatGroup,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &UserGroup {
        &self.inner.users
    }

    pub fn chats(&self) -> &ChatGroup {
        &self.inner.chats
    }
}
