use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::extraction::{IdentityFields, VehicleFields};
use crate::states::DialogState;

/// Telegram user identifier. One active session per user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-user record of an in-progress dialog. Exists only while the dialog is
/// active; discarded at the terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub state: DialogState,
    pub identity_document: Option<PathBuf>,
    pub vehicle_document: Option<PathBuf>,
    pub identity: Option<IdentityFields>,
    pub vehicle: Option<VehicleFields>,
}

impl Session {
    pub fn new(state: DialogState) -> Self {
        Self {
            state,
            identity_document: None,
            vehicle_document: None,
            identity: None,
            vehicle: None,
        }
    }
}

/// Session storage seam. The dialog engine only ever sees this interface, so
/// the in-memory map can later be swapped for a distributed cache without
/// touching the dialog logic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: UserId) -> Option<Session>;
    async fn put(&self, user: UserId, session: Session);
    async fn remove(&self, user: UserId);
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user: UserId) -> Option<Session> {
        self.sessions.lock().await.get(&user).cloned()
    }

    async fn put(&self, user: UserId, session: Session) {
        self.sessions.lock().await.insert(user, session);
    }

    async fn remove(&self, user: UserId) {
        self.sessions.lock().await.remove(&user);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{InMemorySessionStore, Session, SessionStore, UserId};
    use crate::states::DialogState;

    #[tokio::test]
    async fn put_overwrites_an_existing_session() {
        let store = InMemorySessionStore::new();
        let user = UserId(42);

        let mut first = Session::new(DialogState::CarDoc);
        first.identity_document = Some(PathBuf::from("temp/42_identity.jpg"));
        store.put(user, first).await;

        store.put(user, Session::new(DialogState::Passport)).await;
        let current = store.get(user).await.expect("session present");
        assert_eq!(current.state, DialogState::Passport);
        assert!(current.identity_document.is_none());
    }

    #[tokio::test]
    async fn remove_discards_the_session() {
        let store = InMemorySessionStore::new();
        let user = UserId(7);
        store.put(user, Session::new(DialogState::PriceConfirm)).await;
        store.remove(user).await;
        assert!(store.get(user).await.is_none());
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = InMemorySessionStore::new();
        store.put(UserId(1), Session::new(DialogState::Confirmation)).await;
        assert!(store.get(UserId(2)).await.is_none());
    }
}
