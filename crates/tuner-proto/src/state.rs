use crate::protocol::PlayerState;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, read-mostly copy of the player state.
///
/// The core event loop is the only writer (`publish`); the UI and the HTTP
/// control API read snapshots.
pub struct StateStore {
    state: Arc<RwLock<PlayerState>>,
}

impl StateStore {
    pub fn new(initial: PlayerState) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    /// Replace the stored state.  Returns false (and keeps the stored copy)
    /// when `next` is not newer.
    pub async fn publish(&self, next: PlayerState) -> bool {
        let mut state = self.state.write().await;
        if next.rev <= state.rev {
            return false;
        }
        *state = next;
        true
    }
}
