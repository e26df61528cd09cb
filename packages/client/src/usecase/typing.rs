//! Outbound typing debounce.
//!
//! One burst per conversation: the first keystroke emits `typing:start`, every
//! keystroke re-arms the idle timer, and the burst ends with exactly one
//! `typing:stop` (idle timeout, `force_stop`, or switching conversation).

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    domain::{ConversationId, Signal, User},
    usecase::connection::ConnectionManager,
};

struct Burst {
    conversation_id: ConversationId,
    generation: u64,
    idle: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    burst: Option<Burst>,
    next_generation: u64,
}

#[derive(Clone)]
pub struct TypingDebouncer {
    connection: ConnectionManager,
    current_user: Signal<Option<User>>,
    idle: Duration,
    state: Arc<Mutex<DebounceState>>,
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TypingDebouncer {
    pub fn new(
        connection: ConnectionManager,
        current_user: Signal<Option<User>>,
        idle: Duration,
    ) -> Self {
        Self {
            connection,
            current_user,
            idle,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// A keystroke in the composer of `conversation_id`.
    pub fn on_input(&self, conversation_id: &ConversationId) {
        let mut state = lock(&self.state);

        let continuing = match state.burst.take() {
            Some(burst) if &burst.conversation_id == conversation_id => {
                burst.idle.abort();
                true
            }
            Some(burst) => {
                burst.idle.abort();
                self.connection.stop_typing(burst.conversation_id);
                false
            }
            None => false,
        };

        if !continuing {
            let username = self
                .current_user
                .with(|me| me.as_ref().map(|me| me.username.clone()))
                .unwrap_or_default();
            self.connection
                .start_typing(conversation_id.clone(), username);
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let idle = self.spawn_idle(conversation_id.clone(), generation);
        state.burst = Some(Burst {
            conversation_id: conversation_id.clone(),
            generation,
            idle,
        });
    }

    fn spawn_idle(&self, conversation_id: ConversationId, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(&self.state);
        let connection = self.connection.clone();
        let idle = self.idle;
        tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let mut state = lock(&shared);
            if state
                .burst
                .as_ref()
                .is_some_and(|burst| burst.generation == generation)
            {
                state.burst = None;
                tracing::trace!("Typing idle in '{}'", conversation_id);
                connection.stop_typing(conversation_id);
            }
        })
    }

    /// End the current burst now (message sent, chat view left).
    pub fn force_stop(&self) {
        if let Some(burst) = lock(&self.state).burst.take() {
            burst.idle.abort();
            self.connection.stop_typing(burst.conversation_id);
        }
    }

    pub fn is_typing(&self) -> bool {
        lock(&self.state).burst.is_some()
    }
}
