//! Keyed one-shot timers.
//!
//! Scheduling a key that already has a pending timer cancels the old one
//! (cancel-and-reschedule). `clear()` cancels everything and bumps an epoch so
//! a timer task that already woke up can never fire into cleared state.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

struct TimerState<K> {
    epoch: u64,
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

pub struct TimerSet<K> {
    state: Arc<Mutex<TimerState<K>>>,
}

impl<K> Clone for TimerSet<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K> Default for TimerSet<K> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState {
                epoch: 0,
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }
}

fn lock<K>(state: &Mutex<TimerState<K>>) -> MutexGuard<'_, TimerState<K>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K> TimerSet<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` after `delay` unless the key is rescheduled, cancelled,
    /// or the set is cleared first.
    ///
    /// `on_fire` runs with the set locked and must not call back into it.
    pub fn schedule<F>(&self, key: K, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        if let Some(previous) = state.pending.remove(&key) {
            previous.task.abort();
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let epoch = state.epoch;

        let shared = Arc::clone(&self.state);
        let fire_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = lock(&shared);
            let current = state.epoch == epoch
                && state
                    .pending
                    .get(&fire_key)
                    .is_some_and(|p| p.generation == generation);
            if current {
                state.pending.remove(&fire_key);
                on_fire();
            }
        });

        state.pending.insert(key, Pending { generation, task });
    }

    /// Cancel the pending timer for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.state).pending.remove(key) {
            Some(pending) => {
                pending.task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.epoch += 1;
        for (_, pending) in state.pending.drain() {
            pending.task.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.state).pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
