//! Completion barrier across dialogue views
//!
//! A broadcast hands every view a [`CompletionToken`]. When the last
//! outstanding token completes, the broadcast's continuation runs once.
//! Each broadcast bumps a generation counter, so tokens left over from a
//! superseded broadcast complete into nothing.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Work to run once every view has completed
pub type Continuation = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct BarrierState {
    generation: u64,
    pending: BTreeSet<usize>,
    on_all_complete: Option<Continuation>,
}

/// Tracks which views still owe a completion for the current broadcast
#[derive(Clone, Default)]
pub struct CompletionBarrier {
    state: Arc<Mutex<BarrierState>>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a broadcast over `consumers`.
    ///
    /// Every present consumer is marked pending before the first one is
    /// invoked, so a consumer that completes inside `operation` cannot end
    /// the broadcast early. `None` slots are skipped. With no present
    /// consumers `on_all_complete` runs before this returns.
    pub fn broadcast<C, F>(
        &self,
        consumers: &[Option<C>],
        mut operation: F,
        on_all_complete: Continuation,
    ) where
        F: FnMut(&C, CompletionToken),
    {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.pending = consumers
                .iter()
                .enumerate()
                .filter_map(|(index, consumer)| consumer.as_ref().map(|_| index))
                .collect();

            if state.pending.is_empty() {
                state.on_all_complete = None;
                drop(state);
                log::trace!("barrier: broadcast with no consumers completes immediately");
                on_all_complete();
                return;
            }

            state.on_all_complete = Some(on_all_complete);
            log::trace!(
                "barrier: generation {} waiting on {} consumer(s)",
                state.generation,
                state.pending.len()
            );
            state.generation
        };

        for (index, consumer) in consumers.iter().enumerate() {
            let Some(consumer) = consumer else {
                continue;
            };
            // A consumer may have started a newer broadcast from inside its
            // own callback; the rest of this one is then obsolete.
            if self.generation() != generation {
                log::debug!("barrier: generation {generation} superseded while broadcasting");
                break;
            }
            let token = CompletionToken {
                state: Arc::downgrade(&self.state),
                generation,
                consumer: index,
            };
            operation(consumer, token);
        }
    }

    /// Drop the current broadcast without running its continuation
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        if !state.pending.is_empty() {
            log::debug!(
                "barrier: cancelling generation {} with {} consumer(s) outstanding",
                state.generation,
                state.pending.len()
            );
        }
        state.generation += 1;
        state.pending.clear();
        state.on_all_complete = None;
    }

    /// Number of consumers still owing a completion
    pub fn pending(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    fn generation(&self) -> u64 {
        lock(&self.state).generation
    }
}

/// Completion signal owed by one consumer for one broadcast.
///
/// `complete` consumes the token, so a consumer can only report once.
#[must_use = "the broadcast waits until every token is completed"]
pub struct CompletionToken {
    state: Weak<Mutex<BarrierState>>,
    generation: u64,
    consumer: usize,
}

impl CompletionToken {
    /// Slot index of the consumer this token was issued to
    pub fn consumer(&self) -> usize {
        self.consumer
    }

    pub fn complete(self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };

        let continuation = {
            let mut state = lock(&state);
            if state.generation != self.generation {
                log::debug!(
                    "barrier: ignoring stale completion from consumer {} \
                     (generation {}, current {})",
                    self.consumer,
                    self.generation,
                    state.generation
                );
                return;
            }
            if !state.pending.remove(&self.consumer) {
                return;
            }
            log::trace!(
                "barrier: consumer {} complete, {} remaining",
                self.consumer,
                state.pending.len()
            );
            if state.pending.is_empty() {
                state.on_all_complete.take()
            } else {
                None
            }
        };

        if let Some(continuation) = continuation {
            continuation();
        }
    }
}

impl std::fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionToken")
            .field("generation", &self.generation)
            .field("consumer", &self.consumer)
            .finish()
    }
}

fn lock(state: &Mutex<BarrierState>) -> MutexGuard<'_, BarrierState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
