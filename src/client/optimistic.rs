//! Optimistic Mutation Controller
//!
//! Applies a boolean toggle to the UI before the server answers, then either
//! keeps it, rolls it back, or reconciles it to what the server says.
//!
//! # States per key
//!
//! ```text
//! Idle ──toggle──▶ Pending ──┬─ delta matches ─────────▶ Settled
//!                            ├─ delta differs ─────────▶ Reconciled
//!                            └─ error / timeout / 401 ─▶ RolledBack
//! ```
//!
//! A second toggle for a key that is still `Pending` is dropped. The pending
//! mark is held by a guard, so it is cleared on every exit path, including a
//! panic in a callback or the caller dropping the future.

use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::api::MutationError;
use crate::client::config::Config;
use crate::shared::config::DEFAULT_MUTATION_TIMEOUT;

/// Authoritative answer to a toggle
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement<D> {
    /// Change the server actually applied: `+1`, `-1`, or `0` for a no-op
    pub delta: i64,
    /// State after the mutation
    pub is_on: bool,
    pub detail: D,
}

/// How a toggle ended
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome<D> {
    /// Another toggle for the key was still pending
    Dropped,
    /// The server applied exactly the optimistic change
    Settled(Settlement<D>),
    /// The server disagreed; the view was rolled back and then reconciled
    Reconciled(Settlement<D>),
    /// The viewer is not signed in; the view was rolled back
    LoginRequired,
    /// The mutation failed; the view was rolled back
    RolledBack(MutationError),
}

impl<D> ToggleOutcome<D> {
    pub fn settlement(&self) -> Option<&Settlement<D>> {
        match self {
            Self::Settled(settlement) | Self::Reconciled(settlement) => Some(settlement),
            _ => None,
        }
    }
}

/// The server side of a toggle
pub trait ToggleMutation: Send + Sync {
    type Key: Clone + Eq + Hash + Debug + Send + Sync;
    type Detail: Send;

    /// Turn the thing identified by `key` on or off
    fn apply(
        &self,
        key: &Self::Key,
        turn_on: bool,
    ) -> impl Future<Output = Result<Settlement<Self::Detail>, MutationError>> + Send;

    /// Tell other sessions about an authoritative outcome
    fn announce(&self, _key: &Self::Key, _settlement: &Settlement<Self::Detail>) {}
}

/// View-side hooks run by the controller
pub trait ToggleCallbacks<D>: Send + Sync {
    /// Runs synchronously before the request is issued
    fn on_optimistic(&self, assumed_on: bool, assumed_delta: i64);

    /// Undo exactly what `on_optimistic` did
    fn on_rollback(&self);

    /// Apply the server's answer after a rollback
    fn on_reconcile(&self, settlement: &Settlement<D>);

    /// The optimistic change was right; `settlement` may still carry fresher detail
    fn on_settled(&self, _settlement: &Settlement<D>) {}
}

/// Per-key in-flight tracking for toggles
#[derive(Debug, Clone)]
pub struct OptimisticController<K> {
    pending: Arc<Mutex<HashSet<K>>>,
    timeout: Duration,
}

impl<K> Default for OptimisticController<K> {
    fn default() -> Self {
        Self::new(DEFAULT_MUTATION_TIMEOUT)
    }
}

struct PendingGuard<K: Eq + Hash> {
    pending: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for PendingGuard<K> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

impl<K> OptimisticController<K> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashSet::new())),
            timeout,
        }
    }

    /// Controller using the configured mutation timeout
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mutation_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<K: Clone + Eq + Hash + Debug + Send + Sync> OptimisticController<K> {
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn begin(&self, key: &K) -> Option<PendingGuard<K>> {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone());
        inserted.then(|| PendingGuard {
            pending: self.pending.clone(),
            key: key.clone(),
        })
    }

    /// Flip `key` away from `current_guess`
    pub async fn toggle<M, C>(
        &self,
        mutation: &M,
        key: K,
        current_guess: bool,
        callbacks: &C,
    ) -> ToggleOutcome<M::Detail>
    where
        M: ToggleMutation<Key = K>,
        C: ToggleCallbacks<M::Detail> + ?Sized,
    {
        let Some(_guard) = self.begin(&key) else {
            tracing::debug!("[Optimistic] {:?} already pending, dropping toggle", key);
            return ToggleOutcome::Dropped;
        };

        let turn_on = !current_guess;
        let assumed_delta = if turn_on { 1 } else { -1 };
        callbacks.on_optimistic(turn_on, assumed_delta);

        let result = match tokio::time::timeout(self.timeout, mutation.apply(&key, turn_on)).await {
            Ok(result) => result,
            Err(_) => Err(MutationError::Transient(format!(
                "no response within {:?}",
                self.timeout
            ))),
        };

        match result {
            Ok(settlement) => {
                let outcome = if settlement.delta == assumed_delta {
                    callbacks.on_settled(&settlement);
                    ToggleOutcome::Settled(settlement)
                } else {
                    tracing::info!(
                        "[Optimistic] {:?} reconciled: assumed {} got {}",
                        key,
                        assumed_delta,
                        settlement.delta
                    );
                    callbacks.on_rollback();
                    callbacks.on_reconcile(&settlement);
                    ToggleOutcome::Reconciled(settlement)
                };
                if let Some(settlement) = outcome.settlement() {
                    mutation.announce(&key, settlement);
                }
                outcome
            }
            Err(MutationError::Unauthenticated) => {
                callbacks.on_rollback();
                ToggleOutcome::LoginRequired
            }
            Err(error) => {
                tracing::warn!("[Optimistic] {:?} rolled back: {}", key, error);
                callbacks.on_rollback();
                ToggleOutcome::RolledBack(error)
            }
        }
    }
}
