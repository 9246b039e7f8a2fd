//! # Box Office Runtime
//!
//! Runtime implementation for Box Office reducers.
//!
//! This crate provides the [`Store`] that coordinates reducer execution and
//! effect handling for the cart, checkout and order stores.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state, serializes reducer execution, executes effects
//! - **Cancellation registry**: Effects tagged with an [`EffectId`] can be aborted
//!   by a later [`Effect::Cancel`]; timers and confirmation loops rely on this
//! - **Liveness**: After [`Store::shutdown`] the store rejects every action, so a
//!   network call that resolves after teardown can never mutate state
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_runtime::Store;
//!
//! let store = Store::new(CartState::default(), CartReducer, environment);
//!
//! // Send an action
//! store.send(CartAction::Hydrate).await?;
//!
//! // Read state
//! let count = store.state(CartState::count).await;
//! ```

use boxoffice_core::{
    effect::{Effect, EffectId},
    reducer::Reducer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// Returned by `send()` after shutdown was initiated. Feedback actions
        /// from effects that resolve late are dropped with this error.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for an action or for effects to settle
        #[error("Timeout waiting for store")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Guard that decrements the pending effect counter on drop
///
/// Aborted tasks drop their future, so the counter stays correct for
/// cancelled timers as well as completed ones.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type CancellationRegistry = HashMap<EffectId, Vec<AbortHandle>>;

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        AbortHandle, Arc, AtomicBool, AtomicUsize, CancellationRegistry, Duration, Effect,
        EffectId, Mutex, MutexGuard, Ordering, PendingGuard, PoisonError, Reducer, RwLock,
        StoreError,
    };
    use std::future::Future;
    use tokio::sync::broadcast;

    const DEFAULT_BROADCAST_CAPACITY: usize = 64;
    const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; the reducer runs while holding the write lock,
    ///    so actions are applied strictly one at a time)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution, feeding produced actions back into the reducer
    /// 5. Cancellation of tagged effects and teardown
    ///
    /// Cloning a Store yields another handle to the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        cancellations: Arc<Mutex<CancellationRegistry>>,
        /// Every action applied by the reducer is broadcast here after the
        /// state change, which is how consumers subscribe to a store.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Clone + Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new store with a custom action broadcast capacity
        ///
        /// Increase the capacity when subscribers are slow and frequently lag.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                cancellations: Arc::new(Mutex::new(CancellationRegistry::new())),
                action_broadcast,
            }
        }

        /// Whether the store still accepts actions
        #[must_use]
        pub fn is_live(&self) -> bool {
            !self.shutdown.load(Ordering::Acquire)
        }

        /// Number of spawned effects that have not finished yet
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Calls the reducer with (state, action, environment)
        /// 3. Broadcasts the action to subscribers
        /// 4. Starts and registers the returned effects (they run asynchronously)
        /// 5. Releases the write lock
        ///
        /// `send()` returns after the effects were started, not after they finished.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            if !self.is_live() {
                metrics::counter!("store.actions.rejected").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions.total").increment(1);
            let observed = action.clone();

            let mut state = self.state.write().await;

            // Shutdown may have started while we waited for the lock.
            if !self.is_live() {
                metrics::counter!("store.actions.rejected").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            let start = std::time::Instant::now();
            let effects = self
                .reducer
                .reduce(&mut state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            tracing::trace!(effects = effects.len(), "Reducer completed");

            // No subscribers is not an error.
            let _ = self.action_broadcast.send(observed);

            // Effects are registered before the next action can be reduced,
            // so a cancel reduced right after this one finds every handle.
            for effect in effects {
                self.execute_effect(effect, None);
            }
            drop(state);

            Ok(())
        }

        /// Send an action and wait for a matching action
        ///
        /// Subscribes before sending, so an action produced immediately by an
        /// effect cannot be missed.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action before `timeout`
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to every action applied by this store
        ///
        /// The receiver sees each action after the reducer applied it, so
        /// reading state on receipt observes the updated value.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.count()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Wait until no spawned effect is running
        ///
        /// Stores with a running timer never settle; use this for stores whose
        /// effects are one-shot (persistence, fetches).
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if effects are still running after `timeout`.
        pub async fn settle(&self, timeout: Duration) -> Result<(), StoreError> {
            let deadline = tokio::time::Instant::now() + timeout;

            loop {
                if self.pending_effects() == 0 {
                    return Ok(());
                }

                if tokio::time::Instant::now() >= deadline {
                    return Err(StoreError::Timeout);
                }

                tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
            }
        }

        /// Tear the store down
        ///
        /// 1. Sets the shutdown flag (every later `send()` is rejected,
        ///    including feedback from effects still in flight)
        /// 2. Aborts every cancellable effect
        /// 3. Waits for the remaining effects to finish, up to `timeout`
        ///
        /// Calling it more than once is harmless.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout expires.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Shutting down store");
            self.shutdown.store(true, Ordering::Release);

            // Wait out a send that passed the liveness check before the flag
            // was set; its effects are registered once the lock is free.
            drop(self.state.write().await);

            let handles: Vec<AbortHandle> = self
                .cancellations()
                .drain()
                .flat_map(|(_, handles)| handles)
                .collect();
            for handle in &handles {
                handle.abort();
            }
            metrics::counter!("store.effects.cancelled").increment(handles.len() as u64);

            self.settle(timeout).await.map_err(|_| {
                let pending = self.pending_effects();
                tracing::warn!(pending, "Shutdown timed out with effects still running");
                StoreError::ShutdownTimeout(pending)
            })
        }

        /// Execute an effect, registering spawned work under `scope` when set
        fn execute_effect(&self, effect: Effect<A>, scope: Option<EffectId>) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let handle = self.spawn_feedback(fut);
                    self.register(scope, handle);
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let handle = self.spawn_feedback(async move {
                        tokio::time::sleep(duration).await;
                        Some(*action)
                    });
                    self.register(scope, handle);
                },
                Effect::Cancellable { id, effect } => {
                    self.execute_effect(*effect, Some(id));
                },
                Effect::Cancel(id) => {
                    self.cancel(id);
                },
            }
        }

        /// Spawn a task whose output (if any) is fed back into the store
        fn spawn_feedback<F>(&self, fut: F) -> AbortHandle
        where
            F: Future<Output = Option<A>> + Send + 'static,
        {
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = PendingGuard(Arc::clone(&self.pending_effects));
            let store = self.clone();

            tokio::spawn(async move {
                let _pending_guard = pending_guard;

                if let Some(action) = fut.await {
                    if let Err(error) = store.send(action).await {
                        tracing::debug!(%error, "Dropped feedback action");
                    }
                }
            })
            .abort_handle()
        }

        fn register(&self, scope: Option<EffectId>, handle: AbortHandle) {
            let Some(id) = scope else {
                return;
            };

            let mut registry = self.cancellations();
            let handles = registry.entry(id).or_default();
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }

        fn cancel(&self, id: EffectId) {
            let handles = self.cancellations().remove(&id).unwrap_or_default();

            for handle in &handles {
                handle.abort();
            }

            tracing::debug!(effect_id = %id, aborted = handles.len(), "Cancelled effects");
            metrics::counter!("store.effects.cancelled").increment(handles.len() as u64);
        }

        fn cancellations(&self) -> MutexGuard<'_, CancellationRegistry> {
            self.cancellations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                cancellations: Arc::clone(&self.cancellations),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
