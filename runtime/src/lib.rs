//! # Airport Runtime
//!
//! The [`Store`] runtime that drives reducers, executes their effects and feeds
//! resulting actions back in, plus the operational pieces the services share:
//! a bounded [`DeadLetterQueue`] and Prometheus [`metrics`].
//!
//! ## Example
//!
//! ```ignore
//! use airport_runtime::Store;
//!
//! let store = Store::new(FlightState::default(), FlightReducer, environment);
//!
//! store.send(FlightAction::RegisterFlight { correlation_id, flight }).await?;
//!
//! let count = store.state(|s| s.flights.len()).await;
//! ```

use airport_core::{effect::Effect, reducer::Reducer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{RwLock, oneshot, watch};

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// The reply channel of a waiting caller closed without an answer
        #[error("Reply channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Dead letter queue entry
///
/// Represents a failed operation with metadata about the failure.
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// The failed operation payload
    pub payload: T,

    /// Number of times this operation was attempted
    pub attempts: usize,

    /// The error message from the last failure
    pub error_message: String,

    /// When the entry was recorded
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

/// Dead Letter Queue for storing failed operations
///
/// Bounded FIFO: when full, the oldest entry is dropped. Clones share the
/// same underlying queue, so a consumer can hand a clone to an operator
/// endpoint while it keeps pushing.
///
/// # Example
///
/// ```
/// use airport_runtime::DeadLetterQueue;
///
/// let dlq = DeadLetterQueue::new(100);
/// dlq.push("payload".to_string(), "passenger 42 not found".to_string(), 1);
///
/// assert_eq!(dlq.len(), 1);
/// let entries = dlq.drain();
/// assert_eq!(entries[0].error_message, "passenger 42 not found");
/// assert!(dlq.is_empty());
/// ```
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    queue: Arc<Mutex<VecDeque<DeadLetter<T>>>>,
    max_size: usize,
}

impl<T> DeadLetterQueue<T> {
    /// Create a new dead letter queue with the given max size
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Push a failed operation onto the queue
    ///
    /// If the queue is full, the oldest entry is dropped.
    ///
    /// # Arguments
    ///
    /// - `payload`: The operation data
    /// - `error_message`: Description of the failure
    /// - `attempts`: Number of times the operation was attempted
    pub fn push(&self, payload: T, error_message: String, attempts: usize) {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if queue.len() >= self.max_size {
            queue.pop_front();
            ::metrics::counter!("dlq.dropped").increment(1);
            tracing::warn!(
                max_size = self.max_size,
                "DLQ at capacity, dropping oldest entry"
            );
        }

        queue.push_back(DeadLetter {
            payload,
            attempts,
            error_message,
            failed_at: chrono::Utc::now(),
        });

        // Queue length is bounded by max_size, well inside f64's exact range
        #[allow(clippy::cast_precision_loss)]
        ::metrics::gauge!("dlq.size").set(queue.len() as f64);
        ::metrics::counter!("dlq.pushed").increment(1);

        tracing::warn!(
            attempts,
            queue_size = queue.len(),
            "Operation added to dead letter queue"
        );
    }

    /// Get the current queue size
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all entries from the queue
    pub fn drain(&self) -> Vec<DeadLetter<T>> {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries: Vec<_> = queue.drain(..).collect();

        ::metrics::gauge!("dlq.size").set(0.0);
        ::metrics::counter!("dlq.drained").increment(entries.len() as u64);

        tracing::info!(count = entries.len(), "Drained dead letter queue");

        entries
    }

    /// Copy of every entry, oldest first, without removing anything
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeadLetter<T>>
    where
        T: Clone,
    {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Get the maximum queue size
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            max_size: self.max_size,
        }
    }
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Awaiting it waits for the effects spawned
/// directly by that action; actions they feed back are tracked separately.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: completion tracking shared by the effects of one action
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: decrements the effect counter on drop, including on panic
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A caller parked in [`Store::send_and_wait_for`]
struct Waiter<A> {
    id: u64,
    matches: Box<dyn Fn(&A) -> bool + Send + Sync>,
    reply: oneshot::Sender<A>,
}

/// Outstanding waiters, each with its own reply channel
struct Waiters<A> {
    next_id: AtomicU64,
    pending: Mutex<Vec<Waiter<A>>>,
}

impl<A> Waiters<A> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Waiter<A>>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn register(
        &self,
        matches: Box<dyn Fn(&A) -> bool + Send + Sync>,
    ) -> (u64, oneshot::Receiver<A>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.lock().push(Waiter { id, matches, reply });
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|waiter| waiter.id != id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<A: Clone> Waiters<A> {
    /// Hand `action` to every waiter it satisfies.
    fn resolve(&self, action: &A) {
        let mut pending = self.lock();
        let mut i = 0;
        while i < pending.len() {
            if (pending[i].matches)(action) {
                let waiter = pending.swap_remove(i);
                let _ = waiter.reply.send(action.clone());
            } else {
                i += 1;
            }
        }
    }
}

/// Unregisters a waiter once its caller stops waiting.
struct Registration<'a, A> {
    waiters: &'a Waiters<A>,
    id: u64,
}

impl<A> Drop for Registration<'_, A> {
    fn drop(&mut self) {
        self.waiters.remove(self.id);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, Registration, RwLock, StoreError,
        Waiters,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Effects run in spawned tasks. Dropping the future of a caller waiting on
    /// [`Store::send_and_wait_for`] does not cancel them.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Callers waiting for an effect-produced action, checked after the
        /// reducer has applied it.
        waiters: Arc<Waiters<A>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                waiters: Arc::new(Waiters::new()),
            }
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Rejects new commands, then waits for pending effects to finish.
        /// Actions those effects produce are still applied.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(50);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send a command to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Spawns the returned effects
        ///
        /// Returns after the effects are started, not after they complete.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);
            Ok(self.apply(action).await)
        }

        /// Send a command and wait for a matching result action
        ///
        /// The waiter is registered before the command is sent, so a fast
        /// effect cannot race past it, and it gets its own reply channel, so
        /// any number of concurrent callers each see their outcome. Only
        /// effect-produced actions are matched, never the command itself.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: The waiter was dropped without a reply
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool + Send + Sync + 'static,
        {
            let (id, reply) = self.waiters.register(Box::new(predicate));
            let _registration = Registration {
                waiters: &self.waiters,
                id,
            };

            self.send(action).await?;

            match tokio::time::timeout(timeout, reply).await {
                Ok(Ok(action)) => Ok(action),
                Ok(Err(_)) => Err(StoreError::ChannelClosed),
                Err(_) => Err(StoreError::Timeout),
            }
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.flights.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Number of effects still running across all actions
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Number of callers currently parked in `send_and_wait_for`
        #[must_use]
        pub fn waiting(&self) -> usize {
            self.waiters.len()
        }

        async fn apply(&self, action: A) -> EffectHandle
        where
            R: Clone,
            E: Clone,
        {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                // Effect counts are tiny
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!("store.effects.count").record(effects.len() as f64);

                effects
            };

            tracing::trace!("Executing {} effects", effects.len());
            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            handle
        }

        /// Reduce an effect-produced action, then hand it to matching waiters.
        ///
        /// Outcomes bypass the shutdown gate: the command that caused them
        /// was accepted, so its result must land in state.
        async fn feed_back(&self, action: A)
        where
            R: Clone,
            E: Clone,
        {
            metrics::counter!("store.feedback.total").increment(1);
            let _ = self.apply(action.clone()).await;
            self.waiters.resolve(&action);
        }

        fn spawn_tracked<F>(&self, tracking: &EffectTracking, work: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let guard = DecrementGuard(tracking.clone());

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                work.await;
            });
        }

        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();
                    self.spawn_tracked(tracking, async move {
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                waiters: Arc::clone(&self.waiters),
            }
        }
    }
}

pub use store::Store;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use airport_core::{SmallVec, smallvec};

    #[test]
    fn dead_letter_queue_drops_oldest_when_full() {
        let dlq = DeadLetterQueue::new(2);
        dlq.push(1, "first".to_string(), 1);
        dlq.push(2, "second".to_string(), 1);
        dlq.push(3, "third".to_string(), 1);

        let entries = dlq.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].payload, 2);
        assert_eq!(entries[1].payload, 3);
    }

    #[test]
    fn dead_letter_queue_clones_share_storage() {
        let dlq = DeadLetterQueue::new(10);
        let observer = dlq.clone();
        dlq.push("event", "boom".to_string(), 1);
        assert_eq!(observer.len(), 1);
        assert_eq!(observer.drain().len(), 1);
        assert!(dlq.is_empty());
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TallyAction {
        Add(u32),
        AddAfter(u32, u64),
        Added(u32),
    }

    #[derive(Clone)]
    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = Vec<u32>;
        type Action = TallyAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Vec<u32>,
            action: TallyAction,
            _env: &(),
        ) -> SmallVec<[Effect<TallyAction>; 4]> {
            match action {
                TallyAction::Add(n) => {
                    smallvec![Effect::Future(Box::pin(async move {
                        Some(TallyAction::Added(n))
                    }))]
                },
                TallyAction::AddAfter(n, millis) => {
                    smallvec![Effect::Future(Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(millis)).await;
                        Some(TallyAction::Added(n))
                    }))]
                },
                TallyAction::Added(n) => {
                    state.push(n);
                    smallvec![Effect::None]
                },
            }
        }
    }

    fn tally_store() -> Store<Vec<u32>, TallyAction, (), TallyReducer> {
        Store::new(Vec::new(), TallyReducer, ())
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = tally_store();
        let mut handle = store.send(TallyAction::Add(7)).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(Clone::clone).await, vec![7]);
    }

    #[tokio::test]
    async fn send_and_wait_for_sees_applied_state() {
        let store = tally_store();
        let result = store
            .send_and_wait_for(
                TallyAction::Add(3),
                |a| matches!(a, TallyAction::Added(3)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(result, TallyAction::Added(3));
        assert!(store.state(|s| s.contains(&3)).await);
        assert_eq!(store.waiting(), 0);
    }

    #[tokio::test]
    async fn timed_out_waiter_is_unregistered() {
        let store = tally_store();
        let result = store
            .send_and_wait_for(
                TallyAction::Add(1),
                |a| matches!(a, TallyAction::Added(99)),
                Duration::from_millis(50),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Timeout)));
        assert_eq!(store.waiting(), 0);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_commands() {
        let store = tally_store();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send(TallyAction::Add(1)).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
        assert_eq!(store.waiting(), 0);
    }

    #[tokio::test]
    async fn outcome_landing_during_shutdown_is_still_applied() {
        let store = tally_store();
        store.send(TallyAction::AddAfter(4, 50)).await.unwrap();

        store.shutdown(Duration::from_secs(2)).await.unwrap();

        assert_eq!(store.state(Clone::clone).await, vec![4]);
    }

    #[tokio::test]
    async fn completed_handle_returns_immediately() {
        let mut handle = EffectHandle::completed();
        handle.wait_with_timeout(Duration::from_millis(10)).await.unwrap();
    }
}
