//! Asynchronous evaluation of a traversal.
//!
//! A [`SharedTraversal`] guards a [`Traversal`] with a mutex so bodies run
//! one at a time, in the order the worker picks them up. [`SharedTraversal::promise`]
//! schedules a body on a [`Worker`] and returns a [`Promise`] that completes
//! with the body's result.
//!
//! Cancelling a promise completes it with [`TraversalError::Interrupted`]
//! immediately. If the body has already started, the cancellation token it
//! runs under is set and the pipeline stops at its next pull boundary.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;
use trellis_core::Value;

use crate::context::CancellationToken;
use crate::error::{TraversalError, TraversalResult};
use crate::side_effects::SideEffects;
use crate::traversal::Traversal;

/// A job submitted to a [`Worker`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs off the calling thread.
pub trait Worker: Send + Sync {
    /// Schedules `job` for execution.
    fn execute(&self, job: Job);
}

impl Worker for rayon::ThreadPool {
    fn execute(&self, job: Job) {
        self.spawn(job);
    }
}

/// Runs jobs on the global rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorker;

impl Worker for DefaultWorker {
    fn execute(&self, job: Job) {
        rayon::spawn(job);
    }
}

enum State<T> {
    Pending,
    Running,
    Done(TraversalResult<T>),
    Taken,
}

impl<T> State<T> {
    fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    token: CancellationToken,
}

impl<T> Shared<T> {
    /// Moves a pending promise to running; false if it was cancelled first.
    fn start(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = State::Running;
            true
        } else {
            false
        }
    }

    fn complete(&self, result: TraversalResult<T>) -> bool {
        let mut state = self.state.lock();
        if !state.is_open() {
            return false;
        }
        *state = State::Done(result);
        self.ready.notify_all();
        true
    }

    fn take(state: &mut MutexGuard<'_, State<T>>) -> TraversalResult<T> {
        match std::mem::replace(&mut **state, State::Taken) {
            State::Done(result) => result,
            State::Taken => Err(TraversalError::ResultTaken),
            open @ (State::Pending | State::Running) => {
                **state = open;
                Err(TraversalError::Exhausted)
            }
        }
    }
}

/// The eventual result of a body scheduled on a [`SharedTraversal`].
///
/// Clones refer to the same result; only one of them can take it.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending),
                ready: Condvar::new(),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Blocks until the promise completes and takes its result.
    ///
    /// # Errors
    ///
    /// Returns the body's error, [`TraversalError::Interrupted`] if the
    /// promise was cancelled, or [`TraversalError::ResultTaken`] if the
    /// result was already taken.
    pub fn get(&self) -> TraversalResult<T> {
        let mut state = self.shared.state.lock();
        while state.is_open() {
            self.shared.ready.wait(&mut state);
        }
        Shared::take(&mut state)
    }

    /// Like [`get`](Self::get), giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Timeout`] if the promise is still running
    /// when the timeout elapses, otherwise the same errors as `get`.
    pub fn get_timeout(&self, timeout: Duration) -> TraversalResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.is_open() {
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() && state.is_open() {
                return Err(TraversalError::Timeout(timeout));
            }
        }
        Shared::take(&mut state)
    }

    /// Cancels the promise.
    ///
    /// Returns false if it had already completed.
    pub fn cancel(&self) -> bool {
        self.shared.token.cancel();
        let cancelled = self.shared.complete(Err(TraversalError::Interrupted));
        if cancelled {
            debug!("promise cancelled");
        }
        cancelled
    }

    /// Returns true once a result is available or was taken.
    #[must_use]
    pub fn is_done(&self) -> bool {
        !self.shared.state.lock().is_open()
    }

    /// Returns true if [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// A traversal that can be pulled from several threads and evaluated
/// asynchronously.
#[derive(Clone)]
pub struct SharedTraversal {
    inner: Arc<Mutex<Traversal>>,
}

impl SharedTraversal {
    /// Wraps a traversal.
    #[must_use]
    pub fn new(traversal: Traversal) -> Self {
        Self { inner: Arc::new(Mutex::new(traversal)) }
    }

    /// Schedules `body` on the global rayon pool.
    pub fn promise<T, F>(&self, body: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Traversal) -> TraversalResult<T> + Send + 'static,
    {
        self.promise_on(&DefaultWorker, body)
    }

    /// Schedules `body` on `worker`.
    ///
    /// The body runs with exclusive access to the traversal and with the
    /// promise's cancellation token installed. A panic in the body completes
    /// the promise with [`TraversalError::Panicked`].
    pub fn promise_on<W, T, F>(&self, worker: &W, body: F) -> Promise<T>
    where
        W: Worker + ?Sized,
        T: Send + 'static,
        F: FnOnce(&mut Traversal) -> TraversalResult<T> + Send + 'static,
    {
        let promise = Promise::new();
        let shared = Arc::clone(&promise.shared);
        let traversal = Arc::clone(&self.inner);
        debug!("promise scheduled");
        worker.execute(Box::new(move || {
            if !shared.start() {
                return;
            }
            let mut guard = traversal.lock();
            let previous = guard.set_interrupt(Some(shared.token.clone()));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *guard)));
            guard.set_interrupt(previous);
            drop(guard);
            let result = outcome
                .unwrap_or_else(|payload| Err(TraversalError::Panicked(panic_message(&*payload))));
            let ok = result.is_ok();
            if shared.complete(result) {
                debug!(ok, "promise completed");
            }
        }));
        promise
    }

    /// Locks the traversal for direct use.
    pub fn lock(&self) -> MutexGuard<'_, Traversal> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the traversal.
    pub fn with<R>(&self, f: impl FnOnce(&mut Traversal) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// See [`Traversal::next`].
    ///
    /// # Errors
    ///
    /// Same as [`Traversal::next`].
    pub fn next(&self) -> TraversalResult<Value> {
        self.inner.lock().next()
    }

    /// See [`Traversal::try_next`].
    ///
    /// # Errors
    ///
    /// Same as [`Traversal::try_next`].
    pub fn try_next(&self) -> TraversalResult<Option<Value>> {
        self.inner.lock().try_next()
    }

    /// See [`Traversal::has_next`].
    ///
    /// # Errors
    ///
    /// Same as [`Traversal::has_next`].
    pub fn has_next(&self) -> TraversalResult<bool> {
        self.inner.lock().has_next()
    }

    /// See [`Traversal::next_n`].
    ///
    /// # Errors
    ///
    /// Same as [`Traversal::next_n`].
    pub fn next_n(&self, n: usize) -> TraversalResult<Vec<Value>> {
        self.inner.lock().next_n(n)
    }

    /// Drains the traversal for its side effects.
    ///
    /// # Errors
    ///
    /// Same as [`Traversal::iterate`].
    pub fn iterate(&self) -> TraversalResult<()> {
        self.inner.lock().iterate().map(|_| ())
    }

    /// Returns a handle to the traversal's side effects.
    #[must_use]
    pub fn side_effects(&self) -> SideEffects {
        self.inner.lock().side_effects().clone()
    }
}

impl From<Traversal> for SharedTraversal {
    fn from(traversal: Traversal) -> Self {
        Self::new(traversal)
    }
}

impl fmt::Debug for SharedTraversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTraversal").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs jobs inline on the calling thread.
    struct Inline;

    impl Worker for Inline {
        fn execute(&self, job: Job) {
            job();
        }
    }

    /// Drops jobs so promises stay pending.
    struct Never;

    impl Worker for Never {
        fn execute(&self, _job: Job) {}
    }

    fn numbers(n: i64) -> SharedTraversal {
        let traversal = crate::TraversalBuilder::new().inject((1..=n).map(Value::Int)).build();
        SharedTraversal::new(traversal)
    }

    #[test]
    fn inline_promise_completes() {
        let shared = numbers(3);
        let promise = shared.promise_on(&Inline, |t| t.next_n(2));
        assert!(promise.is_done());
        assert_eq!(promise.get().unwrap(), vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(promise.get(), Err(TraversalError::ResultTaken)));
    }

    #[test]
    fn pending_promise_times_out_and_cancels() {
        let shared = numbers(3);
        let promise = shared.promise_on(&Never, |t| t.next());
        assert!(matches!(
            promise.get_timeout(Duration::from_millis(10)),
            Err(TraversalError::Timeout(_))
        ));
        assert!(promise.cancel());
        assert!(!promise.cancel());
        assert!(promise.is_cancelled());
        assert!(matches!(promise.get(), Err(TraversalError::Interrupted)));
        assert_eq!(shared.next().unwrap(), Value::Int(1));
    }

    #[test]
    fn cancelled_before_start_skips_body() {
        let shared = numbers(3);
        let promise: Promise<()> = Promise::new();
        promise.cancel();
        assert!(!promise.shared.start());
        assert_eq!(shared.next_n(5).unwrap().len(), 3);
    }

    #[test]
    fn panic_becomes_error() {
        let shared = numbers(1);
        let promise = shared.promise_on(&Inline, |_| -> TraversalResult<()> { panic!("boom") });
        match promise.get() {
            Err(TraversalError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(shared.next().unwrap(), Value::Int(1));
    }

    #[test]
    fn interrupt_token_is_restored() {
        let shared = numbers(2);
        let token = CancellationToken::new();
        shared.lock().set_interrupt(Some(token.clone()));
        let promise = shared.promise_on(&Inline, |t| t.next());
        assert_eq!(promise.get().unwrap(), Value::Int(1));
        token.cancel();
        assert!(matches!(shared.next(), Err(TraversalError::Interrupted)));
    }
}
