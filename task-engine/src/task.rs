use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  error::Error,
  fmt,
  future::Future,
  panic::{catch_unwind, AssertUnwindSafe},
  pin::Pin,
  sync::{Arc, OnceLock},
  task::{Context, Poll, Waker},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::{
  error::TaskError,
  source::{Job, ThreadPerTask, WorkerSource},
};

pub type Outcome<T> = Result<T, TaskError>;

type Continuation<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Pending,
  Completed,
  Failed,
}

/// A computation that eventually completes with a `T` or fails with a [`TaskError`].
///
/// A task is resolved exactly once. Every clone of the handle, every attached
/// continuation and every `join` observes that single outcome. Values are
/// handed out by clone, which is why most operations ask for `T: Clone`.
pub struct Task<T> {
  shared: Arc<Shared<T>>,
}

/// The producing side of a [`Task`].
///
/// It cannot be cloned and resolving consumes it, so a task has one producer.
/// Dropping a completer without resolving fails the task with
/// [`TaskError::Abandoned`].
pub struct Completer<T: 'static> {
  shared: Arc<Shared<T>>,
  resolved: bool,
}

struct Shared<T> {
  outcome: OnceLock<Outcome<T>>,
  // `None` after resolution
  waiting: Mutex<Option<Waiting<T>>>,
  resolved: Condvar,
}

struct Waiting<T> {
  continuations: Vec<Continuation<T>>,
  wakers: Vec<Waker>,
}

type Released = Box<dyn FnOnce()>;

#[derive(Default)]
struct RunQueue {
  draining: Cell<bool>,
  released: RefCell<VecDeque<Released>>,
}

thread_local! {
  static RUN_QUEUE: RunQueue = RunQueue::default();
}

/// Runs `released` after every continuation already released on this thread.
///
/// A continuation that resolves another task only queues that task's
/// continuations; the outermost call drains the queue in a loop, so a chain
/// of any length resolves in constant stack depth.
fn run_released(released: Released) {
  let mut slot = Some(released);
  let released = match RUN_QUEUE.try_with(|queue| {
    queue.released.borrow_mut().push_back(slot.take().expect("released once"));
    !queue.draining.replace(true)
  }) {
    Ok(false) => return,
    Ok(true) => None,
    // thread-local storage is being torn down
    Err(_) => slot.take(),
  };
  if let Some(released) = released {
    released();
    return;
  }

  struct Draining;
  impl Drop for Draining {
    fn drop(&mut self) {
      let _ = RUN_QUEUE.try_with(|queue| queue.draining.set(false));
    }
  }
  let _draining = Draining;

  while let Some(next) = RUN_QUEUE.with(|queue| queue.released.borrow_mut().pop_front()) {
    next();
  }
}

impl<T> Shared<T> {
  fn new() -> Self {
    Self {
      outcome: OnceLock::new(),
      waiting: Mutex::new(Some(Waiting {
        continuations: Vec::new(),
        wakers: Vec::new(),
      })),
      resolved: Condvar::new(),
    }
  }

  fn subscribe(&self, continuation: Continuation<T>) {
    {
      let mut waiting = self.waiting.lock();
      if let Some(waiting) = waiting.as_mut() {
        waiting.continuations.push(continuation);
        return;
      }
    }

    // already resolved: run on the caller's thread
    if let Some(outcome) = self.outcome.get() {
      continuation(outcome);
    }
  }

  fn wait(&self) -> &Outcome<T> {
    if let Some(outcome) = self.outcome.get() {
      return outcome;
    }

    let mut waiting = self.waiting.lock();
    loop {
      if let Some(outcome) = self.outcome.get() {
        return outcome;
      }
      self.resolved.wait(&mut waiting);
    }
  }
}

impl<T: 'static> Shared<T> {
  /// First resolution wins; later attempts return false and change nothing.
  fn resolve(self: &Arc<Self>, outcome: Outcome<T>) -> bool {
    if self.outcome.set(outcome).is_err() {
      return false;
    }

    let waiting = {
      let mut waiting = self.waiting.lock();
      self.resolved.notify_all();
      waiting.take()
    };

    if let Some(waiting) = waiting {
      let shared = self.clone();
      run_released(Box::new(move || {
        if let Some(outcome) = shared.outcome.get() {
          for continuation in waiting.continuations {
            continuation(outcome);
          }
        }
        for waker in waiting.wakers {
          waker.wake();
        }
      }));
    }
    true
  }
}

impl<T: 'static> Completer<T> {
  pub fn complete(self, value: T) -> bool {
    self.resolve(Ok(value))
  }

  pub fn fail<E>(self, error: E) -> bool
  where
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    self.resolve(Err(TaskError::failed(error)))
  }

  pub(crate) fn resolve(mut self, outcome: Outcome<T>) -> bool {
    self.resolved = true;
    self.shared.resolve(outcome)
  }

  /// Runs `work` here and resolves with its outcome; a panic becomes [`TaskError::Panicked`].
  pub(crate) fn settle<F>(self, work: F) -> bool
  where
    F: FnOnce() -> Outcome<T>,
  {
    let outcome = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
      let error = TaskError::from_panic(payload);
      debug!("Task work panicked: {}", error);
      Err(error)
    });
    self.resolve(outcome)
  }
}

impl<T: 'static> Drop for Completer<T> {
  fn drop(&mut self) {
    if !self.resolved {
      self.shared.resolve(Err(TaskError::Abandoned));
    }
  }
}

impl<T: 'static> fmt::Debug for Completer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Completer")
      .field("resolved", &self.resolved)
      .finish()
  }
}

/// Hands `job` to `source`. A rejected job is dropped, which abandons its task.
pub(crate) fn dispatch<S>(source: &S, job: Job)
where
  S: WorkerSource + ?Sized,
{
  if let Err(error) = source.execute(job) {
    error!("Worker source {} rejected a task: {}", source.name(), error);
  }
}

impl<T: 'static> Task<T> {
  /// Creates a pending task together with the only handle able to resolve it.
  pub fn pending() -> (Completer<T>, Task<T>) {
    let shared = Arc::new(Shared::new());
    (
      Completer {
        shared: shared.clone(),
        resolved: false,
      },
      Task { shared },
    )
  }

  pub fn completed(value: T) -> Task<T> {
    let (completer, task) = Self::pending();
    completer.complete(value);
    task
  }

  pub fn failed<E>(error: E) -> Task<T>
  where
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    let (completer, task) = Self::pending();
    completer.fail(error);
    task
  }

  pub fn state(&self) -> TaskState {
    match self.shared.outcome.get() {
      None => TaskState::Pending,
      Some(Ok(_)) => TaskState::Completed,
      Some(Err(_)) => TaskState::Failed,
    }
  }

  pub fn is_done(&self) -> bool {
    self.state() != TaskState::Pending
  }

  /// Registers `continuation` to run once with the outcome.
  ///
  /// It runs on the thread that resolves the task, or right away on the
  /// calling thread when the task is already resolved. Continuations released
  /// while another one is running wait until it returns.
  pub(crate) fn subscribe<F>(&self, continuation: F)
  where
    F: FnOnce(&Outcome<T>) + Send + 'static,
  {
    self.shared.subscribe(Box::new(continuation));
  }
}

impl<T> Task<T>
where
  T: Send + Sync + 'static,
{
  /// Runs `work` on a fresh thread of the default unbounded source.
  pub fn submit<F>(work: F) -> Task<T>
  where
    F: FnOnce() -> T + Send + 'static,
  {
    Self::submit_on(&ThreadPerTask::default(), work)
  }

  /// Runs `work` on `source` and returns immediately with a pending task.
  pub fn submit_on<S, F>(source: &S, work: F) -> Task<T>
  where
    S: WorkerSource + ?Sized,
    F: FnOnce() -> T + Send + 'static,
  {
    Self::schedule(source, move || Ok(work()))
  }

  pub fn try_submit<F, E>(work: F) -> Task<T>
  where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    Self::try_submit_on(&ThreadPerTask::default(), work)
  }

  /// Like [`submit_on`](Self::submit_on) for work that can fail; an `Err` fails the task.
  pub fn try_submit_on<S, F, E>(source: &S, work: F) -> Task<T>
  where
    S: WorkerSource + ?Sized,
    F: FnOnce() -> Result<T, E> + Send + 'static,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    Self::schedule(source, move || work().map_err(TaskError::failed))
  }

  fn schedule<S, F>(source: &S, work: F) -> Task<T>
  where
    S: WorkerSource + ?Sized,
    F: FnOnce() -> Outcome<T> + Send + 'static,
  {
    let (completer, task) = Self::pending();
    debug!("Submitting task to {}", source.name());
    dispatch(source, Box::new(move || {
      completer.settle(work);
    }));
    task
  }
}

impl<T> Task<T>
where
  T: Clone,
{
  /// Blocks the calling thread until the task resolves.
  ///
  /// Never join from a worker of a bounded pool when the task being joined
  /// still needs a slot of that same pool: with every slot waiting, nothing is
  /// left to run the work and the pool deadlocks.
  pub fn join(&self) -> Outcome<T> {
    self.shared.wait().clone()
  }

  /// The outcome, if the task is already resolved. Never blocks.
  pub fn peek(&self) -> Option<Outcome<T>> {
    self.shared.outcome.get().cloned()
  }
}

impl<T> Clone for Task<T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<T: 'static> fmt::Debug for Task<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Task({:?})", self.state())
  }
}

impl<T> Future for Task<T>
where
  T: Clone,
{
  type Output = Outcome<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if let Some(outcome) = self.shared.outcome.get() {
      return Poll::Ready(outcome.clone());
    }

    {
      let mut waiting = self.shared.waiting.lock();
      if let Some(waiting) = waiting.as_mut() {
        if !waiting.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
          waiting.wakers.push(cx.waker().clone());
        }
        return Poll::Pending;
      }
    }

    match self.shared.outcome.get() {
      Some(outcome) => Poll::Ready(outcome.clone()),
      None => Poll::Pending,
    }
  }
}
