use std::{
  fmt,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  thread,
};

use tokio::runtime::Handle;
use tracing::debug;

use crate::error::SourceError;

/// A unit of work handed to a [`WorkerSource`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that runs jobs off the caller's thread.
///
/// Implementations are cheap clonable handles: a source is created on its own,
/// shared across any number of submissions, and never owned by a task.
pub trait WorkerSource: Send + Sync {
  fn execute(&self, job: Job) -> Result<(), SourceError>;

  fn name(&self) -> &str;
}

/// Unbounded source: every job gets a dedicated, freshly spawned thread.
#[derive(Clone)]
pub struct ThreadPerTask {
  name: Arc<str>,
  spawned: Arc<AtomicU64>,
}

impl ThreadPerTask {
  pub fn new(name: &str) -> Self {
    Self {
      name: Arc::from(name),
      spawned: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Number of threads this source has started so far.
  pub fn spawned(&self) -> u64 {
    self.spawned.load(Ordering::Relaxed)
  }
}

impl Default for ThreadPerTask {
  fn default() -> Self {
    Self::new("task-worker")
  }
}

impl fmt::Debug for ThreadPerTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ThreadPerTask({}, spawned = {})", self.name, self.spawned())
  }
}

impl WorkerSource for ThreadPerTask {
  fn execute(&self, job: Job) -> Result<(), SourceError> {
    let index = self.spawned.fetch_add(1, Ordering::Relaxed);
    let thread_name = format!("{}-{}", self.name, index);
    debug!("Spawning worker thread {}", thread_name);
    thread::Builder::new().name(thread_name).spawn(job)?;
    Ok(())
  }

  fn name(&self) -> &str {
    &self.name
  }
}

/// Runs jobs on a tokio runtime's blocking thread pool.
#[derive(Clone, Debug)]
pub struct BlockingRuntime {
  handle: Handle,
}

impl BlockingRuntime {
  pub fn new(handle: Handle) -> Self {
    Self { handle }
  }

  /// Binds to the runtime the calling thread is running in.
  pub fn current() -> Result<Self, SourceError> {
    Handle::try_current()
      .map(Self::new)
      .map_err(|_| SourceError::NoRuntime)
  }
}

impl WorkerSource for BlockingRuntime {
  fn execute(&self, job: Job) -> Result<(), SourceError> {
    // the JoinHandle is not needed: the job reports through its own completer
    drop(self.handle.spawn_blocking(job));
    Ok(())
  }

  fn name(&self) -> &str {
    "tokio-blocking"
  }
}
