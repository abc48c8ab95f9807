use std::{
  fmt,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::{
  error::{SourceError, TaskError},
  source::{Job, WorkerSource},
};

/// Bounded source: a fixed number of worker threads fed from one FIFO queue.
///
/// When every worker is busy, submissions wait in the queue and are picked up
/// in submission order. A pool of size 1 therefore runs its jobs one after the
/// other. This type is a handle; clones share the same workers.
#[derive(Clone)]
pub struct FixedThreadPool {
  inner: Arc<PoolInner>,
}

struct PoolInner {
  name: String,
  size: usize,
  // `None` once the pool stopped accepting work
  sender: Mutex<Option<Sender<Job>>>,
  receiver: Receiver<Job>,
  active: Arc<AtomicUsize>,
  workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FixedThreadPool {
  pub fn new(name: &str, size: usize) -> Result<Self, SourceError> {
    if size == 0 {
      return Err(SourceError::ZeroSize);
    }

    let (sender, receiver) = unbounded::<Job>();
    let active = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::with_capacity(size);
    for index in 0..size {
      let receiver = receiver.clone();
      let active = active.clone();
      let worker = thread::Builder::new()
        .name(format!("{}-{}", name, index))
        .spawn(move || run_worker(receiver, active))?;
      workers.push(worker);
    }

    info!("Started thread pool {} with {} workers", name, size);

    Ok(Self {
      inner: Arc::new(PoolInner {
        name: name.to_string(),
        size,
        sender: Mutex::new(Some(sender)),
        receiver,
        active,
        workers: Mutex::new(workers),
      }),
    })
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn size(&self) -> usize {
    self.inner.size
  }

  /// Jobs submitted but not yet picked up by a worker.
  pub fn queued(&self) -> usize {
    self.inner.receiver.len()
  }

  /// Jobs currently running.
  pub fn active(&self) -> usize {
    self.inner.active.load(Ordering::Acquire)
  }

  pub fn is_shutdown(&self) -> bool {
    self.inner.sender.lock().is_none()
  }

  /// Stops accepting work. Jobs already queued still run, then the workers exit.
  pub fn shutdown(&self) {
    if self.inner.sender.lock().take().is_some() {
      info!("Shutting down thread pool {}", self.inner.name);
    }
  }

  /// Like [`shutdown`](Self::shutdown), then waits for every worker to exit.
  ///
  /// Must not be called from one of this pool's own workers.
  pub fn shutdown_and_wait(&self) {
    self.shutdown();
    let workers = std::mem::take(&mut *self.inner.workers.lock());
    for worker in workers {
      let name = worker.thread().name().map(str::to_string);
      if worker.join().is_err() {
        error!("Worker {:?} of pool {} exited abnormally", name, self.inner.name);
      }
    }
    debug!("All workers of pool {} have exited", self.inner.name);
  }
}

fn run_worker(receiver: Receiver<Job>, active: Arc<AtomicUsize>) {
  // `iter` drains what is still queued after the sender is gone
  for job in receiver.iter() {
    active.fetch_add(1, Ordering::AcqRel);
    let outcome = catch_unwind(AssertUnwindSafe(job));
    active.fetch_sub(1, Ordering::AcqRel);

    if let Err(payload) = outcome {
      error!(
        "Job panicked on {:?}: {}",
        thread::current().name(),
        TaskError::from_panic(payload)
      );
    }
  }
}

impl WorkerSource for FixedThreadPool {
  fn execute(&self, job: Job) -> Result<(), SourceError> {
    let sender = self.inner.sender.lock();
    match sender.as_ref() {
      Some(sender) => sender
        .send(job)
        .map_err(|_| SourceError::ShutDown(self.inner.name.clone())),
      None => Err(SourceError::ShutDown(self.inner.name.clone())),
    }
  }

  fn name(&self) -> &str {
    FixedThreadPool::name(self)
  }
}

impl fmt::Debug for FixedThreadPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "FixedThreadPool({}, size = {}, active = {}, queued = {})",
      self.inner.name,
      self.inner.size,
      self.active(),
      self.queued()
    )
  }
}
