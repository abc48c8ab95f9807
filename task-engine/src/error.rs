use std::{any::Any, error::Error as StdError, io, sync::Arc};

use thiserror::Error;

/// Why a [`Task`](crate::Task) failed.
///
/// A failure may be observed by many continuations and many handles, so the
/// producer's error is kept behind an `Arc` and cloned, never rewrapped.
#[derive(Clone, Debug, Error)]
pub enum TaskError {
  #[error("{0}")]
  Failed(Arc<dyn StdError + Send + Sync>),

  #[error("task panicked: {0}")]
  Panicked(String),

  // the completer was dropped before it resolved the task
  #[error("task was abandoned before producing a value")]
  Abandoned,
}

impl TaskError {
  pub fn failed<E>(error: E) -> Self
  where
    E: Into<Box<dyn StdError + Send + Sync>>,
  {
    TaskError::Failed(Arc::from(error.into()))
  }

  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
      (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
      message.clone()
    } else {
      "non-string panic payload".to_string()
    };
    TaskError::Panicked(message)
  }

  /// Recovers the producer's original error, if it was of type `E`.
  pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
    match self {
      TaskError::Failed(error) => error.downcast_ref::<E>(),
      _ => None,
    }
  }

  /// True when both values carry the very same producer error (not merely an equal one).
  pub fn same_failure(&self, other: &TaskError) -> bool {
    match (self, other) {
      (TaskError::Failed(a), TaskError::Failed(b)) => Arc::ptr_eq(a, b),
      (TaskError::Panicked(a), TaskError::Panicked(b)) => a == b,
      (TaskError::Abandoned, TaskError::Abandoned) => true,
      _ => false,
    }
  }
}

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("worker source `{0}` has been shut down")]
  ShutDown(String),

  #[error("a fixed thread pool needs at least one worker")]
  ZeroSize,

  #[error("failed to spawn worker thread: {0}")]
  Spawn(#[from] io::Error),

  #[error("no tokio runtime is running on this thread")]
  NoRuntime,
}
