use std::sync::Arc;

use crate::{
  source::WorkerSource,
  task::{dispatch, Completer, Outcome, Task},
};

impl<T> Task<T>
where
  T: Clone + Send + Sync + 'static,
{
  /// Transforms the value once it is available.
  ///
  /// `f` runs on the thread that resolves this task (or right away, if it is
  /// already resolved). A failure skips `f` and is passed on unchanged.
  pub fn map<U, F>(&self, f: F) -> Task<U>
  where
    U: Send + Sync + 'static,
    F: FnOnce(T) -> U + Send + 'static,
  {
    self.continue_with(None, move |value| Ok(f(value)))
  }

  /// Like [`map`](Self::map), but `f` is submitted to `source`.
  pub fn map_on<S, U, F>(&self, source: &S, f: F) -> Task<U>
  where
    S: WorkerSource + Clone + 'static,
    U: Send + Sync + 'static,
    F: FnOnce(T) -> U + Send + 'static,
  {
    self.continue_with(Some(Arc::new(source.clone())), move |value| Ok(f(value)))
  }

  /// Consumes the value for a side effect; the returned task completes with `()`.
  pub fn on_complete<F>(&self, f: F) -> Task<()>
  where
    F: FnOnce(T) + Send + 'static,
  {
    self.map(f)
  }

  pub fn on_complete_on<S, F>(&self, source: &S, f: F) -> Task<()>
  where
    S: WorkerSource + Clone + 'static,
    F: FnOnce(T) + Send + 'static,
  {
    self.map_on(source, f)
  }

  /// Sequences a dependent task: the result is the outcome of the task `f` returns.
  pub fn and_then<U, F>(&self, f: F) -> Task<U>
  where
    U: Clone + Send + Sync + 'static,
    F: FnOnce(T) -> Task<U> + Send + 'static,
  {
    self.map(f).flatten()
  }

  /// Like [`and_then`](Self::and_then), with `f` itself running on `source`.
  pub fn and_then_on<S, U, F>(&self, source: &S, f: F) -> Task<U>
  where
    S: WorkerSource + Clone + 'static,
    U: Clone + Send + Sync + 'static,
    F: FnOnce(T) -> Task<U> + Send + 'static,
  {
    self.map_on(source, f).flatten()
  }

  /// Merges two independently running tasks once both are resolved.
  ///
  /// `f` runs on whichever thread resolves last. The combined task fails if
  /// either input fails; when both fail, this task's error is the one reported.
  pub fn combine<U, R, F>(&self, other: &Task<U>, f: F) -> Task<R>
  where
    U: Clone + Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: FnOnce(T, U) -> R + Send + 'static,
  {
    let (completer, combined) = Task::pending();
    let other = other.clone();

    self.subscribe(move |left| {
      let left = left.clone();
      other.subscribe(move |right| match (left, right) {
        (Ok(left), Ok(right)) => {
          let right = right.clone();
          completer.settle(move || Ok(f(left, right)));
        }
        (Err(error), _) => {
          completer.resolve(Err(error));
        }
        (Ok(_), Err(error)) => {
          completer.resolve(Err(error.clone()));
        }
      });
    });

    combined
  }

  fn continue_with<U, F>(&self, source: Option<Arc<dyn WorkerSource>>, f: F) -> Task<U>
  where
    U: Send + Sync + 'static,
    F: FnOnce(T) -> Outcome<U> + Send + 'static,
  {
    let (completer, next) = Task::pending();

    self.subscribe(move |outcome| match outcome {
      Ok(value) => {
        let value = value.clone();
        match source {
          Some(source) => dispatch(
            source.as_ref(),
            Box::new(move || {
              completer.settle(move || f(value));
            }),
          ),
          None => {
            completer.settle(move || f(value));
          }
        }
      }
      Err(error) => {
        completer.resolve(Err(error.clone()));
      }
    });

    next
  }
}

impl<U> Task<Task<U>>
where
  U: Clone + Send + Sync + 'static,
{
  /// Collapses a task of a task into the inner task's outcome.
  pub fn flatten(&self) -> Task<U> {
    let (completer, flat) = Task::pending();

    self.subscribe(move |outcome| match outcome {
      Ok(inner) => forward(inner, completer),
      Err(error) => {
        completer.resolve(Err(error.clone()));
      }
    });

    flat
  }
}

fn forward<U>(inner: &Task<U>, completer: Completer<U>)
where
  U: Clone + Send + Sync + 'static,
{
  inner.subscribe(move |outcome| {
    completer.resolve(outcome.clone());
  });
}
