//! Deferred, composable units of blocking work.
//!
//! A [`Task`] is submitted to a [`WorkerSource`] and resolves once. Callers
//! chain on it with [`Task::map`], [`Task::and_then`], [`Task::on_complete`]
//! and [`Task::combine`] without blocking, and get the value back with
//! [`Task::join`] or by awaiting the task.
//!
//! ```no_run
//! use task_engine::{FixedThreadPool, Task};
//!
//! let pool = FixedThreadPool::new("prices", 2)?;
//! let latte = Task::submit_on(&pool, || 1100);
//! let mocha = Task::submit_on(&pool, || 1300);
//!
//! let total = latte.combine(&mocha, |a, b| a + b).join()?;
//! assert_eq!(total, 2400);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod compose;
mod error;
mod pool;
mod source;
mod task;

pub use error::{SourceError, TaskError};
pub use pool::FixedThreadPool;
pub use source::{BlockingRuntime, Job, ThreadPerTask, WorkerSource};
pub use task::{Completer, Outcome, Task, TaskState};
