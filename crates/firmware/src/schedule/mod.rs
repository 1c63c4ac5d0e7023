//! Earliest-deadline-first scheduling of pipeline work.
//!
//! Each DSP core runs one [`EdfScheduler`]. A platform tick drives
//! [`EdfScheduler::tick`], which dispatches every due task in deadline order
//! through a [`TaskDispatch`]. For audio, the dispatcher is the pipeline and
//! the task's work item is the id of the stage whose `copy` runs.
//!
//! ```text
//!  Ticker ──tick(now)──► EdfScheduler ──run(work)──► Pipeline::copy(comp)
//!                          │  sorted by (deadline, priority, registration)
//!                          └─ cycle budget charged per systick
//! ```

pub mod edf;
pub mod task;
pub mod tick;

use pipeline::{CompError, Component, Pipeline};

pub use edf::EdfScheduler;
pub use task::{TaskDesc, TaskStats};
pub use tick::{run_for, run_forever};

/// Errors returned by scheduler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// Task description is malformed or names another core.
    InvalidArgument,
    /// A task with the same id is already queued.
    Busy,
    /// Task table is full.
    NoResource,
    /// No task with that id.
    NotFound,
}

impl core::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::InvalidArgument => "invalid task",
            Self::Busy => "task already queued",
            Self::NoResource => "task table full",
            Self::NotFound => "no such task",
        };
        f.write_str(msg)
    }
}

/// Runs the work item of a due task.
///
/// The result is only logged; it never changes when the task runs next.
pub trait TaskDispatch {
    /// Run `work` once. Returns the bytes processed.
    fn run(&mut self, work: u32) -> Result<u32, CompError>;
}

impl<S: Component, const NC: usize, const NB: usize> TaskDispatch for Pipeline<'_, '_, S, NC, NB> {
    fn run(&mut self, work: u32) -> Result<u32, CompError> {
        self.copy(work)
    }
}
