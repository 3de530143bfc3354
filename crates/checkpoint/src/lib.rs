//! Checkpointing and partial-result reporting for IronTask.
//!
//! A run records every attempted step into a [`Checkpoint`], persists it
//! through a [`CheckpointStore`] at each terminal transition, and — when it
//! ends without a final answer but with some successes — derives a
//! [`PartialReport`] for the user.

pub mod checkpoint;
pub mod report;
pub mod store;

pub use checkpoint::{task_id_for, Checkpoint, StepRecord};
pub use report::{ErrorCategory, PartialReport, StopReason};
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
