//! Priority scoring and alerting for the ticket workflow.
//!
//! Two independent concerns live here:
//!
//! - [`score`]: the pure effective-priority computation and the work
//!   queue ordering built on it.
//! - [`alerts`]: the three-condition, three-level escalating alert
//!   matrix with per-episode fire-once memory.
//!
//! Both operate on plain snapshots of ticket state; neither consults a
//! clock or touches storage.

#![warn(missing_docs)]

pub mod alerts;
pub mod queue;
pub mod score;

pub use alerts::{
    recipients_for_level, Alert, AlertCondition, AlertConfigError, AlertEscalationMatrix,
    AlertMatrixConfig, AlertView, LevelThresholds, RecipientRole,
};
pub use queue::{order_queue, WorkQueueEntry};
pub use score::{PriorityScore, PriorityScorer, ScoreInputs};
