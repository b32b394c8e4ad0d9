//! Work queue ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tow_model::TicketId;

use crate::score::PriorityScore;

/// One scored ticket in an agent's work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkQueueEntry {
    /// Ticket this entry ranks.
    pub ticket: TicketId,
    /// Intake timestamp, used as the tiebreaker.
    pub created_at: DateTime<Utc>,
    /// Score and its factor breakdown.
    pub score: PriorityScore,
}

/// Sorts entries by score descending; ties go to the older ticket.
pub fn order_queue(entries: &mut [WorkQueueEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .value
            .partial_cmp(&a.score.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
