//! Parallel-assist envelopes
//!
//! An envelope brings an expert IN to help on a ticket without moving
//! ownership. Any number of envelopes may be active on one ticket at
//! the same time; the ticket's escalated flag is derived from that
//! count, never stored independently.

use crate::ids::{AgentId, EnvelopeId, TeamId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    /// Waiting for an expert to accept
    Pending,
    /// Expert working
    Active,
    /// Terminal: expert finished, summary posted
    Completed,
    /// Terminal: withdrawn before completion
    Cancelled,
}

impl EnvelopeStatus {
    /// Whether this state admits no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnvelopeStatus::Completed | EnvelopeStatus::Cancelled)
    }

    /// Whether this envelope counts toward the escalated flag
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, EnvelopeStatus::Pending | EnvelopeStatus::Active)
    }
}

/// Envelope transition rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeTransitionError {
    /// Envelope already completed or cancelled
    #[error("envelope is {state:?}; terminal states are final")]
    Terminal {
        /// The terminal state
        state: EnvelopeStatus,
    },
    /// Transition not in the table
    #[error("invalid envelope transition: {from:?} -> {to:?}")]
    Invalid {
        /// Current state
        from: EnvelopeStatus,
        /// Requested state
        to: EnvelopeStatus,
    },
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: EnvelopeStatus) -> &'static [EnvelopeStatus] {
    match from {
        EnvelopeStatus::Pending => &[EnvelopeStatus::Active, EnvelopeStatus::Cancelled],
        EnvelopeStatus::Active => &[EnvelopeStatus::Completed, EnvelopeStatus::Cancelled],
        EnvelopeStatus::Completed | EnvelopeStatus::Cancelled => &[],
    }
}

/// Validate a single envelope transition against the table
///
/// # Errors
/// - `EnvelopeTransitionError::Terminal` when `from` is final
/// - `EnvelopeTransitionError::Invalid` for any other off-table move
pub fn validate_transition(
    from: EnvelopeStatus,
    to: EnvelopeStatus,
) -> Result<(), EnvelopeTransitionError> {
    if from.is_terminal() {
        return Err(EnvelopeTransitionError::Terminal { state: from });
    }
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EnvelopeTransitionError::Invalid { from, to })
    }
}

/// Where a pending envelope is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeRouting {
    /// Any member of the team may accept (first wins)
    Team(TeamId),
    /// Only this agent may accept
    Agent(AgentId),
}

/// Parallel-assist sub-workflow on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope identifier
    pub id: EnvelopeId,
    /// Parent ticket
    pub ticket: TicketId,
    /// The ticket owner at creation time
    pub requested_by: AgentId,
    /// Routing target
    pub routing: EnvelopeRouting,
    /// Expert who accepted, set on accept
    pub assigned_to: Option<AgentId>,
    /// Lifecycle state
    pub status: EnvelopeStatus,
    /// Why help is needed, shown to the expert
    pub reason: String,
    /// Outcome summary, set on completion
    pub summary: Option<String>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Accept instant
    pub accepted_at: Option<DateTime<Utc>>,
    /// Completion or cancellation instant
    pub completed_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Create a pending envelope
    #[must_use]
    pub fn new(
        ticket: TicketId,
        requested_by: AgentId,
        routing: EnvelopeRouting,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnvelopeId::new(),
            ticket,
            requested_by,
            routing,
            assigned_to: None,
            status: EnvelopeStatus::Pending,
            reason: reason.into(),
            summary: None,
            created_at: now,
            accepted_at: None,
            completed_at: None,
        }
    }

    /// Whether `agent` may work the envelope thread (assigned expert)
    #[inline]
    #[must_use]
    pub fn is_assigned_to(&self, agent: AgentId) -> bool {
        self.assigned_to == Some(agent)
    }
}
