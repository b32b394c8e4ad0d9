//! Engine error taxonomy.
//!
//! Each concern carries its own error enum; [`EngineError`] aggregates
//! them at the facade so callers match on one type. [`ErrorKind`]
//! classifies every error into the handful of categories transports
//! and tests care about.

use thiserror::Error;
use tow_empowerment::{CalibrationError, ResolutionError};
use tow_model::{
    AgentId, ContactId, EmpowermentConfigError, EnvelopeId, EnvelopeTransitionError, ResolutionId,
    TaskId, TeamId, TicketId, TicketTransitionError,
};

/// Ownership invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The ticket already has an owner; ownership is set at most once.
    #[error("ticket {ticket} is already owned by agent {owner}")]
    AlreadyOwned {
        /// Ticket whose ownership was contested.
        ticket: TicketId,
        /// The standing owner.
        owner: AgentId,
    },
    /// Inactive agents cannot accept work.
    #[error("agent {agent} is inactive and cannot accept tickets")]
    AgentInactive {
        /// The inactive agent.
        agent: AgentId,
    },
    /// The agent's concurrent-ticket ceiling is full.
    #[error("agent {agent} is at capacity ({current}/{max})")]
    AgentAtCapacity {
        /// The saturated agent.
        agent: AgentId,
        /// Tickets currently owned.
        current: u32,
        /// Capacity ceiling.
        max: u32,
    },
    /// The caller is not the ticket's owner.
    #[error("agent {agent} is not the owner of ticket {ticket} (required to {action})")]
    NotOwner {
        /// Ticket in question.
        ticket: TicketId,
        /// The agent that tried.
        agent: AgentId,
        /// What they tried to do.
        action: &'static str,
    },
    /// The ticket has no owner yet.
    #[error("ticket {ticket} has no owner")]
    NotOwned {
        /// The ownerless ticket.
        ticket: TicketId,
    },
    /// Transfer reasons form a closed allow-list.
    #[error("ownership transfer rejected: {reason:?} is not a permitted reason")]
    TransferNotPermitted {
        /// The literal reason that was offered.
        reason: String,
    },
}

/// Envelope coordination failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Transition table violation.
    #[error(transparent)]
    InvalidTransition(#[from] EnvelopeTransitionError),
    /// Acceptor does not match the envelope's routing target.
    #[error("agent {agent} does not match the routing of envelope {envelope}")]
    RoutingMismatch {
        /// Envelope being accepted.
        envelope: EnvelopeId,
        /// Agent that tried to accept.
        agent: AgentId,
    },
    /// Caller is neither the ticket owner nor the assigned expert.
    #[error("agent {agent} is not a participant of envelope {envelope}")]
    NotParticipant {
        /// Envelope in question.
        envelope: EnvelopeId,
        /// The outsider.
        agent: AgentId,
    },
    /// The envelope thread is closed to further activity.
    #[error("envelope {envelope} is closed")]
    Closed {
        /// The terminal envelope.
        envelope: EnvelopeId,
    },
}

/// Ticket lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Transition table violation.
    #[error(transparent)]
    InvalidTransition(#[from] TicketTransitionError),
    /// Resolution is blocked while envelopes remain open.
    #[error("ticket {ticket} still has {count} open envelope(s)")]
    OpenEnvelopes {
        /// Ticket being resolved.
        ticket: TicketId,
        /// Pending plus active envelopes.
        count: usize,
    },
    /// Reopening is disabled by policy.
    #[error("ticket {ticket} is resolved and the reopen policy forbids reopening")]
    ReopenForbidden {
        /// The resolved ticket.
        ticket: TicketId,
    },
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Ownership rule violation.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    /// Envelope rule violation.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// Lifecycle rule violation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Resolution routing or approval violation.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// Calibration queue violation.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    /// Invalid empowerment thresholds.
    #[error(transparent)]
    Config(#[from] EmpowermentConfigError),
    /// Unknown ticket.
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),
    /// Unknown agent.
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),
    /// Unknown team.
    #[error("team {0} not found")]
    TeamNotFound(TeamId),
    /// Unknown contact.
    #[error("contact {0} not found")]
    ContactNotFound(ContactId),
    /// Unknown envelope.
    #[error("envelope {0} not found")]
    EnvelopeNotFound(EnvelopeId),
    /// Unknown task.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    /// The task already reached a terminal state.
    #[error("task {0} is closed")]
    TaskClosed(TaskId),
    /// Unknown resolution.
    #[error("resolution {0} not found")]
    ResolutionNotFound(ResolutionId),
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A structural invariant would have been broken.
    InvariantViolation,
    /// A state-machine transition outside the table.
    InvalidTransition,
    /// The caller lacked the role the operation demands.
    AuthorizationBoundary,
    /// Valid request, rejected by configured policy.
    PolicyRejection,
    /// A referenced entity does not exist.
    NotFound,
}

impl EngineError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Ownership(e) => match e {
                OwnershipError::AlreadyOwned { .. } | OwnershipError::NotOwned { .. } => {
                    ErrorKind::InvariantViolation
                }
                OwnershipError::NotOwner { .. } => ErrorKind::AuthorizationBoundary,
                OwnershipError::AgentInactive { .. }
                | OwnershipError::AgentAtCapacity { .. }
                | OwnershipError::TransferNotPermitted { .. } => ErrorKind::PolicyRejection,
            },
            EngineError::Envelope(e) => match e {
                EnvelopeError::InvalidTransition(_) | EnvelopeError::Closed { .. } => {
                    ErrorKind::InvalidTransition
                }
                EnvelopeError::RoutingMismatch { .. } | EnvelopeError::NotParticipant { .. } => {
                    ErrorKind::AuthorizationBoundary
                }
            },
            EngineError::Lifecycle(e) => match e {
                LifecycleError::InvalidTransition(_) => ErrorKind::InvalidTransition,
                LifecycleError::OpenEnvelopes { .. } => ErrorKind::InvariantViolation,
                LifecycleError::ReopenForbidden { .. } => ErrorKind::PolicyRejection,
            },
            EngineError::Resolution(e) => match e {
                ResolutionError::ApprovalNotRequired { .. }
                | ResolutionError::AlreadyDecided { .. } => ErrorKind::InvalidTransition,
                ResolutionError::NegativeAmount { .. } => ErrorKind::PolicyRejection,
            },
            EngineError::Calibration(e) => match e {
                CalibrationError::AlreadyReviewed(_) => ErrorKind::InvalidTransition,
                CalibrationError::ItemNotFound(_) => ErrorKind::NotFound,
            },
            EngineError::Config(_) => ErrorKind::PolicyRejection,
            EngineError::TaskClosed(_) => ErrorKind::InvalidTransition,
            EngineError::TicketNotFound(_)
            | EngineError::AgentNotFound(_)
            | EngineError::TeamNotFound(_)
            | EngineError::ContactNotFound(_)
            | EngineError::EnvelopeNotFound(_)
            | EngineError::TaskNotFound(_)
            | EngineError::ResolutionNotFound(_) => ErrorKind::NotFound,
        }
    }
}
