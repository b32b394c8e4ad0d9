//! Ticket entity and lifecycle states
//!
//! The ticket state machine is deliberately small: `new`,
//! `in_progress`, `resolved`. Escalation is NOT a state; it is a
//! derived flag (any envelope currently active) so a ticket never
//! loses its in-progress standing while experts are assisting.

use crate::ids::{AgentId, ContactId, TeamId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    /// Something is broken
    Incident,
    /// Customer wants something
    Request,
    /// Planned change
    Change,
    /// Underlying cause investigation
    Problem,
}

/// Ticket lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Created, no owner yet
    New,
    /// Owner accepted, work underway
    InProgress,
    /// Terminal
    Resolved,
}

impl TicketStatus {
    /// Whether this state admits no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved)
    }
}

/// Ticket transition rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TicketTransitionError {
    /// Ticket already resolved
    #[error("ticket is resolved; no further transitions permitted")]
    Terminal,
    /// Transition not in the table
    #[error("invalid ticket transition: {from:?} -> {to:?}")]
    Invalid {
        /// Current state
        from: TicketStatus,
        /// Requested state
        to: TicketStatus,
    },
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: TicketStatus) -> &'static [TicketStatus] {
    match from {
        TicketStatus::New => &[TicketStatus::InProgress],
        TicketStatus::InProgress => &[TicketStatus::Resolved],
        TicketStatus::Resolved => &[],
    }
}

/// Validate a single ticket transition against the table
///
/// # Errors
/// - `TicketTransitionError::Terminal` when `from` is resolved
/// - `TicketTransitionError::Invalid` for any other off-table move
pub fn validate_transition(
    from: TicketStatus,
    to: TicketStatus,
) -> Result<(), TicketTransitionError> {
    if from.is_terminal() {
        return Err(TicketTransitionError::Terminal);
    }
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TicketTransitionError::Invalid { from, to })
    }
}

/// Base severity, fixed at creation (dynamic urgency lives in scoring)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Base score 100
    Critical,
    /// Base score 70
    High,
    /// Base score 40
    Medium,
    /// Base score 10
    Low,
}

impl Priority {
    /// Fixed base score for this severity
    #[inline]
    #[must_use]
    pub fn base_score(&self) -> u32 {
        match self {
            Priority::Critical => 100,
            Priority::High => 70,
            Priority::Medium => 40,
            Priority::Low => 10,
        }
    }
}

/// Requester standing, drives the VIP scoring factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterTier {
    /// No uplift
    Standard,
    /// Uplifted per policy
    Premium,
    /// Uplifted per policy
    Vip,
}

impl RequesterTier {
    /// Whether this tier gets the VIP priority uplift
    #[inline]
    #[must_use]
    pub fn is_priority_tier(&self) -> bool {
        matches!(self, RequesterTier::Premium | RequesterTier::Vip)
    }
}

/// Customer who raised the ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact identifier
    pub id: ContactId,
    /// Email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Service tier
    pub tier: RequesterTier,
}

impl Contact {
    /// Create a standard-tier contact
    #[inline]
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ContactId::new(),
            email: email.into(),
            name: name.into(),
            tier: RequesterTier::Standard,
        }
    }

    /// With service tier
    #[inline]
    #[must_use]
    pub fn with_tier(mut self, tier: RequesterTier) -> Self {
        self.tier = tier;
        self
    }
}

/// The core ticket entity
///
/// `owner` is set at most once, on accept. Nothing in the normal
/// operation surface clears or replaces it; the only exception is the
/// allow-listed administrative transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Human-readable reference, e.g. INC-2024-001234
    pub reference: String,
    /// Short description
    pub subject: String,
    /// Classification
    pub ticket_type: TicketType,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Base severity
    pub priority: Priority,
    /// Who raised it
    pub requester: ContactId,
    /// Owning team (queue the ticket arrived on)
    pub team: Option<TeamId>,
    /// Immutable-after-accept owner
    pub owner: Option<AgentId>,
    /// When ownership was established
    pub owner_accepted_at: Option<DateTime<Utc>>,
    /// SLA clock start
    pub sla_started_at: DateTime<Utc>,
    /// SLA breach deadline, if an SLA applies
    pub sla_breach_at: Option<DateTime<Utc>>,
    /// A formal complaint has been recorded on this ticket
    pub complaint_recorded: bool,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last mutation instant
    pub updated_at: DateTime<Utc>,
    /// Last update authored by the owner (staleness input)
    pub last_owner_update_at: Option<DateTime<Utc>>,
    /// First outbound response to the requester
    pub first_response_at: Option<DateTime<Utc>>,
    /// Resolution instant
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a new ticket in `new`
    #[must_use]
    pub fn new(
        reference: impl Into<String>,
        subject: impl Into<String>,
        requester: ContactId,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            reference: reference.into(),
            subject: subject.into(),
            ticket_type: TicketType::Incident,
            status: TicketStatus::New,
            priority,
            requester,
            team: None,
            owner: None,
            owner_accepted_at: None,
            sla_started_at: now,
            sla_breach_at: None,
            complaint_recorded: false,
            created_at: now,
            updated_at: now,
            last_owner_update_at: None,
            first_response_at: None,
            resolved_at: None,
        }
    }

    /// With ticket type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, ticket_type: TicketType) -> Self {
        self.ticket_type = ticket_type;
        self
    }

    /// With owning team
    #[inline]
    #[must_use]
    pub fn with_team(mut self, team: TeamId) -> Self {
        self.team = Some(team);
        self
    }

    /// With SLA breach deadline
    #[inline]
    #[must_use]
    pub fn with_sla_breach_at(mut self, breach_at: DateTime<Utc>) -> Self {
        self.sla_breach_at = Some(breach_at);
        self
    }

    /// Whether ownership has been established
    #[inline]
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }
}
