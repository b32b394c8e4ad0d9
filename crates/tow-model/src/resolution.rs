//! Resolutions, empowerment tiers, and calibration records
//!
//! A resolution documents what went wrong, why the customer is
//! eligible, and what was granted. Its tier and calibration status
//! are derived by the router; the submitter never sets them.

use crate::flag::CaseFlagType;
use crate::ids::{AgentId, CalibrationItemId, ResolutionId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What was granted to the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// Money back
    Refund,
    /// Account credit
    Credit,
    /// Replacement product
    Replacement,
    /// Repair arranged
    Repair,
    /// Information provided
    Information,
    /// Workaround provided
    Workaround,
    /// Nothing granted
    NoAction,
}

/// Root-cause classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCategory {
    /// Product defect
    Product,
    /// Service failure
    Service,
    /// Shipping or logistics
    Shipping,
    /// Billing mistake
    Billing,
    /// Anything else
    Other,
}

/// Entitlement classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityCategory {
    /// Covered by warranty
    Warranty,
    /// Goodwill gesture
    Goodwill,
    /// Covered by published policy
    Policy,
    /// Legally required
    LegalRequirement,
    /// Anything else
    Other,
}

/// Authorization level required for a resolution
///
/// Ordered: `Agent < TeamLead < Manager`, so a policy-forced minimum
/// tier composes with the amount-derived tier via `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EmpowermentTier {
    /// Within agent discretion, document only
    Agent,
    /// Needs team-lead approval
    TeamLead,
    /// Auto-saved and always calibrated
    Manager,
}

/// Review outcome of a calibration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Decision stands
    Upheld,
    /// Decision should have been different
    Revised,
    /// Decision stands but the agent needs coaching
    CoachingNeeded,
}

/// Where a resolution sits on its path to a terminal review outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// Agent-tier, no approval or review owed
    NotRequired,
    /// Waiting on team-lead approval
    PendingApproval,
    /// Team lead approved
    Approved,
    /// Sitting in the calibration queue
    Queued,
    /// Calibration finished with this outcome
    Reviewed(ReviewOutcome),
}

impl CalibrationStatus {
    /// Monotonic rank; status may only move to an equal or higher rank
    #[inline]
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            CalibrationStatus::NotRequired | CalibrationStatus::PendingApproval => 0,
            CalibrationStatus::Approved | CalibrationStatus::Queued => 1,
            CalibrationStatus::Reviewed(_) => 2,
        }
    }
}

/// Per-team monetary authorization thresholds
///
/// `tier1_limit < tier2_limit` is enforced at construction; an
/// `EmpowermentConfig` that violates it cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmpowermentConfig {
    tier1_limit: f64,
    tier2_limit: f64,
}

/// Rejected empowerment threshold configuration
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum EmpowermentConfigError {
    /// Limits must be strictly ordered
    #[error("tier1_limit ({tier1}) must be strictly below tier2_limit ({tier2})")]
    LimitsNotOrdered {
        /// Proposed agent-discretion limit
        tier1: f64,
        /// Proposed team-lead limit
        tier2: f64,
    },
    /// Limits must be non-negative and finite
    #[error("empowerment limits must be non-negative finite amounts")]
    InvalidAmount,
}

impl EmpowermentConfig {
    /// Build a validated configuration
    ///
    /// # Errors
    /// Rejects non-finite or negative limits and `tier1 >= tier2`.
    pub fn new(tier1_limit: f64, tier2_limit: f64) -> Result<Self, EmpowermentConfigError> {
        if !tier1_limit.is_finite() || !tier2_limit.is_finite() || tier1_limit < 0.0 {
            return Err(EmpowermentConfigError::InvalidAmount);
        }
        if tier1_limit >= tier2_limit {
            return Err(EmpowermentConfigError::LimitsNotOrdered {
                tier1: tier1_limit,
                tier2: tier2_limit,
            });
        }
        Ok(Self {
            tier1_limit,
            tier2_limit,
        })
    }

    /// Agent-discretion ceiling
    #[inline]
    #[must_use]
    pub fn tier1_limit(&self) -> f64 {
        self.tier1_limit
    }

    /// Team-lead ceiling
    #[inline]
    #[must_use]
    pub fn tier2_limit(&self) -> f64 {
        self.tier2_limit
    }

    /// Tier implied by a monetary amount
    #[inline]
    #[must_use]
    pub fn tier_for_amount(&self, amount: f64) -> EmpowermentTier {
        if amount <= self.tier1_limit {
            EmpowermentTier::Agent
        } else if amount <= self.tier2_limit {
            EmpowermentTier::TeamLead
        } else {
            EmpowermentTier::Manager
        }
    }
}

impl Default for EmpowermentConfig {
    /// EUR 100 agent discretion, EUR 500 team-lead ceiling
    fn default() -> Self {
        Self {
            tier1_limit: 100.0,
            tier2_limit: 500.0,
        }
    }
}

/// Compensation/resolution record on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolution identifier
    pub id: ResolutionId,
    /// Parent ticket
    pub ticket: TicketId,
    /// Submitting agent (the ticket owner)
    pub agent: AgentId,
    /// Root-cause narrative
    pub what_went_wrong: String,
    /// Root-cause classification
    pub fault_category: FaultCategory,
    /// Entitlement narrative
    pub why_eligible: String,
    /// Entitlement classification
    pub eligibility_category: EligibilityCategory,
    /// What was granted
    pub resolution_type: ResolutionType,
    /// Monetary amount in major currency units, if any
    pub amount: Option<f64>,
    /// ISO currency code
    pub currency: String,
    /// Derived authorization tier
    pub tier: EmpowermentTier,
    /// Approver, where the tier requires one
    pub approved_by: Option<AgentId>,
    /// Approval instant
    pub approved_at: Option<DateTime<Utc>>,
    /// Derived review-path status
    pub calibration_status: CalibrationStatus,
    /// Submission instant
    pub created_at: DateTime<Utc>,
}

/// Why a resolution landed in the calibration queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationReason {
    /// Manager-tier resolutions are always reviewed
    Tier3,
    /// Ticket carries a calibration-forcing flag
    Flagged(CaseFlagType),
    /// Ticket has a recorded complaint
    Complaint,
    /// Picked by the seeded random sample
    RandomSample,
}

impl CalibrationReason {
    /// Forced reasons always enter the queue; only `RandomSample` is optional
    #[inline]
    #[must_use]
    pub fn is_forced(&self) -> bool {
        !matches!(self, CalibrationReason::RandomSample)
    }
}

/// Review state of a calibration item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Awaiting review
    Pending,
    /// Review recorded
    Reviewed,
}

/// One queued review of a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationItem {
    /// Item identifier
    pub id: CalibrationItemId,
    /// Resolution under review
    pub resolution: ResolutionId,
    /// Why it is in the queue
    pub reason: CalibrationReason,
    /// Review state
    pub review_status: ReviewStatus,
    /// Recorded outcome
    pub outcome: Option<ReviewOutcome>,
    /// Reviewer notes
    pub notes: Option<String>,
    /// Who reviewed
    pub reviewed_by: Option<AgentId>,
    /// Review instant
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Enqueue instant
    pub created_at: DateTime<Utc>,
}

impl CalibrationItem {
    /// Create a pending item
    #[must_use]
    pub fn new(resolution: ResolutionId, reason: CalibrationReason, now: DateTime<Utc>) -> Self {
        Self {
            id: CalibrationItemId::new(),
            resolution,
            reason,
            review_status: ReviewStatus::Pending,
            outcome: None,
            notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        }
    }
}
