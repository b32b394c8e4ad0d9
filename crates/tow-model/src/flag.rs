//! Case flags

use crate::ids::{AgentId, FlagId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Special-handling markers attached to a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFlagType {
    /// Damaged goods or property involved
    PhysicalDamage,
    /// Public reputation exposure
    SocialMedia,
    /// VIP requester
    Vip,
    /// Legal exposure
    Legal,
    /// Requester has contacted repeatedly about the same issue
    RepeatContact,
}

impl CaseFlagType {
    /// Flags that force a resolution into the calibration queue
    #[inline]
    #[must_use]
    pub fn forces_calibration(&self) -> bool {
        matches!(
            self,
            CaseFlagType::PhysicalDamage | CaseFlagType::SocialMedia | CaseFlagType::Legal
        )
    }
}

/// Flag instance on a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFlag {
    /// Flag identifier
    pub id: FlagId,
    /// Parent ticket
    pub ticket: TicketId,
    /// Flag type
    pub flag_type: CaseFlagType,
    /// Agent who raised it
    pub added_by: AgentId,
    /// Why it was raised
    pub reason: String,
    /// Raise instant
    pub created_at: DateTime<Utc>,
}

impl CaseFlag {
    /// Create a flag
    #[must_use]
    pub fn new(
        ticket: TicketId,
        flag_type: CaseFlagType,
        added_by: AgentId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: FlagId::new(),
            ticket,
            flag_type,
            added_by,
            reason: reason.into(),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_forcing_flags() {
        assert!(CaseFlagType::PhysicalDamage.forces_calibration());
        assert!(CaseFlagType::SocialMedia.forces_calibration());
        assert!(CaseFlagType::Legal.forces_calibration());
        assert!(!CaseFlagType::Vip.forces_calibration());
        assert!(!CaseFlagType::RepeatContact.forces_calibration());
    }
}
