//! Amount-based empowerment routing.
//!
//! A submitted resolution lands in one of three empowerment tiers based
//! on its compensation amount against the owning team's thresholds.
//! Certain resolution types can be pinned to a minimum tier regardless
//! of amount; the effective tier is the higher of the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tow_model::{
    CalibrationStatus, EmpowermentConfig, EmpowermentTier, Resolution, ResolutionType,
};

/// Errors from resolution submission and approval.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    /// Approval was requested for a tier that never needs one.
    #[error("tier {tier:?} resolutions do not take an approval step")]
    ApprovalNotRequired {
        /// Tier the resolution actually routed to.
        tier: EmpowermentTier,
    },
    /// The resolution already left the pending-approval state.
    #[error("resolution already decided (status {status:?})")]
    AlreadyDecided {
        /// Status found on the resolution.
        status: CalibrationStatus,
    },
    /// Compensation amounts cannot be negative.
    #[error("compensation amount {amount} is negative")]
    NegativeAmount {
        /// Offending amount.
        amount: f64,
    },
}

/// What the engine should do with a resolution routed to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// Within the agent's own empowerment: save immediately.
    AutoApprove,
    /// Needs a team-lead sign-off before it takes effect.
    RequestApproval,
    /// Saved immediately, but unconditionally enqueued for calibration.
    ForceCalibration,
}

impl RoutingOutcome {
    /// Outcome mandated by a tier.
    #[inline]
    #[must_use]
    pub fn for_tier(tier: EmpowermentTier) -> Self {
        match tier {
            EmpowermentTier::Agent => RoutingOutcome::AutoApprove,
            EmpowermentTier::TeamLead => RoutingOutcome::RequestApproval,
            EmpowermentTier::Manager => RoutingOutcome::ForceCalibration,
        }
    }
}

/// Routing policy: per-type tier floors on top of the per-team
/// amount thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Resolution types pinned to a minimum tier irrespective of amount.
    pub forced_tiers: HashMap<ResolutionType, EmpowermentTier>,
    /// Thresholds used when an agent's team carries no override.
    pub default_empowerment: EmpowermentConfig,
}

/// Stateless router applying a [`RouterConfig`].
#[derive(Debug, Clone, Default)]
pub struct EmpowermentRouter {
    config: RouterConfig,
}

impl EmpowermentRouter {
    /// Creates a router over the given policy.
    #[inline]
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// Thresholds to use for a team-less agent.
    #[inline]
    #[must_use]
    pub fn default_empowerment(&self) -> &EmpowermentConfig {
        &self.config.default_empowerment
    }

    /// Determines the effective tier for a submission.
    ///
    /// `None` amounts (non-monetary resolutions) route by type floor
    /// alone, defaulting to the agent tier.
    pub fn tier_for(
        &self,
        empowerment: &EmpowermentConfig,
        resolution_type: ResolutionType,
        amount: Option<f64>,
    ) -> Result<EmpowermentTier, ResolutionError> {
        let amount_tier = match amount {
            Some(a) if a < 0.0 || a.is_nan() => {
                return Err(ResolutionError::NegativeAmount { amount: a })
            }
            Some(a) => empowerment.tier_for_amount(a),
            None => EmpowermentTier::Agent,
        };
        let floor = self
            .config
            .forced_tiers
            .get(&resolution_type)
            .copied()
            .unwrap_or(EmpowermentTier::Agent);
        Ok(amount_tier.max(floor))
    }

    /// Checks that a resolution may still be approved.
    pub fn validate_approval(resolution: &Resolution) -> Result<(), ResolutionError> {
        if resolution.tier != EmpowermentTier::TeamLead {
            return Err(ResolutionError::ApprovalNotRequired {
                tier: resolution.tier,
            });
        }
        if resolution.calibration_status != CalibrationStatus::PendingApproval {
            return Err(ResolutionError::AlreadyDecided {
                status: resolution.calibration_status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EmpowermentRouter {
        EmpowermentRouter::new(RouterConfig::default())
    }

    #[test]
    fn amounts_route_across_the_three_tiers() {
        let r = router();
        let cfg = EmpowermentConfig::default();
        let tier = |amount| {
            r.tier_for(&cfg, ResolutionType::Refund, Some(amount))
                .unwrap()
        };
        assert_eq!(tier(80.0), EmpowermentTier::Agent);
        assert_eq!(tier(100.0), EmpowermentTier::Agent);
        assert_eq!(tier(300.0), EmpowermentTier::TeamLead);
        assert_eq!(tier(500.0), EmpowermentTier::TeamLead);
        assert_eq!(tier(600.0), EmpowermentTier::Manager);
    }

    #[test]
    fn missing_amount_routes_to_agent_tier() {
        let r = router();
        let tier = r
            .tier_for(
                &EmpowermentConfig::default(),
                ResolutionType::Information,
                None,
            )
            .unwrap();
        assert_eq!(tier, EmpowermentTier::Agent);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = router()
            .tier_for(
                &EmpowermentConfig::default(),
                ResolutionType::Refund,
                Some(-5.0),
            )
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NegativeAmount { .. }));
    }

    #[test]
    fn type_floor_overrides_a_small_amount() {
        let mut config = RouterConfig::default();
        config
            .forced_tiers
            .insert(ResolutionType::Credit, EmpowermentTier::TeamLead);
        let r = EmpowermentRouter::new(config);
        let tier = r
            .tier_for(
                &EmpowermentConfig::default(),
                ResolutionType::Credit,
                Some(20.0),
            )
            .unwrap();
        assert_eq!(tier, EmpowermentTier::TeamLead);
        // The floor never lowers an amount-derived tier.
        let tier = r
            .tier_for(
                &EmpowermentConfig::default(),
                ResolutionType::Credit,
                Some(900.0),
            )
            .unwrap();
        assert_eq!(tier, EmpowermentTier::Manager);
    }

    #[test]
    fn tiers_map_to_their_outcomes() {
        assert_eq!(
            RoutingOutcome::for_tier(EmpowermentTier::Agent),
            RoutingOutcome::AutoApprove
        );
        assert_eq!(
            RoutingOutcome::for_tier(EmpowermentTier::TeamLead),
            RoutingOutcome::RequestApproval
        );
        assert_eq!(
            RoutingOutcome::for_tier(EmpowermentTier::Manager),
            RoutingOutcome::ForceCalibration
        );
    }
}
