//! Dynamic priority scoring.
//!
//! A ticket's effective priority is its static base score multiplied by
//! four independent urgency factors. Each factor is clamped to a fixed
//! range so a single dimension can never dominate the queue, and the
//! whole computation is a pure function of its inputs: the same
//! [`ScoreInputs`] always produces the same [`PriorityScore`].

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tow_model::{Priority, RequesterTier};

/// Upper clamp for the SLA proximity factor.
pub const SLA_FACTOR_MAX: f64 = 3.0;
/// Upper clamp for the requester tier factor.
pub const VIP_FACTOR_MAX: f64 = 1.5;
/// Upper clamp for the escalation factor.
pub const ESCALATION_FACTOR_MAX: f64 = 1.3;
/// Upper clamp for the staleness factor.
pub const STALENESS_FACTOR_MAX: f64 = 1.4;

/// Everything the scorer needs to know about one ticket, captured at a
/// single instant. The caller resolves clocks and ticket state into
/// durations; the scorer itself never consults a clock.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInputs {
    /// Static priority assigned at intake.
    pub priority: Priority,
    /// Time remaining until the SLA breach instant. `None` when the
    /// ticket carries no SLA; zero or negative when already breached.
    pub time_to_breach: Option<Duration>,
    /// Requester's service tier.
    pub requester_tier: RequesterTier,
    /// Number of parallel-assist envelopes currently active.
    pub active_envelopes: usize,
    /// Time since the owner last touched the ticket. `None` for a
    /// ticket that has never been owned.
    pub since_owner_update: Option<Duration>,
}

/// The score together with its full factor breakdown, so queue entries
/// can be explained as well as ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Base score from the static priority band.
    pub base: u32,
    /// SLA proximity multiplier, in `1.0..=3.0`.
    pub sla_factor: f64,
    /// Requester tier multiplier, in `1.0..=1.5`.
    pub vip_factor: f64,
    /// Active-envelope multiplier, in `1.0..=1.3`.
    pub escalation_factor: f64,
    /// Owner-inactivity multiplier, in `1.0..=1.4`.
    pub staleness_factor: f64,
    /// `base * sla * vip * escalation * staleness`.
    pub value: f64,
}

/// Stateless scorer. Exists as a type so the engine can hold one per
/// instance and future tuning knobs have a home.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    /// Creates a scorer with the standard factor tables.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Computes the effective score for one ticket.
    #[must_use]
    pub fn recalculate(&self, inputs: &ScoreInputs) -> PriorityScore {
        let base = inputs.priority.base_score();
        let sla_factor = sla_factor(inputs.time_to_breach);
        let vip_factor = vip_factor(inputs.requester_tier);
        let escalation_factor = escalation_factor(inputs.active_envelopes);
        let staleness_factor = staleness_factor(inputs.since_owner_update);
        let value =
            f64::from(base) * sla_factor * vip_factor * escalation_factor * staleness_factor;
        PriorityScore {
            base,
            sla_factor,
            vip_factor,
            escalation_factor,
            staleness_factor,
            value,
        }
    }
}

/// SLA proximity factor. Grows as the breach instant approaches and
/// saturates at [`SLA_FACTOR_MAX`] once breached.
#[must_use]
pub fn sla_factor(time_to_breach: Option<Duration>) -> f64 {
    let Some(remaining) = time_to_breach else {
        return 1.0;
    };
    let factor = if remaining <= Duration::zero() {
        SLA_FACTOR_MAX
    } else if remaining < Duration::hours(1) {
        2.5
    } else if remaining < Duration::hours(4) {
        2.0
    } else if remaining < Duration::hours(12) {
        1.7
    } else if remaining < Duration::hours(24) {
        1.3
    } else {
        1.0
    };
    factor.clamp(1.0, SLA_FACTOR_MAX)
}

/// Requester tier factor. VIP requesters get a flat multiplier; every
/// other tier scores neutrally.
#[inline]
#[must_use]
pub fn vip_factor(tier: RequesterTier) -> f64 {
    if tier.is_priority_tier() {
        VIP_FACTOR_MAX
    } else {
        1.0
    }
}

/// Escalation factor. Each active envelope adds a tenth, capped at
/// [`ESCALATION_FACTOR_MAX`].
#[inline]
#[must_use]
pub fn escalation_factor(active_envelopes: usize) -> f64 {
    let raw = 1.0 + 0.1 * active_envelopes as f64;
    raw.clamp(1.0, ESCALATION_FACTOR_MAX)
}

/// Staleness factor. Penalises tickets the owner has gone quiet on.
#[must_use]
pub fn staleness_factor(since_owner_update: Option<Duration>) -> f64 {
    let Some(idle) = since_owner_update else {
        return 1.0;
    };
    let factor = if idle > Duration::days(14) {
        STALENESS_FACTOR_MAX
    } else if idle > Duration::days(7) {
        1.3
    } else if idle > Duration::days(3) {
        1.2
    } else {
        1.0
    };
    factor.clamp(1.0, STALENESS_FACTOR_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(priority: Priority) -> ScoreInputs {
        ScoreInputs {
            priority,
            time_to_breach: None,
            requester_tier: RequesterTier::Standard,
            active_envelopes: 0,
            since_owner_update: None,
        }
    }

    #[test]
    fn neutral_inputs_score_at_base() {
        let scorer = PriorityScorer::new();
        let score = scorer.recalculate(&inputs(Priority::High));
        assert_eq!(score.base, 70);
        assert!((score.value - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn urgent_medium_outranks_quiet_high() {
        // Medium base 40 with a breached SLA (x2.0 band at <4h) and a
        // VIP requester comes out at 40 * 2.0 * 1.5 = 120, ahead of a
        // plain High at 70.
        let scorer = PriorityScorer::new();
        let medium = scorer.recalculate(&ScoreInputs {
            priority: Priority::Medium,
            time_to_breach: Some(Duration::hours(2)),
            requester_tier: RequesterTier::Vip,
            active_envelopes: 0,
            since_owner_update: None,
        });
        let high = scorer.recalculate(&inputs(Priority::High));
        assert!((medium.value - 120.0).abs() < 1e-9);
        assert!(medium.value > high.value);
    }

    #[test]
    fn breached_sla_saturates_at_three() {
        assert!((sla_factor(Some(Duration::hours(-5))) - 3.0).abs() < f64::EPSILON);
        assert!((sla_factor(Some(Duration::zero())) - 3.0).abs() < f64::EPSILON);
        assert!((sla_factor(Some(Duration::minutes(30))) - 2.5).abs() < f64::EPSILON);
        assert!((sla_factor(Some(Duration::hours(30))) - 1.0).abs() < f64::EPSILON);
        assert!((sla_factor(None) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn escalation_caps_at_one_point_three() {
        assert!((escalation_factor(0) - 1.0).abs() < f64::EPSILON);
        assert!((escalation_factor(2) - 1.2).abs() < 1e-9);
        assert!((escalation_factor(10) - 1.3).abs() < f64::EPSILON);
    }

    #[test]
    fn staleness_bands() {
        assert!((staleness_factor(Some(Duration::days(2))) - 1.0).abs() < f64::EPSILON);
        assert!((staleness_factor(Some(Duration::days(5))) - 1.2).abs() < f64::EPSILON);
        assert!((staleness_factor(Some(Duration::days(10))) - 1.3).abs() < f64::EPSILON);
        assert!((staleness_factor(Some(Duration::days(20))) - 1.4).abs() < f64::EPSILON);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_priority() -> impl Strategy<Value = Priority> {
            prop_oneof![
                Just(Priority::Critical),
                Just(Priority::High),
                Just(Priority::Medium),
                Just(Priority::Low),
            ]
        }

        fn arb_tier() -> impl Strategy<Value = RequesterTier> {
            prop_oneof![
                Just(RequesterTier::Standard),
                Just(RequesterTier::Premium),
                Just(RequesterTier::Vip),
            ]
        }

        fn arb_inputs() -> impl Strategy<Value = ScoreInputs> {
            (
                arb_priority(),
                proptest::option::of(-10_000i64..10_000),
                arb_tier(),
                0usize..32,
                proptest::option::of(0i64..40),
            )
                .prop_map(|(priority, breach_mins, tier, active, idle_days)| ScoreInputs {
                    priority,
                    time_to_breach: breach_mins.map(Duration::minutes),
                    requester_tier: tier,
                    active_envelopes: active,
                    since_owner_update: idle_days.map(Duration::days),
                })
        }

        proptest! {
            #[test]
            fn factors_stay_within_their_clamps(inputs in arb_inputs()) {
                let score = PriorityScorer::new().recalculate(&inputs);
                prop_assert!((1.0..=SLA_FACTOR_MAX).contains(&score.sla_factor));
                prop_assert!((1.0..=VIP_FACTOR_MAX).contains(&score.vip_factor));
                prop_assert!((1.0..=ESCALATION_FACTOR_MAX).contains(&score.escalation_factor));
                prop_assert!((1.0..=STALENESS_FACTOR_MAX).contains(&score.staleness_factor));
            }

            #[test]
            fn scoring_is_deterministic(inputs in arb_inputs()) {
                let scorer = PriorityScorer::new();
                prop_assert_eq!(scorer.recalculate(&inputs), scorer.recalculate(&inputs));
            }

            #[test]
            fn score_never_drops_below_base(inputs in arb_inputs()) {
                let score = PriorityScorer::new().recalculate(&inputs);
                prop_assert!(score.value >= f64::from(score.base) - 1e-9);
            }
        }
    }
}
