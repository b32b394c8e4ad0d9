//! Engine configuration.

use tow_empowerment::{RouterConfig, SamplerConfig};
use tow_model::TeamId;
use tow_scoring::AlertMatrixConfig;

/// What happens to the SLA clock while a ticket is escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlaDuringEscalation {
    /// The clock keeps running; escalation buys no SLA relief.
    #[default]
    Continue,
    /// Elapsed time while envelopes are active is excluded from the
    /// SLA proximity calculation.
    Pause,
}

/// Who, if anyone, may move a resolved ticket back to in-progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReopenPolicy {
    /// Resolved is terminal, full stop.
    #[default]
    Forbidden,
    /// Only system-level calls may reopen; agents never can.
    SystemOnly,
}

/// Tunable engine policy, built with `with_*` methods over sane
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Resolution routing policy.
    pub router: RouterConfig,
    /// Calibration sampling policy.
    pub sampler: SamplerConfig,
    /// Alert threshold ladders.
    pub alerts: AlertMatrixConfig,
    /// SLA behaviour under escalation.
    pub sla_during_escalation: SlaDuringEscalation,
    /// Reopen policy for resolved tickets.
    pub reopen: ReopenPolicy,
    /// Team that receives auto-spawned legal review envelopes. Without
    /// one, a legal flag degrades to a notification.
    pub legal_team: Option<TeamId>,
}

impl EngineConfig {
    /// Default policy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resolution routing policy.
    #[inline]
    #[must_use]
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    /// Sets the calibration sampling policy.
    #[inline]
    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Sets the alert threshold ladders.
    #[inline]
    #[must_use]
    pub fn with_alerts(mut self, alerts: AlertMatrixConfig) -> Self {
        self.alerts = alerts;
        self
    }

    /// Sets the SLA-under-escalation policy.
    #[inline]
    #[must_use]
    pub fn with_sla_during_escalation(mut self, policy: SlaDuringEscalation) -> Self {
        self.sla_during_escalation = policy;
        self
    }

    /// Sets the reopen policy.
    #[inline]
    #[must_use]
    pub fn with_reopen(mut self, policy: ReopenPolicy) -> Self {
        self.reopen = policy;
        self
    }

    /// Sets the legal review team.
    #[inline]
    #[must_use]
    pub fn with_legal_team(mut self, team: TeamId) -> Self {
        self.legal_team = Some(team);
        self
    }
}
