//! Escalating alert matrix.
//!
//! Three monitored conditions, three severity levels each. Thresholds
//! within a condition are strictly increasing, so a level-3 breach
//! always implies levels 1 and 2 breached as well. Recipients are
//! cumulative by level. Each (ticket, condition, level) fires at most
//! once per breach episode; resolving the underlying condition resets
//! the episode so a later recurrence alerts again.

use chrono::Duration;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tow_model::TicketId;

/// Conditions the matrix watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    /// No owner has accepted the ticket.
    NotAssigned,
    /// The ticket has not been touched.
    NotUpdated,
    /// The ticket has not reached resolution.
    NotCompleted,
}

impl AlertCondition {
    /// All conditions, in evaluation order.
    pub const ALL: [AlertCondition; 3] = [
        AlertCondition::NotAssigned,
        AlertCondition::NotUpdated,
        AlertCondition::NotCompleted,
    ];
}

/// Who an alert goes to. Level 1 reaches the tech, level 2 adds the
/// supervisor, level 3 adds the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    /// The owning agent (or the team on an unassigned ticket).
    Tech,
    /// The team supervisor.
    Supervisor,
    /// The team manager.
    Manager,
}

/// Cumulative recipient set for a severity level.
#[must_use]
pub fn recipients_for_level(level: u8) -> &'static [RecipientRole] {
    match level {
        1 => &[RecipientRole::Tech],
        2 => &[RecipientRole::Tech, RecipientRole::Supervisor],
        _ => &[
            RecipientRole::Tech,
            RecipientRole::Supervisor,
            RecipientRole::Manager,
        ],
    }
}

/// Rejected matrix configurations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertConfigError {
    /// Thresholds for a condition must be strictly increasing by level.
    #[error("{condition:?} thresholds must strictly increase per level")]
    NonMonotonicThresholds {
        /// Condition whose ladder is malformed.
        condition: AlertCondition,
    },
}

/// A strictly increasing three-level threshold ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThresholds {
    level1: Duration,
    level2: Duration,
    level3: Duration,
}

impl LevelThresholds {
    /// Builds a ladder, rejecting any non-increasing step.
    pub fn new(
        condition: AlertCondition,
        level1: Duration,
        level2: Duration,
        level3: Duration,
    ) -> Result<Self, AlertConfigError> {
        if level1 < level2 && level2 < level3 {
            Ok(Self {
                level1,
                level2,
                level3,
            })
        } else {
            Err(AlertConfigError::NonMonotonicThresholds { condition })
        }
    }

    /// Threshold for a given level (levels above 3 use the top rung).
    #[must_use]
    pub fn for_level(&self, level: u8) -> Duration {
        match level {
            1 => self.level1,
            2 => self.level2,
            _ => self.level3,
        }
    }

    /// Highest level whose threshold `elapsed` has crossed (0 if none).
    /// Monotonic ladders make the breached set nested by construction.
    #[must_use]
    pub fn breached_level(&self, elapsed: Duration) -> u8 {
        if elapsed >= self.level3 {
            3
        } else if elapsed >= self.level2 {
            2
        } else if elapsed >= self.level1 {
            1
        } else {
            0
        }
    }
}

/// Threshold ladders for the three conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertMatrixConfig {
    /// Ladder for [`AlertCondition::NotAssigned`], measured from intake.
    pub not_assigned: LevelThresholds,
    /// Ladder for [`AlertCondition::NotUpdated`], measured from the last touch.
    pub not_updated: LevelThresholds,
    /// Ladder for [`AlertCondition::NotCompleted`], measured from SLA start.
    pub not_completed: LevelThresholds,
}

impl AlertMatrixConfig {
    /// Ladder for one condition.
    #[must_use]
    pub fn thresholds(&self, condition: AlertCondition) -> LevelThresholds {
        match condition {
            AlertCondition::NotAssigned => self.not_assigned,
            AlertCondition::NotUpdated => self.not_updated,
            AlertCondition::NotCompleted => self.not_completed,
        }
    }
}

impl Default for AlertMatrixConfig {
    fn default() -> Self {
        // Unwraps are safe: the built-in ladders are strictly increasing.
        Self {
            not_assigned: LevelThresholds::new(
                AlertCondition::NotAssigned,
                Duration::minutes(30),
                Duration::hours(2),
                Duration::hours(8),
            )
            .unwrap(),
            not_updated: LevelThresholds::new(
                AlertCondition::NotUpdated,
                Duration::hours(24),
                Duration::hours(48),
                Duration::hours(96),
            )
            .unwrap(),
            not_completed: LevelThresholds::new(
                AlertCondition::NotCompleted,
                Duration::hours(24),
                Duration::hours(72),
                Duration::hours(168),
            )
            .unwrap(),
        }
    }
}

/// What the matrix needs to know about one ticket at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertView {
    /// Ticket under evaluation.
    pub ticket: TicketId,
    /// Whether an owner has accepted.
    pub owned: bool,
    /// Whether the ticket has reached resolution.
    pub resolved: bool,
    /// Elapsed since intake.
    pub since_created: Duration,
    /// Elapsed since the last update of any kind.
    pub since_update: Duration,
    /// Elapsed since the SLA clock started.
    pub since_sla_start: Duration,
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Ticket that breached.
    pub ticket: TicketId,
    /// Which condition breached.
    pub condition: AlertCondition,
    /// Severity level, 1 to 3.
    pub level: u8,
    /// Cumulative recipients for that level.
    pub recipients: Vec<RecipientRole>,
}

/// The matrix itself: validated thresholds plus the per-episode memory
/// of which (ticket, condition, level) triples have already fired.
#[derive(Debug)]
pub struct AlertEscalationMatrix {
    config: AlertMatrixConfig,
    fired: DashSet<(TicketId, AlertCondition, u8)>,
}

impl AlertEscalationMatrix {
    /// Creates a matrix over a validated configuration.
    #[must_use]
    pub fn new(config: AlertMatrixConfig) -> Self {
        Self {
            config,
            fired: DashSet::new(),
        }
    }

    /// Evaluates one ticket and returns the alerts that fire now.
    ///
    /// A condition that no longer applies (the ticket got an owner, was
    /// updated, or was resolved) has its episode memory cleared, so a
    /// later recurrence raises fresh alerts.
    pub fn evaluate(&self, view: &AlertView) -> Vec<Alert> {
        let mut raised = Vec::new();
        for condition in AlertCondition::ALL {
            let elapsed = match condition {
                AlertCondition::NotAssigned => (!view.owned).then_some(view.since_created),
                AlertCondition::NotUpdated => (!view.resolved).then_some(view.since_update),
                AlertCondition::NotCompleted => (!view.resolved).then_some(view.since_sla_start),
            };
            let breached = elapsed
                .map(|e| self.config.thresholds(condition).breached_level(e))
                .unwrap_or(0);
            for level in 1..=3u8 {
                let key = (view.ticket, condition, level);
                if level <= breached {
                    if self.fired.insert(key) {
                        tracing::warn!(
                            ticket = %view.ticket,
                            ?condition,
                            level,
                            "alert threshold breached"
                        );
                        raised.push(Alert {
                            ticket: view.ticket,
                            condition,
                            level,
                            recipients: recipients_for_level(level).to_vec(),
                        });
                    }
                } else {
                    // Below threshold (or condition cleared): the
                    // breach episode for this level is over.
                    self.fired.remove(&key);
                }
            }
        }
        raised
    }

    /// Drops all episode memory for a ticket, e.g. after resolution.
    pub fn forget(&self, ticket: TicketId) {
        self.fired.retain(|(t, _, _)| *t != ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(ticket: TicketId, owned: bool, since_created: Duration) -> AlertView {
        AlertView {
            ticket,
            owned,
            resolved: false,
            since_created,
            since_update: Duration::zero(),
            since_sla_start: Duration::zero(),
        }
    }

    #[test]
    fn rejects_non_monotonic_ladder() {
        let err = LevelThresholds::new(
            AlertCondition::NotUpdated,
            Duration::hours(4),
            Duration::hours(4),
            Duration::hours(8),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AlertConfigError::NonMonotonicThresholds {
                condition: AlertCondition::NotUpdated
            }
        ));
    }

    #[test]
    fn level_three_breach_implies_lower_levels() {
        let matrix = AlertEscalationMatrix::new(AlertMatrixConfig::default());
        let ticket = TicketId::new();
        let alerts = matrix.evaluate(&view(ticket, false, Duration::hours(9)));
        let levels: Vec<u8> = alerts
            .iter()
            .filter(|a| a.condition == AlertCondition::NotAssigned)
            .map(|a| a.level)
            .collect();
        assert_eq!(levels, vec![1, 2, 3]);
    }

    #[test]
    fn recipients_are_cumulative() {
        assert_eq!(recipients_for_level(1), &[RecipientRole::Tech]);
        assert_eq!(
            recipients_for_level(2),
            &[RecipientRole::Tech, RecipientRole::Supervisor]
        );
        assert_eq!(recipients_for_level(3).len(), 3);
    }

    #[test]
    fn each_level_fires_once_per_episode() {
        let matrix = AlertEscalationMatrix::new(AlertMatrixConfig::default());
        let ticket = TicketId::new();
        let first = matrix.evaluate(&view(ticket, false, Duration::hours(1)));
        assert_eq!(first.len(), 1);
        // Same breach, second sweep: silent.
        let second = matrix.evaluate(&view(ticket, false, Duration::hours(1)));
        assert!(second.is_empty());
    }

    #[test]
    fn cleared_condition_resets_the_episode() {
        let matrix = AlertEscalationMatrix::new(AlertMatrixConfig::default());
        let ticket = TicketId::new();
        assert_eq!(
            matrix
                .evaluate(&view(ticket, false, Duration::hours(1)))
                .len(),
            1
        );
        // Ticket gains an owner: condition clears, memory resets.
        assert!(matrix
            .evaluate(&view(ticket, true, Duration::hours(1)))
            .iter()
            .all(|a| a.condition != AlertCondition::NotAssigned));
        // Owner drops off again later (transfer window): fires anew.
        assert_eq!(
            matrix
                .evaluate(&view(ticket, false, Duration::hours(1)))
                .len(),
            1
        );
    }

    #[test]
    fn resolved_ticket_raises_nothing() {
        let matrix = AlertEscalationMatrix::new(AlertMatrixConfig::default());
        let alerts = matrix.evaluate(&AlertView {
            ticket: TicketId::new(),
            owned: true,
            resolved: true,
            since_created: Duration::days(30),
            since_update: Duration::days(30),
            since_sla_start: Duration::days(30),
        });
        assert!(alerts.is_empty());
    }
}
