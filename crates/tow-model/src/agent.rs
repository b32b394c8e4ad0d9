//! Agents and teams

use crate::ids::{AgentId, TeamId};
use crate::resolution::EmpowermentConfig;
use serde::{Deserialize, Serialize};

/// Concurrent-ticket capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    /// Tickets currently owned
    pub current: u32,
    /// Hard ceiling
    pub max: u32,
}

impl Capacity {
    /// Create capacity with a ceiling and nothing in flight
    #[inline]
    #[must_use]
    pub fn with_max(max: u32) -> Self {
        Self { current: 0, max }
    }

    /// Whether another ticket fits
    #[inline]
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.current < self.max
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::with_max(25)
    }
}

/// Support agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Agent identifier
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Team memberships
    pub teams: Vec<TeamId>,
    /// Skill tags (routing hints, not enforced here)
    pub skills: Vec<String>,
    /// Concurrent ticket capacity
    pub capacity: Capacity,
    /// Inactive agents cannot accept work
    pub is_active: bool,
}

impl Agent {
    /// Create an active agent with default capacity
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            teams: Vec::new(),
            skills: Vec::new(),
            capacity: Capacity::default(),
            is_active: true,
        }
    }

    /// With team membership
    #[inline]
    #[must_use]
    pub fn in_team(mut self, team: TeamId) -> Self {
        self.teams.push(team);
        self
    }

    /// With capacity ceiling
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, max: u32) -> Self {
        self.capacity = Capacity::with_max(max);
        self
    }

    /// Mark inactive
    #[inline]
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Whether this agent belongs to `team`
    #[inline]
    #[must_use]
    pub fn is_member_of(&self, team: TeamId) -> bool {
        self.teams.contains(&team)
    }
}

/// Agent team with its empowerment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Team identifier
    pub id: TeamId,
    /// Display name
    pub name: String,
    /// Team lead, receives level-2 alerts and approval requests
    pub supervisor: Option<AgentId>,
    /// Manager, receives level-3 alerts and flag notifications
    pub manager: Option<AgentId>,
    /// Monetary authorization thresholds
    pub empowerment: EmpowermentConfig,
}

impl Team {
    /// Create a team with the given empowerment thresholds
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, empowerment: EmpowermentConfig) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            supervisor: None,
            manager: None,
            empowerment,
        }
    }

    /// With supervisor
    #[inline]
    #[must_use]
    pub fn with_supervisor(mut self, supervisor: AgentId) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// With manager
    #[inline]
    #[must_use]
    pub fn with_manager(mut self, manager: AgentId) -> Self {
        self.manager = Some(manager);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_room() {
        let mut cap = Capacity::with_max(2);
        assert!(cap.has_room());
        cap.current = 2;
        assert!(!cap.has_room());
    }

    #[test]
    fn agent_team_membership() {
        let team = TeamId::new();
        let agent = Agent::new("sam").in_team(team);
        assert!(agent.is_member_of(team));
        assert!(!agent.is_member_of(TeamId::new()));
    }
}
