//! Smaller work items on a ticket
//!
//! A task either stands alone on the ticket or hangs off an envelope.
//! Envelope completion never auto-closes its tasks; each is finished
//! or cancelled on its own.

use crate::ids::{AgentId, EnvelopeId, TaskId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,
    /// Being worked
    InProgress,
    /// Terminal: finished
    Done,
    /// Terminal: abandoned
    Cancelled,
}

impl TaskStatus {
    /// Whether this state admits no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

/// Work item under a ticket, optionally scoped to an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier
    pub id: TaskId,
    /// Parent ticket
    pub ticket: TicketId,
    /// Owning envelope, `None` for standalone tasks
    pub envelope: Option<EnvelopeId>,
    /// What needs doing
    pub title: String,
    /// Who is doing it
    pub assignee: Option<AgentId>,
    /// State
    pub status: TaskStatus,
    /// Due instant
    pub due_at: Option<DateTime<Utc>>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Completion instant
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a standalone task
    #[must_use]
    pub fn new(ticket: TicketId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            ticket,
            envelope: None,
            title: title.into(),
            assignee: None,
            status: TaskStatus::Todo,
            due_at: None,
            created_at: now,
            completed_at: None,
        }
    }

    /// Scope to an envelope
    #[inline]
    #[must_use]
    pub fn under_envelope(mut self, envelope: EnvelopeId) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// With assignee
    #[inline]
    #[must_use]
    pub fn assigned_to(mut self, agent: AgentId) -> Self {
        self.assignee = Some(agent);
        self
    }

    /// With due instant
    #[inline]
    #[must_use]
    pub fn due(mut self, at: DateTime<Utc>) -> Self {
        self.due_at = Some(at);
        self
    }

    /// Whether the task is attached directly to the ticket
    #[inline]
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.envelope.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_vs_envelope_scoped() {
        let ticket = TicketId::new();
        let standalone = Task::new(ticket, "order part", Utc::now());
        assert!(standalone.is_standalone());

        let scoped = Task::new(ticket, "check logs", Utc::now()).under_envelope(EnvelopeId::new());
        assert!(!scoped.is_standalone());
    }
}
