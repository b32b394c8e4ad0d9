//! Ticket lifecycle.
//!
//! Tickets walk a three-state machine: `new` -> `in_progress` ->
//! `resolved`. Resolved is terminal for agents; whether a system-level
//! caller may reopen is a policy decision, not a state-machine one.

use std::sync::Arc;

use tow_model::ticket::validate_transition;
use tow_model::{AgentId, Clock, EntryDraft, EntryKind, Ticket, TicketId, TicketStatus};

use crate::config::ReopenPolicy;
use crate::error::{EngineError, LifecycleError};
use crate::ownership::OwnershipGuard;
use crate::store::WorkflowStore;

/// Drives ticket state transitions.
#[derive(Debug, Clone)]
pub struct TicketLifecycle {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
    reopen_policy: ReopenPolicy,
}

impl TicketLifecycle {
    /// Creates a lifecycle driver with the given reopen policy.
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, clock: Arc<dyn Clock>, reopen_policy: ReopenPolicy) -> Self {
        Self {
            store,
            clock,
            reopen_policy,
        }
    }

    /// Owner resolves the ticket. Blocked while any envelope is still
    /// pending or active: outstanding expert work must be concluded or
    /// cancelled first.
    pub fn resolve(&self, ticket: TicketId, agent: AgentId) -> Result<Ticket, EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        OwnershipGuard::require_owner(&cell.ticket, agent, "resolve the ticket")?;
        validate_transition(cell.ticket.status, TicketStatus::Resolved)
            .map_err(LifecycleError::from)?;
        let open = cell.open_envelope_count();
        if open > 0 {
            return Err(LifecycleError::OpenEnvelopes { ticket, count: open }.into());
        }
        let now = self.clock.now();
        cell.ticket.status = TicketStatus::Resolved;
        cell.ticket.resolved_at = Some(now);
        cell.ticket.updated_at = now;
        cell.ticket.last_owner_update_at = Some(now);
        cell.log.append(
            EntryDraft::system(EntryKind::StatusChange, "ticket resolved"),
            now,
        );
        // Resolution frees the owner's capacity slot; ownership of the
        // record itself is permanent.
        let _ = self.store.with_agent_mut(agent, |a| {
            a.capacity.current = a.capacity.current.saturating_sub(1);
        });
        tracing::info!(ticket = %ticket, agent = %agent, "ticket resolved");
        Ok(cell.ticket.clone())
    }

    /// System-level reopen. Agents have no path here; whether the
    /// system itself does depends on the configured policy.
    pub fn reopen(&self, ticket: TicketId) -> Result<Ticket, EngineError> {
        if self.reopen_policy == ReopenPolicy::Forbidden {
            return Err(LifecycleError::ReopenForbidden { ticket }.into());
        }
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        if cell.ticket.status != TicketStatus::Resolved {
            return Err(LifecycleError::InvalidTransition(
                tow_model::TicketTransitionError::Invalid {
                    from: cell.ticket.status,
                    to: TicketStatus::InProgress,
                },
            )
            .into());
        }
        let now = self.clock.now();
        cell.ticket.status = TicketStatus::InProgress;
        cell.ticket.resolved_at = None;
        cell.ticket.updated_at = now;
        cell.log.append(
            EntryDraft::system(EntryKind::StatusChange, "ticket reopened by system"),
            now,
        );
        if let Some(owner) = cell.ticket.owner {
            let _ = self.store.with_agent_mut(owner, |a| {
                a.capacity.current += 1;
            });
        }
        tracing::warn!(ticket = %ticket, "ticket reopened");
        Ok(cell.ticket.clone())
    }
}
