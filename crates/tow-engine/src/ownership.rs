//! Ownership guard.
//!
//! Ownership is set at most once for a ticket's lifetime. The only way
//! a ticket changes hands afterwards is an administrative transfer
//! with a reason from a closed allow-list. There is no release, no
//! reassignment, no workload rebalancing.

use std::str::FromStr;
use std::sync::Arc;

use tow_model::ticket::validate_transition;
use tow_model::{AgentId, Clock, EntryDraft, EntryKind, Ticket, TicketId, TicketStatus};

use crate::error::{EngineError, LifecycleError, OwnershipError};
use crate::store::WorkflowStore;

/// Permitted grounds for an administrative ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferReason {
    /// The owner left the organisation.
    AgentTerminated,
    /// The owner is on extended leave.
    AgentOnExtendedLeave,
}

impl TransferReason {
    /// Canonical wire form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferReason::AgentTerminated => "agent_terminated",
            TransferReason::AgentOnExtendedLeave => "agent_on_extended_leave",
        }
    }
}

impl FromStr for TransferReason {
    type Err = OwnershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent_terminated" => Ok(TransferReason::AgentTerminated),
            "agent_on_extended_leave" => Ok(TransferReason::AgentOnExtendedLeave),
            other => Err(OwnershipError::TransferNotPermitted {
                reason: other.to_string(),
            }),
        }
    }
}

/// Enforces the single-owner invariant.
#[derive(Debug, Clone)]
pub struct OwnershipGuard {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
}

impl OwnershipGuard {
    /// Creates a guard over the shared store.
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Agent explicitly accepts a ticket, becoming its owner for life.
    ///
    /// Fails if the ticket is already owned, the agent is inactive or
    /// at capacity, or the ticket has left `new`. Under concurrent
    /// accepts exactly one caller wins; the rest observe
    /// [`OwnershipError::AlreadyOwned`].
    pub fn accept(&self, ticket: TicketId, agent: AgentId) -> Result<Ticket, EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        if let Some(owner) = cell.ticket.owner {
            return Err(OwnershipError::AlreadyOwned { ticket, owner }.into());
        }
        validate_transition(cell.ticket.status, TicketStatus::InProgress)
            .map_err(crate::error::LifecycleError::from)?;
        // Capacity is checked and consumed under the agent entry while
        // the cell lock is held, so two accepts by the same agent
        // cannot both squeeze into the last slot.
        let name = self.store.with_agent_mut(agent, |a| {
            if !a.is_active {
                return Err(OwnershipError::AgentInactive { agent });
            }
            if !a.capacity.has_room() {
                return Err(OwnershipError::AgentAtCapacity {
                    agent,
                    current: a.capacity.current,
                    max: a.capacity.max,
                });
            }
            a.capacity.current += 1;
            Ok(a.name.clone())
        })??;

        let now = self.clock.now();
        cell.ticket.owner = Some(agent);
        cell.ticket.owner_accepted_at = Some(now);
        cell.ticket.status = TicketStatus::InProgress;
        cell.ticket.updated_at = now;
        cell.ticket.last_owner_update_at = Some(now);
        cell.log.append(
            EntryDraft::system(
                EntryKind::OwnershipAccepted,
                format!("ownership accepted by {name}"),
            ),
            now,
        );
        tracing::info!(ticket = %ticket, agent = %agent, "ownership established");
        Ok(cell.ticket.clone())
    }

    /// Administrative transfer. The reason string must parse into the
    /// [`TransferReason`] allow-list; anything else is rejected.
    pub fn transfer(
        &self,
        ticket: TicketId,
        reason: &str,
        new_owner: AgentId,
    ) -> Result<Ticket, EngineError> {
        let reason = TransferReason::from_str(reason)?;
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        // A resolved ticket no longer consumes a capacity slot;
        // handing it over would charge the successor for closed work.
        if cell.ticket.status.is_terminal() {
            return Err(
                LifecycleError::InvalidTransition(tow_model::TicketTransitionError::Terminal)
                    .into(),
            );
        }
        let previous = cell
            .ticket
            .owner
            .ok_or(OwnershipError::NotOwned { ticket })?;
        let name = self.store.with_agent_mut(new_owner, |a| {
            if !a.is_active {
                return Err(OwnershipError::AgentInactive { agent: new_owner });
            }
            if !a.capacity.has_room() {
                return Err(OwnershipError::AgentAtCapacity {
                    agent: new_owner,
                    current: a.capacity.current,
                    max: a.capacity.max,
                });
            }
            a.capacity.current += 1;
            Ok(a.name.clone())
        })??;
        // Free the departed owner's slot; a missing record (already
        // purged) is not an error here.
        let _ = self.store.with_agent_mut(previous, |a| {
            a.capacity.current = a.capacity.current.saturating_sub(1);
        });

        let now = self.clock.now();
        cell.ticket.owner = Some(new_owner);
        cell.ticket.updated_at = now;
        cell.log.append(
            EntryDraft::system(
                EntryKind::OwnershipTransferred,
                format!(
                    "ownership transferred to {name} ({reason})",
                    reason = reason.as_str()
                ),
            ),
            now,
        );
        tracing::warn!(
            ticket = %ticket,
            from = %previous,
            to = %new_owner,
            reason = reason.as_str(),
            "administrative ownership transfer"
        );
        Ok(cell.ticket.clone())
    }

    /// Current owner, if any.
    pub fn get_owner(&self, ticket: TicketId) -> Result<Option<AgentId>, EngineError> {
        Ok(self.store.cell(ticket)?.lock().ticket.owner)
    }

    /// Side-effect-free owner check used by other components.
    pub(crate) fn require_owner(
        ticket: &Ticket,
        agent: AgentId,
        action: &'static str,
    ) -> Result<(), OwnershipError> {
        match ticket.owner {
            Some(owner) if owner == agent => Ok(()),
            Some(_) | None => Err(OwnershipError::NotOwner {
                ticket: ticket.id,
                agent,
                action,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tow_model::{Agent, Contact, Priority, SystemClock};

    fn setup() -> (Arc<WorkflowStore>, OwnershipGuard, TicketId, AgentId) {
        let store = Arc::new(WorkflowStore::new());
        let guard = OwnershipGuard::new(Arc::clone(&store), Arc::new(SystemClock));
        let requester = store.insert_contact(Contact::new("r@example.com", "Rae"));
        let ticket = store.insert_ticket(Ticket::new(
            "INC-100",
            "cannot log in",
            requester,
            Priority::Medium,
            SystemClock.now(),
        ));
        let agent = store.insert_agent(Agent::new("Kim"));
        (store, guard, ticket, agent)
    }

    #[test]
    fn accept_sets_owner_once_and_logs_it() {
        let (store, guard, ticket, agent) = setup();
        let owned = guard.accept(ticket, agent).unwrap();
        assert_eq!(owned.owner, Some(agent));
        assert_eq!(owned.status, TicketStatus::InProgress);
        let snap = store.snapshot(ticket).unwrap();
        assert_eq!(snap.log.len(), 1);
        assert_eq!(snap.log.entries()[0].kind, EntryKind::OwnershipAccepted);
        assert_eq!(store.agent(agent).unwrap().capacity.current, 1);
    }

    #[test]
    fn second_accept_is_rejected() {
        let (store, guard, ticket, agent) = setup();
        let rival = store.insert_agent(Agent::new("Lee"));
        guard.accept(ticket, agent).unwrap();
        let err = guard.accept(ticket, rival).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ownership(OwnershipError::AlreadyOwned { owner, .. }) if owner == agent
        ));
        // The loser's capacity is untouched.
        assert_eq!(store.agent(rival).unwrap().capacity.current, 0);
    }

    #[test]
    fn inactive_or_saturated_agents_cannot_accept() {
        let (store, guard, ticket, _) = setup();
        let inactive = store.insert_agent(Agent::new("Ghost").inactive());
        assert!(matches!(
            guard.accept(ticket, inactive).unwrap_err(),
            EngineError::Ownership(OwnershipError::AgentInactive { .. })
        ));
        let full = store.insert_agent(Agent::new("Busy").with_capacity(0));
        assert!(matches!(
            guard.accept(ticket, full).unwrap_err(),
            EngineError::Ownership(OwnershipError::AgentAtCapacity { .. })
        ));
    }

    #[test]
    fn transfer_requires_an_allow_listed_reason() {
        let (store, guard, ticket, agent) = setup();
        guard.accept(ticket, agent).unwrap();
        let successor = store.insert_agent(Agent::new("Noor"));

        let err = guard
            .transfer(ticket, "workload_balancing", successor)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ownership(OwnershipError::TransferNotPermitted { .. })
        ));
        assert_eq!(guard.get_owner(ticket).unwrap(), Some(agent));

        let moved = guard
            .transfer(ticket, "agent_terminated", successor)
            .unwrap();
        assert_eq!(moved.owner, Some(successor));
        assert_eq!(store.agent(agent).unwrap().capacity.current, 0);
        assert_eq!(store.agent(successor).unwrap().capacity.current, 1);
    }

    #[test]
    fn transfer_of_an_unowned_ticket_fails() {
        let (store, guard, ticket, _) = setup();
        let successor = store.insert_agent(Agent::new("Noor"));
        assert!(matches!(
            guard
                .transfer(ticket, "agent_terminated", successor)
                .unwrap_err(),
            EngineError::Ownership(OwnershipError::NotOwned { .. })
        ));
    }

    #[test]
    fn reason_strings_round_trip() {
        for reason in [
            TransferReason::AgentTerminated,
            TransferReason::AgentOnExtendedLeave,
        ] {
            assert_eq!(TransferReason::from_str(reason.as_str()).unwrap(), reason);
        }
        assert!(TransferReason::from_str("because").is_err());
    }
}
