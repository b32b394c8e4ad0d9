//! Parallel-assist envelope coordination.
//!
//! An envelope is a bounded request for expert help on a ticket the
//! requesting agent keeps owning. Envelope threads carry their own
//! ledger entries with `EnvelopeOnly` visibility; completion posts the
//! summary back to the ticket's main stream. The ticket's escalated
//! state is derived from its active envelope count, so clearing it on
//! the last completion needs no bookkeeping beyond the status change
//! itself.

use std::sync::Arc;

use tow_model::{
    envelope::validate_transition, AgentId, Clock, EntryDraft, EntryKind, Envelope, EnvelopeId,
    EnvelopeRouting, EnvelopeStatus, TicketId, Visibility,
};

use crate::effects::{EffectBus, Notification, NotificationEvent};
use crate::error::{EngineError, EnvelopeError, LifecycleError};
use crate::ownership::OwnershipGuard;
use crate::store::{TicketCell, WorkflowStore};

/// Coordinates envelope threads on owned tickets.
#[derive(Debug, Clone)]
pub struct EnvelopeCoordinator {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
    effects: EffectBus,
}

impl EnvelopeCoordinator {
    /// Creates a coordinator over the shared store.
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, clock: Arc<dyn Clock>, effects: EffectBus) -> Self {
        Self {
            store,
            clock,
            effects,
        }
    }

    /// Opens a pending envelope. Only the ticket's owner may request
    /// help, and not on a resolved ticket. Ownership and status of the
    /// ticket are untouched.
    pub fn create(
        &self,
        ticket: TicketId,
        requested_by: AgentId,
        routing: EnvelopeRouting,
        reason: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        OwnershipGuard::require_owner(&cell.ticket, requested_by, "request an envelope")?;
        if cell.ticket.status.is_terminal() {
            return Err(
                LifecycleError::InvalidTransition(tow_model::TicketTransitionError::Terminal)
                    .into(),
            );
        }
        let now = self.clock.now();
        let envelope = Envelope::new(ticket, requested_by, routing, reason, now);
        let id = envelope.id;
        cell.log.append(
            EntryDraft::new(
                EntryKind::EnvelopeCreated,
                Visibility::EnvelopeOnly,
                tow_model::Author::Agent(requested_by),
                format!("assist requested: {}", envelope.reason),
            )
            .in_envelope(id),
            now,
        );
        cell.ticket.updated_at = now;
        cell.ticket.last_owner_update_at = Some(now);
        cell.envelopes.push(envelope.clone());
        drop(cell);
        self.store.index_envelope(id, ticket);

        let recipient = match routing {
            EnvelopeRouting::Agent(agent) => Some(agent),
            EnvelopeRouting::Team(_) => None,
        };
        self.effects.send(Notification {
            recipient,
            event: NotificationEvent::EnvelopeRequested { envelope: id },
            ticket,
            detail: envelope.reason.clone(),
        });
        tracing::info!(ticket = %ticket, envelope = %id, "envelope opened");
        Ok(envelope)
    }

    /// Expert accepts a pending envelope. The acceptor must match the
    /// routing target: the named agent, or a member of the named team.
    pub fn accept(&self, envelope: EnvelopeId, expert: AgentId) -> Result<Envelope, EngineError> {
        let (ticket, cell) = self.store.cell_for_envelope(envelope)?;
        let agent = self.store.agent(expert)?;
        let mut cell = cell.lock();
        let env = cell.envelope_mut(envelope)?;
        validate_transition(env.status, EnvelopeStatus::Active).map_err(EnvelopeError::from)?;
        let routed_ok = match env.routing {
            EnvelopeRouting::Agent(target) => target == expert,
            EnvelopeRouting::Team(team) => agent.is_member_of(team),
        };
        if !routed_ok {
            return Err(EnvelopeError::RoutingMismatch {
                envelope,
                agent: expert,
            }
            .into());
        }
        let now = self.clock.now();
        env.status = EnvelopeStatus::Active;
        env.assigned_to = Some(expert);
        env.accepted_at = Some(now);
        let owner = cell.ticket.owner;
        cell.log.append(
            EntryDraft::new(
                EntryKind::EnvelopeAccepted,
                Visibility::EnvelopeOnly,
                tow_model::Author::Agent(expert),
                format!("assist accepted by {}", agent.name),
            )
            .in_envelope(envelope),
            now,
        );
        cell.ticket.updated_at = now;
        let updated = cell
            .envelopes
            .iter()
            .find(|e| e.id == envelope)
            .cloned()
            .ok_or(EngineError::EnvelopeNotFound(envelope))?;
        drop(cell);

        self.effects.send(Notification {
            recipient: owner,
            event: NotificationEvent::EnvelopeAccepted { envelope, expert },
            ticket,
            detail: agent.name,
        });
        tracing::info!(ticket = %ticket, envelope = %envelope, expert = %expert, "envelope active");
        Ok(updated)
    }

    /// Completes an active envelope, posting `summary` to the ticket's
    /// main stream as an internal entry. Only a participant (owner or
    /// assigned expert) may complete. If this was the last active
    /// envelope the ticket ceases to be escalated in the same commit.
    pub fn complete(
        &self,
        envelope: EnvelopeId,
        completed_by: AgentId,
        summary: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        let summary = summary.into();
        let (ticket, cell) = self.store.cell_for_envelope(envelope)?;
        let mut cell = cell.lock();
        Self::require_participant(&cell, envelope, completed_by)?;
        let now = self.clock.now();
        let env = cell.envelope_mut(envelope)?;
        validate_transition(env.status, EnvelopeStatus::Completed).map_err(EnvelopeError::from)?;
        env.status = EnvelopeStatus::Completed;
        env.summary = Some(summary.clone());
        env.completed_at = Some(now);
        let owner = cell.ticket.owner;
        // Summary lands on the main stream so the owner's record of
        // the ticket is complete without opening the thread.
        cell.log.append(
            EntryDraft::new(
                EntryKind::EnvelopeCompleted,
                Visibility::Internal,
                tow_model::Author::Agent(completed_by),
                summary.clone(),
            ),
            now,
        );
        if !cell.is_escalated() {
            cell.log.append(
                EntryDraft::system(EntryKind::System, "last active envelope closed"),
                now,
            );
        }
        cell.ticket.updated_at = now;
        if owner == Some(completed_by) {
            cell.ticket.last_owner_update_at = Some(now);
        }
        let updated = cell
            .envelopes
            .iter()
            .find(|e| e.id == envelope)
            .cloned()
            .ok_or(EngineError::EnvelopeNotFound(envelope))?;
        drop(cell);

        self.effects.send(Notification {
            recipient: owner,
            event: NotificationEvent::EnvelopeCompleted { envelope },
            ticket,
            detail: summary,
        });
        tracing::info!(ticket = %ticket, envelope = %envelope, "envelope completed");
        Ok(updated)
    }

    /// Cancels a pending or active envelope. Participant-only, like
    /// completion.
    pub fn cancel(
        &self,
        envelope: EnvelopeId,
        cancelled_by: AgentId,
        reason: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        let (ticket, cell) = self.store.cell_for_envelope(envelope)?;
        let mut cell = cell.lock();
        Self::require_participant(&cell, envelope, cancelled_by)?;
        let now = self.clock.now();
        let env = cell.envelope_mut(envelope)?;
        validate_transition(env.status, EnvelopeStatus::Cancelled).map_err(EnvelopeError::from)?;
        env.status = EnvelopeStatus::Cancelled;
        env.completed_at = Some(now);
        cell.log.append(
            EntryDraft::new(
                EntryKind::EnvelopeCancelled,
                Visibility::Internal,
                tow_model::Author::Agent(cancelled_by),
                reason.into(),
            ),
            now,
        );
        cell.ticket.updated_at = now;
        let updated = cell
            .envelopes
            .iter()
            .find(|e| e.id == envelope)
            .cloned()
            .ok_or(EngineError::EnvelopeNotFound(envelope))?;
        tracing::info!(ticket = %ticket, envelope = %envelope, "envelope cancelled");
        Ok(updated)
    }

    /// Posts a note into an open envelope's thread. Participant-only;
    /// the note is `EnvelopeOnly` so other experts on the same ticket
    /// never see it.
    pub fn add_note(
        &self,
        envelope: EnvelopeId,
        author: AgentId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        let (_, cell) = self.store.cell_for_envelope(envelope)?;
        let mut cell = cell.lock();
        Self::require_participant(&cell, envelope, author)?;
        let env = cell.envelope_mut(envelope)?;
        if env.status.is_terminal() {
            return Err(EnvelopeError::Closed { envelope }.into());
        }
        let now = self.clock.now();
        let owner = cell.ticket.owner;
        cell.log.append(
            EntryDraft::new(
                EntryKind::Note,
                Visibility::EnvelopeOnly,
                tow_model::Author::Agent(author),
                content,
            )
            .in_envelope(envelope),
            now,
        );
        cell.ticket.updated_at = now;
        if owner == Some(author) {
            cell.ticket.last_owner_update_at = Some(now);
        }
        Ok(())
    }

    fn require_participant(
        cell: &TicketCell,
        envelope: EnvelopeId,
        agent: AgentId,
    ) -> Result<(), EngineError> {
        let env = cell
            .envelopes
            .iter()
            .find(|e| e.id == envelope)
            .ok_or(EngineError::EnvelopeNotFound(envelope))?;
        let is_owner = cell.ticket.owner == Some(agent);
        if is_owner || env.is_assigned_to(agent) {
            Ok(())
        } else {
            Err(EnvelopeError::NotParticipant { envelope, agent }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tow_ledger::Viewer;
    use tow_model::{Agent, Contact, Priority, SystemClock, Team, Ticket};

    struct Fixture {
        store: Arc<WorkflowStore>,
        coordinator: EnvelopeCoordinator,
        ticket: TicketId,
        owner: AgentId,
        expert: AgentId,
        team: tow_model::TeamId,
    }

    fn setup() -> Fixture {
        let store = Arc::new(WorkflowStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let coordinator = EnvelopeCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            EffectBus::disconnected(),
        );
        let ownership = OwnershipGuard::new(Arc::clone(&store), clock);
        let team = store.insert_team(Team::new("network", Default::default()));
        let owner = store.insert_agent(Agent::new("Owner"));
        let expert = store.insert_agent(Agent::new("Expert").in_team(team));
        let requester = store.insert_contact(Contact::new("r@example.com", "Rae"));
        let ticket = store.insert_ticket(Ticket::new(
            "INC-200",
            "vpn flapping",
            requester,
            Priority::High,
            SystemClock.now(),
        ));
        ownership.accept(ticket, owner).unwrap();
        Fixture {
            store,
            coordinator,
            ticket,
            owner,
            expert,
            team,
        }
    }

    #[test]
    fn only_the_owner_opens_envelopes() {
        let f = setup();
        let err = f
            .coordinator
            .create(
                f.ticket,
                f.expert,
                EnvelopeRouting::Team(f.team),
                "need network eyes",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Ownership(_)));
    }

    #[test]
    fn escalation_tracks_active_envelopes() {
        let f = setup();
        let env = f
            .coordinator
            .create(
                f.ticket,
                f.owner,
                EnvelopeRouting::Team(f.team),
                "need network eyes",
            )
            .unwrap();
        // Pending does not escalate.
        assert!(!f.store.snapshot(f.ticket).unwrap().is_escalated());
        f.coordinator.accept(env.id, f.expert).unwrap();
        assert!(f.store.snapshot(f.ticket).unwrap().is_escalated());
        f.coordinator
            .complete(env.id, f.expert, "link MTU fixed")
            .unwrap();
        let snap = f.store.snapshot(f.ticket).unwrap();
        assert!(!snap.is_escalated());
        // Ownership never moved.
        assert_eq!(snap.ticket.owner, Some(f.owner));
    }

    #[test]
    fn routing_target_is_enforced_on_accept() {
        let f = setup();
        let outsider = f.store.insert_agent(Agent::new("Outsider"));
        let env = f
            .coordinator
            .create(
                f.ticket,
                f.owner,
                EnvelopeRouting::Team(f.team),
                "need network eyes",
            )
            .unwrap();
        assert!(matches!(
            f.coordinator.accept(env.id, outsider).unwrap_err(),
            EngineError::Envelope(EnvelopeError::RoutingMismatch { .. })
        ));
        // Direct-to-agent routing rejects everyone else, team-mates included.
        let direct = f
            .coordinator
            .create(
                f.ticket,
                f.owner,
                EnvelopeRouting::Agent(outsider),
                "for outsider",
            )
            .unwrap();
        assert!(matches!(
            f.coordinator.accept(direct.id, f.expert).unwrap_err(),
            EngineError::Envelope(EnvelopeError::RoutingMismatch { .. })
        ));
    }

    #[test]
    fn completion_posts_summary_to_the_main_stream() {
        let f = setup();
        let env = f
            .coordinator
            .create(f.ticket, f.owner, EnvelopeRouting::Agent(f.expert), "help")
            .unwrap();
        f.coordinator.accept(env.id, f.expert).unwrap();
        f.coordinator
            .complete(env.id, f.expert, "root cause: expired cert")
            .unwrap();
        let snap = f.store.snapshot(f.ticket).unwrap();
        let main: Vec<_> = snap.log.main_stream().collect();
        assert!(main
            .iter()
            .any(|e| e.kind == EntryKind::EnvelopeCompleted
                && e.content == "root cause: expired cert"));
        // Thread entries stay invisible to a plain agent viewer.
        let agent_view = snap.log.visible_to(Viewer::Agent);
        assert!(agent_view
            .iter()
            .all(|e| e.kind != EntryKind::EnvelopeCreated));
    }

    #[test]
    fn double_completion_is_rejected() {
        let f = setup();
        let env = f
            .coordinator
            .create(f.ticket, f.owner, EnvelopeRouting::Agent(f.expert), "help")
            .unwrap();
        f.coordinator.accept(env.id, f.expert).unwrap();
        f.coordinator.complete(env.id, f.expert, "done").unwrap();
        assert!(matches!(
            f.coordinator.complete(env.id, f.expert, "again").unwrap_err(),
            EngineError::Envelope(EnvelopeError::InvalidTransition(_))
        ));
    }

    #[test]
    fn notes_are_participant_only_and_thread_scoped() {
        let f = setup();
        let outsider = f.store.insert_agent(Agent::new("Outsider"));
        let env = f
            .coordinator
            .create(f.ticket, f.owner, EnvelopeRouting::Agent(f.expert), "help")
            .unwrap();
        f.coordinator.accept(env.id, f.expert).unwrap();
        f.coordinator
            .add_note(env.id, f.expert, "tried reseating the card")
            .unwrap();
        assert!(matches!(
            f.coordinator
                .add_note(env.id, outsider, "drive-by")
                .unwrap_err(),
            EngineError::Envelope(EnvelopeError::NotParticipant { .. })
        ));
        let snap = f.store.snapshot(f.ticket).unwrap();
        let thread: Vec<_> = snap.log.envelope_thread(env.id).collect();
        assert!(thread.iter().any(|e| e.kind == EntryKind::Note));
        // Requester sees none of it.
        assert!(snap.log.visible_to(Viewer::Requester).is_empty());
    }

    #[test]
    fn multiple_envelopes_run_in_parallel() {
        let f = setup();
        let second = f.store.insert_agent(Agent::new("Second").in_team(f.team));
        let a = f
            .coordinator
            .create(f.ticket, f.owner, EnvelopeRouting::Agent(f.expert), "a")
            .unwrap();
        let b = f
            .coordinator
            .create(f.ticket, f.owner, EnvelopeRouting::Agent(second), "b")
            .unwrap();
        f.coordinator.accept(a.id, f.expert).unwrap();
        f.coordinator.accept(b.id, second).unwrap();
        let snap = f.store.snapshot(f.ticket).unwrap();
        assert_eq!(snap.active_envelope_count(), 2);
        // Closing one leaves the ticket escalated by the other.
        f.coordinator.complete(a.id, f.expert, "done a").unwrap();
        assert!(f.store.snapshot(f.ticket).unwrap().is_escalated());
    }
}
