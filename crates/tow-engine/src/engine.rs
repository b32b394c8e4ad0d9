//! The workflow engine facade.
//!
//! One `WorkflowEngine` wires the components over a shared store and
//! clock and exposes the whole operation surface. Mutations commit
//! synchronously under per-ticket locks; notifications drain through
//! the effect bus after commit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tow_empowerment::{CalibrationSampler, EmpowermentRouter, RoutingOutcome};
use tow_ledger::Viewer;
use tow_model::{
    AgentId, CalibrationItem, CalibrationItemId, CaseFlag, CaseFlagType, Clock, ContactId,
    Envelope, EnvelopeId, EnvelopeRouting, EntryDraft, EntryKind, RequesterTier, Resolution,
    ResolutionId, ReviewOutcome, SystemClock, Task, TaskId, TaskStatus, Ticket, TicketId,
    TicketStatus, TimelineEntry, Visibility,
};
use tow_scoring::{
    order_queue, Alert, AlertEscalationMatrix, AlertView, PriorityScore, PriorityScorer,
    RecipientRole, ScoreInputs, WorkQueueEntry,
};

use crate::config::{EngineConfig, SlaDuringEscalation};
use crate::effects::{EffectBus, Notification, NotificationEvent};
use crate::envelope::EnvelopeCoordinator;
use crate::error::EngineError;
use crate::flags::CaseFlags;
use crate::lifecycle::TicketLifecycle;
use crate::ownership::OwnershipGuard;
use crate::resolution::{ResolutionDesk, ResolutionDraft};
use crate::store::{TicketSnapshot, WorkflowStore};

/// The engine.
#[derive(Debug)]
pub struct WorkflowEngine {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
    effects: EffectBus,
    ownership: OwnershipGuard,
    envelopes: EnvelopeCoordinator,
    lifecycle: TicketLifecycle,
    flags: CaseFlags,
    desk: ResolutionDesk,
    scorer: PriorityScorer,
    matrix: AlertEscalationMatrix,
    sla_policy: SlaDuringEscalation,
}

impl WorkflowEngine {
    /// Engine with the system clock and a disconnected effect bus.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), EffectBus::disconnected())
    }

    /// Engine over an explicit clock and effect bus. This is the
    /// constructor tests and embedders use.
    #[must_use]
    pub fn with_parts(config: EngineConfig, clock: Arc<dyn Clock>, effects: EffectBus) -> Self {
        let store = Arc::new(WorkflowStore::new());
        let ownership = OwnershipGuard::new(Arc::clone(&store), Arc::clone(&clock));
        let envelopes = EnvelopeCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            effects.clone(),
        );
        let lifecycle =
            TicketLifecycle::new(Arc::clone(&store), Arc::clone(&clock), config.reopen);
        let flags = CaseFlags::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            effects.clone(),
            config.legal_team,
        );
        let desk = ResolutionDesk::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            effects.clone(),
            EmpowermentRouter::new(config.router),
            CalibrationSampler::new(config.sampler),
        );
        Self {
            store,
            clock,
            effects,
            ownership,
            envelopes,
            lifecycle,
            flags,
            desk,
            scorer: PriorityScorer::new(),
            matrix: AlertEscalationMatrix::new(config.alerts),
            sla_policy: config.sla_during_escalation,
        }
    }

    /// The shared store, for registering agents, teams, contacts and
    /// tickets and for snapshot reads.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    // --- ownership ------------------------------------------------------

    /// Agent accepts a ticket. See [`OwnershipGuard::accept`].
    pub fn accept_ticket(&self, ticket: TicketId, agent: AgentId) -> Result<Ticket, EngineError> {
        self.ownership.accept(ticket, agent)
    }

    /// Administrative transfer. See [`OwnershipGuard::transfer`].
    pub fn transfer_ticket(
        &self,
        ticket: TicketId,
        reason: &str,
        new_owner: AgentId,
    ) -> Result<Ticket, EngineError> {
        self.ownership.transfer(ticket, reason, new_owner)
    }

    /// Current owner, if any.
    pub fn owner_of(&self, ticket: TicketId) -> Result<Option<AgentId>, EngineError> {
        self.ownership.get_owner(ticket)
    }

    // --- envelopes ------------------------------------------------------

    /// Owner requests a parallel-assist envelope.
    pub fn create_envelope(
        &self,
        ticket: TicketId,
        requested_by: AgentId,
        routing: EnvelopeRouting,
        reason: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        self.envelopes.create(ticket, requested_by, routing, reason)
    }

    /// Expert accepts a pending envelope.
    pub fn accept_envelope(
        &self,
        envelope: EnvelopeId,
        expert: AgentId,
    ) -> Result<Envelope, EngineError> {
        self.envelopes.accept(envelope, expert)
    }

    /// Participant completes an active envelope with a summary.
    pub fn complete_envelope(
        &self,
        envelope: EnvelopeId,
        completed_by: AgentId,
        summary: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        self.envelopes.complete(envelope, completed_by, summary)
    }

    /// Participant cancels an open envelope.
    pub fn cancel_envelope(
        &self,
        envelope: EnvelopeId,
        cancelled_by: AgentId,
        reason: impl Into<String>,
    ) -> Result<Envelope, EngineError> {
        self.envelopes.cancel(envelope, cancelled_by, reason)
    }

    /// Participant posts a note into an open envelope thread.
    pub fn add_envelope_note(
        &self,
        envelope: EnvelopeId,
        author: AgentId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.envelopes.add_note(envelope, author, content)
    }

    // --- timeline -------------------------------------------------------

    /// Records an inbound message from the requester.
    pub fn record_inbound_contact(
        &self,
        ticket: TicketId,
        contact: ContactId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        cell.log.append(
            EntryDraft::new(
                EntryKind::ContactInbound,
                Visibility::Public,
                tow_model::Author::Requester(contact),
                content,
            ),
            now,
        );
        cell.ticket.updated_at = now;
        Ok(())
    }

    /// Records an outbound response to the requester. The first one
    /// stamps the ticket's first-response instant.
    pub fn record_outbound_response(
        &self,
        ticket: TicketId,
        agent: AgentId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        cell.log.append(
            EntryDraft::new(
                EntryKind::ContactOutbound,
                Visibility::Public,
                tow_model::Author::Agent(agent),
                content,
            ),
            now,
        );
        if cell.ticket.first_response_at.is_none() {
            cell.ticket.first_response_at = Some(now);
        }
        cell.ticket.updated_at = now;
        if cell.ticket.owner == Some(agent) {
            cell.ticket.last_owner_update_at = Some(now);
        }
        Ok(())
    }

    /// Posts an internal note on the ticket's main stream.
    pub fn add_note(
        &self,
        ticket: TicketId,
        agent: AgentId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        cell.log.append(
            EntryDraft::new(
                EntryKind::Note,
                Visibility::Internal,
                tow_model::Author::Agent(agent),
                content,
            ),
            now,
        );
        cell.ticket.updated_at = now;
        if cell.ticket.owner == Some(agent) {
            cell.ticket.last_owner_update_at = Some(now);
        }
        Ok(())
    }

    /// The ticket's timeline as `viewer` is allowed to see it.
    pub fn timeline(
        &self,
        ticket: TicketId,
        viewer: Viewer,
    ) -> Result<Vec<TimelineEntry>, EngineError> {
        let snap = self.store.snapshot(ticket)?;
        Ok(snap.log.visible_to(viewer).into_iter().cloned().collect())
    }

    // --- tasks ----------------------------------------------------------

    /// Creates a task on a ticket, optionally under an envelope and
    /// optionally assigned.
    pub fn create_task(
        &self,
        ticket: TicketId,
        title: impl Into<String>,
        assignee: Option<AgentId>,
        envelope: Option<EnvelopeId>,
    ) -> Result<Task, EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        let mut task = Task::new(ticket, title, now);
        if let Some(agent) = assignee {
            task = task.assigned_to(agent);
        }
        if let Some(env) = envelope {
            // The task inherits the thread's confidentiality.
            cell.envelope_mut(env)?;
            task = task.under_envelope(env);
        }
        let id = task.id;
        cell.log.append(
            EntryDraft::system(EntryKind::TaskCreated, format!("task created: {}", task.title)),
            now,
        );
        cell.tasks.push(task.clone());
        cell.ticket.updated_at = now;
        drop(cell);
        self.store.index_task(id, ticket);
        Ok(task)
    }

    /// Marks a task done.
    pub fn complete_task(&self, task: TaskId, by: AgentId) -> Result<Task, EngineError> {
        let (_, cell) = self.store.cell_for_task(task)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        let record = cell.task_mut(task)?;
        if record.status.is_terminal() {
            return Err(EngineError::TaskClosed(task));
        }
        record.status = TaskStatus::Done;
        record.completed_at = Some(now);
        let title = record.title.clone();
        cell.log.append(
            EntryDraft::new(
                EntryKind::TaskCompleted,
                Visibility::Internal,
                tow_model::Author::Agent(by),
                format!("task completed: {title}"),
            ),
            now,
        );
        cell.ticket.updated_at = now;
        let done = cell
            .tasks
            .iter()
            .find(|t| t.id == task)
            .cloned()
            .ok_or(EngineError::TaskNotFound(task))?;
        Ok(done)
    }

    // --- flags and complaints -------------------------------------------

    /// Raises a case flag. See [`CaseFlags::add_flag`].
    pub fn add_flag(
        &self,
        ticket: TicketId,
        flag_type: CaseFlagType,
        added_by: AgentId,
        reason: impl Into<String>,
    ) -> Result<(CaseFlag, Option<Envelope>), EngineError> {
        self.flags.add_flag(ticket, flag_type, added_by, reason)
    }

    /// Records a formal complaint.
    pub fn record_complaint(
        &self,
        ticket: TicketId,
        contact: ContactId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.flags.record_complaint(ticket, contact, content)
    }

    /// Repeat-contact detection.
    pub fn detect_repeat_contact(&self, ticket: TicketId) -> Result<bool, EngineError> {
        self.flags.detect_repeat_contact(ticket)
    }

    // --- lifecycle ------------------------------------------------------

    /// Owner resolves the ticket.
    pub fn resolve_ticket(&self, ticket: TicketId, agent: AgentId) -> Result<Ticket, EngineError> {
        let resolved = self.lifecycle.resolve(ticket, agent)?;
        self.matrix.forget(ticket);
        Ok(resolved)
    }

    /// System-level reopen, subject to policy.
    pub fn reopen_ticket(&self, ticket: TicketId) -> Result<Ticket, EngineError> {
        self.lifecycle.reopen(ticket)
    }

    // --- resolutions ----------------------------------------------------

    /// Owner submits a resolution; it routes through the empowerment
    /// tiers.
    pub fn submit_resolution(
        &self,
        ticket: TicketId,
        agent: AgentId,
        draft: ResolutionDraft,
    ) -> Result<(Resolution, RoutingOutcome), EngineError> {
        self.desk.submit(ticket, agent, draft)
    }

    /// Team lead approves a pending tier-2 resolution.
    pub fn approve_resolution(
        &self,
        resolution: ResolutionId,
        approver: AgentId,
    ) -> Result<Resolution, EngineError> {
        self.desk.approve(resolution, approver)
    }

    /// Builds this cycle's calibration queue.
    pub fn generate_calibration_queue(&self, seed: u64) -> Vec<CalibrationItem> {
        self.desk.generate_queue(seed)
    }

    /// Records a calibration review.
    pub fn review_calibration(
        &self,
        item: CalibrationItemId,
        reviewer: AgentId,
        outcome: ReviewOutcome,
        notes: impl Into<String>,
    ) -> Result<CalibrationItem, EngineError> {
        self.desk.review(item, reviewer, outcome, notes)
    }

    /// Calibration items still awaiting review.
    #[must_use]
    pub fn calibration_queue(&self) -> Vec<CalibrationItem> {
        self.desk.pending_queue()
    }

    // --- scoring and alerts ---------------------------------------------

    /// Effective priority of one ticket, right now.
    pub fn recalculate_priority(&self, ticket: TicketId) -> Result<PriorityScore, EngineError> {
        let snap = self.store.snapshot(ticket)?;
        let now = self.clock.now();
        Ok(self.scorer.recalculate(&self.score_inputs(&snap, now)))
    }

    /// An agent's owned, unresolved tickets, scored and ordered.
    pub fn work_queue(&self, agent: AgentId) -> Result<Vec<WorkQueueEntry>, EngineError> {
        // Surfaces a NotFound for unknown agents instead of an empty queue.
        self.store.agent(agent)?;
        let now = self.clock.now();
        let mut entries: Vec<WorkQueueEntry> = self
            .store
            .owned_by(agent)
            .iter()
            .map(|snap| WorkQueueEntry {
                ticket: snap.ticket.id,
                created_at: snap.ticket.created_at,
                score: self.scorer.recalculate(&self.score_inputs(snap, now)),
            })
            .collect();
        order_queue(&mut entries);
        Ok(entries)
    }

    /// Sweeps every ticket through the alert matrix, queues a
    /// notification per resolved recipient, and returns what fired.
    pub fn evaluate_alerts(&self) -> Vec<Alert> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        for snap in self.store.snapshot_all() {
            let view = AlertView {
                ticket: snap.ticket.id,
                owned: snap.ticket.is_owned(),
                resolved: snap.ticket.status == TicketStatus::Resolved,
                since_created: now - snap.ticket.created_at,
                since_update: now - snap.ticket.updated_at,
                since_sla_start: now - snap.ticket.sla_started_at,
            };
            for alert in self.matrix.evaluate(&view) {
                for role in &alert.recipients {
                    self.effects.send(Notification {
                        recipient: self.resolve_role(&snap, *role),
                        event: NotificationEvent::AlertRaised {
                            condition: alert.condition,
                            level: alert.level,
                            role: *role,
                        },
                        ticket: alert.ticket,
                        detail: snap.ticket.reference.clone(),
                    });
                }
                fired.push(alert);
            }
        }
        fired
    }

    fn resolve_role(&self, snap: &TicketSnapshot, role: RecipientRole) -> Option<AgentId> {
        let team = snap.ticket.team.and_then(|t| self.store.team(t).ok());
        match role {
            RecipientRole::Tech => snap.ticket.owner,
            RecipientRole::Supervisor => team.and_then(|t| t.supervisor),
            RecipientRole::Manager => team.and_then(|t| t.manager),
        }
    }

    fn score_inputs(&self, snap: &TicketSnapshot, now: DateTime<Utc>) -> ScoreInputs {
        let requester_tier = self
            .store
            .contact(snap.ticket.requester)
            .map(|c| c.tier)
            .unwrap_or(RequesterTier::Standard);
        // Under a paused-SLA policy an escalated ticket feels no SLA
        // pressure until its envelopes close.
        let time_to_breach = if self.sla_policy == SlaDuringEscalation::Pause && snap.is_escalated()
        {
            None
        } else {
            snap.ticket.sla_breach_at.map(|breach| breach - now)
        };
        let since_owner_update = snap
            .ticket
            .last_owner_update_at
            .map(|at| now - at)
            .filter(|d| *d > Duration::zero());
        ScoreInputs {
            priority: snap.ticket.priority,
            time_to_breach,
            requester_tier,
            active_envelopes: snap.active_envelope_count(),
            since_owner_update,
        }
    }
}
