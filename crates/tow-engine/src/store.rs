//! In-memory workflow store.
//!
//! Every ticket lives in a [`TicketCell`] behind its own mutex: the
//! ticket record, its envelopes, tasks, flags, resolutions, and its
//! append-only timeline move together or not at all. Holding the cell
//! lock across "check invariant, mutate state, append ledger entry"
//! is what makes each operation atomic; two agents racing to accept
//! the same ticket serialize on this lock and exactly one wins.
//!
//! Directory maps (agents, teams, contacts) and the envelope and
//! resolution indexes are independent `DashMap`s. Lock order is
//! always cell first, then directory entry, never the reverse.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tow_ledger::TimelineLog;
use tow_model::{
    Agent, AgentId, CaseFlag, Contact, ContactId, Envelope, EnvelopeId, EnvelopeStatus,
    Resolution, ResolutionId, Task, TaskId, Team, TeamId, Ticket, TicketId, TicketStatus,
};

use crate::error::EngineError;

/// Everything owned by one ticket, guarded as a unit.
#[derive(Debug)]
pub(crate) struct TicketCell {
    pub(crate) ticket: Ticket,
    pub(crate) envelopes: Vec<Envelope>,
    pub(crate) tasks: Vec<Task>,
    pub(crate) flags: Vec<CaseFlag>,
    pub(crate) resolutions: Vec<Resolution>,
    pub(crate) log: TimelineLog,
}

impl TicketCell {
    fn new(ticket: Ticket) -> Self {
        let log = TimelineLog::new(ticket.id);
        Self {
            ticket,
            envelopes: Vec::new(),
            tasks: Vec::new(),
            flags: Vec::new(),
            resolutions: Vec::new(),
            log,
        }
    }

    /// Escalation is derived, never stored: a ticket is escalated
    /// exactly while it has at least one active envelope.
    pub(crate) fn is_escalated(&self) -> bool {
        self.envelopes
            .iter()
            .any(|e| e.status == EnvelopeStatus::Active)
    }

    pub(crate) fn open_envelope_count(&self) -> usize {
        self.envelopes
            .iter()
            .filter(|e| e.status.is_open())
            .count()
    }

    pub(crate) fn envelope_mut(
        &mut self,
        id: EnvelopeId,
    ) -> Result<&mut Envelope, EngineError> {
        self.envelopes
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EngineError::EnvelopeNotFound(id))
    }

    pub(crate) fn resolution_mut(
        &mut self,
        id: ResolutionId,
    ) -> Result<&mut Resolution, EngineError> {
        self.resolutions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(EngineError::ResolutionNotFound(id))
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, EngineError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EngineError::TaskNotFound(id))
    }
}

/// Consistent point-in-time copy of a cell, cloned under its lock.
#[derive(Debug, Clone)]
pub struct TicketSnapshot {
    /// Ticket record.
    pub ticket: Ticket,
    /// All envelopes, open and closed.
    pub envelopes: Vec<Envelope>,
    /// All tasks.
    pub tasks: Vec<Task>,
    /// All case flags.
    pub flags: Vec<CaseFlag>,
    /// All submitted resolutions.
    pub resolutions: Vec<Resolution>,
    /// The full timeline.
    pub log: TimelineLog,
}

impl TicketSnapshot {
    /// Whether the ticket had an active envelope at snapshot time.
    #[must_use]
    pub fn is_escalated(&self) -> bool {
        self.envelopes
            .iter()
            .any(|e| e.status == EnvelopeStatus::Active)
    }

    /// Active envelope count at snapshot time.
    #[must_use]
    pub fn active_envelope_count(&self) -> usize {
        self.envelopes
            .iter()
            .filter(|e| e.status == EnvelopeStatus::Active)
            .count()
    }
}

/// The shared in-memory store.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    tickets: DashMap<TicketId, Arc<Mutex<TicketCell>>>,
    agents: DashMap<AgentId, Agent>,
    teams: DashMap<TeamId, Team>,
    contacts: DashMap<ContactId, Contact>,
    envelope_index: DashMap<EnvelopeId, TicketId>,
    resolution_index: DashMap<ResolutionId, TicketId>,
    task_index: DashMap<TaskId, TicketId>,
}

impl WorkflowStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ticket and returns its id.
    pub fn insert_ticket(&self, ticket: Ticket) -> TicketId {
        let id = ticket.id;
        tracing::info!(ticket = %id, reference = %ticket.reference, "ticket registered");
        self.tickets
            .insert(id, Arc::new(Mutex::new(TicketCell::new(ticket))));
        id
    }

    /// Registers an agent.
    pub fn insert_agent(&self, agent: Agent) -> AgentId {
        let id = agent.id;
        self.agents.insert(id, agent);
        id
    }

    /// Registers a team.
    pub fn insert_team(&self, team: Team) -> TeamId {
        let id = team.id;
        self.teams.insert(id, team);
        id
    }

    /// Registers a contact.
    pub fn insert_contact(&self, contact: Contact) -> ContactId {
        let id = contact.id;
        self.contacts.insert(id, contact);
        id
    }

    pub(crate) fn cell(&self, id: TicketId) -> Result<Arc<Mutex<TicketCell>>, EngineError> {
        self.tickets
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::TicketNotFound(id))
    }

    pub(crate) fn cell_for_envelope(
        &self,
        envelope: EnvelopeId,
    ) -> Result<(TicketId, Arc<Mutex<TicketCell>>), EngineError> {
        let ticket = self
            .envelope_index
            .get(&envelope)
            .map(|e| *e.value())
            .ok_or(EngineError::EnvelopeNotFound(envelope))?;
        Ok((ticket, self.cell(ticket)?))
    }

    pub(crate) fn cell_for_resolution(
        &self,
        resolution: ResolutionId,
    ) -> Result<(TicketId, Arc<Mutex<TicketCell>>), EngineError> {
        let ticket = self
            .resolution_index
            .get(&resolution)
            .map(|e| *e.value())
            .ok_or(EngineError::ResolutionNotFound(resolution))?;
        Ok((ticket, self.cell(ticket)?))
    }

    pub(crate) fn index_envelope(&self, envelope: EnvelopeId, ticket: TicketId) {
        self.envelope_index.insert(envelope, ticket);
    }

    pub(crate) fn index_resolution(&self, resolution: ResolutionId, ticket: TicketId) {
        self.resolution_index.insert(resolution, ticket);
    }

    pub(crate) fn cell_for_task(
        &self,
        task: TaskId,
    ) -> Result<(TicketId, Arc<Mutex<TicketCell>>), EngineError> {
        let ticket = self
            .task_index
            .get(&task)
            .map(|e| *e.value())
            .ok_or(EngineError::TaskNotFound(task))?;
        Ok((ticket, self.cell(ticket)?))
    }

    pub(crate) fn index_task(&self, task: TaskId, ticket: TicketId) {
        self.task_index.insert(task, ticket);
    }

    /// Cloned agent record.
    pub fn agent(&self, id: AgentId) -> Result<Agent, EngineError> {
        self.agents
            .get(&id)
            .map(|a| a.value().clone())
            .ok_or(EngineError::AgentNotFound(id))
    }

    /// Cloned team record.
    pub fn team(&self, id: TeamId) -> Result<Team, EngineError> {
        self.teams
            .get(&id)
            .map(|t| t.value().clone())
            .ok_or(EngineError::TeamNotFound(id))
    }

    /// Cloned contact record.
    pub fn contact(&self, id: ContactId) -> Result<Contact, EngineError> {
        self.contacts
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or(EngineError::ContactNotFound(id))
    }

    pub(crate) fn with_agent_mut<T>(
        &self,
        id: AgentId,
        f: impl FnOnce(&mut Agent) -> T,
    ) -> Result<T, EngineError> {
        let mut entry = self
            .agents
            .get_mut(&id)
            .ok_or(EngineError::AgentNotFound(id))?;
        Ok(f(entry.value_mut()))
    }

    /// Point-in-time copy of one ticket's state.
    pub fn snapshot(&self, id: TicketId) -> Result<TicketSnapshot, EngineError> {
        let cell = self.cell(id)?;
        let cell = cell.lock();
        Ok(TicketSnapshot {
            ticket: cell.ticket.clone(),
            envelopes: cell.envelopes.clone(),
            tasks: cell.tasks.clone(),
            flags: cell.flags.clone(),
            resolutions: cell.resolutions.clone(),
            log: cell.log.clone(),
        })
    }

    /// Snapshots of every ticket. Each cell is locked briefly in turn;
    /// the result is per-ticket consistent, not globally consistent.
    pub fn snapshot_all(&self) -> Vec<TicketSnapshot> {
        let ids: Vec<TicketId> = self.tickets.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.snapshot(id).ok())
            .collect()
    }

    /// Unresolved tickets currently owned by `agent`.
    pub fn owned_by(&self, agent: AgentId) -> Vec<TicketSnapshot> {
        self.snapshot_all()
            .into_iter()
            .filter(|s| {
                s.ticket.owner == Some(agent) && s.ticket.status != TicketStatus::Resolved
            })
            .collect()
    }
}
