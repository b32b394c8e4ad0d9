//! Case flags and complaint handling.
//!
//! Flag semantics are declarative: each flag type maps to a fixed list
//! of effects. Effects that mutate ticket state (spawning a legal
//! review envelope) run inside the flag's own transaction; effects
//! that cross a process boundary are queued post-commit.

use std::sync::Arc;

use tow_model::{
    AgentId, CaseFlag, CaseFlagType, Clock, ContactId, EntryDraft, EntryKind, Envelope,
    EnvelopeRouting, TeamId, TicketId, TicketStatus, Visibility,
};

use crate::effects::{EffectBus, Notification, NotificationEvent};
use crate::error::EngineError;
use crate::store::WorkflowStore;

/// What raising a flag does beyond recording it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEffect {
    /// Notify the responsible manager.
    NotifyManager,
    /// Ask for an SLA upgrade on the ticket.
    RequestSlaUpgrade,
    /// Open a legal review envelope on the ticket.
    SpawnLegalEnvelope,
}

/// Effects a flag type carries.
#[must_use]
pub fn flag_effects(flag_type: CaseFlagType) -> &'static [FlagEffect] {
    match flag_type {
        CaseFlagType::SocialMedia => {
            &[FlagEffect::NotifyManager, FlagEffect::RequestSlaUpgrade]
        }
        CaseFlagType::Legal => &[FlagEffect::SpawnLegalEnvelope],
        // These force calibration on the eventual resolution but carry
        // no immediate side effect of their own.
        CaseFlagType::PhysicalDamage | CaseFlagType::Vip | CaseFlagType::RepeatContact => &[],
    }
}

/// Number of inbound requester contacts at which an unresolved ticket
/// counts as a repeat-contact case.
pub const REPEAT_CONTACT_THRESHOLD: usize = 3;

/// Raises flags and records complaints.
#[derive(Debug, Clone)]
pub struct CaseFlags {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
    effects: EffectBus,
    legal_team: Option<TeamId>,
}

impl CaseFlags {
    /// Creates the flag service; `legal_team` receives auto-spawned
    /// legal review envelopes.
    #[must_use]
    pub fn new(
        store: Arc<WorkflowStore>,
        clock: Arc<dyn Clock>,
        effects: EffectBus,
        legal_team: Option<TeamId>,
    ) -> Self {
        Self {
            store,
            clock,
            effects,
            legal_team,
        }
    }

    /// Raises a flag and applies its effects. Returns the flag and the
    /// legal envelope, when one was spawned.
    pub fn add_flag(
        &self,
        ticket: TicketId,
        flag_type: CaseFlagType,
        added_by: AgentId,
        reason: impl Into<String>,
    ) -> Result<(CaseFlag, Option<Envelope>), EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        let flag = CaseFlag::new(ticket, flag_type, added_by, reason, now);
        cell.log.append(
            EntryDraft::new(
                EntryKind::FlagAdded,
                Visibility::Internal,
                tow_model::Author::Agent(added_by),
                format!("flag raised: {flag_type:?}"),
            ),
            now,
        );
        cell.flags.push(flag.clone());
        cell.ticket.updated_at = now;

        // Legal review is ticket state, so it commits with the flag.
        // It needs an owner to stand as the requesting agent and a
        // configured legal team; otherwise it degrades to the manager
        // notification below.
        let mut spawned = None;
        let mut notifications = Vec::new();
        for effect in flag_effects(flag_type) {
            match effect {
                FlagEffect::NotifyManager => notifications.push(Notification {
                    recipient: self.manager_for(&cell.ticket),
                    event: NotificationEvent::ManagerAlertRequested,
                    ticket,
                    detail: format!("{flag_type:?} flag on {}", cell.ticket.reference),
                }),
                FlagEffect::RequestSlaUpgrade => notifications.push(Notification {
                    recipient: None,
                    event: NotificationEvent::SlaUpgradeRequested,
                    ticket,
                    detail: cell.ticket.reference.clone(),
                }),
                FlagEffect::SpawnLegalEnvelope => {
                    match (cell.ticket.owner, self.legal_team) {
                        (Some(owner), Some(team)) => {
                            let envelope = Envelope::new(
                                ticket,
                                owner,
                                EnvelopeRouting::Team(team),
                                "legal review",
                                now,
                            );
                            cell.log.append(
                                EntryDraft::system(
                                    EntryKind::EnvelopeCreated,
                                    "legal review envelope opened",
                                )
                                .in_envelope(envelope.id),
                                now,
                            );
                            cell.envelopes.push(envelope.clone());
                            spawned = Some(envelope);
                        }
                        _ => notifications.push(Notification {
                            recipient: self.manager_for(&cell.ticket),
                            event: NotificationEvent::ManagerAlertRequested,
                            ticket,
                            detail: "legal flag raised, no legal envelope possible".into(),
                        }),
                    }
                }
            }
        }
        drop(cell);
        if let Some(envelope) = &spawned {
            self.store.index_envelope(envelope.id, ticket);
        }
        for notification in notifications {
            self.effects.send(notification);
        }
        tracing::info!(ticket = %ticket, flag = ?flag_type, "case flag raised");
        Ok((flag, spawned))
    }

    /// Records a formal complaint on the ticket. Complaints force the
    /// ticket's resolutions into calibration at the next queue build.
    pub fn record_complaint(
        &self,
        ticket: TicketId,
        contact: ContactId,
        content: impl Into<String>,
    ) -> Result<(), EngineError> {
        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        cell.ticket.complaint_recorded = true;
        cell.ticket.updated_at = now;
        cell.log.append(
            EntryDraft::new(
                EntryKind::ComplaintRecorded,
                Visibility::Public,
                tow_model::Author::Requester(contact),
                content,
            ),
            now,
        );
        tracing::warn!(ticket = %ticket, "complaint recorded");
        Ok(())
    }

    /// Whether the ticket qualifies as a repeat-contact case: still
    /// unresolved with at least [`REPEAT_CONTACT_THRESHOLD`] inbound
    /// requester messages.
    pub fn detect_repeat_contact(&self, ticket: TicketId) -> Result<bool, EngineError> {
        let cell = self.store.cell(ticket)?;
        let cell = cell.lock();
        Ok(cell.ticket.status != TicketStatus::Resolved
            && cell.log.inbound_contact_count() >= REPEAT_CONTACT_THRESHOLD)
    }

    fn manager_for(&self, ticket: &tow_model::Ticket) -> Option<AgentId> {
        ticket
            .team
            .and_then(|team| self.store.team(team).ok())
            .and_then(|team| team.manager)
    }
}
