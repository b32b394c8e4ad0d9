//! Resolution submission, approval, and the calibration queue.
//!
//! A resolution routes through the owning team's empowerment tiers at
//! submission time. Tier-1 saves immediately. Tier-2 waits for a
//! team-lead approval. Tier-3 saves immediately but is unconditionally
//! enqueued for calibration in the same operation, so no high-value
//! resolution can slip past review.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tow_model::{
    AgentId, CalibrationItem, CalibrationItemId, CalibrationReason, CalibrationStatus, Clock,
    EligibilityCategory, EntryDraft, EntryKind, FaultCategory, Resolution, ResolutionId,
    ResolutionType, ReviewOutcome, ReviewStatus, TicketId, TicketStatus, Visibility,
};

use tow_empowerment::{
    CalibrationError, CalibrationSampler, EmpowermentRouter, ResolutionCandidate, RoutingOutcome,
};

use crate::effects::{EffectBus, Notification, NotificationEvent};
use crate::error::{EngineError, LifecycleError};
use crate::ownership::OwnershipGuard;
use crate::store::WorkflowStore;

/// Caller-supplied resolution fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionDraft {
    /// What actually went wrong.
    pub what_went_wrong: String,
    /// Fault classification.
    pub fault_category: FaultCategory,
    /// Why the requester is eligible for this outcome.
    pub why_eligible: String,
    /// Eligibility classification.
    pub eligibility_category: EligibilityCategory,
    /// The outcome granted.
    pub resolution_type: ResolutionType,
    /// Compensation amount, for monetary outcomes.
    pub amount: Option<f64>,
    /// ISO currency of `amount`.
    pub currency: String,
}

impl ResolutionDraft {
    /// Non-monetary draft.
    #[must_use]
    pub fn new(
        what_went_wrong: impl Into<String>,
        fault_category: FaultCategory,
        why_eligible: impl Into<String>,
        eligibility_category: EligibilityCategory,
        resolution_type: ResolutionType,
    ) -> Self {
        Self {
            what_went_wrong: what_went_wrong.into(),
            fault_category,
            why_eligible: why_eligible.into(),
            eligibility_category,
            resolution_type,
            amount: None,
            currency: "EUR".to_string(),
        }
    }

    /// Attaches a compensation amount.
    #[must_use]
    pub fn with_amount(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.amount = Some(amount);
        self.currency = currency.into();
        self
    }
}

#[derive(Debug, Default)]
struct CalibrationLedger {
    items: IndexMap<CalibrationItemId, CalibrationItem>,
    queued: HashSet<ResolutionId>,
}

/// Routes resolutions and owns the calibration queue.
#[derive(Debug)]
pub struct ResolutionDesk {
    store: Arc<WorkflowStore>,
    clock: Arc<dyn Clock>,
    effects: EffectBus,
    router: EmpowermentRouter,
    sampler: CalibrationSampler,
    ledger: Mutex<CalibrationLedger>,
}

impl ResolutionDesk {
    /// Creates the desk.
    #[must_use]
    pub fn new(
        store: Arc<WorkflowStore>,
        clock: Arc<dyn Clock>,
        effects: EffectBus,
        router: EmpowermentRouter,
        sampler: CalibrationSampler,
    ) -> Self {
        Self {
            store,
            clock,
            effects,
            router,
            sampler,
            ledger: Mutex::new(CalibrationLedger::default()),
        }
    }

    /// Owner submits a resolution. The routing outcome tells the
    /// caller what happened: saved, parked for approval, or saved and
    /// forced into calibration.
    pub fn submit(
        &self,
        ticket: TicketId,
        agent: AgentId,
        draft: ResolutionDraft,
    ) -> Result<(Resolution, RoutingOutcome), EngineError> {
        let agent_record = self.store.agent(agent)?;
        let empowerment = agent_record
            .teams
            .first()
            .and_then(|team| self.store.team(*team).ok())
            .map(|team| team.empowerment)
            .unwrap_or(*self.router.default_empowerment());
        let supervisor = agent_record
            .teams
            .first()
            .and_then(|team| self.store.team(*team).ok())
            .and_then(|team| team.supervisor);

        let cell = self.store.cell(ticket)?;
        let mut cell = cell.lock();
        OwnershipGuard::require_owner(&cell.ticket, agent, "submit a resolution")?;
        if cell.ticket.status == TicketStatus::Resolved {
            return Err(
                LifecycleError::InvalidTransition(tow_model::TicketTransitionError::Terminal)
                    .into(),
            );
        }
        let tier = self
            .router
            .tier_for(&empowerment, draft.resolution_type, draft.amount)?;
        let outcome = RoutingOutcome::for_tier(tier);
        let now = self.clock.now();
        let resolution = Resolution {
            id: ResolutionId::new(),
            ticket,
            agent,
            what_went_wrong: draft.what_went_wrong,
            fault_category: draft.fault_category,
            why_eligible: draft.why_eligible,
            eligibility_category: draft.eligibility_category,
            resolution_type: draft.resolution_type,
            amount: draft.amount,
            currency: draft.currency,
            tier,
            approved_by: None,
            approved_at: None,
            calibration_status: match outcome {
                RoutingOutcome::AutoApprove => CalibrationStatus::NotRequired,
                RoutingOutcome::RequestApproval => CalibrationStatus::PendingApproval,
                RoutingOutcome::ForceCalibration => CalibrationStatus::Queued,
            },
            created_at: now,
        };
        let id = resolution.id;
        cell.log.append(
            EntryDraft::new(
                EntryKind::Resolution,
                Visibility::Internal,
                tow_model::Author::Agent(agent),
                format!(
                    "resolution submitted ({:?}, tier {:?})",
                    resolution.resolution_type, tier
                ),
            ),
            now,
        );
        cell.resolutions.push(resolution.clone());
        cell.ticket.updated_at = now;
        cell.ticket.last_owner_update_at = Some(now);
        drop(cell);
        self.store.index_resolution(id, ticket);

        match outcome {
            RoutingOutcome::AutoApprove => {}
            RoutingOutcome::RequestApproval => {
                self.effects.send(Notification {
                    recipient: supervisor,
                    event: NotificationEvent::ApprovalRequested { resolution: id },
                    ticket,
                    detail: "tier-2 resolution awaiting approval".to_string(),
                });
            }
            RoutingOutcome::ForceCalibration => {
                // Same operation as the save: the queue entry exists
                // before submit returns.
                let mut ledger = self.ledger.lock();
                let item = CalibrationItem::new(id, CalibrationReason::Tier3, now);
                ledger.queued.insert(id);
                ledger.items.insert(item.id, item);
            }
        }
        tracing::info!(ticket = %ticket, resolution = %id, ?tier, ?outcome, "resolution submitted");
        Ok((resolution, outcome))
    }

    /// Team lead approves a pending tier-2 resolution.
    pub fn approve(
        &self,
        resolution: ResolutionId,
        approver: AgentId,
    ) -> Result<Resolution, EngineError> {
        let (ticket, cell) = self.store.cell_for_resolution(resolution)?;
        let mut cell = cell.lock();
        let now = self.clock.now();
        let record = cell.resolution_mut(resolution)?;
        EmpowermentRouter::validate_approval(record)?;
        record.approved_by = Some(approver);
        record.approved_at = Some(now);
        record.calibration_status = CalibrationStatus::Approved;
        let submitter = record.agent;
        let approved = record.clone();
        cell.log.append(
            EntryDraft::system(EntryKind::System, "resolution approved"),
            now,
        );
        cell.ticket.updated_at = now;
        drop(cell);
        self.effects.send(Notification {
            recipient: Some(submitter),
            event: NotificationEvent::ResolutionApproved { resolution },
            ticket,
            detail: String::new(),
        });
        tracing::info!(ticket = %ticket, resolution = %resolution, approver = %approver, "resolution approved");
        Ok(approved)
    }

    /// Builds this cycle's calibration queue: every forced candidate
    /// plus a seeded random sample of the rest. Returns the items
    /// added this cycle.
    pub fn generate_queue(&self, seed: u64) -> Vec<CalibrationItem> {
        let mut candidates = Vec::new();
        for snap in self.store.snapshot_all() {
            let forcing_flags: Vec<_> = snap
                .flags
                .iter()
                .map(|f| f.flag_type)
                .filter(|t| t.forces_calibration())
                .collect();
            for resolution in &snap.resolutions {
                // Pending approvals are not final yet; queued and
                // reviewed ones are already accounted for.
                if !matches!(
                    resolution.calibration_status,
                    CalibrationStatus::NotRequired | CalibrationStatus::Approved
                ) {
                    continue;
                }
                candidates.push(ResolutionCandidate {
                    resolution: resolution.id,
                    tier: resolution.tier,
                    forcing_flags: forcing_flags.clone(),
                    complaint: snap.ticket.complaint_recorded,
                });
            }
        }

        let mut ledger = self.ledger.lock();
        let picks = self.sampler.assemble(&candidates, &ledger.queued, seed);
        let now = self.clock.now();
        let mut added = Vec::with_capacity(picks.len());
        for (resolution, reason) in picks {
            let item = CalibrationItem::new(resolution, reason, now);
            ledger.queued.insert(resolution);
            ledger.items.insert(item.id, item.clone());
            self.mark_queued(resolution);
            added.push(item);
        }
        tracing::info!(added = added.len(), seed, "calibration queue generated");
        added
    }

    /// Records a review outcome on a queued item. An item is reviewed
    /// at most once.
    pub fn review(
        &self,
        item: CalibrationItemId,
        reviewer: AgentId,
        outcome: ReviewOutcome,
        notes: impl Into<String>,
    ) -> Result<CalibrationItem, EngineError> {
        let now = self.clock.now();
        let reviewed = {
            let mut ledger = self.ledger.lock();
            let record = ledger
                .items
                .get_mut(&item)
                .ok_or(CalibrationError::ItemNotFound(item))?;
            CalibrationSampler::validate_review(record)?;
            record.review_status = ReviewStatus::Reviewed;
            record.outcome = Some(outcome);
            record.notes = Some(notes.into());
            record.reviewed_by = Some(reviewer);
            record.reviewed_at = Some(now);
            record.clone()
        };
        // Reflect the terminal state on the resolution itself.
        if let Ok((_, cell)) = self.store.cell_for_resolution(reviewed.resolution) {
            let mut cell = cell.lock();
            if let Ok(record) = cell.resolution_mut(reviewed.resolution) {
                record.calibration_status = CalibrationStatus::Reviewed(outcome);
            }
        }
        tracing::info!(item = %item, reviewer = %reviewer, ?outcome, "calibration review recorded");
        Ok(reviewed)
    }

    /// Items still awaiting review, in enqueue order.
    #[must_use]
    pub fn pending_queue(&self) -> Vec<CalibrationItem> {
        self.ledger
            .lock()
            .items
            .values()
            .filter(|i| i.review_status == ReviewStatus::Pending)
            .cloned()
            .collect()
    }

    fn mark_queued(&self, resolution: ResolutionId) {
        if let Ok((_, cell)) = self.store.cell_for_resolution(resolution) {
            let mut cell = cell.lock();
            if let Ok(record) = cell.resolution_mut(resolution) {
                if !matches!(record.calibration_status, CalibrationStatus::Reviewed(_)) {
                    record.calibration_status = CalibrationStatus::Queued;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tow_empowerment::{ResolutionError, RouterConfig, SamplerConfig};
    use tow_model::{Agent, Contact, EmpowermentConfig, Priority, SystemClock, Team, Ticket};

    struct Fixture {
        store: Arc<WorkflowStore>,
        desk: ResolutionDesk,
        ticket: TicketId,
        owner: AgentId,
        supervisor: AgentId,
    }

    fn compensation(amount: f64) -> ResolutionDraft {
        ResolutionDraft::new(
            "parcel lost in transit",
            FaultCategory::Shipping,
            "tracked shipment never arrived",
            EligibilityCategory::Policy,
            ResolutionType::Refund,
        )
        .with_amount(amount, "EUR")
    }

    fn setup() -> Fixture {
        let store = Arc::new(WorkflowStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let desk = ResolutionDesk::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            EffectBus::disconnected(),
            EmpowermentRouter::new(RouterConfig::default()),
            CalibrationSampler::new(SamplerConfig::default()),
        );
        let ownership = OwnershipGuard::new(Arc::clone(&store), clock);
        let supervisor = store.insert_agent(Agent::new("Lead"));
        let team = store.insert_team(
            Team::new("claims", EmpowermentConfig::default()).with_supervisor(supervisor),
        );
        let owner = store.insert_agent(Agent::new("Owner").in_team(team));
        let requester = store.insert_contact(Contact::new("r@example.com", "Rae"));
        let ticket = store.insert_ticket(Ticket::new(
            "INC-500",
            "lost parcel",
            requester,
            Priority::Medium,
            SystemClock.now(),
        ));
        ownership.accept(ticket, owner).unwrap();
        Fixture {
            store,
            desk,
            ticket,
            owner,
            supervisor,
        }
    }

    #[test]
    fn tier_one_auto_approves() {
        let f = setup();
        let (resolution, outcome) = f.desk.submit(f.ticket, f.owner, compensation(80.0)).unwrap();
        assert_eq!(outcome, RoutingOutcome::AutoApprove);
        assert_eq!(resolution.calibration_status, CalibrationStatus::NotRequired);
        assert!(f.desk.pending_queue().is_empty());
    }

    #[test]
    fn tier_two_waits_for_approval() {
        let f = setup();
        let (resolution, outcome) = f
            .desk
            .submit(f.ticket, f.owner, compensation(300.0))
            .unwrap();
        assert_eq!(outcome, RoutingOutcome::RequestApproval);
        assert_eq!(
            resolution.calibration_status,
            CalibrationStatus::PendingApproval
        );
        let approved = f.desk.approve(resolution.id, f.supervisor).unwrap();
        assert_eq!(approved.calibration_status, CalibrationStatus::Approved);
        assert_eq!(approved.approved_by, Some(f.supervisor));
        // Second decision is rejected.
        assert!(matches!(
            f.desk.approve(resolution.id, f.supervisor).unwrap_err(),
            EngineError::Resolution(ResolutionError::AlreadyDecided { .. })
        ));
    }

    #[test]
    fn tier_three_is_enqueued_in_the_same_operation() {
        let f = setup();
        let (resolution, outcome) = f
            .desk
            .submit(f.ticket, f.owner, compensation(600.0))
            .unwrap();
        assert_eq!(outcome, RoutingOutcome::ForceCalibration);
        assert_eq!(resolution.calibration_status, CalibrationStatus::Queued);
        let queue = f.desk.pending_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].resolution, resolution.id);
        assert_eq!(queue[0].reason, CalibrationReason::Tier3);
    }

    #[test]
    fn approving_an_auto_approved_resolution_fails() {
        let f = setup();
        let (resolution, _) = f.desk.submit(f.ticket, f.owner, compensation(50.0)).unwrap();
        assert!(matches!(
            f.desk.approve(resolution.id, f.supervisor).unwrap_err(),
            EngineError::Resolution(ResolutionError::ApprovalNotRequired { .. })
        ));
    }

    #[test]
    fn only_the_owner_submits() {
        let f = setup();
        let stranger = f.store.insert_agent(Agent::new("Stranger"));
        assert!(matches!(
            f.desk
                .submit(f.ticket, stranger, compensation(10.0))
                .unwrap_err(),
            EngineError::Ownership(_)
        ));
    }

    #[test]
    fn weekly_queue_is_seeded_and_deduplicated() {
        let f = setup();
        let (tier3, _) = f
            .desk
            .submit(f.ticket, f.owner, compensation(900.0))
            .unwrap();
        let (small, _) = f.desk.submit(f.ticket, f.owner, compensation(10.0)).unwrap();
        // Tier-3 entered at submission; a later generate must not
        // enqueue it again.
        let added = f.desk.generate_queue(17);
        assert!(added.iter().all(|i| i.resolution != tier3.id));
        let added_again = f.desk.generate_queue(17);
        assert!(added_again.iter().all(|i| i.resolution != tier3.id));
        assert!(added_again.iter().all(|i| i.resolution != small.id
            || added.iter().all(|a| a.resolution != small.id)));
    }

    #[test]
    fn review_is_once_only_and_reflected_on_the_resolution() {
        let f = setup();
        let reviewer = f.store.insert_agent(Agent::new("QA"));
        let (resolution, _) = f
            .desk
            .submit(f.ticket, f.owner, compensation(700.0))
            .unwrap();
        let item = f.desk.pending_queue()[0].clone();
        let reviewed = f
            .desk
            .review(item.id, reviewer, ReviewOutcome::Upheld, "sound judgement")
            .unwrap();
        assert_eq!(reviewed.review_status, ReviewStatus::Reviewed);
        assert!(matches!(
            f.desk
                .review(item.id, reviewer, ReviewOutcome::Revised, "again")
                .unwrap_err(),
            EngineError::Calibration(CalibrationError::AlreadyReviewed(_))
        ));
        let snap = f.store.snapshot(f.ticket).unwrap();
        let record = snap
            .resolutions
            .iter()
            .find(|r| r.id == resolution.id)
            .unwrap();
        assert_eq!(
            record.calibration_status,
            CalibrationStatus::Reviewed(ReviewOutcome::Upheld)
        );
        assert!(f.desk.pending_queue().is_empty());
    }
}
