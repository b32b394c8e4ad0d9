//! Testing utilities for the TOW workspace
//!
//! Shared clocks, notifiers, and fixtures.

#![allow(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tow_engine::{EffectBus, EngineConfig, Notification, Notifier, WorkflowEngine};
use tow_model::{Agent, AgentId, Clock, Contact, ContactId, Priority, Team, TeamId, Ticket, TicketId};

/// Installs a tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Clock whose time only moves when a test says so.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at a fixed, readable instant.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Notifier that records everything it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.delivered.lock().push(notification);
    }
}

/// An engine on a manual clock with a captured effect bus, plus the
/// standard cast: a team with supervisor and manager, two agents in
/// the team, and a requester.
pub struct TestWorld {
    pub engine: WorkflowEngine,
    pub clock: Arc<ManualClock>,
    pub effects: tokio::sync::mpsc::UnboundedReceiver<Notification>,
    pub team: TeamId,
    pub supervisor: AgentId,
    pub manager: AgentId,
    pub agent: AgentId,
    pub expert: AgentId,
    pub requester: ContactId,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let (bus, effects) = EffectBus::capture();
        let engine = WorkflowEngine::with_parts(config, clock.clone(), bus);
        let supervisor = engine.store().insert_agent(Agent::new("Sam Supervisor"));
        let manager = engine.store().insert_agent(Agent::new("Mel Manager"));
        let team = engine.store().insert_team(
            Team::new("frontline", Default::default())
                .with_supervisor(supervisor)
                .with_manager(manager),
        );
        let agent = engine.store().insert_agent(Agent::new("Kim Agent").in_team(team));
        let expert = engine
            .store()
            .insert_agent(Agent::new("Evi Expert").in_team(team));
        let requester = engine
            .store()
            .insert_contact(Contact::new("pat@example.com", "Pat Requester"));
        Self {
            engine,
            clock,
            effects,
            team,
            supervisor,
            manager,
            agent,
            expert,
            requester,
        }
    }

    /// Registers a fresh medium-priority ticket on the fixture team.
    pub fn new_ticket(&self, reference: &str) -> TicketId {
        self.engine.store().insert_ticket(
            Ticket::new(
                reference,
                "fixture ticket",
                self.requester,
                Priority::Medium,
                self.clock.now(),
            )
            .with_team(self.team),
        )
    }

    /// Registers a ticket and has the fixture agent accept it.
    pub fn owned_ticket(&self, reference: &str) -> TicketId {
        let ticket = self.new_ticket(reference);
        self.engine
            .accept_ticket(ticket, self.agent)
            .expect("fixture accept");
        ticket
    }

    /// Drains everything currently sitting on the effect bus.
    pub fn drain_effects(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.effects.try_recv().ok()).collect()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
