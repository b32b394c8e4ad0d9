//! Post-commit notification delivery through a live drain task.
//!
//! Run with: cargo test --package tow-engine --test effect_tests

use std::sync::Arc;
use std::time::Duration;

use tow_engine::{EffectBus, EngineConfig, NotificationEvent, WorkflowEngine};
use tow_model::{Agent, Contact, EnvelopeRouting, Priority, SystemClock, Ticket};
use tow_test_utils::{init_tracing, RecordingNotifier};

#[tokio::test]
async fn envelope_request_reaches_the_notifier() {
    init_tracing();
    let notifier = Arc::new(RecordingNotifier::new());
    let bus = EffectBus::spawn(notifier.clone());
    let engine = WorkflowEngine::with_parts(EngineConfig::new(), Arc::new(SystemClock), bus);

    let requester = engine
        .store()
        .insert_contact(Contact::new("pat@example.com", "Pat"));
    let ticket = engine.store().insert_ticket(Ticket::new(
        "INC-2026-000501",
        "billing dispute",
        requester,
        Priority::Medium,
        chrono::Utc::now(),
    ));
    let owner = engine.store().insert_agent(Agent::new("Kim"));
    let expert = engine.store().insert_agent(Agent::new("Evi"));
    engine.accept_ticket(ticket, owner).expect("accept");
    engine
        .create_envelope(ticket, owner, EnvelopeRouting::Agent(expert), "billing check")
        .expect("envelope");

    // The drain task runs concurrently; give it a moment to deliver.
    let mut delivered = Vec::new();
    for _ in 0..50 {
        delivered = notifier.delivered();
        if !delivered.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].recipient, Some(expert));
    assert!(matches!(
        delivered[0].event,
        NotificationEvent::EnvelopeRequested { .. }
    ));
}
