//! Dynamic priority over live engine state.
//!
//! Run with: cargo test --package tow-engine --test scoring_tests

use chrono::Duration;
use tow_engine::{EngineConfig, SlaDuringEscalation};
use tow_model::{Clock, EnvelopeRouting, Priority, Ticket};
use tow_test_utils::TestWorld;

fn ticket_with_breach(world: &TestWorld, reference: &str, priority: Priority, breach_in: Duration) -> tow_model::TicketId {
    world.engine.store().insert_ticket(
        Ticket::new(reference, "scored ticket", world.requester, priority, world.clock.now())
            .with_team(world.team)
            .with_sla_breach_at(world.clock.now() + breach_in),
    )
}

#[test]
fn work_queue_orders_by_score_not_intake() {
    let world = TestWorld::new();
    // Older medium ticket, comfortable SLA.
    let medium = ticket_with_breach(&world, "INC-2026-000401", Priority::Medium, Duration::days(3));
    world.engine.accept_ticket(medium, world.agent).expect("accept");

    world.clock.advance(Duration::hours(1));
    // Younger high ticket, SLA closing in.
    let high = ticket_with_breach(&world, "INC-2026-000402", Priority::High, Duration::minutes(30));
    world.engine.accept_ticket(high, world.agent).expect("accept");

    let queue = world.engine.work_queue(world.agent).expect("queue");
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].ticket, high);
    assert_eq!(queue[1].ticket, medium);
    assert!(queue[0].score.value > queue[1].score.value);
}

#[test]
fn sla_proximity_raises_the_score() {
    let world = TestWorld::new();
    let ticket = ticket_with_breach(&world, "INC-2026-000403", Priority::Medium, Duration::days(2));
    world.engine.accept_ticket(ticket, world.agent).expect("accept");

    let relaxed = world.engine.recalculate_priority(ticket).expect("score");
    world.clock.advance(Duration::days(2) - Duration::minutes(30));
    let urgent = world.engine.recalculate_priority(ticket).expect("score");
    assert!(urgent.value > relaxed.value);
    assert!(urgent.sla_factor > relaxed.sla_factor);
}

#[test]
fn paused_sla_ignores_breach_while_escalated() {
    let world = TestWorld::with_config(
        EngineConfig::new().with_sla_during_escalation(SlaDuringEscalation::Pause),
    );
    let ticket = ticket_with_breach(&world, "INC-2026-000404", Priority::Medium, Duration::hours(2));
    world.engine.accept_ticket(ticket, world.agent).expect("accept");

    let before = world.engine.recalculate_priority(ticket).expect("score");
    assert!(before.sla_factor > 1.0);

    let env = world
        .engine
        .create_envelope(
            ticket,
            world.agent,
            EnvelopeRouting::Agent(world.expert),
            "specialist input",
        )
        .expect("create");
    world.engine.accept_envelope(env.id, world.expert).expect("accept envelope");

    // Active envelope: SLA pressure drops out, escalation uplift comes in.
    let during = world.engine.recalculate_priority(ticket).expect("score");
    assert_eq!(during.sla_factor, 1.0);
    assert!(during.escalation_factor > 1.0);

    world
        .engine
        .complete_envelope(env.id, world.expert, "done")
        .expect("complete");
    let after = world.engine.recalculate_priority(ticket).expect("score");
    assert!(after.sla_factor > 1.0);
}
