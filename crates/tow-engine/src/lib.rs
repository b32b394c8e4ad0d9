//! TOW Engine - ticket ownership and parallel-assist workflow.
//!
//! The engine enforces one rule above all others: a ticket's owner is
//! set at most once and keeps the ticket until resolution. Everything
//! else (parallel-assist envelopes, the visibility-scoped timeline,
//! dynamic priority, the alert matrix, empowerment routing, the
//! calibration queue) is built around that invariant.
//!
//! # Example
//!
//! ```rust
//! use tow_engine::{EngineConfig, WorkflowEngine};
//! use tow_model::prelude::*;
//! use chrono::Utc;
//!
//! let engine = WorkflowEngine::new(EngineConfig::new());
//! let requester = Contact::new("pat@example.com", "Pat");
//! let requester_id = engine.store().insert_contact(requester);
//! let agent = engine.store().insert_agent(Agent::new("Kim"));
//! let ticket = engine.store().insert_ticket(Ticket::new(
//!     "INC-2024-001234",
//!     "order lost",
//!     requester_id,
//!     Priority::Medium,
//!     Utc::now(),
//! ));
//!
//! let owned = engine.accept_ticket(ticket, agent).unwrap();
//! assert_eq!(owned.owner, Some(agent));
//! // A second accept loses: ownership is set at most once.
//! assert!(engine.accept_ticket(ticket, agent).is_err());
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod effects;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod flags;
pub mod lifecycle;
pub mod ownership;
pub mod resolution;
pub mod store;

pub use config::{EngineConfig, ReopenPolicy, SlaDuringEscalation};
pub use effects::{EffectBus, Notification, NotificationEvent, Notifier, NullNotifier};
pub use engine::WorkflowEngine;
pub use envelope::EnvelopeCoordinator;
pub use error::{EngineError, EnvelopeError, ErrorKind, LifecycleError, OwnershipError};
pub use flags::{flag_effects, CaseFlags, FlagEffect, REPEAT_CONTACT_THRESHOLD};
pub use lifecycle::TicketLifecycle;
pub use ownership::{OwnershipGuard, TransferReason};
pub use resolution::{ResolutionDesk, ResolutionDraft};
pub use store::{TicketSnapshot, WorkflowStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
