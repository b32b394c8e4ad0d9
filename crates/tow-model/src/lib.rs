//! TOW Model - entities for the ticket ownership workflow engine
//!
//! Everything a component mutates or reads is defined here as a
//! closed type: ticket and envelope lifecycles carry explicit,
//! exhaustive transition tables so the compiler, not convention,
//! rules out off-table moves.
//!
//! # Example
//!
//! ```rust
//! use tow_model::prelude::*;
//! use chrono::Utc;
//!
//! let requester = Contact::new("pat@example.com", "Pat").with_tier(RequesterTier::Vip);
//! let ticket = Ticket::new("INC-2024-001234", "order lost", requester.id, Priority::Medium, Utc::now());
//! assert_eq!(ticket.status, TicketStatus::New);
//! assert!(ticket.owner.is_none());
//! ```

#![warn(missing_docs)]

pub mod agent;
pub mod clock;
pub mod envelope;
pub mod flag;
pub mod ids;
pub mod resolution;
pub mod task;
pub mod ticket;
pub mod timeline;

pub use agent::{Agent, Capacity, Team};
pub use clock::{Clock, SystemClock};
pub use envelope::{Envelope, EnvelopeRouting, EnvelopeStatus, EnvelopeTransitionError};
pub use flag::{CaseFlag, CaseFlagType};
pub use ids::{
    AgentId, CalibrationItemId, ContactId, EntryId, EnvelopeId, FlagId, ResolutionId, TaskId,
    TeamId, TicketId,
};
pub use resolution::{
    CalibrationItem, CalibrationReason, CalibrationStatus, EligibilityCategory, EmpowermentConfig,
    EmpowermentConfigError, EmpowermentTier, FaultCategory, Resolution, ResolutionType,
    ReviewOutcome, ReviewStatus,
};
pub use task::{Task, TaskStatus};
pub use ticket::{Contact, Priority, RequesterTier, Ticket, TicketStatus, TicketTransitionError, TicketType};
pub use timeline::{Author, EntryDraft, EntryKind, TimelineEntry, Visibility};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the TOW model
    pub use crate::{
        Agent, AgentId, Author, CaseFlag, CaseFlagType, Clock, Contact, ContactId, Envelope,
        EnvelopeId, EnvelopeRouting, EnvelopeStatus, EntryDraft, EntryKind, Priority,
        RequesterTier, Resolution, ResolutionId, SystemClock, Task, TaskId, Team, TeamId, Ticket,
        TicketId, TicketStatus, TicketType, TimelineEntry, Visibility,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
