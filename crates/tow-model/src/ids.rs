//! Identifier newtypes
//!
//! Every entity gets its own ULID-backed id type so a `TicketId` can
//! never be passed where an `EnvelopeId` is expected. ULIDs are
//! lexicographically sortable by creation time, which the work queue
//! relies on for its earliest-created tiebreak.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique ticket identifier
    TicketId
);
entity_id!(
    /// Unique agent identifier
    AgentId
);
entity_id!(
    /// Unique team identifier
    TeamId
);
entity_id!(
    /// Unique requester contact identifier
    ContactId
);
entity_id!(
    /// Unique envelope identifier
    EnvelopeId
);
entity_id!(
    /// Unique task identifier
    TaskId
);
entity_id!(
    /// Unique timeline entry identifier
    EntryId
);
entity_id!(
    /// Unique case flag identifier
    FlagId
);
entity_id!(
    /// Unique resolution identifier
    ResolutionId
);
entity_id!(
    /// Unique calibration item identifier
    CalibrationItemId
);
