//! Timeline entries
//!
//! Entries are immutable once written; the ledger only appends.
//! Visibility restricts the audience: public entries reach the
//! requester, internal entries any agent, envelope-only entries just
//! the owner and that envelope's expert.

use crate::ids::{AgentId, ContactId, EntryId, EnvelopeId, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of event an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Message from the requester
    ContactInbound,
    /// Message to the requester
    ContactOutbound,
    /// Agent note
    Note,
    /// Engine-generated event
    System,
    /// Envelope created
    EnvelopeCreated,
    /// Envelope accepted by an expert
    EnvelopeAccepted,
    /// Envelope completed, summary posted
    EnvelopeCompleted,
    /// Envelope cancelled
    EnvelopeCancelled,
    /// Task created
    TaskCreated,
    /// Task completed
    TaskCompleted,
    /// Ticket status changed
    StatusChange,
    /// Ownership established
    OwnershipAccepted,
    /// Administrative ownership transfer
    OwnershipTransferred,
    /// Case flag added
    FlagAdded,
    /// Complaint recorded
    ComplaintRecorded,
    /// Resolution submitted
    Resolution,
}

/// Who may read an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Requester and agents
    Public,
    /// Agents only
    Internal,
    /// Owner and that envelope's expert only
    EnvelopeOnly,
}

/// Entry author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// An agent wrote it
    Agent(AgentId),
    /// The requester wrote it
    Requester(ContactId),
    /// The engine wrote it
    System,
}

/// Immutable timeline record
///
/// `seq` is assigned by the ledger on append and is strictly
/// increasing per ticket; it, not the timestamp, defines order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Entry identifier
    pub id: EntryId,
    /// Parent ticket
    pub ticket: TicketId,
    /// Owning envelope thread, `None` for the main stream
    pub envelope: Option<EnvelopeId>,
    /// Position in the ticket's ledger
    pub seq: u64,
    /// Event kind
    pub kind: EntryKind,
    /// Audience restriction
    pub visibility: Visibility,
    /// Who wrote it
    pub author: Author,
    /// Body text
    pub content: String,
    /// Write instant
    pub created_at: DateTime<Utc>,
}

/// Entry under construction; the ledger assigns `seq` on append
#[derive(Debug, Clone)]
pub struct EntryDraft {
    /// Owning envelope thread, `None` for the main stream
    pub envelope: Option<EnvelopeId>,
    /// Event kind
    pub kind: EntryKind,
    /// Audience restriction
    pub visibility: Visibility,
    /// Who wrote it
    pub author: Author,
    /// Body text
    pub content: String,
}

impl EntryDraft {
    /// Draft a main-stream entry
    #[inline]
    #[must_use]
    pub fn new(kind: EntryKind, visibility: Visibility, author: Author, content: impl Into<String>) -> Self {
        Self {
            envelope: None,
            kind,
            visibility,
            author,
            content: content.into(),
        }
    }

    /// Scope the draft to an envelope thread
    #[inline]
    #[must_use]
    pub fn in_envelope(mut self, envelope: EnvelopeId) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Draft a system event on the main stream
    #[inline]
    #[must_use]
    pub fn system(kind: EntryKind, content: impl Into<String>) -> Self {
        Self::new(kind, Visibility::Internal, Author::System, content)
    }
}
