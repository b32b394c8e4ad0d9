//! TOW Ledger - append-only ticket timeline
//!
//! The ledger is the source of truth for "what happened" on a
//! ticket. Entries are immutable once appended and carry a strictly
//! increasing per-ticket sequence number; no component computes
//! history any other way.
//!
//! Visibility scoping lives here too: a viewer sees only the entries
//! its scope admits, and `envelope_only` entries never leak outside
//! their envelope thread.

#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tow_model::ids::{EntryId, EnvelopeId, TicketId};
use tow_model::timeline::{Author, EntryDraft, EntryKind, TimelineEntry, Visibility};

/// Read scope for timeline queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// The requester: public entries only
    Requester,
    /// Any agent without envelope access: public + internal
    Agent,
    /// The expert assigned to one envelope: public + internal +
    /// that envelope's thread
    EnvelopeMember(EnvelopeId),
    /// The ticket owner: everything
    Owner,
}

/// Append-only, ordered timeline of one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineLog {
    ticket: TicketId,
    entries: Vec<TimelineEntry>,
    next_seq: u64,
}

impl TimelineLog {
    /// Create an empty log for a ticket
    #[inline]
    #[must_use]
    pub fn new(ticket: TicketId) -> Self {
        Self {
            ticket,
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Ticket this log belongs to
    #[inline]
    #[must_use]
    pub fn ticket(&self) -> TicketId {
        self.ticket
    }

    /// Append an entry; the log assigns id, sequence, and timestamp
    ///
    /// This is the only way to write. There is no update or delete.
    pub fn append(&mut self, draft: EntryDraft, now: DateTime<Utc>) -> &TimelineEntry {
        let entry = TimelineEntry {
            id: EntryId::new(),
            ticket: self.ticket,
            envelope: draft.envelope,
            seq: self.next_seq,
            kind: draft.kind,
            visibility: draft.visibility,
            author: draft.author,
            content: draft.content,
            created_at: now,
        };
        self.next_seq += 1;
        self.entries.push(entry);
        self.entries.last().expect("entry just pushed")
    }

    /// All entries in append order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Main-stream entries (no envelope scoping), append order
    pub fn main_stream(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter().filter(|e| e.envelope.is_none())
    }

    /// Entries of one envelope thread, append order
    pub fn envelope_thread(&self, envelope: EnvelopeId) -> impl Iterator<Item = &TimelineEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.envelope == Some(envelope))
    }

    /// Entries the viewer's scope admits, append order
    #[must_use]
    pub fn visible_to(&self, viewer: Viewer) -> Vec<&TimelineEntry> {
        self.entries
            .iter()
            .filter(|e| can_view(e, viewer))
            .collect()
    }

    /// Count of distinct inbound requester contacts
    ///
    /// Input to repeat-contact detection; "distinct" here means
    /// distinct contact events, not distinct authors; one customer
    /// writing three times is three contacts.
    #[must_use]
    pub fn inbound_contact_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::ContactInbound && matches!(e.author, Author::Requester(_)))
            .count()
    }
}

/// Whether `viewer` may read `entry`
#[must_use]
pub fn can_view(entry: &TimelineEntry, viewer: Viewer) -> bool {
    match viewer {
        Viewer::Requester => entry.visibility == Visibility::Public,
        Viewer::Agent => matches!(entry.visibility, Visibility::Public | Visibility::Internal),
        Viewer::EnvelopeMember(envelope) => match entry.visibility {
            Visibility::Public | Visibility::Internal => true,
            Visibility::EnvelopeOnly => entry.envelope == Some(envelope),
        },
        Viewer::Owner => true,
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use tow_model::ids::{AgentId, ContactId};

    fn agent_note(visibility: Visibility) -> EntryDraft {
        EntryDraft::new(
            EntryKind::Note,
            visibility,
            Author::Agent(AgentId::new()),
            "note",
        )
    }

    #[test]
    fn append_assigns_increasing_sequence() {
        let mut log = TimelineLog::new(TicketId::new());
        let now = Utc::now();
        log.append(agent_note(Visibility::Internal), now);
        log.append(agent_note(Visibility::Internal), now);
        log.append(agent_note(Visibility::Internal), now);

        let seqs: Vec<u64> = log.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn requester_sees_public_only() {
        let mut log = TimelineLog::new(TicketId::new());
        let now = Utc::now();
        log.append(agent_note(Visibility::Public), now);
        log.append(agent_note(Visibility::Internal), now);
        log.append(
            agent_note(Visibility::EnvelopeOnly).in_envelope(EnvelopeId::new()),
            now,
        );

        assert_eq!(log.visible_to(Viewer::Requester).len(), 1);
        assert_eq!(log.visible_to(Viewer::Agent).len(), 2);
        assert_eq!(log.visible_to(Viewer::Owner).len(), 3);
    }

    #[test]
    fn envelope_only_entries_stay_in_their_thread() {
        let mut log = TimelineLog::new(TicketId::new());
        let now = Utc::now();
        let mine = EnvelopeId::new();
        let other = EnvelopeId::new();
        log.append(agent_note(Visibility::EnvelopeOnly).in_envelope(mine), now);
        log.append(agent_note(Visibility::EnvelopeOnly).in_envelope(other), now);
        log.append(agent_note(Visibility::Internal), now);

        let visible = log.visible_to(Viewer::EnvelopeMember(mine));
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|e| e.envelope != Some(other)));
    }

    #[test]
    fn thread_queries_split_streams() {
        let mut log = TimelineLog::new(TicketId::new());
        let now = Utc::now();
        let envelope = EnvelopeId::new();
        log.append(agent_note(Visibility::Internal), now);
        log.append(
            agent_note(Visibility::EnvelopeOnly).in_envelope(envelope),
            now,
        );

        assert_eq!(log.main_stream().count(), 1);
        assert_eq!(log.envelope_thread(envelope).count(), 1);
    }

    #[test]
    fn inbound_contact_counting() {
        let mut log = TimelineLog::new(TicketId::new());
        let now = Utc::now();
        let requester = ContactId::new();
        for _ in 0..3 {
            log.append(
                EntryDraft::new(
                    EntryKind::ContactInbound,
                    Visibility::Public,
                    Author::Requester(requester),
                    "where is my order",
                ),
                now,
            );
        }
        log.append(agent_note(Visibility::Internal), now);

        assert_eq!(log.inbound_contact_count(), 3);
    }
}
