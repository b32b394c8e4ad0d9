//! Post-commit side effects.
//!
//! Mutations commit synchronously under the ticket lock; anything that
//! crosses a process boundary (notifying an agent, requesting an SLA
//! upgrade) is described as a [`Notification`] and pushed onto the
//! [`EffectBus`] after the lock is released. A dropped or full bus
//! never fails the originating operation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tow_model::{AgentId, EnvelopeId, ResolutionId, TicketId};
use tow_scoring::{AlertCondition, RecipientRole};

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A parallel-assist envelope was requested from you or your team.
    EnvelopeRequested {
        /// The pending envelope.
        envelope: EnvelopeId,
    },
    /// An expert accepted your envelope.
    EnvelopeAccepted {
        /// The active envelope.
        envelope: EnvelopeId,
        /// Who accepted.
        expert: AgentId,
    },
    /// An envelope you participate in closed.
    EnvelopeCompleted {
        /// The completed envelope.
        envelope: EnvelopeId,
    },
    /// A resolution awaits your approval.
    ApprovalRequested {
        /// The pending resolution.
        resolution: ResolutionId,
    },
    /// Your resolution was approved.
    ResolutionApproved {
        /// The approved resolution.
        resolution: ResolutionId,
    },
    /// A case flag asks for manager attention.
    ManagerAlertRequested,
    /// A case flag asks for an SLA upgrade on the ticket.
    SlaUpgradeRequested,
    /// An alert matrix threshold fired.
    AlertRaised {
        /// Breached condition.
        condition: AlertCondition,
        /// Severity level, 1 to 3.
        level: u8,
        /// Role this copy of the alert addresses.
        role: RecipientRole,
    },
}

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Addressee; `None` routes to the ticket's team queue.
    pub recipient: Option<AgentId>,
    /// What happened.
    pub event: NotificationEvent,
    /// Ticket it concerns.
    pub ticket: TicketId,
    /// Free-form context line.
    pub detail: String,
}

/// Delivery backend for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification. Failures are the notifier's problem;
    /// the engine never retries.
    async fn notify(&self, notification: Notification);
}

/// Notifier that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _notification: Notification) {}
}

/// Cheap-to-clone handle for queueing post-commit notifications.
#[derive(Clone)]
pub struct EffectBus {
    tx: mpsc::UnboundedSender<Notification>,
}

impl fmt::Debug for EffectBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectBus")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl EffectBus {
    /// Spawns a drain task delivering to `notifier`. Requires a tokio
    /// runtime.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                notifier.notify(notification).await;
            }
        });
        Self { tx }
    }

    /// Bus with a captured receiver, for asserting on effects without
    /// a runtime.
    #[must_use]
    pub fn capture() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Bus that silently discards everything.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Queues a notification. Best-effort: a closed bus is ignored.
    pub fn send(&self, notification: Notification) {
        tracing::debug!(
            ticket = %notification.ticket,
            event = ?notification.event,
            "queueing notification"
        );
        let _ = self.tx.send(notification);
    }
}
