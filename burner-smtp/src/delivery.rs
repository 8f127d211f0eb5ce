//! Per-connection delivery state, driven by the SMTP session one callback at
//! a time.
//!
//! ```text
//! Idle --sender--> GotSender --recipient--> Recipients --data--> Received
//!   ^                                                               |
//!   +--------------------------- reset -----------------------------+
//! ```
//!
//! A new sender starts a fresh envelope from any phase. A rejected recipient
//! leaves the phase unchanged.

use std::sync::Arc;

use burner_common::{
    internal,
    message::{Envelope, MessageDraft},
    policy::DomainPolicy,
    traits::{FiniteStateMachine, Rejected},
};
use burner_store::MailboxStore;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, info};

use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    GotSender,
    Recipients,
    Received,
}

impl Phase {
    /// Checks if a mail transaction has been started and not yet completed.
    pub const fn in_transaction(self) -> bool {
        matches!(self, Self::GotSender | Self::Recipients)
    }
}

#[derive(Debug)]
pub enum Event {
    Sender(String),
    Recipient(String),
    Data,
    Reset,
}

#[derive(Debug)]
pub struct Transaction {
    envelope: Envelope,
    policy: Arc<DomainPolicy>,
}

const ALREADY_RECEIVED: &str = "Message already received, reset first";

impl FiniteStateMachine for Phase {
    type Input = Event;
    type Context = Transaction;
    type Error = DeliveryError;

    fn transition(
        self,
        input: Self::Input,
        transaction: &mut Self::Context,
    ) -> Result<Self, Rejected<Self, Self::Error>> {
        match (self, input) {
            (_, Event::Reset) => {
                transaction.envelope.clear();
                Ok(Self::Idle)
            }
            (_, Event::Sender(sender)) => {
                transaction.envelope.recipients.clear();
                transaction.envelope.sender = sender;
                Ok(Self::GotSender)
            }
            (Self::Received, Event::Recipient(_) | Event::Data) => Err(Rejected::new(
                self,
                DeliveryError::BadSequence(ALREADY_RECEIVED),
            )),
            (_, Event::Recipient(recipient)) => {
                if transaction.policy.is_accepted(&recipient) {
                    transaction.envelope.recipients.push(recipient);
                    Ok(Self::Recipients)
                } else {
                    Err(Rejected::new(
                        self,
                        DeliveryError::RecipientRejected(recipient),
                    ))
                }
            }
            (Self::Recipients, Event::Data) => Ok(Self::Received),
            (Self::Idle | Self::GotSender, Event::Data) => {
                Err(Rejected::new(self, DeliveryError::NoRecipients))
            }
        }
    }
}

/// One client's mail transactions, from first `MAIL` to logout.
#[derive(Debug)]
pub struct Delivery {
    phase: Phase,
    transaction: Transaction,
    store: Arc<dyn MailboxStore>,
}

impl Delivery {
    pub fn new(policy: Arc<DomainPolicy>, store: Arc<dyn MailboxStore>) -> Self {
        Self {
            phase: Phase::Idle,
            transaction: Transaction {
                envelope: Envelope::default(),
                policy,
            },
            store,
        }
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn envelope(&self) -> &Envelope {
        &self.transaction.envelope
    }

    fn advance(&mut self, event: Event) -> Result<(), DeliveryError> {
        match self.phase.transition(event, &mut self.transaction) {
            Ok(next) => {
                self.phase = next;
                Ok(())
            }
            Err(Rejected { state, error }) => {
                self.phase = state;
                Err(error)
            }
        }
    }

    /// Start a new envelope from `sender`. Never refused.
    pub fn on_sender(&mut self, sender: impl Into<String>) {
        let sender = sender.into();
        internal!("Sender <{sender}>");

        self.phase = match self
            .phase
            .transition(Event::Sender(sender), &mut self.transaction)
        {
            Ok(next) | Err(Rejected { state: next, .. }) => next,
        };
    }

    /// Add `recipient` to the envelope if the domain policy accepts it.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::RecipientRejected`] if the policy refuses the
    /// address. The envelope and phase are left as they were, so the client
    /// may try another recipient.
    pub fn on_recipient(&mut self, recipient: impl Into<String>) -> Result<(), DeliveryError> {
        let recipient = recipient.into();
        internal!("Recipient <{recipient}>");

        self.advance(Event::Recipient(recipient))
    }

    /// Read the whole message from `content`, parse it and store it.
    ///
    /// Returns the stored id. `None` means the message was accepted but the
    /// store failed to keep it; the failure is logged rather than pushed back
    /// onto the client.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::NoRecipients`] if nothing was accepted to deliver to
    /// - [`DeliveryError::Transport`] if `content` fails before its end
    /// - [`DeliveryError::Parse`] if the content is not a mail message
    ///
    /// Read and parse failures abandon the transaction.
    pub async fn on_data<R>(&mut self, mut content: R) -> Result<Option<u64>, DeliveryError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.advance(Event::Data)?;

        let mut raw = Vec::new();
        if let Err(e) = content.read_to_end(&mut raw).await {
            self.on_reset();
            return Err(e.into());
        }

        let envelope = std::mem::take(&mut self.transaction.envelope);
        let draft = match MessageDraft::parse(envelope, raw, Utc::now()) {
            Ok(draft) => draft,
            Err(e) => {
                self.on_reset();
                return Err(e.into());
            }
        };

        let (sender, recipients, size) = (
            draft.envelope.sender.clone(),
            draft.envelope.recipients.len(),
            draft.raw.len(),
        );

        match self.store.save(draft).await {
            Ok(id) => {
                info!(id, sender = %sender, recipients, size, "Message stored");
                Ok(Some(id))
            }
            Err(e) => {
                error!(sender = %sender, recipients, size, error = %e, "Failed to store accepted message");
                Ok(None)
            }
        }
    }

    /// Drop the envelope and return to [`Phase::Idle`].
    pub fn on_reset(&mut self) {
        self.phase = match self.phase.transition(Event::Reset, &mut self.transaction) {
            Ok(next) | Err(Rejected { state: next, .. }) => next,
        };
    }

    /// End of the session.
    pub fn on_logout(self) {
        internal!("Logout in phase {:?}", self.phase);
    }
}
