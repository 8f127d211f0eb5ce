use std::io;

use burner_common::{error::ParseError, status::Status};
use thiserror::Error;

/// Why a delivery callback refused its input.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The recipient's domain is not one we keep mail for. The transaction
    /// carries on without it.
    #[error("Invalid recipient {0}")]
    RecipientRejected(String),

    /// Message content offered before any recipient was accepted.
    #[error("No valid recipients")]
    NoRecipients,

    /// A callback arrived in a phase where it makes no sense.
    #[error("Bad sequence of commands: {0}")]
    BadSequence(&'static str),

    /// The message content could not be read to the end.
    #[error("Failed to read message: {0}")]
    Transport(#[from] io::Error),

    /// The message content is not a mail message.
    #[error("Failed to parse message: {0}")]
    Parse(#[from] ParseError),
}

impl DeliveryError {
    /// The SMTP reply for this error.
    pub const fn status(&self) -> Status {
        match self {
            Self::RecipientRejected(_) => Status::Error,
            Self::NoRecipients | Self::BadSequence(_) => Status::InvalidCommandSequence,
            Self::Transport(_) => Status::ActionUnavailable,
            Self::Parse(_) => Status::TransactionFailed,
        }
    }

    /// Reply text, including the RFC 3463 enhanced status code.
    pub fn reply(&self) -> String {
        match self {
            Self::RecipientRejected(_) => "5.1.1 Invalid recipient".to_string(),
            Self::NoRecipients => "5.5.1 No valid recipients".to_string(),
            Self::BadSequence(why) => format!("5.5.1 {why}"),
            Self::Transport(_) => "4.3.0 Failed to read message".to_string(),
            Self::Parse(_) => "5.6.0 Message could not be parsed".to_string(),
        }
    }
}
