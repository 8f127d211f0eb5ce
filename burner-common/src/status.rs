use core::fmt::{self, Display, Formatter};

/// SMTP reply codes used by the receiver (RFC 5321 Section 4.2).
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    HelpMessage = 214,
    ServiceReady = 220,
    GoodBye = 221,
    Ok = 250,
    StartMailInput = 354,
    Unavailable = 421,
    ActionUnavailable = 451,
    InsufficientStorage = 452,
    SyntaxError = 500,
    ParameterError = 501,
    NotImplemented = 502,
    InvalidCommandSequence = 503,
    Error = 550,
    ExceededStorage = 552,
    TransactionFailed = 554,
    Unknown(u32),
}

impl Status {
    /// Checks if the status is a permanent rejection
    pub fn is_permanent(self) -> bool {
        u32::from(self) >= 500
    }

    /// Checks if the status is a temporary rejection
    pub fn is_temporary(self) -> bool {
        (400..500).contains(&u32::from(self))
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            214 => Self::HelpMessage,
            220 => Self::ServiceReady,
            221 => Self::GoodBye,
            250 => Self::Ok,
            354 => Self::StartMailInput,
            421 => Self::Unavailable,
            451 => Self::ActionUnavailable,
            452 => Self::InsufficientStorage,
            500 => Self::SyntaxError,
            501 => Self::ParameterError,
            502 => Self::NotImplemented,
            503 => Self::InvalidCommandSequence,
            550 => Self::Error,
            552 => Self::ExceededStorage,
            554 => Self::TransactionFailed,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        match value {
            Status::HelpMessage => 214,
            Status::ServiceReady => 220,
            Status::GoodBye => 221,
            Status::Ok => 250,
            Status::StartMailInput => 354,
            Status::Unavailable => 421,
            Status::ActionUnavailable => 451,
            Status::InsufficientStorage => 452,
            Status::SyntaxError => 500,
            Status::ParameterError => 501,
            Status::NotImplemented => 502,
            Status::InvalidCommandSequence => 503,
            Status::Error => 550,
            Status::ExceededStorage => 552,
            Status::TransactionFailed => 554,
            Status::Unknown(v) => v,
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn status() {
        assert!(Status::Error.is_permanent());
        assert!(!Status::Error.is_temporary());

        assert!(Status::Unavailable.is_temporary());
        assert!(!Status::Unavailable.is_permanent());

        assert!(!Status::Ok.is_temporary());
        assert!(!Status::Ok.is_permanent());

        assert_eq!(Status::from(550), Status::Error);
        assert_eq!(u32::from(Status::Error), 550);
        assert_eq!(Status::from(299), Status::Unknown(299));
        assert_eq!(Status::InsufficientStorage.to_string(), "452");
    }

    #[test]
    fn round_trips_known_codes() {
        for code in [
            214, 220, 221, 250, 354, 421, 451, 452, 500, 501, 502, 503, 550, 552, 554,
        ] {
            let status = Status::from(code);
            assert!(!matches!(status, Status::Unknown(_)), "{code} is unknown");
            assert_eq!(u32::from(status), code);
        }
    }
}
