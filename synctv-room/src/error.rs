use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    #[error("Hub closed")]
    HubClosed,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mailbox full: {0}")]
    Backpressure(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable classification of an [`Error`], for front ends that map failures
/// onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AlreadyClosed,
    InvalidInput,
    ResourceExhausted,
    Unavailable,
    Internal,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::AlreadyClosed(_) | Self::HubClosed => ErrorKind::AlreadyClosed,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Backpressure(_) => ErrorKind::ResourceExhausted,
            Self::Transport(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.kind(), ErrorKind::AlreadyClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::HubClosed.kind(), ErrorKind::AlreadyClosed);
        assert_eq!(
            Error::AlreadyClosed("connection".to_string()).kind(),
            ErrorKind::AlreadyClosed
        );
        assert_eq!(Error::NotFound("movie".to_string()).kind(), ErrorKind::NotFound);
        assert!(Error::HubClosed.is_closed());
        assert!(!Error::InvalidInput("id".to_string()).is_closed());
    }

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyExists("user alice".to_string());
        assert_eq!(err.to_string(), "Already exists: user alice");
    }
}
