use std::fmt;

/// Errors raised while opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every stream slot is taken.
    CapacityExhausted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityExhausted => write!(f, "No forecast stream slots are available"),
        }
    }
}

impl std::error::Error for Error {}
