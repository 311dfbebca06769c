// src/error.rs - Error taxonomy shared by codec, device, state and dispatcher
use thiserror::Error;

/// Every failure that can happen while handling one request line.
///
/// The dispatcher renders any of these as a single `ERROR:<message>` reply,
/// so the `Display` text is what clients see.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid direction '{0}', expected W or R")]
    InvalidDirection(String),
    #[error("invalid byte length {0}, expected 1..=8")]
    InvalidLength(usize),
    #[error("hex payload has odd length {0}")]
    OddLength(usize),
    #[error("invalid hex payload '{0}'")]
    InvalidHex(String),
    #[error("{0}")]
    OutOfRange(String),
    #[error("invalid board '{0}', expected 1, 2 or 3")]
    InvalidBoard(String),
    #[error("invalid channel '{0}', expected 1 or 2")]
    InvalidChannel(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn out_of_range<T: std::fmt::Display>(name: &str, value: T, range: &str) -> Self {
        Error::OutOfRange(format!("{} {} is out of range {}", name, value, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let e = Error::out_of_range("amplitude", 1024, "[0, 1023]");
        assert_eq!(e.to_string(), "amplitude 1024 is out of range [0, 1023]");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
