//! Error types returned by the scene and geometry API.

use thiserror::Error;

/// The kind of error, mirroring the `RTCError` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidOperation,
    OutOfMemory,
    UnsupportedCpu,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    /// Returns the name of the error code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "RTC_ERROR_INVALID_ARGUMENT",
            ErrorKind::InvalidOperation => "RTC_ERROR_INVALID_OPERATION",
            ErrorKind::OutOfMemory => "RTC_ERROR_OUT_OF_MEMORY",
            ErrorKind::UnsupportedCpu => "RTC_ERROR_UNSUPPORTED_CPU",
            ErrorKind::Cancelled => "RTC_ERROR_CANCELLED",
            ErrorKind::Unknown => "RTC_ERROR_UNKNOWN",
        }
    }
}

/// An error with a fixed message naming the rule that was violated.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[error("{}: {}", .kind.as_str(), .msg)]
pub struct RtcError {
    pub kind: ErrorKind,
    pub msg: &'static str,
}

impl RtcError {
    pub fn invalid_operation(msg: &'static str) -> Self {
        RtcError {
            kind: ErrorKind::InvalidOperation,
            msg,
        }
    }

    pub fn invalid_argument(msg: &'static str) -> Self {
        RtcError {
            kind: ErrorKind::InvalidArgument,
            msg,
        }
    }
}

pub type RtcResult<T> = std::result::Result<T, RtcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = RtcError::invalid_operation("static scenes cannot get modified");
        assert_eq!(
            err.to_string(),
            "RTC_ERROR_INVALID_OPERATION: static scenes cannot get modified"
        );
    }
}
