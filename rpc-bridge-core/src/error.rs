//! Status codes and the bridge error taxonomy.
//!
//! This module provides the error types every bridge session reports through:
//! - [`Code`]: gRPC-style status codes
//! - [`Error`]: the terminal error of one call session
//! - [`StreamError`]: mid-stream failures, including the clean end of a stream

use std::fmt;
use std::str::FromStr;

/// RPC status codes, numbered as in the gRPC protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Get the string representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// Map a numeric status code to a [`Code`].
    ///
    /// Values outside the known range map to [`Code::Unknown`].
    pub fn from_i32(value: i32) -> Code {
        match value {
            0 => Code::Ok,
            1 => Code::Canceled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    /// Returns whether this code indicates a transient condition that may be
    /// resolved by starting the call again.
    ///
    /// The bridge itself never retries; this is a hint for hosts.
    ///
    /// ```
    /// use rpc_bridge_core::Code;
    ///
    /// assert!(Code::Unavailable.is_retryable());
    /// assert!(!Code::InvalidArgument.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Code::Unavailable | Code::ResourceExhausted | Code::Aborted
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCodeError(());

impl fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code")
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Code::Ok),
            "canceled" | "cancelled" => Ok(Code::Canceled),
            "unknown" => Ok(Code::Unknown),
            "invalid_argument" => Ok(Code::InvalidArgument),
            "deadline_exceeded" => Ok(Code::DeadlineExceeded),
            "not_found" => Ok(Code::NotFound),
            "already_exists" => Ok(Code::AlreadyExists),
            "permission_denied" => Ok(Code::PermissionDenied),
            "resource_exhausted" => Ok(Code::ResourceExhausted),
            "failed_precondition" => Ok(Code::FailedPrecondition),
            "aborted" => Ok(Code::Aborted),
            "out_of_range" => Ok(Code::OutOfRange),
            "unimplemented" => Ok(Code::Unimplemented),
            "internal" => Ok(Code::Internal),
            "unavailable" => Ok(Code::Unavailable),
            "data_loss" => Ok(Code::DataLoss),
            "unauthenticated" => Ok(Code::Unauthenticated),
            _ => Err(ParseCodeError(())),
        }
    }
}

/// Failures that terminate a stream half.
///
/// [`StreamError::EndOfStream`] is not a fault: it is how a finite stream
/// reports completion. It still travels as the terminal error so that a
/// stream sink observes exactly one terminal signal.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The remote side finished the stream cleanly.
    #[error("end of stream")]
    EndOfStream,

    /// A message was sent after the send side was stopped.
    #[error("send after stream was stopped")]
    SendAfterStop,

    /// The send side was stopped a second time.
    #[error("send stream already stopped")]
    AlreadyStopped,

    /// The peer went away before the operation completed.
    #[error("stream disconnected: {0}")]
    Disconnected(String),

    /// The session's cancellation scope was cancelled.
    #[error("stream canceled")]
    Canceled,

    /// The remote side terminated the stream with a status.
    #[error("stream failed ({code}): {message}")]
    Status { code: Code, message: String },
}

/// The terminal error of one bridge call session.
///
/// Variants follow the order in which a session can fail: decoding the
/// request, acquiring a connection, invoking the remote method, pulling or
/// pushing stream messages, and encoding a response.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The request bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// No connection to the backend could be acquired.
    #[error("connect error: {0}")]
    Connect(String),

    /// The remote method rejected the call or could not be opened.
    #[error("invoke error ({code}): {message}")]
    Invoke { code: Code, message: String },

    /// A stream failed or finished.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A response could not be encoded for delivery.
    #[error("encode error: {0}")]
    Encode(String),
}

impl Error {
    /// Create an invoke error with a code and message.
    pub fn invoke<S: Into<String>>(code: Code, message: S) -> Self {
        Error::Invoke {
            code,
            message: message.into(),
        }
    }

    /// The clean end-of-stream terminal value.
    pub fn end_of_stream() -> Self {
        Error::Stream(StreamError::EndOfStream)
    }

    /// A cancellation observed while a stream was live.
    pub fn canceled() -> Self {
        Error::Stream(StreamError::Canceled)
    }

    /// Returns true if this error is the clean end of a stream rather than
    /// a fault.
    ///
    /// ```
    /// use rpc_bridge_core::{Error, StreamError};
    ///
    /// assert!(Error::end_of_stream().is_end_of_stream());
    /// assert!(!Error::Stream(StreamError::Canceled).is_end_of_stream());
    /// ```
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::Stream(StreamError::EndOfStream))
    }

    /// Get the status code for this error.
    ///
    /// For variants without a remote status, returns an appropriate code:
    /// - Decode: `InvalidArgument`
    /// - Connect, Disconnected: `Unavailable`
    /// - Encode: `Internal`
    /// - EndOfStream: `Ok`
    /// - Canceled: `Canceled`
    /// - SendAfterStop, AlreadyStopped: `FailedPrecondition`
    pub fn code(&self) -> Code {
        match self {
            Error::Decode(_) => Code::InvalidArgument,
            Error::Connect(_) => Code::Unavailable,
            Error::Invoke { code, .. } => *code,
            Error::Encode(_) => Code::Internal,
            Error::Stream(stream) => match stream {
                StreamError::EndOfStream => Code::Ok,
                StreamError::SendAfterStop | StreamError::AlreadyStopped => {
                    Code::FailedPrecondition
                }
                StreamError::Disconnected(_) => Code::Unavailable,
                StreamError::Canceled => Code::Canceled,
                StreamError::Status { code, .. } => *code,
            },
        }
    }

    /// Get the error message, if the variant carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::Decode(msg) | Error::Connect(msg) | Error::Encode(msg) => Some(msg),
            Error::Invoke { message, .. } => Some(message),
            Error::Stream(StreamError::Disconnected(msg)) => Some(msg),
            Error::Stream(StreamError::Status { message, .. }) => Some(message),
            Error::Stream(_) => None,
        }
    }

    /// Returns whether starting the call again may succeed.
    ///
    /// Connection failures are retryable; so are remote statuses whose code
    /// is retryable. End of stream is not a failure and is never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Stream(StreamError::EndOfStream) => false,
            _ => self.code().is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_as_str() {
        assert_eq!(Code::Ok.as_str(), "ok");
        assert_eq!(Code::InvalidArgument.as_str(), "invalid_argument");
        assert_eq!(Code::Unauthenticated.to_string(), "unauthenticated");
    }

    #[test]
    fn test_code_from_str() {
        assert_eq!("ok".parse(), Ok(Code::Ok));
        assert_eq!("invalid_argument".parse(), Ok(Code::InvalidArgument));
        assert_eq!("canceled".parse(), Ok(Code::Canceled));
        assert_eq!("cancelled".parse(), Ok(Code::Canceled));
        assert_eq!("unknown_code".parse::<Code>(), Err(ParseCodeError(())));
    }

    #[test]
    fn test_code_from_i32() {
        assert_eq!(Code::from_i32(0), Code::Ok);
        assert_eq!(Code::from_i32(14), Code::Unavailable);
        assert_eq!(Code::from_i32(16), Code::Unauthenticated);
        assert_eq!(Code::from_i32(99), Code::Unknown);
        assert_eq!(Code::from_i32(-1), Code::Unknown);
    }

    #[test]
    fn test_code_is_retryable() {
        assert!(Code::Unavailable.is_retryable());
        assert!(Code::ResourceExhausted.is_retryable());
        assert!(Code::Aborted.is_retryable());

        assert!(!Code::Ok.is_retryable());
        assert!(!Code::Canceled.is_retryable());
        assert!(!Code::InvalidArgument.is_retryable());
        assert!(!Code::NotFound.is_retryable());
        assert!(!Code::Internal.is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Decode("bad".into()).code(), Code::InvalidArgument);
        assert_eq!(Error::Connect("down".into()).code(), Code::Unavailable);
        assert_eq!(Error::invoke(Code::NotFound, "missing").code(), Code::NotFound);
        assert_eq!(Error::Encode("bad".into()).code(), Code::Internal);
        assert_eq!(Error::end_of_stream().code(), Code::Ok);
        assert_eq!(Error::canceled().code(), Code::Canceled);
        assert_eq!(
            Error::from(StreamError::SendAfterStop).code(),
            Code::FailedPrecondition
        );
        assert_eq!(
            Error::from(StreamError::Status {
                code: Code::Aborted,
                message: "x".into()
            })
            .code(),
            Code::Aborted
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::Decode("empty request".into()).to_string(),
            "decode error: empty request"
        );
        assert_eq!(
            Error::invoke(Code::NotFound, "no such user").to_string(),
            "invoke error (not_found): no such user"
        );
        assert_eq!(Error::end_of_stream().to_string(), "end of stream");
        assert_eq!(
            Error::from(StreamError::Status {
                code: Code::Internal,
                message: "boom".into()
            })
            .to_string(),
            "stream failed (internal): boom"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(Error::Connect("refused".into()).message(), Some("refused"));
        assert_eq!(Error::invoke(Code::Internal, "x").message(), Some("x"));
        assert!(Error::end_of_stream().message().is_none());
    }

    #[test]
    fn test_end_of_stream_predicate() {
        assert!(Error::end_of_stream().is_end_of_stream());
        assert!(!Error::canceled().is_end_of_stream());
        assert!(!Error::Decode("x".into()).is_end_of_stream());
        assert!(
            !Error::from(StreamError::Status {
                code: Code::Ok,
                message: String::new()
            })
            .is_end_of_stream()
        );
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(Error::Connect("refused".into()).is_retryable());
        assert!(Error::invoke(Code::Unavailable, "overloaded").is_retryable());
        assert!(Error::from(StreamError::Disconnected("reset".into())).is_retryable());

        assert!(!Error::Decode("bad".into()).is_retryable());
        assert!(!Error::Encode("bad".into()).is_retryable());
        assert!(!Error::invoke(Code::NotFound, "missing").is_retryable());
        assert!(!Error::end_of_stream().is_retryable());
        assert!(!Error::canceled().is_retryable());
    }
}
