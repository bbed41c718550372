//! Structured error taxonomy: a domain + kind + message chain.
//!
//! Every fallible operation in this crate returns `Result<T, Error>`. Nothing
//! is recovered internally; offsets are carried so a caller can point a
//! forensic tool at the exact byte that triggered the fault.

use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub offset: Option<u64>,
    /// The underlying cause, when this error wraps one (e.g. a
    /// `std::string::FromUtf16Error` from a malformed name or value).
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (at offset {offset})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            offset: None,
            source: None,
        }
    }

    pub fn at(kind: ErrorKind, message: impl Into<String>, offset: u64) -> Self {
        Error {
            kind,
            message: message.into(),
            offset: Some(offset),
            source: None,
        }
    }

    /// Attaches a chained cause (§10.1), returned from `.source()`.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn truncated(what: &str, offset: u64, need: u64, have: u64) -> Self {
        Error::at(
            ErrorKind::Input(InputError::TruncatedData),
            format!("{what}: need {need} bytes at offset {offset}, have {have}"),
            offset,
        )
    }

    pub fn invalid_data(what: impl Into<String>, offset: u64) -> Self {
        Error::at(ErrorKind::Input(InputError::InvalidData), what, offset)
    }

    pub fn signature_mismatch(expected: &[u8; 4], found: &[u8], offset: u64) -> Self {
        Error::at(
            ErrorKind::Input(InputError::SignatureMismatch),
            format!(
                "expected signature {:?}, found {:?}",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(found)
            ),
            offset,
        )
    }

    pub fn value_mismatch(what: impl Into<String>, offset: u64) -> Self {
        Error::at(ErrorKind::Input(InputError::ValueMismatch), what, offset)
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Error::new(ErrorKind::Runtime(RuntimeError::UnsupportedValue), what)
    }

    pub fn abort_requested() -> Self {
        Error::new(
            ErrorKind::Runtime(RuntimeError::AbortRequested),
            "rendering aborted by caller",
        )
    }

    pub fn insufficient_space(required: usize) -> Self {
        Error::new(
            ErrorKind::Output(OutputError::InsufficientSpace),
            format!("output buffer too small, {required} bytes required"),
        )
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Error::new(ErrorKind::Arguments(ArgumentsError::InvalidValue), what)
    }

    pub fn allocation_failed(what: impl Into<String>) -> Self {
        Error::new(ErrorKind::Memory(MemoryError::Insufficient), what)
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid argument")]
    Arguments(ArgumentsError),
    #[error("malformed input")]
    Input(InputError),
    #[error("runtime error")]
    Runtime(RuntimeError),
    #[error("output error")]
    Output(OutputError),
    #[error("memory error")]
    Memory(MemoryError),
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentsError {
    #[error("invalid value")]
    InvalidValue,
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("truncated data")]
    TruncatedData,
    #[error("invalid data")]
    InvalidData,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("value mismatch")]
    ValueMismatch,
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unsupported value")]
    UnsupportedValue,
    #[error("abort requested")]
    AbortRequested,
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    #[error("insufficient space")]
    InsufficientSpace,
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("allocation failed")]
    Insufficient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_source_is_exposed_through_std_error_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::invalid_data("wrapping", 0).with_source(cause);
        let source = std::error::Error::source(&err).expect("source was attached");
        assert_eq!(source.to_string(), "boom");
    }

    #[test]
    fn errors_without_a_source_report_none() {
        let err = Error::invalid_data("no cause here", 0);
        assert!(std::error::Error::source(&err).is_none());
    }
}
