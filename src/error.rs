//! Error types for wkhtmlpdf library.

use std::io;
use thiserror::Error;

/// Result type alias for wkhtmlpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while driving the native engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The native engine could not start.
    #[error("Could not initialize library: {0}")]
    Init(String),

    /// A process-global engine is already initialized.
    #[error("Library is already initialized")]
    AlreadyInitialized,

    /// An operation was attempted before initialization or after shutdown.
    #[error("Library is not initialized")]
    NotInitialized,

    /// A native allocation returned a null handle.
    #[error("Could not create {0}")]
    ResourceCreation(&'static str),

    /// The native settings sink rejected an option.
    #[error("Could not set option `{name}` to `{value}`")]
    InvalidOption { name: String, value: String },

    /// An option name was empty after trimming.
    #[error("Option name cannot be empty")]
    EmptyOptionName,

    /// A document location was empty.
    #[error("Object location cannot be empty")]
    EmptyLocation,

    /// A conversion was attempted without any objects.
    #[error("Must add at least one object to convert")]
    NoObjects,

    /// A resource was used after it was destroyed.
    #[error("Cannot use uninitialized or destroyed {0}")]
    Destroyed(&'static str),

    /// A conversion step was invoked out of order.
    #[error("Invalid conversion state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// The native convert call reported failure.
    #[error("Could not convert the added objects (HTTP error code {http_error_code})")]
    Conversion { http_error_code: i32 },

    /// The native output buffer was empty.
    #[error("Could not retrieve the converted file")]
    EmptyOutput,

    /// The dispatcher was shut down before the work could run.
    #[error("Dispatcher is shut down")]
    DispatcherClosed,

    /// Work was submitted from the dispatcher's own thread.
    #[error("Cannot submit work from the dispatcher thread")]
    Reentrant,

    /// Submitted work panicked on the dispatcher thread.
    #[error("Submitted work panicked")]
    WorkPanicked,

    /// I/O error when handling temporary input files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Structured configuration could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was raised before any native side effect took place.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized
                | Error::EmptyOptionName
                | Error::EmptyLocation
                | Error::NoObjects
                | Error::Destroyed(_)
                | Error::InvalidState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoObjects;
        assert_eq!(err.to_string(), "Must add at least one object to convert");

        let err = Error::InvalidOption {
            name: "dpi".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Could not set option `dpi` to `abc`");

        let err = Error::Destroyed("converter");
        assert_eq!(
            err.to_string(),
            "Cannot use uninitialized or destroyed converter"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(Error::NoObjects.is_precondition());
        assert!(Error::NotInitialized.is_precondition());
        assert!(!Error::EmptyOutput.is_precondition());
        assert!(!Error::Conversion { http_error_code: 0 }.is_precondition());
    }
}
