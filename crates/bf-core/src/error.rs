//! Error types for BinFit

use thiserror::Error;

/// BinFit error type
#[derive(Error, Debug)]
pub enum Error {
    /// A constructor was handed arguments it cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_message() {
        let err = Error::Validation("x out of range".into());
        assert_eq!(err.to_string(), "Validation error: x out of range");
    }
}
