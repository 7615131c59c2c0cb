// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

/// A boxed, thread-safe error used for causes that come from outside the cache,
/// such as a failing warmer producer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error from a cache operation.
///
/// This is an opaque error type that can wrap any underlying error from a tier,
/// such as a failed blob write or an entry that could not be encoded. Use
/// [`std::error::Error::source()`] to access the underlying cause if needed.
///
/// # Example
///
/// ```
/// use strata_tier::Error;
///
/// let error = Error::from_message("disk tier is not configured");
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates a new error from any type that can be converted to an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_tier::Error;
    ///
    /// let error = Error::from_message("operation failed");
    /// ```
    pub fn from_message(cause: impl Into<BoxError>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_cause_message() {
        let error = Error::caused_by("blob write failed");
        let display_str = format!("{error}");
        assert!(
            display_str.contains("blob write failed"),
            "display output should contain the cause message, got: {display_str}"
        );
    }

    #[test]
    fn from_message_wraps_io_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing blob");
        let error = Error::from_message(io);
        assert!(format!("{error:?}").contains("missing blob"));
    }

    #[test]
    fn result_type_alias_propagates_errors() {
        fn returns_err() -> Result<i32> {
            Err(Error::caused_by("expected failure"))
        }

        let err = returns_err().expect_err("should return an error");
        assert!(format!("{err}").contains("expected failure"));
    }
}
