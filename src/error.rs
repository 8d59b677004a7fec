//! Error types for container operations.
//!
//! The containers in this crate are almost entirely total: key absence is
//! reported through `Option`, and removing an absent key is a no-op. The
//! two remaining failure modes are structural:
//!
//! - [`Error::EmptyCollection`]: `min`/`max` invoked on a container with
//!   zero elements.
//! - [`Error::InvalidArgument`]: a validating constructor received input
//!   that violates a structural precondition (for example, a "sorted"
//!   entry list that is not strictly ascending).
//!
//! Both indicate programmer error rather than recoverable runtime state,
//! and a failed operation always leaves the container value unchanged.

/// An error raised by a container operation that failed a structural
/// precondition.
///
/// # Examples
///
/// ```rust
/// use persistree::{Error, SortedSet};
///
/// let empty: SortedSet<i32> = SortedSet::new();
/// assert_eq!(
///     empty.min(),
///     Err(Error::EmptyCollection { operation: "min" })
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `min`/`max` (or a derived min/max-key operation) was invoked on a
    /// container with zero elements.
    EmptyCollection {
        /// The operation that was attempted.
        operation: &'static str,
    },
    /// An operation received a value that fails a structural precondition.
    ///
    /// Raised synchronously at the call site, never deferred.
    InvalidArgument {
        /// The operation that was attempted.
        operation: &'static str,
        /// The precondition that was violated.
        reason: &'static str,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCollection { operation } => {
                write!(formatter, "{operation}: collection is empty")
            }
            Self::InvalidArgument { operation, reason } => {
                write!(formatter, "{operation}: invalid argument: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_collection_display() {
        let error = Error::EmptyCollection { operation: "min" };
        assert_eq!(format!("{error}"), "min: collection is empty");
    }

    #[test]
    fn test_invalid_argument_display() {
        let error = Error::InvalidArgument {
            operation: "from_sorted_entries",
            reason: "keys must be strictly ascending",
        };
        assert_eq!(
            format!("{error}"),
            "from_sorted_entries: invalid argument: keys must be strictly ascending"
        );
    }

    #[test]
    fn test_error_equality() {
        let first = Error::EmptyCollection { operation: "max" };
        let second = Error::EmptyCollection { operation: "max" };
        assert_eq!(first, second);
        assert_ne!(first, Error::EmptyCollection { operation: "min" });
    }
}
