// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The outcome of a memoized call that did not produce a value.
///
/// Every caller attached to one invocation receives a clone of the same error. The operation's
/// own error is carried as-is: `Display` and [`source`](std::error::Error::source) are forwarded
/// to it, and no per-caller context is added.
///
/// # Examples
///
/// ```
/// use memoflight::Error;
///
/// let error: Error<std::fmt::Error> = Error::Operation(std::fmt::Error);
/// assert_eq!(error.to_string(), std::fmt::Error.to_string());
/// assert_eq!(error.into_operation_error(), Some(std::fmt::Error));
///
/// let cancelled: Error<std::fmt::Error> = Error::Cancelled;
/// assert!(cancelled.is_cancelled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    /// The wrapped operation failed with this error.
    #[error(transparent)]
    Operation(E),

    /// The owning invocation ended before publishing an outcome.
    ///
    /// This happens when the owner's future is dropped while the operation is still running, or
    /// when the operation panics. Every caller that joined that invocation observes this error,
    /// even callers that were never cancelled themselves.
    #[error("the owning invocation was cancelled before it produced an outcome")]
    Cancelled,
}

impl<E> Error<E> {
    /// Returns `true` if the owning invocation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the operation's error, if that is what this is.
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::Cancelled => None,
        }
    }

    /// Consumes `self` and returns the operation's error, if that is what this is.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::Cancelled => None,
        }
    }
}
