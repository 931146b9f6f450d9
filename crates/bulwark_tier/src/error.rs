// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error type for tier operations.

/// An error reported by a cache tier.
///
/// The type is opaque; use [`std::error::Error::source()`] to reach the backend's
/// own error. Tier errors never escape the tiered cache: it logs them and carries on
/// as if the tier had missed.
///
/// # Example
///
/// ```
/// use bulwark_tier::Error;
///
/// let error = Error::from_message("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates an error from anything convertible into a boxed error.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for tier operations.
pub type Result<T> = std::result::Result<T, Error>;
