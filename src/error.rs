use thiserror::Error;

use crate::store::StoreError;

/// Result type returned by every fallible [crate::Rollout] and [crate::Feature] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Error is returned when an operation could not be completed.
///
/// Missing features are never an error: a feature with nothing stored is simply inactive.
#[derive(Debug, Error)]
pub enum Error {
    /// The user is a record that does not expose a usable identifier through the configured
    /// accessor, e.g. the attribute is missing or holds a boolean.
    #[error("user has no usable identifier in attribute `{accessor}`")]
    UnresolvableUser {
        /// Name of the accessor that was consulted.
        accessor: String,
    },

    /// The feature name cannot be stored without corrupting the feature index: it is empty, it
    /// is the index's own name, or it contains the index delimiter.
    #[error("invalid feature name {name:?}: {reason}")]
    InvalidFeatureName {
        /// The rejected name.
        name: String,
        /// Which rule the name broke.
        reason: &'static str,
    },

    /// The storage backend failed. The backend's own error is available through
    /// [std::error::Error::source].
    #[error("storage backend error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}
