use thiserror::Error;

/// Errors returned by the fetch task registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required identifier was blank.
    #[error("empty value: {0}")]
    EmptyValue(&'static str),
    /// Nothing is registered under the given key.
    #[error("not found: {key}")]
    NotFound { key: String },
    /// A value did not have the expected shape.
    #[error("failed to convert `{value}` into {kind}")]
    ConversionFailed { value: String, kind: &'static str },
}

impl Error {
    #[inline]
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    pub fn is_empty_value(&self) -> bool {
        matches!(self, Self::EmptyValue(_))
    }
}
