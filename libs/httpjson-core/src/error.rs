use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::decode::{UnknownFields, decode_strict};
use crate::diagnostic::UnknownField;
use crate::registry::JsonShape;

/// Why the decoder rejected a payload.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Malformed or truncated JSON.
    #[error("json: syntax error: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Well-formed JSON whose values do not fit the target type.
    #[error("json: cannot decode: {0}")]
    TypeMismatch(#[source] serde_json::Error),

    /// A key the target does not declare. `path` is the first such key in
    /// document order.
    #[error("json: unknown field \"{path}\"")]
    UnknownField { path: String },
}

impl DecodeError {
    /// Sorts a `serde_json` error into syntax and type-mismatch failures.
    #[must_use]
    pub fn classify(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => Self::TypeMismatch(err),
            Category::Io | Category::Syntax | Category::Eof => Self::Syntax(err),
        }
    }

    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch(_))
    }

    #[must_use]
    pub fn is_unknown_field(&self) -> bool {
        matches!(self, Self::UnknownField { .. })
    }
}

/// A decode error together with the diagnostics explaining it.
///
/// Diagnostics are only present when the error is
/// [`DecodeError::UnknownField`].
#[derive(Debug)]
pub struct DecodeFailure {
    error: DecodeError,
    unknown_fields: Vec<UnknownField>,
}

impl DecodeFailure {
    pub(crate) fn new(error: DecodeError, unknown_fields: Vec<UnknownField>) -> Self {
        Self {
            error,
            unknown_fields,
        }
    }

    #[must_use]
    pub fn error(&self) -> &DecodeError {
        &self.error
    }

    #[must_use]
    pub fn unknown_fields(&self) -> &[UnknownField] {
        &self.unknown_fields
    }

    #[must_use]
    pub fn into_parts(self) -> (DecodeError, Vec<UnknownField>) {
        (self.error, self.unknown_fields)
    }
}

impl From<DecodeError> for DecodeFailure {
    fn from(error: DecodeError) -> Self {
        Self::new(error, Vec::new())
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for diagnostic in &self.unknown_fields {
            write!(f, "\n{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Response status of 400 or above, with the body the server sent.
#[derive(Debug, Clone, thiserror::Error)]
#[error("http {}", .status.as_u16())]
pub struct StatusError {
    pub status: StatusCode,
    pub body: Bytes,
}

/// One rejected decode target.
#[derive(Debug)]
pub struct Attempt {
    /// Position of the target among the alternatives tried.
    pub index: usize,
    /// Rust type name of the target.
    pub target: &'static str,
    pub failure: DecodeFailure,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to decode response option #{} as type {}: {}",
            self.index, self.target, self.failure
        )
    }
}

/// Everything that went wrong turning a response into a value.
///
/// Bundles every rejected decode target, the status error when the response
/// status is 400 or above, and the raw body. `Display` joins the parts with
/// newlines.
#[derive(Debug)]
pub struct JsonError {
    attempts: Vec<Attempt>,
    status: Option<StatusError>,
    body: Bytes,
}

impl JsonError {
    pub(crate) fn new(attempts: Vec<Attempt>, status: Option<StatusError>, body: Bytes) -> Self {
        Self {
            attempts,
            status,
            body,
        }
    }

    /// Status code when the response status was 400 or above.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status.as_ref().map(|err| err.status)
    }

    #[must_use]
    pub fn status_error(&self) -> Option<&StatusError> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn failures(&self) -> impl Iterator<Item = &DecodeFailure> {
        self.attempts.iter().map(|attempt| &attempt.failure)
    }

    /// Every unknown-field diagnostic across all decode attempts.
    pub fn unknown_fields(&self) -> impl Iterator<Item = &UnknownField> {
        self.failures().flat_map(DecodeFailure::unknown_fields)
    }

    #[must_use]
    pub fn has_unknown_fields(&self) -> bool {
        self.failures().any(|failure| failure.error.is_unknown_field())
    }

    #[must_use]
    pub fn is_syntax(&self) -> bool {
        self.failures().any(|failure| failure.error.is_syntax())
    }

    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        self.failures().any(|failure| failure.error.is_type_mismatch())
    }

    /// Raw response body, kept whatever the cause of the failure.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Strictly decodes the retained body as `E`, typically a server error
    /// payload.
    ///
    /// # Errors
    /// Returns the decode failure when the body does not match `E`.
    pub fn decode_body<E>(&self) -> Result<E, DecodeFailure>
    where
        E: DeserializeOwned + JsonShape,
    {
        decode_strict(&self.body, UnknownFields::Deny)
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut separator = "";
        for attempt in &self.attempts {
            write!(f, "{separator}{attempt}")?;
            separator = "\n";
        }
        if let Some(status) = &self.status {
            write!(f, "{separator}{status}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.attempts.first() {
            Some(attempt) => Some(&attempt.failure),
            None => self
                .status
                .as_ref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_classify_syntax_and_eof() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": }").unwrap_err();
        assert!(DecodeError::classify(err).is_syntax());
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": 1").unwrap_err();
        assert!(DecodeError::classify(err).is_syntax());
    }

    #[test]
    fn test_classify_type_mismatch() {
        let err = serde_json::from_str::<u32>("\"seven\"").unwrap_err();
        assert!(DecodeError::classify(err).is_type_mismatch());
    }

    #[test]
    fn test_unknown_field_message() {
        let err = DecodeError::UnknownField {
            path: "output".to_owned(),
        };
        assert_eq!(err.to_string(), "json: unknown field \"output\"");
    }

    #[test]
    fn test_status_error_message() {
        let err = StatusError {
            status: StatusCode::NOT_FOUND,
            body: Bytes::from_static(b"missing"),
        };
        assert_eq!(err.to_string(), "http 404");
    }

    #[test]
    fn test_status_only_error() {
        let err = JsonError::new(
            Vec::new(),
            Some(StatusError {
                status: StatusCode::BAD_GATEWAY,
                body: Bytes::from_static(b"upstream"),
            }),
            Bytes::from_static(b"upstream"),
        );
        assert_eq!(err.to_string(), "http 502");
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(!err.is_syntax());
        assert!(!err.has_unknown_fields());
        assert_eq!(err.body().as_ref(), b"upstream");
        assert!(std::error::Error::source(&err).is_some());
    }
}
