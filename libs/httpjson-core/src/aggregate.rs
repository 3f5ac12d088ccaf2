//! Turning a response status and body into a value or a [`JsonError`].

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;

use crate::decode::{UnknownFields, decode_strict};
use crate::error::{Attempt, JsonError, StatusError};
use crate::registry::JsonShape;

/// Result of decoding a response into one of two alternative types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Either<A, B> {
    First(A),
    Second(B),
}

fn attempt<T>(index: usize, body: &Bytes, unknown_fields: UnknownFields) -> Result<T, Attempt>
where
    T: DeserializeOwned + JsonShape,
{
    decode_strict(body, unknown_fields).map_err(|failure| Attempt {
        index,
        target: std::any::type_name::<T>(),
        failure,
    })
}

fn status_error(status: StatusCode, body: &Bytes) -> Option<StatusError> {
    (status.is_client_error() || status.is_server_error()).then(|| StatusError {
        status,
        body: body.clone(),
    })
}

/// Decodes a response body into `T`.
///
/// A status of 400 or above is an error even when the body decodes; the
/// body is kept on the error for [`JsonError::decode_body`].
///
/// # Errors
/// Returns a [`JsonError`] carrying the decode failure with its unknown-field
/// diagnostics, the status error, or both.
pub fn decode_response<T>(
    status: StatusCode,
    body: Bytes,
    unknown_fields: UnknownFields,
) -> Result<T, JsonError>
where
    T: DeserializeOwned + JsonShape,
{
    let status = status_error(status, &body);
    match (attempt::<T>(0, &body, unknown_fields), status) {
        (Ok(value), None) => Ok(value),
        (Ok(_), status) => Err(JsonError::new(Vec::new(), status, body)),
        (Err(failed), status) => Err(JsonError::new(vec![failed], status, body)),
    }
}

/// Decodes a response body into `A`, falling back to `B`.
///
/// Useful for endpoints that answer with different structures. Every failed
/// alternative is recorded on the error.
///
/// # Errors
/// Returns a [`JsonError`] when neither type decodes or when the status is
/// 400 or above.
pub fn decode_response_or<A, B>(
    status: StatusCode,
    body: Bytes,
    unknown_fields: UnknownFields,
) -> Result<Either<A, B>, JsonError>
where
    A: DeserializeOwned + JsonShape,
    B: DeserializeOwned + JsonShape,
{
    let status = status_error(status, &body);
    let mut attempts = Vec::new();
    let decoded = match attempt::<A>(0, &body, unknown_fields) {
        Ok(first) => Some(Either::First(first)),
        Err(failed) => {
            attempts.push(failed);
            match attempt::<B>(1, &body, unknown_fields) {
                Ok(second) => Some(Either::Second(second)),
                Err(failed) => {
                    attempts.push(failed);
                    None
                }
            }
        }
    };
    match (decoded, status) {
        (Some(value), None) => Ok(value),
        (_, status) => Err(JsonError::new(attempts, status, body)),
    }
}
