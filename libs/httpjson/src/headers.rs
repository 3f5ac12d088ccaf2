use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::error::HttpError;

/// Ordered header directives applied on top of a request's headers.
///
/// Each directive names a header and a list of values:
/// - no values removes the header,
/// - a single value replaces whatever the header held,
/// - several values are appended after the existing ones.
///
/// Clients apply their default patch first, then the patch of the request.
///
/// # Example
///
/// ```ignore
/// use http::header::{AUTHORIZATION, USER_AGENT};
///
/// let patch = HeaderPatch::new()
///     .set(AUTHORIZATION, HeaderValue::from_static("Bearer 123"))
///     .remove(USER_AGENT);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderPatch {
    directives: Vec<(HeaderName, Vec<HeaderValue>)>,
}

impl HeaderPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `name` with a single value
    #[must_use]
    pub fn set(self, name: HeaderName, value: HeaderValue) -> Self {
        self.directive(name, vec![value])
    }

    /// Append `values` to `name`
    ///
    /// A single value behaves like [`set`](Self::set) and an empty list like
    /// [`remove`](Self::remove).
    #[must_use]
    pub fn append(self, name: HeaderName, values: impl IntoIterator<Item = HeaderValue>) -> Self {
        self.directive(name, values.into_iter().collect())
    }

    /// Remove `name` from the request
    #[must_use]
    pub fn remove(self, name: HeaderName) -> Self {
        self.directive(name, Vec::new())
    }

    /// Add a raw directive
    #[must_use]
    pub fn directive(mut self, name: HeaderName, values: Vec<HeaderValue>) -> Self {
        self.directives.push((name, values));
        self
    }

    /// Parse `name` and `value` and replace the header with the result
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderName` or `HttpError::InvalidHeaderValue`
    /// when either part is not a valid header token.
    pub fn try_set(self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        Ok(self.set(name, value))
    }

    /// Append every directive of `other` after the ones already held
    pub fn extend(&mut self, other: &HeaderPatch) {
        self.directives.extend(other.directives.iter().cloned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[HeaderValue])> {
        self.directives
            .iter()
            .map(|(name, values)| (name, values.as_slice()))
    }

    /// Apply the directives in order
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, values) in &self.directives {
            match values.as_slice() {
                [] => {
                    headers.remove(name);
                }
                [value] => {
                    headers.insert(name.clone(), value.clone());
                }
                values => {
                    for value in values {
                        headers.append(name.clone(), value.clone());
                    }
                }
            }
        }
    }
}

impl FromIterator<(HeaderName, Vec<HeaderValue>)> for HeaderPatch {
    fn from_iter<I: IntoIterator<Item = (HeaderName, Vec<HeaderValue>)>>(iter: I) -> Self {
        Self {
            directives: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::header::{ACCEPT_ENCODING, AUTHORIZATION, USER_AGENT};

    fn base() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, br, zstd"));
        headers.insert(USER_AGENT, HeaderValue::from_static("httpjson/test"));
        headers
    }

    #[test]
    fn test_single_value_replaces() {
        let mut headers = base();
        HeaderPatch::new()
            .set(USER_AGENT, HeaderValue::from_static("custom/1.0"))
            .apply(&mut headers);
        let values: Vec<_> = headers.get_all(USER_AGENT).iter().collect();
        assert_eq!(values, ["custom/1.0"]);
    }

    #[test]
    fn test_empty_values_remove() {
        let mut headers = base();
        HeaderPatch::new().remove(USER_AGENT).apply(&mut headers);
        assert!(!headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT_ENCODING));
    }

    #[test]
    fn test_several_values_append() {
        let mut headers = base();
        HeaderPatch::new()
            .append(
                ACCEPT_ENCODING,
                [
                    HeaderValue::from_static("identity"),
                    HeaderValue::from_static("deflate"),
                ],
            )
            .apply(&mut headers);
        let values: Vec<_> = headers.get_all(ACCEPT_ENCODING).iter().collect();
        assert_eq!(values, ["gzip, br, zstd", "identity", "deflate"]);
    }

    #[test]
    fn test_directives_apply_in_order() {
        let mut headers = HeaderMap::new();
        let mut patch = HeaderPatch::new().set(AUTHORIZATION, HeaderValue::from_static("Bearer 1"));
        patch.extend(&HeaderPatch::new().set(AUTHORIZATION, HeaderValue::from_static("Bearer 2")));
        patch.apply(&mut headers);
        assert_eq!(headers[AUTHORIZATION], "Bearer 2");
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn test_try_set_rejects_invalid_tokens() {
        assert!(matches!(
            HeaderPatch::new().try_set("bad header", "v"),
            Err(HttpError::InvalidHeaderName(_))
        ));
        assert!(matches!(
            HeaderPatch::new().try_set("x-ok", "bad\nvalue"),
            Err(HttpError::InvalidHeaderValue(_))
        ));
        let patch = HeaderPatch::new().try_set("x-ok", "fine").unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_from_iterator() {
        let patch: HeaderPatch = [(USER_AGENT, Vec::new())].into_iter().collect();
        let mut headers = base();
        patch.apply(&mut headers);
        assert!(!headers.contains_key(USER_AGENT));
        assert_eq!(patch.iter().count(), 1);
    }
}
