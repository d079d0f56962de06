//! Response metadata and handler replies.
//!
//! A handler hands the task a [`Reply`] for every `receive`/`finish` call.
//! The first delivery of a task turns the reply into a full header set with
//! [`synthesize_headers`].

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use super::headers::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};

// ============================================================================
// Constants
// ============================================================================

/// Status code used when the handler does not pick one.
pub const DEFAULT_STATUS: u16 = 200;

/// HTTP version reported to the host.
pub const DEFAULT_VERSION: &str = "HTTP/1.1";

/// Content type used when neither the reply nor its metadata names one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// ResponseMeta
// ============================================================================

/// Status line and headers delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseMeta {
    /// HTTP status code.
    pub status: u16,

    /// HTTP version string.
    pub version: String,

    /// Response headers.
    pub headers: HeaderMap,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseMeta {
    /// Creates `200 HTTP/1.1` metadata with no headers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: DEFAULT_STATUS,
            version: DEFAULT_VERSION.to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Sets the status code.
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the HTTP version string.
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns a header by case-insensitive name.
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// Payload of a `receive` or `finish` call.
///
/// Every part is optional. Metadata and content type only matter on the
/// first delivery of a task; later replies contribute body bytes only.
///
/// # Example
///
/// ```
/// use scheme_task_pool::Reply;
///
/// let reply = Reply::data("<h1>hi</h1>")
///     .with_content_type("text/html")
///     .with_status(201);
///
/// assert_eq!(reply.body(), Some(&b"<h1>hi</h1>"[..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    meta: Option<ResponseMeta>,
    body: Option<Vec<u8>>,
    content_type: Option<String>,
}

impl Reply {
    /// Creates an empty reply.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reply carrying body bytes.
    #[inline]
    #[must_use]
    pub fn data(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Sets the response metadata.
    #[inline]
    #[must_use]
    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Sets the status code, creating default metadata if needed.
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.meta = Some(self.meta.unwrap_or_default().with_status(status));
        self
    }

    /// Sets the content type.
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the body bytes, if any.
    #[inline]
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns `true` if the reply names metadata or a content type.
    #[inline]
    #[must_use]
    pub fn has_header_info(&self) -> bool {
        self.meta.is_some() || self.content_type.is_some()
    }

    /// Splits the reply into its parts.
    pub(crate) fn into_parts(self) -> (Option<ResponseMeta>, Option<Vec<u8>>, Option<String>) {
        (self.meta, self.body, self.content_type)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(body: Vec<u8>) -> Self {
        Self::data(body)
    }
}

impl From<&[u8]> for Reply {
    fn from(body: &[u8]) -> Self {
        Self::data(body)
    }
}

impl From<&str> for Reply {
    fn from(body: &str) -> Self {
        Self::data(body)
    }
}

// ============================================================================
// Header Synthesis
// ============================================================================

/// Builds the header set for a task's first delivery.
///
/// - `Content-Type`: `content_type`, else the one in `meta`, else
///   `application/octet-stream`
/// - `Content-Length`: `body_len` unless `meta` sets it
/// - `Access-Control-Allow-Origin`: echo of `origin` unless `meta` sets it
#[must_use]
pub fn synthesize_headers(
    meta: Option<ResponseMeta>,
    body_len: Option<usize>,
    content_type: Option<&str>,
    origin: Option<&str>,
) -> ResponseMeta {
    let mut meta = meta.unwrap_or_default();

    match content_type {
        Some(content_type) => meta.headers.insert(CONTENT_TYPE, content_type),
        None if !meta.headers.contains(CONTENT_TYPE) => {
            meta.headers.insert(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
        }
        None => {}
    }

    if let Some(len) = body_len
        && !meta.headers.contains(CONTENT_LENGTH)
    {
        meta.headers.insert(CONTENT_LENGTH, len.to_string());
    }

    if let Some(origin) = origin
        && !meta.headers.contains(ACCESS_CONTROL_ALLOW_ORIGIN)
    {
        meta.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    meta
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_defaults() {
        let meta = ResponseMeta::default();
        assert_eq!(meta.status, 200);
        assert_eq!(meta.version, "HTTP/1.1");
        assert!(meta.headers.is_empty());
    }

    #[test]
    fn test_synthesize_defaults() {
        let meta = synthesize_headers(None, None, None, None);

        assert_eq!(meta.header(CONTENT_TYPE), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(meta.header(CONTENT_LENGTH), None);
        assert_eq!(meta.header(ACCESS_CONTROL_ALLOW_ORIGIN), None);
    }

    #[test]
    fn test_synthesize_content_type_and_length() {
        let meta = synthesize_headers(None, Some(5), Some("text/plain"), None);

        assert_eq!(meta.header("content-type"), Some("text/plain"));
        assert_eq!(meta.header("content-length"), Some("5"));
    }

    #[test]
    fn test_explicit_content_type_overrides_meta() {
        let given = ResponseMeta::new().with_header("content-type", "text/css");

        let kept = synthesize_headers(Some(given.clone()), None, None, None);
        assert_eq!(kept.header(CONTENT_TYPE), Some("text/css"));

        let overridden = synthesize_headers(Some(given), None, Some("text/html"), None);
        assert_eq!(overridden.header(CONTENT_TYPE), Some("text/html"));
        assert_eq!(overridden.headers.len(), 1);
    }

    #[test]
    fn test_meta_content_length_wins() {
        let given = ResponseMeta::new().with_header(CONTENT_LENGTH, "1024");
        let meta = synthesize_headers(Some(given), Some(16), None, None);
        assert_eq!(meta.header(CONTENT_LENGTH), Some("1024"));
    }

    #[test]
    fn test_cors_echo() {
        let meta = synthesize_headers(None, Some(0), None, Some("https://x.test"));
        assert_eq!(meta.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some("https://x.test"));

        let given = ResponseMeta::new().with_header(ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        let meta = synthesize_headers(Some(given), None, None, Some("https://x.test"));
        assert_eq!(meta.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    }

    #[test]
    fn test_reply_builders() {
        let reply = Reply::data("abc").with_status(404).with_content_type("text/plain");
        assert!(reply.has_header_info());

        let (meta, body, content_type) = reply.into_parts();
        assert_eq!(meta.map(|m| m.status), Some(404));
        assert_eq!(body.as_deref(), Some(&b"abc"[..]));
        assert_eq!(content_type.as_deref(), Some("text/plain"));

        assert!(!Reply::new().has_header_info());
        assert_eq!(Reply::from(&b"xy"[..]).body(), Some(&b"xy"[..]));
    }
}
