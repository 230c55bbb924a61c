//! Deciding whether a response should be compressed at all.

use crate::context::RequestContext;
use http::{HeaderMap, StatusCode, header};
use http_body::SizeHint;
use std::fmt;

/// Default minimum body size for [`MinSize`] (approximately 1 MTU).
pub const DEFAULT_MIN_SIZE: u64 = 860;

/// A user-supplied compression condition.
///
/// Consulted after the built-in checks pass. Returning `false` leaves the
/// response untouched.
///
/// Closures with the matching signature implement this trait:
///
/// ```
/// use http::{HeaderMap, StatusCode};
/// use http_body::SizeHint;
/// use http_brotli_compression::{CompressionLayer, RequestContext};
///
/// let layer = CompressionLayer::new().compress_if(
///     |req: &RequestContext, _: StatusCode, _: &HeaderMap, _: &SizeHint| {
///         !req.path().starts_with("/stream")
///     },
/// );
/// # drop(layer);
/// ```
pub trait Predicate: Send + Sync + 'static {
    /// Returns whether this response may be compressed.
    fn should_compress(
        &self,
        request: &RequestContext,
        status: StatusCode,
        headers: &HeaderMap,
        body: &SizeHint,
    ) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&RequestContext, StatusCode, &HeaderMap, &SizeHint) -> bool + Send + Sync + 'static,
{
    fn should_compress(
        &self,
        request: &RequestContext,
        status: StatusCode,
        headers: &HeaderMap,
        body: &SizeHint,
    ) -> bool {
        self(request, status, headers, body)
    }
}

impl fmt::Debug for dyn Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// Skips responses known to be smaller than the given number of bytes.
///
/// The size comes from `Content-Length` when it parses, otherwise from an
/// exact body size hint. Responses of unknown size are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinSize(pub u64);

impl Default for MinSize {
    fn default() -> Self {
        Self(DEFAULT_MIN_SIZE)
    }
}

impl Predicate for MinSize {
    fn should_compress(
        &self,
        _request: &RequestContext,
        _status: StatusCode,
        headers: &HeaderMap,
        body: &SizeHint,
    ) -> bool {
        let known_len = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or_else(|| body.exact());

        known_len.is_none_or(|len| len >= self.0)
    }
}

/// Policy consulted by [`should_compress`].
pub(crate) struct Eligibility<'a> {
    pub(crate) include: Option<&'a [String]>,
    pub(crate) predicate: Option<&'a dyn Predicate>,
}

/// Applies the compression rules in order, stopping at the first that fails.
pub(crate) fn should_compress(
    request: &RequestContext,
    status: StatusCode,
    headers: &HeaderMap,
    body: &SizeHint,
    policy: &Eligibility<'_>,
) -> bool {
    if has_no_entity_body(status) {
        tracing::trace!(%status, "status has no entity body, skipping compression");
        return false;
    }

    if has_no_transform(headers) {
        tracing::trace!("cache-control forbids transforms, skipping compression");
        return false;
    }

    if is_already_encoded(headers) {
        tracing::trace!("response already encoded, skipping compression");
        return false;
    }

    if policy
        .include
        .is_some_and(|include| !is_included_content_type(headers, include))
    {
        tracing::trace!("content type not included, skipping compression");
        return false;
    }

    if policy
        .predicate
        .is_some_and(|predicate| !predicate.should_compress(request, status, headers, body))
    {
        tracing::trace!("predicate declined compression");
        return false;
    }

    if is_empty_content_length(headers) {
        tracing::trace!("content-length is zero, skipping compression");
        return false;
    }

    true
}

/// Informational responses, 204 and 304 carry no body.
fn has_no_entity_body(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

fn has_no_transform(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| contains_word(v, "no-transform"))
}

/// Any coding other than `identity`, in any `Content-Encoding` value, means
/// the body is encoded. Unreadable values count as encoded.
fn is_already_encoded(headers: &HeaderMap) -> bool {
    headers.get_all(header::CONTENT_ENCODING).iter().any(|v| {
        v.to_str().map_or(true, |v| {
            v.split(',')
                .map(str::trim)
                .filter(|coding| !coding.is_empty())
                .any(|coding| !coding.eq_ignore_ascii_case("identity"))
        })
    })
}

fn is_included_content_type(headers: &HeaderMap, include: &[String]) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let media_type = content_type.split(';').next().unwrap_or("").trim();
    include
        .iter()
        .any(|included| included.trim().eq_ignore_ascii_case(media_type))
}

fn is_empty_content_length(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .is_some_and(|v| v.as_bytes() == b"0")
}

/// Finds `word` in `haystack` with word-character boundaries on both sides.
fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let bytes = haystack.as_bytes();

    haystack.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before = start == 0 || !is_word_byte(bytes[start - 1]);
        let after = end == bytes.len() || !is_word_byte(bytes[end]);
        before && after
    })
}
