//! Header selection for the download relay.

use reqwest::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HeaderMap, HeaderName,
    HeaderValue, IF_RANGE, LAST_MODIFIED, RANGE,
};

/// Response headers copied from the download origin. Everything else is dropped.
pub const FORWARDED_RESPONSE_HEADERS: [HeaderName; 6] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CONTENT_RANGE,
    ACCEPT_RANGES,
    ETAG,
    LAST_MODIFIED,
];

/// Conditional range headers taken verbatim from the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeHeaders {
    pub range: Option<HeaderValue>,
    pub if_range: Option<HeaderValue>,
}

impl RangeHeaders {
    /// Picks `Range` and `If-Range` out of inbound request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            range: headers.get(RANGE).cloned(),
            if_range: headers.get(IF_RANGE).cloned(),
        }
    }

    /// Returns true when neither header was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_none() && self.if_range.is_none()
    }

    pub(crate) fn apply(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(range) = &self.range {
            request = request.header(RANGE, range.clone());
        }
        if let Some(if_range) = &self.if_range {
            request = request.header(IF_RANGE, if_range.clone());
        }
        request
    }
}

/// Keeps only the allow-listed headers that are present in `upstream`.
#[must_use]
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in &FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream.get(name) {
            forwarded.insert(name.clone(), value.clone());
        }
    }
    forwarded
}
