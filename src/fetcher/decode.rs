use crate::fetcher::types::{Charset, PageResponse};
use bytes::Bytes;
use chrono::Utc;
use encoding_rs::Encoding;
use regex::Regex;
use reqwest::StatusCode;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

// Only the head of the document is searched for <meta> declarations.
const SNIFF_BYTES: usize = 4096;

pub fn decode_response(
    url_final: Url,
    status: StatusCode,
    body_raw: Bytes,
    content_type: &str,
) -> PageResponse {
    let charset = detect_charset(content_type, &body_raw);
    let body_utf8 = decode_to_utf8(&body_raw, &charset, &url_final);

    PageResponse {
        url_final,
        status,
        body_raw,
        body_utf8,
        charset,
        fetched_at: Utc::now(),
    }
}

fn charset_from(regex: &Regex, haystack: &str) -> Option<Charset> {
    let label = regex.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes()).map(Charset::from_encoding)
}

/// Header charset first, then `<meta charset>` (which also covers the
/// `http-equiv` form's `content="...; charset=..."`), then a statistical guess.
fn detect_charset(content_type: &str, body: &[u8]) -> Charset {
    if let Some(charset) = charset_from(&CHARSET_REGEX, content_type) {
        return charset;
    }

    let head = &body[..body.len().min(SNIFF_BYTES)];
    let head_str = String::from_utf8_lossy(head);
    if let Some(charset) = charset_from(&META_CHARSET_REGEX, &head_str) {
        return charset;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, head.len() == body.len());
    Charset::from_encoding(detector.guess(None, true))
}

/// Malformed sequences become U+FFFD; a page with a few bad bytes is still
/// worth extracting.
fn decode_to_utf8(body: &[u8], charset: &Charset, url: &Url) -> String {
    let encoding = charset.encoding();
    let (decoded, _, had_errors) = encoding.decode(body);
    if had_errors {
        debug!(url = %url, encoding = encoding.name(), "body decoded with replacement characters");
    }
    decoded.into_owned()
}
