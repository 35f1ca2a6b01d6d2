//! Utility functions for gateway operations.
//!
//! This module provides helpers for encoding and decoding, value sanitising,
//! and other common operations used throughout the library.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use subtle::ConstantTimeEq;

/// Characters RFC 3986 leaves unreserved; everything else gets encoded.
const RAW_URL_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Token that starts the signature parameter in a callback URL.
const SIGNATURE_TOKEN: &str = "&signature=";

/// Escapes XML special characters, then truncates to `max` characters.
///
/// Truncation counts Unicode code points and runs after escaping, so an entity
/// may be cut short when it straddles the limit.
///
/// # Examples
///
/// ```
/// use bog_payment::utils::clean;
///
/// assert_eq!(clean("Tea & Coffee", None), "Tea &amp; Coffee");
/// assert_eq!(clean("ყავა და ჩაი", Some(4)), "ყავა");
/// assert_eq!(clean("a<b", Some(3)), "a&l");
/// ```
pub fn clean(value: &str, max: Option<usize>) -> String {
    let escaped = quick_xml::escape::escape(value);

    match max {
        Some(max) => escaped.chars().take(max).collect(),
        None => escaped.into_owned(),
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
///
/// # Examples
///
/// ```
/// use bog_payment::utils::raw_url_encode;
///
/// assert_eq!(raw_url_encode("https://shop.ge/ok?a=1"), "https%3A%2F%2Fshop.ge%2Fok%3Fa%3D1");
/// assert_eq!(raw_url_encode("a b~c"), "a%20b~c");
/// ```
pub fn raw_url_encode(value: &str) -> String {
    utf8_percent_encode(value, RAW_URL_ENCODE).to_string()
}

/// Decodes `%XX` sequences. `+` is left alone.
pub fn raw_url_decode(value: &str) -> Vec<u8> {
    percent_decode_str(value).collect()
}

/// Reconstructs the bytes the gateway signed from a callback URL.
///
/// Everything from the first `&signature=` onwards is dropped and the rest is
/// percent-decoded. Parameter order and spelling are kept exactly as received.
///
/// # Examples
///
/// ```
/// use bog_payment::utils::signed_payload;
///
/// let payload = signed_payload("https://h/cb?a=1&b=x%20y&signature=XYZ");
/// assert_eq!(payload, b"https://h/cb?a=1&b=x y");
/// ```
pub fn signed_payload(url: &str) -> Vec<u8> {
    let unsigned = match url.find(SIGNATURE_TOKEN) {
        Some(pos) => &url[..pos],
        None => url,
    };
    raw_url_decode(unsigned)
}

/// Builds a form-encoded query string, keeping the given order.
pub fn build_query<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .finish()
}

/// Merges caller parameters over defaults.
///
/// A caller key that already exists replaces the default value in place;
/// new keys are appended in the order given.
pub fn merge_params(defaults: Vec<(String, String)>, overrides: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut merged = defaults;

    for (key, value) in overrides {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => merged.push((key.to_string(), value.to_string())),
        }
    }

    merged
}

/// Parses an `Authorization: Basic ...` header into user and password.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;

    Some((user.to_string(), pass.to_string()))
}

/// Compares two secrets without leaking where they differ.
pub fn secure_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
