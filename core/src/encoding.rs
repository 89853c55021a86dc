//! Percent-encoding for URL path segments and query components.
//!
//! # Design
//! The base set matches what `encodeURIComponent` escapes: everything except
//! ASCII alphanumerics and `- _ . ! ~ * ' ( )`. That set over-escapes for
//! RFC 3986, so each position carves out the characters it may carry
//! verbatim:
//!
//! - query components keep `@ : $ ,`
//! - path segments keep the query carve-outs plus `& = +`
//!
//! Space handling is explicit. Path segments always use `%20`; query
//! components take a [`SpaceEncoding`] and the request builder always asks
//! for `+`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const QUERY: &AsciiSet = &COMPONENT.remove(b'@').remove(b':').remove(b'$').remove(b',');

const SEGMENT: &AsciiSet = &QUERY.remove(b'&').remove(b'=').remove(b'+');

/// How a literal space is written in a query component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceEncoding {
    /// `%20`
    Percent,
    /// `+`, the form-encoding convention.
    Plus,
}

/// Encode a key or value for the query component of a URL.
pub fn encode_uri_query(value: &str, spaces: SpaceEncoding) -> String {
    let encoded = utf8_percent_encode(value, QUERY).to_string();
    match spaces {
        SpaceEncoding::Percent => encoded,
        // A literal `%` is always escaped to `%25`, so every `%20` here came from a space.
        SpaceEncoding::Plus => encoded.replace("%20", "+"),
    }
}

/// Encode a value substituted into a single path segment.
pub fn encode_uri_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}
