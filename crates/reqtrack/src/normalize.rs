//! URL and content-type normalization.
//!
//! Pure functions shared by dynamic capture, static analysis and the
//! aggregation layer. Nothing here performs I/O.

use crate::model::{Param, PostDataEntry, RequestRecord};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;

pub const CT_JSON: &str = "application/json";
pub const CT_FORM: &str = "application/x-www-form-urlencoded";
pub const CT_MULTIPART: &str = "multipart/form-data";
pub const CT_OCTET_STREAM: &str = "application/octet-stream";
pub const CT_XML: &str = "application/xml";

/// Marker left behind by an unresolved template interpolation.
const INTERPOLATION_MARKER: &str = "${";

/// Schemes that never produce an HTTP request.
const NON_NETWORK_SCHEMES: &[&str] = &[
    "data:",
    "blob:",
    "javascript:",
    "about:",
    "mailto:",
    "tel:",
    "chrome-extension:",
];

fn url_char_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '/' | '-' | '_' | '.' | ':' | '=' | '?' | '&' | '%' | '#')
}

/// Sanitize a raw URL and resolve it against `base_origin`.
///
/// Returns `""` when the URL cannot be determined statically (empty, or
/// holding an unresolved `${...}` interpolation) or when it names a scheme
/// that does not issue network requests.
pub fn sanitize_url(raw: &str, base_origin: &str) -> String {
    if raw.is_empty() || raw.contains(INTERPOLATION_MARKER) {
        return String::new();
    }

    let filtered: String = raw.chars().filter(|c| url_char_allowed(*c)).collect();
    let cleaned = filtered.trim();
    if cleaned.is_empty() {
        return String::new();
    }

    let lower = cleaned.to_ascii_lowercase();
    if NON_NETWORK_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return String::new();
    }

    if let Some(rest) = cleaned.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if is_absolute(&lower) {
        return cleaned.to_string();
    }

    let base = base_origin.trim_end_matches('/');
    if cleaned.starts_with('/') {
        format!("{base}{cleaned}")
    } else {
        format!("{base}/{cleaned}")
    }
}

fn is_absolute(lower: &str) -> bool {
    ["http://", "https://", "ws://", "wss://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Parse the query string of `url` into ordered name/value pairs.
///
/// Duplicate names are preserved. A key without `=` yields an empty value.
/// Values are kept exactly as written.
pub fn parse_query_params(url: &str) -> Vec<Param> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or("");
    split_pairs(query)
}

fn split_pairs(text: &str) -> Vec<Param> {
    text.split('&')
        .filter(|piece| !piece.is_empty())
        .map(|piece| match piece.split_once('=') {
            Some((name, value)) => Param::new(name, value),
            None => Param::new(piece, ""),
        })
        .collect()
}

/// Decode a form-urlencoded body into ordered pairs.
pub fn parse_form_body(body: &str) -> Vec<Param> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(name, value)| Param::new(name, value))
        .collect()
}

/// Whether `content_type` names a form-urlencoded payload.
pub fn is_form_urlencoded(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains(CT_FORM)
}

/// Query parameters for a record: the URL's query string, followed by any
/// form-urlencoded body pairs.
pub fn derive_query_params(
    url: &str,
    content_type: &str,
    entries: &[PostDataEntry],
) -> Vec<Param> {
    let mut params = parse_query_params(url);
    if is_form_urlencoded(content_type) {
        for entry in entries.iter().filter(|e| !e.decoded_text.is_empty()) {
            params.extend(parse_form_body(&entry.decoded_text));
        }
    }
    params
}

/// Rewrite a record's URL to its normalized form and re-derive its query
/// parameters so the two stay consistent.
pub fn normalize_record(record: &mut RequestRecord, base_origin: &str) {
    record.url = sanitize_url(&record.url, base_origin);
    record.query_params =
        derive_query_params(&record.url, &record.content_type, &record.post_data_entries);
}

fn blob_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"type\s*:\s*["'`]([^"'`]+)["'`]"#).expect("valid blob type regex")
    })
}

fn base64_shape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("valid base64 regex"))
}

/// Infer a body's content type.
///
/// An explicit value always wins. Otherwise the body is classified by shape,
/// falling back to form-urlencoded. Bodyless `GET`/`HEAD` requests have no
/// content type.
pub fn guess_content_type(explicit: &str, body: &str, method: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }

    let body = body.trim();
    if body.is_empty() {
        let bodyless = method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD");
        return if bodyless { String::new() } else { CT_FORM.to_string() };
    }

    classify_body(body)
}

fn classify_body(body: &str) -> String {
    if looks_like_json(body) {
        return CT_JSON.to_string();
    }
    if body.contains("new FormData") {
        return CT_MULTIPART.to_string();
    }
    if body.contains("new URLSearchParams") {
        return CT_FORM.to_string();
    }
    if body.starts_with("new Blob") || body.starts_with("new File") {
        return blob_type_regex()
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| CT_OCTET_STREAM.to_string());
    }
    if looks_like_xml(body) {
        return CT_XML.to_string();
    }
    if looks_like_base64(body) {
        return CT_OCTET_STREAM.to_string();
    }
    // key=value pairs and anything unrecognized are sent as form data.
    CT_FORM.to_string()
}

fn looks_like_json(body: &str) -> bool {
    if body.starts_with("JSON.stringify(") {
        return true;
    }
    let object_shape = body.starts_with('{') && body.ends_with('}');
    let array_shape = body.starts_with('[') && body.ends_with(']');
    if object_shape || array_shape {
        // JS object and array literals count even when not strict JSON.
        return true;
    }
    serde_json::from_str::<serde_json::Value>(body).is_ok()
}

fn looks_like_xml(body: &str) -> bool {
    if body.starts_with("<?xml") {
        return true;
    }
    let lower = body.to_ascii_lowercase();
    body.starts_with('<')
        && !lower.starts_with("<!doctype html")
        && !lower.starts_with("<html")
        && body.contains("</")
}

fn looks_like_base64(body: &str) -> bool {
    body.len() >= 20
        && body.len() % 4 == 0
        && base64_shape_regex().is_match(body)
        && STANDARD.decode(body).is_ok()
}
