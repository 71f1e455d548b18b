//! Core data types shared by the capture engine, the static analyzer, and
//! the aggregation layer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Method used when none could be resolved.
pub const DEFAULT_METHOD: &str = "GET";

/// A name/value pair from a query string or form body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Header mapping. Names keep the case they were observed with; lookups
/// ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Case-insensitive lookup. An exact-case match wins over a folded one.
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.0.get(name) {
            return Some(value);
        }
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One request body fragment: the transport encoding plus its decoded text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDataEntry {
    /// Base64 of the raw body bytes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bytes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub decoded_text: String,
}

impl PostDataEntry {
    /// Build an entry from plain body text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let decoded_text = text.into();
        Self {
            bytes: STANDARD.encode(decoded_text.as_bytes()),
            decoded_text,
        }
    }

    /// Build an entry from a base64 transport fragment. Bytes that are not
    /// valid base64 or not UTF-8 leave the decoded text empty.
    pub fn from_base64(bytes: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let decoded_text = STANDARD
            .decode(bytes.as_bytes())
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .unwrap_or_default();
        Self {
            bytes,
            decoded_text,
        }
    }
}

/// Response metadata attached by dynamic capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    pub status: u16,
    pub status_text: String,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
}

/// One observed or inferred HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
    /// Empty means intentionally absent (for example a bodyless GET).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_data_entries: Vec<PostDataEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseInfo>,
}

impl RequestRecord {
    /// Create a record with an upper-cased method (`GET` when blank).
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: normalize_method(method),
            url: url.into(),
            headers: Headers::new(),
            content_type: String::new(),
            query_params: Vec::new(),
            post_data_entries: Vec::new(),
            response: None,
        }
    }

    /// Decoded text of the first body fragment, or `""`.
    pub fn first_body(&self) -> &str {
        self.post_data_entries
            .first()
            .map(|entry| entry.decoded_text.as_str())
            .unwrap_or("")
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The identity used for deduplication.
    pub fn dedup_key(&self) -> RecordKey {
        RecordKey {
            method: self.method.clone(),
            url: self.url.clone(),
            body: self.first_body().to_string(),
        }
    }

    /// Attach `response` unless one is already present. Returns whether it
    /// was attached.
    pub fn attach_response(&mut self, response: ResponseInfo) -> bool {
        if self.response.is_some() {
            return false;
        }
        self.response = Some(response);
        true
    }
}

/// `(method, url, first body text)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// Trim and upper-case an HTTP method, defaulting to `GET`.
pub fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() {
        DEFAULT_METHOD.to_string()
    } else {
        method.to_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults_method() {
        assert_eq!(RequestRecord::new("", "/x").method, "GET");
        assert_eq!(RequestRecord::new(" post ", "/x").method, "POST");
    }

    #[test]
    fn test_headers_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("accept"), None);
    }

    #[test]
    fn test_post_data_from_base64() {
        let entry = PostDataEntry::from_base64("YT0xJmI9Mg==");
        assert_eq!(entry.decoded_text, "a=1&b=2");

        let broken = PostDataEntry::from_base64("not base64!");
        assert_eq!(broken.bytes, "not base64!");
        assert!(broken.decoded_text.is_empty());
    }

    #[test]
    fn test_attach_response_only_once() {
        let mut record = RequestRecord::new("GET", "https://ex.com/a");
        let first = ResponseInfo {
            status: 200,
            status_text: "OK".into(),
            ..Default::default()
        };
        let second = ResponseInfo {
            status: 500,
            ..Default::default()
        };
        assert!(record.attach_response(first));
        assert!(!record.attach_response(second));
        assert_eq!(record.response.as_ref().map(|r| r.status), Some(200));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = RequestRecord::new("POST", "https://ex.com/a");
        record.content_type = "application/json".into();
        record.post_data_entries.push(PostDataEntry::from_text("{}"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["contentType"], "application/json");
        assert_eq!(json["postDataEntries"][0]["decodedText"], "{}");
        assert!(json.get("response").is_none());
    }
}
