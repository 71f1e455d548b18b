//! HAR 1.2 archive model and conversion from request records.
//!
//! The types mirror the interchange schema field for field so archives
//! written here load in browser devtools and proxy tooling, and archives
//! produced by those tools load here. Unknown fields are ignored.

pub mod stream;

pub use stream::{
    for_each_entry, load_archive, load_archive_file, write_archive, write_archive_file,
};

use crate::model::{Headers, PostDataEntry, RequestRecord, ResponseInfo};
use crate::normalize::{derive_query_params, is_form_urlencoded, parse_form_body, parse_query_params};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const HAR_VERSION: &str = "1.2";
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// The `log.creator` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Creator {
    pub name: String,
    pub version: String,
}

impl Creator {
    pub fn reqtrack() -> Self {
        Self {
            name: "reqtrack".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A `name`/`value` pair used for headers and query strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

/// A decoded form field inside `postData.params`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostParam {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostData {
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<PostParam>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<NameValue>,
    pub query_string: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Content {
    pub size: i64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveResponse {
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<NameValue>,
    pub content: Content,
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

impl ArchiveResponse {
    /// Placeholder for requests that never saw a response.
    fn empty() -> Self {
        Self {
            headers_size: -1,
            body_size: -1,
            ..Self::default()
        }
    }

    fn from_info(info: &ResponseInfo) -> Self {
        Self {
            status: info.status,
            status_text: info.status_text.clone(),
            http_version: HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: name_values(&info.headers),
            content: Content {
                size: -1,
                mime_type: info.mime_type.clone(),
                ..Content::default()
            },
            redirect_url: info.headers.get("location").unwrap_or_default().to_string(),
            headers_size: -1,
            body_size: -1,
        }
    }

    fn to_info(&self) -> Option<ResponseInfo> {
        if self.status == 0 {
            return None;
        }
        Some(ResponseInfo {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            mime_type: self.content.mime_type.clone(),
        })
    }
}

/// Phase timings in milliseconds; `-1` marks a phase that does not apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub blocked: f64,
    pub dns: f64,
    pub connect: f64,
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
    pub ssl: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            blocked: -1.0,
            dns: -1.0,
            connect: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
            ssl: -1.0,
        }
    }
}

/// One `log.entries[]` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveEntry {
    pub started_date_time: String,
    pub time: f64,
    pub request: ArchiveRequest,
    pub response: ArchiveResponse,
    pub cache: serde_json::Value,
    pub timings: Timings,
    #[serde(rename = "serverIPAddress", skip_serializing_if = "Option::is_none")]
    pub server_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pageref: Option<String>,
}

impl Default for ArchiveEntry {
    fn default() -> Self {
        Self {
            started_date_time: String::new(),
            time: 0.0,
            request: ArchiveRequest::default(),
            response: ArchiveResponse::empty(),
            cache: serde_json::Value::Object(Default::default()),
            timings: Timings::default(),
            server_ip_address: None,
            connection: None,
            pageref: None,
        }
    }
}

impl ArchiveEntry {
    /// Convert a record, stamping it with the current time.
    pub fn from_record(record: &RequestRecord) -> Self {
        Self::from_record_at(record, Utc::now())
    }

    /// Convert a record, stamping it with `started`.
    pub fn from_record_at(record: &RequestRecord, started: DateTime<Utc>) -> Self {
        let text: String = record
            .post_data_entries
            .iter()
            .map(|entry| entry.decoded_text.as_str())
            .collect();

        // A bodyless record keeps its inferred type as an empty postData.
        let has_post_data = !text.is_empty() || !record.content_type.is_empty();
        let post_data = has_post_data.then(|| PostData {
            mime_type: record.content_type.clone(),
            params: if is_form_urlencoded(&record.content_type) {
                parse_form_body(&text)
                    .into_iter()
                    .map(|p| PostParam {
                        name: p.name,
                        value: Some(p.value),
                        ..PostParam::default()
                    })
                    .collect()
            } else {
                Vec::new()
            },
            text: text.clone(),
        });

        let request = ArchiveRequest {
            method: record.method.clone(),
            url: record.url.clone(),
            http_version: HTTP_VERSION.to_string(),
            cookies: record.header("cookie").map(parse_cookies).unwrap_or_default(),
            headers: name_values(&record.headers),
            query_string: parse_query_params(&record.url)
                .into_iter()
                .map(|p| NameValue::new(p.name, p.value))
                .collect(),
            post_data,
            headers_size: -1,
            body_size: text.len() as i64,
        };

        Self {
            started_date_time: started.to_rfc3339_opts(SecondsFormat::Millis, true),
            request,
            response: record
                .response
                .as_ref()
                .map(ArchiveResponse::from_info)
                .unwrap_or_else(ArchiveResponse::empty),
            ..Self::default()
        }
    }

    /// Content type by priority: the body's declared type, else the first
    /// `Content-Type` request header.
    pub fn content_type(&self) -> &str {
        if let Some(post) = &self.request.post_data {
            if !post.mime_type.is_empty() {
                return &post.mime_type;
            }
        }
        self.request
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("content-type"))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }

    /// Request body text, or `""`.
    pub fn body_text(&self) -> &str {
        self.request
            .post_data
            .as_ref()
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }

    /// Rebuild the request record this entry describes.
    pub fn to_record(&self) -> RequestRecord {
        let mut record = RequestRecord::new(&self.request.method, self.request.url.clone());
        record.headers = self
            .request
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect::<Headers>();
        record.content_type = self.content_type().to_string();
        if !self.body_text().is_empty() {
            record
                .post_data_entries
                .push(PostDataEntry::from_text(self.body_text()));
        }
        record.query_params =
            derive_query_params(&record.url, &record.content_type, &record.post_data_entries);
        record.response = self.response.to_info();
        record
    }
}

fn name_values(headers: &Headers) -> Vec<NameValue> {
    headers.iter().map(|(n, v)| NameValue::new(n, v)).collect()
}

fn parse_cookies(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| Cookie {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            ..Cookie::default()
        })
        .collect()
}
