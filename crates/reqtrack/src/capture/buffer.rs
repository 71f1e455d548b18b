//! Append-only record buffer fed by network events.

use crate::browser::NetworkEvent;
use crate::model::{Headers, PostDataEntry, RequestRecord, ResponseInfo};
use crate::normalize::derive_query_params;

/// A body that must be retrieved out of band for the record at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDataRequest {
    pub index: usize,
    pub request_id: String,
}

/// Ordered records reconstructed from network events.
///
/// Records are only ever appended. Later events may fill in a record's
/// response or body, never remove it.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    records: Vec<RequestRecord>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns a follow-up retrieval when the request has a
    /// body that was not inlined.
    pub fn apply(&mut self, event: NetworkEvent) -> Option<PostDataRequest> {
        match event {
            NetworkEvent::RequestInitiated {
                request_id,
                method,
                url,
                headers,
                post_data,
                has_post_data,
            } => {
                if method.eq_ignore_ascii_case("OPTIONS") {
                    tracing::trace!(%url, "skipping preflight");
                    return None;
                }
                let record = build_record(&method, url, headers, post_data);
                let needs_fetch = has_post_data && record.post_data_entries.is_empty();
                tracing::debug!(method = %record.method, url = %record.url, "request");
                self.records.push(record);
                needs_fetch.then(|| PostDataRequest {
                    index: self.records.len() - 1,
                    request_id,
                })
            }
            NetworkEvent::ResponseReceived {
                url,
                status,
                status_text,
                headers,
                mime_type,
                ..
            } => {
                let pending = self
                    .records
                    .iter_mut()
                    .find(|r| r.url == url && r.response.is_none());
                match pending {
                    Some(record) => {
                        record.attach_response(ResponseInfo {
                            status,
                            status_text,
                            headers: headers.into_iter().collect(),
                            mime_type,
                        });
                    }
                    None => tracing::trace!(%url, status, "response without pending request"),
                }
                None
            }
            NetworkEvent::Other => None,
        }
    }

    /// Attach a body retrieved out of band to the record at `index`.
    pub fn attach_post_data(&mut self, index: usize, body: String) {
        if body.is_empty() {
            return;
        }
        let Some(record) = self.records.get_mut(index) else {
            return;
        };
        record.post_data_entries.push(PostDataEntry::from_text(body));
        record.query_params =
            derive_query_params(&record.url, &record.content_type, &record.post_data_entries);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RequestRecord> {
        self.records
    }
}

fn build_record(
    method: &str,
    url: String,
    headers: Vec<(String, String)>,
    post_data: Vec<String>,
) -> RequestRecord {
    let mut record = RequestRecord::new(method, url);
    record.headers = headers.into_iter().collect::<Headers>();
    record.content_type = record
        .header("content-type")
        .map(str::to_string)
        .unwrap_or_default();
    record.post_data_entries = post_data
        .into_iter()
        .filter(|bytes| !bytes.is_empty())
        .map(PostDataEntry::from_base64)
        .collect();
    record.query_params =
        derive_query_params(&record.url, &record.content_type, &record.post_data_entries);
    record
}
