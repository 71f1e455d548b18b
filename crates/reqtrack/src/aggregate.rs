//! Merging and deduplication of records from both producers.

use crate::archive::ArchiveEntry;
use crate::config::base_origin;
use crate::error::Result;
use crate::model::{RecordKey, RequestRecord};
use crate::normalize::{normalize_record, sanitize_url};
use std::collections::HashSet;

/// Concatenate `base` (already persisted or captured) and `scraped`
/// (statically inferred) entries, in that order.
pub fn merge(mut base: Vec<ArchiveEntry>, scraped: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
    base.extend(scraped);
    base
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct EntryKey {
    method: String,
    url: String,
    body: String,
    content_type: String,
}

/// Deduplicate archive entries against the origin of `target_url`.
///
/// Each surviving entry has its URL rewritten to the normalized form. Entries
/// whose URL normalizes to nothing are dropped. The first entry per
/// `(method, url, body, content type)` wins.
pub fn deduplicate(entries: Vec<ArchiveEntry>, target_url: &str) -> Result<Vec<ArchiveEntry>> {
    let origin = base_origin(target_url)?;
    let total = entries.len();

    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(total);
    for mut entry in entries {
        let url = sanitize_url(&entry.request.url, &origin);
        if url.is_empty() {
            continue;
        }
        let key = EntryKey {
            method: entry.request.method.to_uppercase(),
            url: url.clone(),
            body: entry.body_text().to_string(),
            content_type: entry.content_type().to_string(),
        };
        if seen.insert(key) {
            entry.request.url = url;
            kept.push(entry);
        }
    }

    tracing::debug!(total, kept = kept.len(), "deduplicated archive entries");
    Ok(kept)
}

/// Drop records without a URL and keep the first record per
/// `(method, url, first body)`. Order is preserved.
pub fn dedupe_records(records: Vec<RequestRecord>) -> Vec<RequestRecord> {
    let mut seen: HashSet<RecordKey> = HashSet::new();
    records
        .into_iter()
        .filter(|record| !record.url.is_empty())
        .filter(|record| seen.insert(record.dedup_key()))
        .collect()
}

/// Normalize every record against `base_origin`, then deduplicate.
pub fn normalize_records(mut records: Vec<RequestRecord>, base_origin: &str) -> Vec<RequestRecord> {
    for record in &mut records {
        normalize_record(record, base_origin);
    }
    dedupe_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{NameValue, PostData};

    const TARGET: &str = "https://ex.com/app/index.html";

    fn entry(method: &str, url: &str, body: Option<&str>) -> ArchiveEntry {
        let mut entry = ArchiveEntry::default();
        entry.request.method = method.into();
        entry.request.url = url.into();
        entry.request.post_data = body.map(|text| PostData {
            mime_type: "application/json".into(),
            text: text.into(),
            ..PostData::default()
        });
        entry
    }

    #[test]
    fn test_merge_keeps_order() {
        let merged = merge(
            vec![entry("GET", "/a", None)],
            vec![entry("GET", "/b", None), entry("GET", "/c", None)],
        );
        let urls: Vec<_> = merged.iter().map(|e| e.request.url.as_str()).collect();
        assert_eq!(urls, ["/a", "/b", "/c"]);
    }

    #[test]
    fn test_deduplicate_normalizes_and_drops() {
        let entries = vec![
            entry("GET", "/api/users", None),
            entry("GET", "https://ex.com/api/users", None),
            entry("GET", "/api/${id}", None),
            entry("POST", "/api/users", Some("{\"a\":1}")),
            entry("POST", "/api/users", Some("{\"a\":2}")),
            entry("GET", "", None),
        ];
        let deduped = deduplicate(entries, TARGET).unwrap();
        let summary: Vec<_> = deduped
            .iter()
            .map(|e| (e.request.method.as_str(), e.request.url.as_str(), e.body_text()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GET", "https://ex.com/api/users", ""),
                ("POST", "https://ex.com/api/users", "{\"a\":1}"),
                ("POST", "https://ex.com/api/users", "{\"a\":2}"),
            ]
        );
    }

    #[test]
    fn test_header_casing_does_not_split_entries() {
        let mut first = entry("GET", "/x", None);
        first.request.headers = vec![
            NameValue { name: "Accept".into(), value: "*/*".into() },
            NameValue { name: "X-A".into(), value: "1".into() },
        ];
        let mut second = entry("GET", "/x", None);
        second.request.headers = vec![
            NameValue { name: "x-a".into(), value: "1".into() },
            NameValue { name: "accept".into(), value: "*/*".into() },
        ];
        assert_eq!(deduplicate(vec![first, second], TARGET).unwrap().len(), 1);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let entries = vec![
            entry("GET", "p", None),
            entry("GET", "/p", None),
            entry("DELETE", "//cdn.ex.com/p", None),
            entry("POST", "/p", Some("[1]")),
        ];
        let once = deduplicate(entries, TARGET).unwrap();
        let twice = deduplicate(once.clone(), TARGET).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_deduplicate_rejects_bad_target() {
        assert!(deduplicate(Vec::new(), "nope").is_err());
    }

    #[test]
    fn test_dedupe_records_first_wins() {
        let mut with_header = RequestRecord::new("GET", "https://ex.com/a");
        with_header.headers.insert("X-First", "1");
        let records = vec![
            with_header,
            RequestRecord::new("get", "https://ex.com/a"),
            RequestRecord::new("GET", ""),
            RequestRecord::new("POST", "https://ex.com/a"),
        ];
        let deduped = dedupe_records(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].header("x-first"), Some("1"));
        assert_eq!(deduped[1].method, "POST");
    }
}
