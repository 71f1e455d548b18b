use assert_json_diff::assert_json_include;
use chrono::{TimeZone, Utc};
use reqtrack::archive::{for_each_entry, ArchiveEntry};
use reqtrack::model::{PostDataEntry, RequestRecord, ResponseInfo};
use reqtrack::{load_archive, load_archive_file, write_archive, write_archive_file, Error};
use serde_json::json;

fn entry(i: usize) -> ArchiveEntry {
    let mut record = RequestRecord::new("POST", format!("https://app.example.com/api/items/{i}?v=1"));
    record.headers.insert("Content-Type", "application/json");
    record.content_type = "application/json".into();
    record
        .post_data_entries
        .push(PostDataEntry::from_text(format!("{{\"id\":{i}}}")));
    if i % 2 == 0 {
        record.response = Some(ResponseInfo {
            status: 201,
            status_text: "Created".into(),
            headers: Default::default(),
            mime_type: "application/json".into(),
        });
    }
    let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    ArchiveEntry::from_record_at(&record, started)
}

#[test]
fn test_round_trip_sizes() {
    for n in [0usize, 1, 5000] {
        let entries: Vec<ArchiveEntry> = (0..n).map(entry).collect();
        let mut buf = Vec::new();
        assert_eq!(write_archive(&mut buf, &entries).unwrap(), n);

        let loaded = load_archive(buf.as_slice()).unwrap();
        assert_eq!(loaded.len(), n);
        assert_eq!(loaded, entries);
    }
}

#[test]
fn test_written_shape() {
    let mut buf = Vec::new();
    write_archive(&mut buf, [entry(0)]).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    assert_json_include!(
        actual: doc,
        expected: json!({
            "log": {
                "version": "1.2",
                "creator": {"name": "reqtrack"},
                "pages": [],
                "entries": [{
                    "startedDateTime": "2026-03-01T12:00:00.000Z",
                    "request": {
                        "method": "POST",
                        "url": "https://app.example.com/api/items/0?v=1",
                        "httpVersion": "HTTP/1.1",
                        "queryString": [{"name": "v", "value": "1"}],
                        "postData": {"mimeType": "application/json", "text": "{\"id\":0}"},
                        "bodySize": 8
                    },
                    "response": {"status": 201, "statusText": "Created"}
                }]
            }
        })
    );
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.har");
    let entries: Vec<ArchiveEntry> = (0..3).map(entry).collect();

    write_archive_file(&path, &entries).unwrap();
    assert_eq!(load_archive_file(&path).unwrap(), entries);
}

#[test]
fn test_foreign_archive_loads() {
    let doc = json!({
        "log": {
            "version": "1.2",
            "creator": {"name": "Firefox", "version": "144.0"},
            "browser": {"name": "Firefox", "version": "144.0"},
            "pages": [{"id": "page_1", "title": "Dashboard"}],
            "entries": [{
                "pageref": "page_1",
                "startedDateTime": "2026-03-01T12:00:00.000+01:00",
                "time": 42.5,
                "request": {
                    "method": "GET",
                    "url": "https://app.example.com/api/me",
                    "httpVersion": "HTTP/2",
                    "headers": [{"name": "Accept", "value": "*/*"}],
                    "queryString": [],
                    "cookies": [],
                    "headersSize": 120,
                    "bodySize": 0
                },
                "response": {
                    "status": 200,
                    "statusText": "OK",
                    "httpVersion": "HTTP/2",
                    "headers": [],
                    "cookies": [],
                    "content": {"size": 2, "mimeType": "application/json", "text": "{}"},
                    "redirectURL": "",
                    "headersSize": 80,
                    "bodySize": 2,
                    "_transferSize": 300
                },
                "cache": {},
                "timings": {"send": 0, "wait": 40, "receive": 2.5}
            }]
        }
    });
    let bytes = serde_json::to_vec(&doc).unwrap();

    let mut seen = Vec::new();
    let count = for_each_entry(bytes.as_slice(), |e| seen.push(e)).unwrap();
    assert_eq!(count, 1);
    assert_eq!(seen[0].request.url, "https://app.example.com/api/me");
    assert_eq!(seen[0].pageref.as_deref(), Some("page_1"));
    assert_eq!(seen[0].to_record().response.map(|r| r.status), Some(200));
}

#[test]
fn test_missing_entries_is_format_error() {
    let err = load_archive(br#"{"log":{"version":"1.2"}}"#.as_slice()).unwrap_err();
    assert!(matches!(err, Error::ArchiveFormat(_)), "{err:?}");

    let err = load_archive(br#"{"log":{"entries":[{"request":"#.as_slice()).unwrap_err();
    assert!(matches!(err, Error::ArchiveFormat(_)), "{err:?}");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_archive_file(&dir.path().join("absent.har")).unwrap_err();
    assert!(matches!(err, Error::ArchiveFile { .. }));
}
