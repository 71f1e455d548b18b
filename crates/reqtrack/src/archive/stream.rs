//! Streaming archive I/O.
//!
//! Loading walks the JSON token stream down to `log.entries` and decodes one
//! entry at a time. Writing emits the container by hand and encodes each
//! entry straight into the output, so neither direction builds a document
//! tree of the whole archive.

use super::{ArchiveEntry, Creator, HAR_VERSION};
use crate::error::{Error, Result};
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Write `entries` as a complete archive. Returns the number written.
pub fn write_archive<W, I>(writer: W, entries: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<ArchiveEntry>,
{
    let mut out = BufWriter::new(writer);

    out.write_all(b"{\"log\":{\"version\":")?;
    serde_json::to_writer(&mut out, HAR_VERSION)?;
    out.write_all(b",\"creator\":")?;
    serde_json::to_writer(&mut out, &Creator::reqtrack())?;
    out.write_all(b",\"pages\":[],\"entries\":[")?;

    let mut written = 0;
    for entry in entries {
        if written > 0 {
            out.write_all(b",")?;
        }
        serde_json::to_writer(&mut out, entry.borrow())?;
        written += 1;
    }

    out.write_all(b"]}}\n")?;
    out.flush()?;
    tracing::debug!(entries = written, "archive written");
    Ok(written)
}

/// Create (or truncate) `path` and write `entries` into it.
pub fn write_archive_file<I>(path: &Path, entries: I) -> Result<usize>
where
    I: IntoIterator,
    I::Item: Borrow<ArchiveEntry>,
{
    let file = File::create(path).map_err(|source| Error::ArchiveFile {
        path: path.to_path_buf(),
        source,
    })?;
    write_archive(file, entries)
}

/// Load every entry of an archive.
pub fn load_archive<R: Read>(reader: R) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    for_each_entry(reader, |entry| entries.push(entry))?;
    Ok(entries)
}

/// Load every entry of the archive at `path`.
pub fn load_archive_file(path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(path).map_err(|source| Error::ArchiveFile {
        path: path.to_path_buf(),
        source,
    })?;
    load_archive(file)
}

/// Decode entries one at a time, handing each to `sink` as soon as it is
/// complete. Returns the number of entries seen.
pub fn for_each_entry<R, F>(reader: R, mut sink: F) -> Result<usize>
where
    R: Read,
    F: FnMut(ArchiveEntry),
{
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
    let count = RootSeed { sink: &mut sink }
        .deserialize(&mut de)
        .map_err(format_error)?;
    de.end().map_err(format_error)?;
    tracing::debug!(entries = count, "archive loaded");
    Ok(count)
}

fn format_error(err: serde_json::Error) -> Error {
    if err.is_io() {
        Error::ArchiveIo(err.into())
    } else {
        Error::ArchiveFormat(err.to_string())
    }
}

struct RootSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> DeserializeSeed<'de> for RootSeed<'_, F> {
    type Value = usize;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<usize, D::Error> {
        deserializer.deserialize_map(RootVisitor { sink: self.sink })
    }
}

struct RootVisitor<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> Visitor<'de> for RootVisitor<'_, F> {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an archive object with a `log` member")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<usize, A::Error> {
        let sink = self.sink;
        let mut count = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "log" && count.is_none() {
                count = Some(map.next_value_seed(LogSeed { sink: &mut *sink })?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        count.ok_or_else(|| de::Error::missing_field("log"))
    }
}

struct LogSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> DeserializeSeed<'de> for LogSeed<'_, F> {
    type Value = usize;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<usize, D::Error> {
        deserializer.deserialize_map(LogVisitor { sink: self.sink })
    }
}

struct LogVisitor<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> Visitor<'de> for LogVisitor<'_, F> {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a `log` object with an `entries` array")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<usize, A::Error> {
        let sink = self.sink;
        let mut count = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "entries" && count.is_none() {
                count = Some(map.next_value_seed(EntriesSeed { sink: &mut *sink })?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        count.ok_or_else(|| de::Error::missing_field("entries"))
    }
}

struct EntriesSeed<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> DeserializeSeed<'de> for EntriesSeed<'_, F> {
    type Value = usize;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<usize, D::Error> {
        deserializer.deserialize_seq(EntriesVisitor { sink: self.sink })
    }
}

struct EntriesVisitor<'a, F> {
    sink: &'a mut F,
}

impl<'de, F: FnMut(ArchiveEntry)> Visitor<'de> for EntriesVisitor<'_, F> {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of archive entries")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<usize, A::Error> {
        let sink = self.sink;
        let mut count = 0;
        while let Some(entry) = seq.next_element::<ArchiveEntry>()? {
            sink(entry);
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries_is_format_error() {
        let err = load_archive(&br#"{"log":{"version":"1.2"}}"#[..]).unwrap_err();
        assert!(matches!(err, Error::ArchiveFormat(_)), "{err}");

        let err = load_archive(&b"[]"[..]).unwrap_err();
        assert!(matches!(err, Error::ArchiveFormat(_)), "{err}");
    }

    #[test]
    fn test_truncated_archive_is_error() {
        let err = load_archive(&br#"{"log":{"entries":[{"request":{}},"#[..]).unwrap_err();
        assert!(matches!(err, Error::ArchiveFormat(_)), "{err}");
    }

    #[test]
    fn test_other_members_skipped() {
        let raw = br#"{
            "log": {
                "version": "1.2",
                "creator": {"name": "devtools", "version": "1"},
                "browser": {"name": "Chrome", "version": "140"},
                "pages": [{"id": "page_1", "title": "x"}],
                "entries": [
                    {"request": {"method": "GET", "url": "https://ex.com/a"}},
                    {"request": {"method": "POST", "url": "https://ex.com/b"}}
                ],
                "comment": "trailing"
            }
        }"#;
        let entries = load_archive(&raw[..]).unwrap();
        let urls: Vec<_> = entries.iter().map(|e| e.request.url.as_str()).collect();
        assert_eq!(urls, ["https://ex.com/a", "https://ex.com/b"]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_archive_file(Path::new("/nonexistent/dir/x.har")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dir/x.har"));
    }
}
