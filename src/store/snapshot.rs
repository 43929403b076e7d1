//! CSV snapshot writer

use crate::error::{Error, Result};
use crate::models::Record;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Full header, used when rows carry their origin
pub const FULL_HEADER: [&str; 4] = ["origin_tag", "source_url", "record_type", "text"];

/// Reduced header for untagged single-source output
pub const BARE_HEADER: [&str; 2] = ["record_type", "text"];

/// Write `records` to `path`, replacing whatever was there.
///
/// Rows go to a sibling temp file first and are renamed into place, so
/// readers never observe a half-written snapshot.
pub fn write_snapshot(path: &Path, records: &[Record], include_origin: bool) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let written = write_rows(&tmp, records, include_origin).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        e
    })?;
    std::fs::rename(&tmp, path)?;

    debug!("Wrote {} rows to {:?}", written, path);
    Ok(written)
}

fn write_rows(path: &Path, records: &[Record], include_origin: bool) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;

    if include_origin {
        writer.write_record(FULL_HEADER)?;
    } else {
        writer.write_record(BARE_HEADER)?;
    }

    for record in records {
        if include_origin {
            writer.write_record([
                record.origin_tag(),
                record.source_url().as_str(),
                record.record_type().as_str(),
                record.text(),
            ])?;
        } else {
            writer.write_record([record.record_type().as_str(), record.text()])?;
        }
    }

    writer
        .flush()
        .map_err(|e| Error::Persistence(format!("flush {:?}: {}", path, e)))?;
    Ok(records.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `data/demo.csv` becomes `data/demo-20240301T120000Z.csv`
pub fn versioned_path(path: &Path, at: DateTime<Utc>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = at.format("%Y%m%dT%H%M%SZ");
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}-{}", stem, stamp),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use url::Url;

    fn sample() -> Vec<Record> {
        let url = Url::parse("http://test/page").unwrap();
        vec![
            Record::new("demo", url.clone(), RecordType::Heading, "T").unwrap(),
            Record::new("demo", url, RecordType::Paragraph, "Body, with \"quotes\"").unwrap(),
        ]
    }

    #[test]
    fn test_write_full_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("demo.csv");

        assert_eq!(write_snapshot(&path, &sample(), true).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "origin_tag,source_url,record_type,text");
        assert_eq!(lines[1], "demo,http://test/page,heading,T");
        assert_eq!(lines[2], r#"demo,http://test/page,paragraph,"Body, with ""quotes""""#);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_overwrites_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo.csv");

        write_snapshot(&path, &sample(), false).unwrap();
        write_snapshot(&path, &sample()[..1], false).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "record_type,text\nheading,T\n");
    }

    #[test]
    fn test_versioned_path() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            versioned_path(Path::new("data/demo.csv"), at),
            PathBuf::from("data/demo-20240301T120000Z.csv")
        );
        assert_eq!(
            versioned_path(Path::new("demo"), at),
            PathBuf::from("demo-20240301T120000Z")
        );
    }
}
