//! Normalized records and per-cycle results.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Kind of content a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Heading,
    Paragraph,
    Title,
    MetaDescription,
    Custom,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Heading => "heading",
            RecordType::Paragraph => "paragraph",
            RecordType::Title => "title",
            RecordType::MetaDescription => "meta_description",
            RecordType::Custom => "custom",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heading" => Ok(RecordType::Heading),
            "paragraph" => Ok(RecordType::Paragraph),
            "title" => Ok(RecordType::Title),
            "meta_description" | "metadescription" | "description" => {
                Ok(RecordType::MetaDescription)
            }
            "custom" => Ok(RecordType::Custom),
            other => Err(Error::Config(format!("Unknown record type: {}", other))),
        }
    }
}

/// One normalized unit of extracted content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    origin_tag: String,
    source_url: Url,
    record_type: RecordType,
    text: String,
}

impl Record {
    /// Build a record. The origin tag must be non-empty.
    pub fn new(
        origin_tag: impl Into<String>,
        source_url: Url,
        record_type: RecordType,
        text: impl Into<String>,
    ) -> Result<Self> {
        let origin_tag = origin_tag.into();
        if origin_tag.trim().is_empty() {
            return Err(Error::Other("record origin tag must not be empty".to_string()));
        }
        Ok(Self {
            origin_tag,
            source_url,
            record_type,
            text: text.into(),
        })
    }

    pub fn origin_tag(&self) -> &str {
        &self.origin_tag
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Outcome of persisting one source's records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    /// Rows committed to the relational table
    pub rows_written: usize,
    /// Rows written to the flat file
    pub csv_rows: usize,
    /// Where the flat file landed, if it was written
    pub csv_path: Option<String>,
}

/// Outcome of one full cycle over every configured source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub cycle: u64,
    pub records_written: usize,
    pub per_source_errors: BTreeMap<String, String>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            records_written: 0,
            per_source_errors: BTreeMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn record_error(&mut self, source: &str, err: &Error) {
        self.per_source_errors
            .insert(source.to_string(), format!("{}: {}", err.kind(), err));
    }

    pub fn is_clean(&self) -> bool {
        self.per_source_errors.is_empty()
    }
}
