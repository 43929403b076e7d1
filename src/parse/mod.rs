//! Payload parsing and record extraction
//!
//! This module handles:
//! - HTML documents: headings, paragraphs, title and meta description
//! - JSON API payloads: flattening into one record per element

mod html;
mod json;

pub use html::*;
pub use json::*;

use crate::config::FieldMapping;
use crate::error::Result;
use crate::models::Record;
use scraper::Html;
use serde_json::Value;
use url::Url;

/// A fetched payload, ready for extraction
pub enum RawPayload {
    /// Parsed JSON body from an API source
    Json(Value),
    /// Parsed HTML tree from a document source
    Document(Html),
}

impl std::fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawPayload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            RawPayload::Document(_) => f.write_str("Document(..)"),
        }
    }
}

/// Per-source extraction settings
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Emit title and meta description records for documents
    pub capture_metadata: bool,
    /// Field mapping for API payloads
    pub mapping: Option<FieldMapping>,
}

/// Normalize a payload into records, in payload order
pub fn extract(
    payload: &RawPayload,
    origin_tag: &str,
    source_url: &Url,
    options: &ExtractOptions,
) -> Result<Vec<Record>> {
    match payload {
        RawPayload::Document(document) => {
            extract_document(document, origin_tag, source_url, options.capture_metadata)
        }
        RawPayload::Json(value) => {
            extract_json(value, origin_tag, source_url, options.mapping.as_ref())
        }
    }
}
