//! HTML record extraction

use crate::error::{Error, Result};
use crate::models::{Record, RecordType};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Recorded when a document has no `<title>`
pub const NO_TITLE: &str = "No title";

/// Recorded when a document has no meta description
pub const NO_DESCRIPTION: &str = "No description";

const CONTENT_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("invalid selector '{}': {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extract headings and paragraphs in document order.
///
/// With `capture_metadata`, the title and meta description lead the output as
/// singleton records, falling back to [`NO_TITLE`] / [`NO_DESCRIPTION`] when
/// absent. A document with no headings or paragraphs yields nothing at all.
pub fn extract_document(
    document: &Html,
    origin_tag: &str,
    source_url: &Url,
    capture_metadata: bool,
) -> Result<Vec<Record>> {
    let content = selector(CONTENT_SELECTOR)?;

    let mut body = Vec::new();
    for element in document.select(&content) {
        let record_type = if element.value().name() == "p" {
            RecordType::Paragraph
        } else {
            RecordType::Heading
        };
        body.push(Record::new(
            origin_tag,
            source_url.clone(),
            record_type,
            element_text(element),
        )?);
    }

    if body.is_empty() {
        return Ok(body);
    }

    let mut records = Vec::with_capacity(body.len() + 2);
    if capture_metadata {
        records.push(Record::new(
            origin_tag,
            source_url.clone(),
            RecordType::Title,
            document_title(document)?.unwrap_or_else(|| NO_TITLE.to_string()),
        )?);
        records.push(Record::new(
            origin_tag,
            source_url.clone(),
            RecordType::MetaDescription,
            meta_description(document)?.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        )?);
    }
    records.extend(body);
    Ok(records)
}

/// The document's `<title>` text, if present and non-blank
pub fn document_title(document: &Html) -> Result<Option<String>> {
    let title = selector("title")?;
    Ok(document
        .select(&title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty()))
}

/// The `content` of `<meta name="description">`, if present
pub fn meta_description(document: &Html) -> Result<Option<String>> {
    let meta = selector("meta[name][content]")?;
    Ok(document
        .select(&meta)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string()))
}
