//! Attribution recovery from stamped PDFs

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use tracing::warn;

use crate::error::{Error, Result};
use crate::watermark::WatermarkRecord;

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.catalog()?;

    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::InvalidDocument("Catalog has no Pages reference".to_string()))?;

    let count = doc
        .get_dictionary(pages_id)?
        .get(b"Count")
        .and_then(Object::as_i64)
        .map_err(|_| Error::InvalidDocument("Pages has no integer Count".to_string()))?;

    Ok(count.max(0) as usize)
}

/// Attribution found in a document's Info dictionary
#[derive(Debug, Clone, Default)]
pub struct DocumentAttribution {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (the distributed file name)
    pub title: Option<String>,
    /// Subject (the watermark payload)
    pub subject: Option<String>,
    /// Keywords (requester identity and timestamp)
    pub keywords: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
}

impl DocumentAttribution {
    /// Parse the Subject as a watermark record, if it is one
    pub fn watermark(&self) -> Option<WatermarkRecord> {
        self.subject
            .as_deref()
            .and_then(|s| WatermarkRecord::from_payload(s.as_bytes()).ok())
    }
}

fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| Error::InvalidDocument(format!("Unable to parse PDF: {}", e)))
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise treated as UTF-8)
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn info_text(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let value = match info.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };

    value.as_str().ok().map(decode_text_string)
}

/// Read the attribution channel stored in the document Info dictionary
pub fn read_attribution(bytes: &[u8]) -> Result<DocumentAttribution> {
    let doc = load(bytes)?;

    let mut attribution = DocumentAttribution {
        page_count: count_pages_from_catalog(&doc)?,
        ..Default::default()
    };

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    if let Some(info) = info {
        attribution.title = info_text(&doc, info, b"Title");
        attribution.subject = info_text(&doc, info, b"Subject");
        attribution.keywords = info_text(&doc, info, b"Keywords");
        attribution.producer = info_text(&doc, info, b"Producer");
        attribution.creator = info_text(&doc, info, b"Creator");
    }

    Ok(attribution)
}

/// Recover every watermark record drawn into the page content
///
/// Each text-show operand that parses as a record is returned, so a document
/// stamped once yields three records per page. Pages whose content cannot be
/// decoded are skipped.
pub fn extract_watermarks(bytes: &[u8]) -> Result<Vec<WatermarkRecord>> {
    let doc = load(bytes)?;
    let mut records = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let raw = doc.get_page_content(page_id)?;

        let content = match Content::decode(&raw) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping page {}: undecodable content: {}", page_number, e);
                continue;
            }
        };

        for operation in &content.operations {
            let strings: Vec<&[u8]> = match operation.operator.as_str() {
                "Tj" | "'" => operation
                    .operands
                    .iter()
                    .filter_map(|o| o.as_str().ok())
                    .collect(),
                "TJ" => operation
                    .operands
                    .iter()
                    .filter_map(|o| o.as_array().ok())
                    .flatten()
                    .filter_map(|o| o.as_str().ok())
                    .collect(),
                _ => continue,
            };

            records.extend(
                strings
                    .into_iter()
                    .filter_map(|s| WatermarkRecord::from_payload(s).ok()),
            );
        }
    }

    Ok(records)
}
