//! Invisible attribution stamping using lopdf
//!
//! The watermark payload is written as text on every page in three places
//! (bottom-right, top-left, centered) at 1pt with near-zero opacity, and again
//! in the document Info dictionary. Either channel alone is enough to recover
//! the requester from a leaked copy.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::error::{Error, Result};
use crate::watermark::WatermarkRecord;

/// Resource name of the watermark font on each page
const FONT_RESOURCE: &str = "WmF1";
/// Resource name of the transparency graphics state on each page
const GSTATE_RESOURCE: &str = "WmGS";
/// Distance from the page edge in points
const EDGE_MARGIN: f32 = 10.0;

/// Options for stamping a document
#[derive(Debug, Clone)]
pub struct StampOptions {
    /// Written as the document Producer and Creator
    pub platform_name: String,
    /// Font size of the in-page text in points
    pub font_size: f32,
    /// Fill and stroke alpha of the in-page text
    pub opacity: f32,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            platform_name: "Quiz Platform".to_string(),
            font_size: 1.0,
            opacity: 0.01,
        }
    }
}

/// Page rectangle in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
struct MediaBox {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl MediaBox {
    /// US Letter (612pt × 792pt)
    fn letter() -> Self {
        Self { llx: 0.0, lly: 0.0, urx: 612.0, ury: 792.0 }
    }

    fn width(&self) -> f32 {
        self.urx - self.llx
    }

    fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

/// Embed a watermark record into a PDF held in memory
///
/// The source bytes are not modified; a new serialized document is returned.
/// Output is deterministic for identical inputs.
///
/// # Example
///
/// ```no_run
/// use pdf_distribution::pdf::{stamp_document, StampOptions};
/// use pdf_distribution::WatermarkRecord;
///
/// let source = std::fs::read("handbook.pdf").unwrap();
/// let record = WatermarkRecord::new("u123", "handbook.pdf", chrono::Utc::now());
/// let stamped = stamp_document(&source, &record, &StampOptions::default()).unwrap();
/// std::fs::write("handbook-u123.pdf", stamped).unwrap();
/// ```
pub fn stamp_document(source: &[u8], record: &WatermarkRecord, options: &StampOptions) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(source)
        .map_err(|e| Error::InvalidDocument(format!("Unable to parse PDF: {}", e)))?;

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(Error::InvalidDocument("PDF has no pages".to_string()));
    }

    let payload = record.to_payload()?;

    let font_id = use_helvetica_font(&mut doc);
    let gstate_id = add_transparency_state(&mut doc, options.opacity);

    for page_id in &page_ids {
        let media_box = page_media_box(&doc, *page_id);

        add_watermark_resources(&mut doc, *page_id, font_id, gstate_id)?;

        // Isolate the original content so its transformations end before ours begin
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let content = generate_watermark_content(&payload, &media_box, options);
        let close_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        wrap_page_contents(&mut doc, *page_id, open_id, close_id)?;
    }

    set_document_info(&mut doc, record, &payload, options)?;

    doc.compress();

    let mut output = Vec::new();
    doc.save_to(&mut output)?;

    debug!(
        "Stamped {} pages of {} for {}",
        page_ids.len(),
        record.file_name,
        record.user_id
    );

    Ok(output)
}

/// Use Helvetica (standard PDF font, nothing to embed)
fn use_helvetica_font(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    doc.add_object(Object::Dictionary(font))
}

/// Graphics state with fill and stroke alpha set to `opacity`
fn add_transparency_state(doc: &mut Document, opacity: f32) -> ObjectId {
    let mut gstate = Dictionary::new();
    gstate.set("Type", Object::Name(b"ExtGState".to_vec()));
    gstate.set("ca", Object::Real(opacity));
    gstate.set("CA", Object::Real(opacity));

    doc.add_object(Object::Dictionary(gstate))
}

/// Follow a reference to its target, or return the object itself
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(node_id) = current {
        let node = doc.get_dictionary(node_id).ok()?;

        if let Ok(value) = node.get(key) {
            return resolve(doc, value).cloned();
        }

        current = node.get(b"Parent").and_then(Object::as_reference).ok();

        // Guard against cyclic Parent chains
        depth += 1;
        if depth > 64 {
            break;
        }
    }

    None
}

fn page_media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    let Some(Object::Array(values)) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return MediaBox::letter();
    };

    let nums: Vec<f32> = values
        .iter()
        .filter_map(|v| resolve(doc, v))
        .filter_map(|v| v.as_float().ok())
        .collect();

    if nums.len() != 4 {
        return MediaBox::letter();
    }

    let media_box = MediaBox {
        llx: nums[0].min(nums[2]),
        lly: nums[1].min(nums[3]),
        urx: nums[0].max(nums[2]),
        ury: nums[1].max(nums[3]),
    };

    if media_box.width() <= 0.0 || media_box.height() <= 0.0 {
        MediaBox::letter()
    } else {
        media_box
    }
}

/// Copy of a resource subdictionary (Font, ExtGState, ...), dereferenced
fn resource_subdictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    match resources.get(key).ok().and_then(|obj| resolve(doc, obj)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Add the watermark font and graphics state to the page's Resources
///
/// The page gets its own direct Resources dictionary so shared or inherited
/// resources of other pages are left untouched.
fn add_watermark_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    gstate_id: ObjectId,
) -> Result<()> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };

    let mut fonts = resource_subdictionary(doc, &resources, b"Font");
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let mut gstates = resource_subdictionary(doc, &resources, b"ExtGState");
    gstates.set(GSTATE_RESOURCE, Object::Reference(gstate_id));
    resources.set("ExtGState", Object::Dictionary(gstates));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// Content stream references of a page, resolving an indirect Contents array
fn page_content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_dictionary(page_id)?;

    let refs = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => vec![],
    };

    Ok(refs)
}

/// Set the page Contents to `[open, original..., close]`
fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    open_id: ObjectId,
    close_id: ObjectId,
) -> Result<()> {
    let existing = page_content_refs(doc, page_id)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Generate the content stream that closes the original content and draws
/// the payload three times
fn generate_watermark_content(payload: &str, media_box: &MediaBox, options: &StampOptions) -> String {
    let payload = ascii_json(payload);
    let text_width = estimate_text_width(&payload, options.font_size);
    let escaped = escape_pdf_string(&payload);

    let bottom_right = (
        (media_box.urx - EDGE_MARGIN - text_width).max(media_box.llx),
        media_box.lly + EDGE_MARGIN,
    );
    let top_left = (
        media_box.llx + EDGE_MARGIN,
        media_box.ury - EDGE_MARGIN - options.font_size,
    );
    let center = (
        (media_box.llx + (media_box.width() - text_width) / 2.0).max(media_box.llx),
        media_box.lly + media_box.height() / 2.0,
    );

    // Leading newline keeps the Q apart from the previous stream's last token
    let mut content = String::from("\nQ\n");
    content.push_str("q\n");
    content.push_str(&format!("/{} gs\n", GSTATE_RESOURCE));
    content.push_str("0.5 g\n");

    for (x, y) in [bottom_right, top_left, center] {
        content.push_str("BT\n");
        content.push_str(&format!("/{} {} Tf\n", FONT_RESOURCE, options.font_size));
        content.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", x, y));
        content.push_str(&format!("({}) Tj\n", escaped));
        content.push_str("ET\n");
    }

    content.push_str("Q\n");
    content
}

/// Rewrite non-ASCII characters of a JSON document as `\uXXXX` escapes
///
/// The in-page font uses WinAnsiEncoding, so raw UTF-8 would extract as
/// mojibake. Non-ASCII can only occur inside JSON strings, where the escape
/// decodes back to the same character.
fn ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Escape special characters in PDF strings
fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

/// Estimate text width for Helvetica
fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    // Average Helvetica glyph is roughly 0.55 em
    text.chars().count() as f32 * font_size * 0.55
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Write attribution into the document Info dictionary
fn set_document_info(
    doc: &mut Document,
    record: &WatermarkRecord,
    payload: &str,
    options: &StampOptions,
) -> Result<()> {
    let existing_id = doc.trailer.get(b"Info").and_then(Object::as_reference).ok();

    let mut info = match doc.trailer.get(b"Info").ok().and_then(|obj| resolve(doc, obj)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    info.set("Title", text_string(&record.file_name));
    info.set("Subject", text_string(payload));
    info.set(
        "Keywords",
        text_string(&format!("{}, {}", record.user_id, record.timestamp_iso())),
    );
    info.set("Producer", text_string(&options.platform_name));
    info.set("Creator", text_string(&options.platform_name));

    match existing_id {
        Some(info_id) => {
            doc.objects.insert(info_id, Object::Dictionary(info));
        }
        None => {
            let info_id = doc.add_object(Object::Dictionary(info));
            doc.trailer.set("Info", Object::Reference(info_id));
        }
    }

    Ok(())
}
