//! PDF watermarking module

pub mod metadata;
pub mod stamp;

// Re-export commonly used items
pub use metadata::{extract_watermarks, read_attribution, DocumentAttribution};
pub use stamp::{stamp_document, StampOptions};

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// Build a small PDF whose pages inherit MediaBox and Resources from the
    /// page tree and start with an unwrapped `cm` transform
    pub(crate) fn sample_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids: Vec<Object> = Vec::new();
        for i in 0..page_count {
            let content = format!(
                "0.75 0 0 -0.75 0 792 cm\nBT\n/F1 18 Tf\n72 72 Td\n(Page {}) Tj\nET\n",
                i + 1
            );
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
