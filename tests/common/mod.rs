//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf_distribution::pdf::StampOptions;
use pdf_distribution::{AuditLog, Distributor, DocumentStore};
use tempfile::TempDir;

/// Build a PDF with `page_count` Letter pages, each with its own MediaBox
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..page_count {
        let content = format!("BT\n/F1 24 Tf\n72 700 Td\n(Handout page {}) Tj\nET", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("Failed to serialize sample PDF");
    buffer
}

/// Temporary document store and log location
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    /// Store containing `handbook.pdf` (3 pages) and `unit-2_quiz-notes.pdf` (1 page)
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let workspace = Self { dir };

        fs::create_dir_all(workspace.documents_dir()).unwrap();
        workspace.add_document("handbook.pdf", &sample_pdf(3));
        workspace.add_document("unit-2_quiz-notes.pdf", &sample_pdf(1));
        workspace
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.dir.path().join("documents")
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("logs").join("pdf-downloads.log")
    }

    pub fn add_document(&self, name: &str, bytes: &[u8]) {
        fs::write(self.documents_dir().join(name), bytes).unwrap();
    }

    pub fn document_path(&self, name: &str) -> PathBuf {
        self.documents_dir().join(name)
    }

    pub fn distributor(&self) -> Distributor {
        Distributor::new(
            DocumentStore::new(self.documents_dir()),
            AuditLog::new(self.log_path()),
            StampOptions::default(),
        )
    }

    pub fn log_lines(&self) -> usize {
        read_lines(&self.log_path())
    }
}

fn read_lines(path: &Path) -> usize {
    fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}
