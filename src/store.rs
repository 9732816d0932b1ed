//! Read-only directory of distributable PDF documents

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glob::{glob_with, MatchOptions, Pattern};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Extension every distributable document must carry
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// One row of the document listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub display_name: String,
}

/// Directory holding the source documents
///
/// The store never writes to its directory. Documents are uploaded out of band.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every PDF in the store, sorted by file name
    ///
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<DocumentInfo>> {
        let root = self.root.to_str().ok_or_else(|| {
            Error::General(format!("Document directory is not valid UTF-8: {}", self.root.display()))
        })?;
        let pattern = format!("{}/*{}", Pattern::escape(root), DOCUMENT_EXTENSION);

        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };

        let entries = glob_with(&pattern, options)
            .map_err(|e| Error::General(format!("Invalid document pattern {}: {}", pattern, e)))?;

        let mut documents = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable store entry: {}", e);
                    continue;
                }
            };

            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping unreadable document {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Skipping document without modification time {}: {}", path.display(), e);
                    continue;
                }
            };

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!("Skipping non UTF-8 file name: {}", path.display());
                continue;
            };

            documents.push(DocumentInfo {
                file_name: file_name.to_string(),
                size: metadata.len(),
                last_modified: DateTime::<Utc>::from(modified),
                display_name: display_name(file_name),
            });
        }

        documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        debug!("Listed {} documents in {}", documents.len(), self.root.display());

        Ok(documents)
    }

    /// Read a document by its sanitized file name
    pub fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(file_name);

        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(fs::read(&path)?),
            Ok(_) => Err(Error::NotFound(format!("Document not found: {}", file_name))),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(Error::NotFound(format!("Document not found: {}", file_name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Reduce a requested document name to a safe base name
///
/// Rejects empty names, NUL bytes and any `..` component, then keeps only the
/// last path component. The result must end in `.pdf` (ASCII case-insensitive).
pub fn sanitize_file_name(requested: &str) -> Result<String> {
    let requested = requested.trim();

    if requested.is_empty() {
        return Err(Error::InvalidRequest("Document name is required".to_string()));
    }

    if requested.contains('\0') {
        return Err(Error::InvalidRequest("Document name contains a NUL byte".to_string()));
    }

    let components: Vec<&str> = requested.split(['/', '\\']).collect();
    if components.iter().any(|c| c.trim() == "..") {
        return Err(Error::InvalidRequest(format!("Invalid document name: {}", requested)));
    }

    let base = components.last().map(|c| c.trim()).unwrap_or_default();
    if !has_document_extension(base) || base.len() == DOCUMENT_EXTENSION.len() {
        return Err(Error::InvalidRequest(format!(
            "Only {} documents can be downloaded: {}",
            DOCUMENT_EXTENSION, requested
        )));
    }

    Ok(base.to_string())
}

fn has_document_extension(name: &str) -> bool {
    name.len() >= DOCUMENT_EXTENSION.len()
        && name.is_char_boundary(name.len() - DOCUMENT_EXTENSION.len())
        && name[name.len() - DOCUMENT_EXTENSION.len()..].eq_ignore_ascii_case(DOCUMENT_EXTENSION)
}

/// Human-readable title derived from a file name
///
/// `"unit-3_study_guide.pdf"` becomes `"unit 3 study guide"`.
pub fn display_name(file_name: &str) -> String {
    let stem = if has_document_extension(file_name) {
        &file_name[..file_name.len() - DOCUMENT_EXTENSION.len()]
    } else {
        file_name
    };

    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
