//! PDF Distribution Library
//!
//! Serves PDF handouts to authenticated learners with per-download
//! attribution. This library provides functionality to:
//! - List the documents available in a document directory
//! - Stamp a PDF with an invisible, machine-readable watermark
//! - Recover watermarks from a stamped (possibly leaked) copy
//! - Record every download in an append-only JSON-lines audit log
//! - Serve all of the above over HTTP
//!
//! # Example
//!
//! ```no_run
//! use pdf_distribution::{AuditLog, Distributor, DocumentStore, Requester};
//! use pdf_distribution::pdf::StampOptions;
//!
//! let distributor = Distributor::new(
//!     DocumentStore::new("documents"),
//!     AuditLog::new("logs/pdf-downloads.log"),
//!     StampOptions::default(),
//! );
//!
//! let requester = Requester::new("u123");
//! let stamped = distributor
//!     .distribute("handbook.pdf", &requester, None)
//!     .expect("Failed to distribute");
//! std::fs::write(&stamped.file_name, stamped.bytes).unwrap();
//! ```

pub mod audit;
pub mod config;
pub mod distribute;
pub mod error;
pub mod logging;
pub mod pdf;
pub mod server;
pub mod store;
pub mod watermark;

// Re-export commonly used items
pub use audit::{AuditLog, AuditLogEntry, LogQuery};
pub use distribute::{Distribution, Distributor, Requester};
pub use error::{Error, ErrorKind, Result};
pub use store::{DocumentInfo, DocumentStore};
pub use watermark::WatermarkRecord;
