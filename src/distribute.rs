//! Watermarked document distribution
//!
//! Validates a request, loads the source document, stamps an in-memory copy
//! with the requester's attribution and records the event in the audit log.
//! The audit append is the last step, so a failed request leaves both the
//! store and the log untouched.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::audit::{AuditLog, AuditLogEntry};
use crate::error::{Error, Result};
use crate::pdf::{stamp_document, StampOptions};
use crate::store::{sanitize_file_name, DocumentStore};
use crate::watermark::WatermarkRecord;

/// Requester identity for one download
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    /// Opaque user identifier (required)
    #[serde(default)]
    pub user_id: String,
    /// Optional email used for attribution
    #[serde(default)]
    pub user_email: Option<String>,
    /// Optional display name used for attribution
    #[serde(default)]
    pub user_name: Option<String>,
}

impl Requester {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// A stamped document ready to hand to the caller
#[derive(Debug, Clone)]
pub struct Distribution {
    /// Sanitized file name
    pub file_name: String,
    /// Stamped document bytes
    pub bytes: Vec<u8>,
    /// The record that was embedded and logged
    pub watermark: WatermarkRecord,
}

/// Orchestrates store, stamper and audit log
#[derive(Debug)]
pub struct Distributor {
    store: DocumentStore,
    audit: AuditLog,
    options: StampOptions,
}

impl Distributor {
    pub fn new(store: DocumentStore, audit: AuditLog, options: StampOptions) -> Self {
        Self { store, audit, options }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Distribute a document stamped with the current time
    pub fn distribute(&self, document: &str, requester: &Requester, origin: Option<String>) -> Result<Distribution> {
        self.distribute_at(document, requester, origin, Utc::now())
    }

    /// Distribute a document stamped with `timestamp`
    pub fn distribute_at(
        &self,
        document: &str,
        requester: &Requester,
        origin: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Distribution> {
        let user_id = requester.user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidRequest("User ID is required".to_string()));
        }

        let file_name = sanitize_file_name(document)?;
        let source = self.store.read(&file_name)?;

        let watermark = WatermarkRecord::new(user_id, file_name.as_str(), timestamp)
            .with_email(requester.user_email.clone())
            .with_name(requester.user_name.clone());

        let bytes = stamp_document(&source, &watermark, &self.options)?;

        let entry = AuditLogEntry::new(watermark.clone(), origin);
        self.audit.append(&entry)?;

        info!(
            file = %file_name,
            user = %entry.user_id,
            origin = %entry.ip_address,
            size = bytes.len(),
            "Distributed watermarked document"
        );

        Ok(Distribution {
            file_name,
            bytes,
            watermark,
        })
    }
}
