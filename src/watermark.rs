//! Watermark record embedded into every distributed document

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Attribution payload for one distribution request
///
/// Serialized as compact JSON, the record is written into each page of the
/// stamped document, into its Info dictionary, and into the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkRecord {
    /// Opaque requester identifier
    pub user_id: String,
    /// Requester email (free text)
    #[serde(default)]
    pub email: Option<String>,
    /// Requester display name (free text)
    #[serde(default)]
    pub name: Option<String>,
    /// Distribution timestamp
    pub timestamp: DateTime<Utc>,
    /// Source document file name
    pub file_name: String,
}

impl WatermarkRecord {
    pub fn new(user_id: impl Into<String>, file_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
            timestamp,
            file_name: file_name.into(),
        }
    }

    /// Set the requester email; blank values are dropped
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = non_blank(email);
        self
    }

    /// Set the requester display name; blank values are dropped
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = non_blank(name);
        self
    }

    /// Compact JSON attribution string
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an attribution string produced by [`WatermarkRecord::to_payload`]
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Timestamp as ISO-8601 with millisecond precision
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
