//! Append-only download audit log
//!
//! Every successful distribution appends one line of compact JSON to a log
//! file. Lines are never rewritten; the file only grows. Reading tolerates
//! malformed historical lines so one bad entry cannot hide the rest of the
//! trail.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::watermark::WatermarkRecord;

/// Network origin recorded when the caller's address is unavailable
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// One distribution event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    /// Originating network address, or `"unknown"`
    pub ip_address: String,
    /// The embedded record, duplicated for verification against a leaked copy
    pub watermark: WatermarkRecord,
}

impl AuditLogEntry {
    /// Create an entry mirroring the watermark that was embedded
    pub fn new(watermark: WatermarkRecord, ip_address: Option<String>) -> Self {
        let ip_address = ip_address
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());

        Self {
            user_id: watermark.user_id.clone(),
            email: watermark.email.clone(),
            name: watermark.name.clone(),
            file_name: watermark.file_name.clone(),
            timestamp: watermark.timestamp,
            ip_address,
            watermark,
        }
    }
}

/// Line-delimited JSON log file
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    /// Serializes appends within this process
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used when exporting the log as an attachment
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "downloads.log".to_string())
    }

    /// Append one entry as a complete line
    ///
    /// The file and its parent directories are created on demand. The line is
    /// written with a single `write_all` on an append-mode handle. An
    /// unterminated fragment left by an earlier failed write is closed off
    /// first so the new entry starts on its own line.
    pub fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let json = serde_json::to_vec(entry)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let mut line = Vec::with_capacity(json.len() + 2);
        if ends_with_fragment(&mut file)? {
            warn!("Closing unterminated line at end of {}", self.path.display());
            line.push(b'\n');
        }
        line.extend_from_slice(&json);
        line.push(b'\n');

        file.write_all(&line)?;

        debug!("Appended audit entry for {} ({})", entry.file_name, entry.user_id);
        Ok(())
    }

    /// Parse every well-formed entry in append order
    ///
    /// A missing file means nothing has been distributed yet and reads as empty.
    pub fn read_all(&self) -> Result<Vec<AuditLogEntry>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in content.split(|b| *b == b'\n').enumerate() {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<AuditLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping malformed audit log line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }

        Ok(entries)
    }

    /// Raw log content, unmodified
    pub fn export_raw(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(Error::NotFound("No download log file found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether the file is non-empty and its last byte is not a newline
fn ends_with_fragment(file: &mut fs::File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Filter and ordering for reviewing the log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    /// Case-insensitive text matched against file name, user id, email and
    /// network address
    #[serde(default)]
    pub search: Option<String>,
}

impl LogQuery {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();

        [
            Some(entry.file_name.as_str()),
            Some(entry.user_id.as_str()),
            entry.email.as_deref(),
            Some(entry.ip_address.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Keep matching entries, newest first
    pub fn apply(&self, entries: Vec<AuditLogEntry>) -> Vec<AuditLogEntry> {
        let mut selected: Vec<AuditLogEntry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn entry(user: &str, file: &str, minutes: i64) -> AuditLogEntry {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes);
        let record = WatermarkRecord::new(user, file, ts).with_email(Some(format!("{}@school.edu", user)));
        AuditLogEntry::new(record, Some("10.0.0.7".to_string()))
    }

    #[test]
    fn test_entry_duplicates_watermark() {
        let e = entry("u1", "a.pdf", 0);
        assert_eq!(e.user_id, e.watermark.user_id);
        assert_eq!(e.file_name, e.watermark.file_name);
        assert_eq!(e.timestamp, e.watermark.timestamp);
        assert_eq!(e.email, e.watermark.email);
    }

    #[test]
    fn test_missing_origin_is_unknown() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let record = WatermarkRecord::new("u1", "a.pdf", ts);
        assert_eq!(AuditLogEntry::new(record.clone(), None).ip_address, UNKNOWN_ORIGIN);
        assert_eq!(AuditLogEntry::new(record, Some(" ".to_string())).ip_address, UNKNOWN_ORIGIN);
    }

    #[test]
    fn test_append_creates_directories() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("logs").join("nested").join("downloads.log"));

        log.append(&entry("u1", "a.pdf", 0)).unwrap();

        let raw = fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_append_never_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("downloads.log");
        fs::write(&path, "existing line\n").unwrap();

        let log = AuditLog::new(&path);
        log.append(&entry("u1", "a.pdf", 0)).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("existing line\n"));
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_read_all_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("absent.log"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_all_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("downloads.log"));

        log.append(&entry("u1", "a.pdf", 0)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
            file.write_all(b"{\"userId\": broken\n\n").unwrap();
        }
        log.append(&entry("u2", "b.pdf", 1)).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, "u1");
        assert_eq!(entries[1].user_id, "u2");
    }

    #[test]
    fn test_read_all_skips_invalid_utf8_line() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("downloads.log"));

        log.append(&entry("u1", "a.pdf", 0)).unwrap();
        {
            // An append cut off inside a multi-byte character
            let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
            file.write_all(b"{\"userId\":\"Zo\xc3\n").unwrap();
        }
        log.append(&entry("u2", "b.pdf", 1)).unwrap();

        let entries = log.read_all().unwrap();
        let users: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
    }

    #[test]
    fn test_append_after_unterminated_fragment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("downloads.log");
        let log = AuditLog::new(&path);

        log.append(&entry("u1", "a.pdf", 0)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"userId\":\"u-partial\",\"fileN").unwrap();
        }
        log.append(&entry("u2", "b.pdf", 1)).unwrap();
        log.append(&entry("u3", "c.pdf", 2)).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 4);
        assert!(raw.ends_with('\n'));

        let users: Vec<String> = log.read_all().unwrap().into_iter().map(|e| e.user_id).collect();
        assert_eq!(users, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn test_export_raw_is_unmodified() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("downloads.log"));
        log.append(&entry("u1", "a.pdf", 0)).unwrap();

        let raw = log.export_raw().unwrap();
        assert_eq!(raw, fs::read(log.path()).unwrap());
        assert_eq!(log.file_name(), "downloads.log");
    }

    #[test]
    fn test_export_raw_missing_file() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("absent.log"));
        assert!(matches!(log.export_raw(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_concurrent_appends_keep_lines_intact() {
        let dir = TempDir::new().unwrap();
        let log = std::sync::Arc::new(AuditLog::new(dir.path().join("downloads.log")));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&entry(&format!("user-{}", t), "a.pdf", i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let raw = fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 200);
        assert_eq!(log.read_all().unwrap().len(), 200);
    }

    #[test]
    fn test_query_search_and_order() {
        let entries = vec![
            entry("alice", "intro.pdf", 0),
            entry("bob", "unit-2.pdf", 5),
            entry("carol", "Intro-Advanced.pdf", 10),
        ];

        let all = LogQuery::default().apply(entries.clone());
        let users: Vec<&str> = all.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["carol", "bob", "alice"]);

        let query = LogQuery { search: Some("INTRO".to_string()) };
        let found = query.apply(entries.clone());
        let users: Vec<&str> = found.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["carol", "alice"]);

        let by_email = LogQuery { search: Some("bob@school".to_string()) };
        assert_eq!(by_email.apply(entries.clone()).len(), 1);

        let by_ip = LogQuery { search: Some("10.0.0".to_string()) };
        assert_eq!(by_ip.apply(entries).len(), 3);
    }
}
