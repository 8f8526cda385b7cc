// file: src/models/note.rs
// description: raw note input and the assembled note handed to the enex writer
// reference: internal data structures

use crate::error::{PipelineError, Result};
use crate::models::resource::ResourceRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A note file as read from disk, before any processing.
#[derive(Debug, Clone)]
pub struct RawNote {
    pub path: PathBuf,
    pub relative_path: String,
    pub text: String,
}

impl RawNote {
    pub fn new(path: impl Into<PathBuf>, relative_path: impl Into<String>, text: String) -> Self {
        Self {
            path: path.into(),
            relative_path: relative_path.into(),
            text,
        }
    }

    /// Reads the whole file; unreadable or non UTF-8 files fail this note only.
    pub fn read(path: &Path, relative_path: &str) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| PipelineError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8(bytes).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.utf8_error().to_string(),
        })?;

        Ok(Self::new(path, relative_path, text))
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.relative_path.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub title: String,
    /// CDATA-wrapped ENML.
    pub content: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub author: String,
    pub tags: Vec<String>,
    pub notebook: Option<String>,
    pub source_url: Option<String>,
    pub guid: Uuid,
    pub resources: Vec<ResourceRecord>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            title: title.into(),
            content: content.into(),
            created: now,
            updated: now,
            author: author.into(),
            tags: Vec::new(),
            notebook: None,
            source_url: None,
            guid: Uuid::new_v4(),
            resources: Vec::new(),
        }
    }

    /// Attaches a resource once per content hash.
    pub fn attach_resource(&mut self, record: ResourceRecord) -> bool {
        if self.resources.iter().any(|r| r.hash == record.hash) {
            return false;
        }
        self.resources.push(record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &str, hash: &str) -> ResourceRecord {
        ResourceRecord {
            key: key.to_string(),
            hash: hash.to_string(),
            mime: "image/png".to_string(),
            data_base64: String::new(),
            file_name: key.to_string(),
            size: 0,
            width: None,
            height: None,
            placeholder: false,
            fallback: None,
        }
    }

    #[test]
    fn test_attach_resource_dedups_by_hash() {
        let mut note = Note::new("t", "", "me");
        assert!(note.attach_resource(record("a.png", "h1")));
        assert!(!note.attach_resource(record("copy-of-a.png", "h1")));
        assert!(note.attach_resource(record("b.png", "h2")));
        assert_eq!(note.resources.len(), 2);
    }

    #[test]
    fn test_read_rejects_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.md");
        fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();

        let err = RawNote::read(&path, "bad.md").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_read_missing_file() {
        let err = RawNote::read(Path::new("/nonexistent/note.md"), "note.md").unwrap_err();
        assert!(matches!(err, PipelineError::FileOperation { .. }));
    }

    #[test]
    fn test_file_stem() {
        let note = RawNote::new("/notes/Daily Log.md", "Daily Log.md", String::new());
        assert_eq!(note.file_stem(), "Daily Log");
    }
}
