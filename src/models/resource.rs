// file: src/models/resource.rs
// description: embeddable resource records and the per-run resource set
// reference: internal data structures

use crate::models::image::file_name_of;
use serde::Serialize;
use std::collections::BTreeMap;

/// Why a placeholder was embedded instead of the real file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFallback {
    Missing,
    Oversized,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub key: String,
    /// MD5 hex digest of the embedded bytes.
    pub hash: String,
    pub mime: String,
    #[serde(skip_serializing)]
    pub data_base64: String,
    pub file_name: String,
    pub size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub placeholder: bool,
    pub fallback: Option<ResourceFallback>,
}

/// Resolved records keyed by reference key. Several keys may share a hash.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    records: BTreeMap<String, ResourceRecord>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts for the same key replace earlier ones.
    pub fn insert(&mut self, record: ResourceRecord) {
        self.records.insert(record.key.clone(), record);
    }

    /// Exact key first, then a record whose key has the same file name.
    pub fn lookup(&self, key: &str) -> Option<&ResourceRecord> {
        if let Some(record) = self.records.get(key) {
            return Some(record);
        }

        let wanted = file_name_of(key);
        self.records
            .values()
            .find(|record| file_name_of(&record.key) == wanted || record.file_name == wanted)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    pub fn placeholder_count(&self) -> usize {
        self.records.values().filter(|r| r.placeholder).count()
    }
}

impl FromIterator<ResourceRecord> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = ResourceRecord>>(iter: I) -> Self {
        let mut set = ResourceSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, hash: &str) -> ResourceRecord {
        ResourceRecord {
            key: key.to_string(),
            hash: hash.to_string(),
            mime: "image/png".to_string(),
            data_base64: String::new(),
            file_name: file_name_of(key).to_string(),
            size: 0,
            width: None,
            height: None,
            placeholder: false,
            fallback: None,
        }
    }

    #[test]
    fn test_lookup_exact_then_file_name() {
        let set: ResourceSet = vec![record("assets/cat.png", "aaa"), record("dog.png", "bbb")]
            .into_iter()
            .collect();

        assert_eq!(set.lookup("assets/cat.png").unwrap().hash, "aaa");
        assert_eq!(set.lookup("elsewhere/cat.png").unwrap().hash, "aaa");
        assert_eq!(set.lookup("dog.png").unwrap().hash, "bbb");
        assert!(set.lookup("bird.png").is_none());
    }

    #[test]
    fn test_placeholder_count() {
        let mut stand_in = record("gone.png", "ph");
        stand_in.placeholder = true;
        stand_in.fallback = Some(ResourceFallback::Missing);
        let set: ResourceSet = vec![record("cat.png", "aaa"), stand_in].into_iter().collect();
        assert_eq!(set.placeholder_count(), 1);
        assert_eq!(ResourceSet::new().placeholder_count(), 0);
    }

    #[test]
    fn test_last_insert_wins() {
        let mut set = ResourceSet::new();
        set.insert(record("cat.png", "first"));
        set.insert(record("cat.png", "second"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.lookup("cat.png").unwrap().hash, "second");
    }
}
