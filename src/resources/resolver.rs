// file: src/resources/resolver.rs
// description: locates referenced files and turns them into embeddable records
// reference: content addressed attachments keyed by md5

use crate::config::{Config, ResourceOptions};
use crate::error::{PipelineError, Result};
use crate::models::image::file_name_of;
use crate::models::{ResourceFallback, ResourceRecord, ResourceSet};
use crate::resources::dimensions::image_dimensions;
use crate::resources::mime::mime_for_path;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// 1x1 transparent PNG embedded for missing and oversized resources.
pub const PLACEHOLDER_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

lazy_static! {
    static ref PLACEHOLDER_BYTES: Vec<u8> = BASE64.decode(PLACEHOLDER_PNG_BASE64).unwrap_or_default();
    static ref PLACEHOLDER_HASH: String = format!("{:x}", md5::compute(PLACEHOLDER_BYTES.as_slice()));
}

pub fn placeholder_hash() -> &'static str {
    PLACEHOLDER_HASH.as_str()
}

pub fn placeholder_record(key: &str, fallback: ResourceFallback) -> ResourceRecord {
    ResourceRecord {
        key: key.to_string(),
        hash: PLACEHOLDER_HASH.clone(),
        mime: "image/png".to_string(),
        data_base64: PLACEHOLDER_PNG_BASE64.to_string(),
        file_name: file_name_of(key).to_string(),
        size: PLACEHOLDER_BYTES.len() as u64,
        width: Some(1),
        height: Some(1),
        placeholder: true,
        fallback: Some(fallback),
    }
}

pub struct ResourceResolver {
    source_dir: PathBuf,
    resources_dir: String,
    options: ResourceOptions,
}

impl ResourceResolver {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        resources_dir: impl Into<String>,
        options: ResourceOptions,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            resources_dir: resources_dir.into(),
            options,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.source_directory.clone(),
            config.resources_directory.clone(),
            config.resource_options.clone(),
        )
    }

    /// Paths tried for a key, in order, without duplicates.
    pub fn candidates(&self, key: &str) -> Vec<PathBuf> {
        let file_name = file_name_of(key);
        let mut candidates = vec![self.source_dir.join(key), PathBuf::from(key)];

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(key));
        }
        candidates.push(self.source_dir.join(file_name));
        if !self.resources_dir.is_empty() {
            candidates.push(self.source_dir.join(&self.resources_dir).join(file_name));
        }

        let mut unique: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }

    pub fn locate(&self, key: &str) -> Option<PathBuf> {
        self.candidates(key).into_iter().find(|path| path.is_file())
    }

    /// `Ok(None)` means the key was dropped by policy. Read failures of a
    /// located file are errors for this key only; `ResourceTooLarge` is fatal.
    pub fn resolve(&self, key: &str) -> Result<Option<ResourceRecord>> {
        let Some(path) = self.locate(key) else {
            warn!("Resource not found: {}", key);
            return Ok(self.fallback(key, ResourceFallback::Missing));
        };

        let size = fs::metadata(&path)
            .map_err(|e| PipelineError::Resource {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .len();

        if size > self.options.max_resource_size {
            if self.options.fail_on_oversized {
                return Err(PipelineError::ResourceTooLarge {
                    key: key.to_string(),
                    size,
                    limit: self.options.max_resource_size,
                });
            }
            warn!(
                "Resource {} is {} bytes, above the {} byte limit",
                key, size, self.options.max_resource_size
            );
            return Ok(self.fallback(key, ResourceFallback::Oversized));
        }

        let data = fs::read(&path).map_err(|e| PipelineError::Resource {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(self.build_record(key, &path, &data)))
    }

    /// Resolves every key, logging and skipping per-key failures.
    pub fn resolve_all<'a, I>(&self, keys: I) -> Result<ResourceSet>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut set = ResourceSet::new();
        for key in keys {
            match self.resolve(key) {
                Ok(Some(record)) => set.insert(record),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("{}", e),
            }
        }
        Ok(set)
    }

    fn fallback(&self, key: &str, reason: ResourceFallback) -> Option<ResourceRecord> {
        if self.options.include_unknown_resources {
            Some(placeholder_record(key, reason))
        } else {
            None
        }
    }

    fn build_record(&self, key: &str, path: &Path, data: &[u8]) -> ResourceRecord {
        let mime = mime_for_path(path);

        let (width, height) = if mime.starts_with("image/") {
            match image_dimensions(data) {
                Some((width, height)) => (Some(width), Some(height)),
                None => {
                    warn!("Could not read image dimensions: {}", path.display());
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name_of(key).to_string());

        debug!("Resolved {} -> {} ({} bytes)", key, path.display(), data.len());

        ResourceRecord {
            key: key.to_string(),
            hash: format!("{:x}", md5::compute(data)),
            mime,
            data_base64: BASE64.encode(data),
            file_name,
            size: data.len() as u64,
            width,
            height,
            placeholder: false,
            fallback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    fn resolver(dir: &TempDir, options: ResourceOptions) -> ResourceResolver {
        ResourceResolver::new(dir.path(), "_resources", options)
    }

    #[test]
    fn test_resolve_existing_image() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("img")).unwrap();
        let bytes = png(64, 32);
        fs::write(dir.path().join("img/photo.png"), &bytes).unwrap();

        let record = resolver(&dir, ResourceOptions::default())
            .resolve("img/photo.png")
            .unwrap()
            .unwrap();

        assert_eq!(record.hash, format!("{:x}", md5::compute(&bytes)));
        assert_eq!(record.mime, "image/png");
        assert_eq!(record.file_name, "photo.png");
        assert_eq!((record.width, record.height), (Some(64), Some(32)));
        assert_eq!(BASE64.decode(&record.data_base64).unwrap(), bytes);
        assert!(!record.placeholder);
    }

    #[test]
    fn test_hash_depends_on_bytes_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bin"), b"same bytes").unwrap();
        fs::write(dir.path().join("b.dat"), b"same bytes").unwrap();
        let resolver = resolver(&dir, ResourceOptions::default());

        let first = resolver.resolve("a.bin").unwrap().unwrap();
        let again = resolver.resolve("a.bin").unwrap().unwrap();
        let other = resolver.resolve("b.dat").unwrap().unwrap();
        assert_eq!(first.hash, again.hash);
        assert_eq!(first.hash, other.hash);
    }

    #[test]
    fn test_missing_resource_policy() {
        let dir = TempDir::new().unwrap();

        let record = resolver(&dir, ResourceOptions::default())
            .resolve("nowhere.png")
            .unwrap()
            .unwrap();
        assert!(record.placeholder);
        assert_eq!(record.fallback, Some(ResourceFallback::Missing));
        assert_eq!(
            record.hash,
            format!("{:x}", md5::compute(BASE64.decode(PLACEHOLDER_PNG_BASE64).unwrap()))
        );

        let strict = ResourceOptions {
            include_unknown_resources: false,
            ..ResourceOptions::default()
        };
        assert!(resolver(&dir, strict).resolve("nowhere.png").unwrap().is_none());
    }

    #[test]
    fn test_oversized_resource() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.bin"), vec![0u8; 64]).unwrap();

        let small = ResourceOptions {
            max_resource_size: 16,
            ..ResourceOptions::default()
        };
        let record = resolver(&dir, small.clone()).resolve("big.bin").unwrap().unwrap();
        assert_eq!(record.fallback, Some(ResourceFallback::Oversized));

        let failing = ResourceOptions {
            fail_on_oversized: true,
            ..small
        };
        let err = resolver(&dir, failing).resolve("big.bin").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_candidate_fallbacks() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("_resources")).unwrap();
        fs::write(dir.path().join("_resources/scan.pdf"), b"%PDF-1.7").unwrap();
        fs::write(dir.path().join("flat.txt"), b"text").unwrap();
        let resolver = resolver(&dir, ResourceOptions::default());

        let pdf = resolver.resolve("attachments/scan.pdf").unwrap().unwrap();
        assert_eq!(pdf.mime, "application/pdf");
        assert!(!pdf.placeholder);

        let text = resolver.resolve("deep/folder/flat.txt").unwrap().unwrap();
        assert_eq!(text.key, "deep/folder/flat.txt");
        assert_eq!(text.width, None);
    }

    #[test]
    fn test_resolve_all_skips_dropped_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), png(1, 1)).unwrap();
        let strict = ResourceOptions {
            include_unknown_resources: false,
            ..ResourceOptions::default()
        };

        let keys = vec!["a.png".to_string(), "gone.png".to_string()];
        let set = resolver(&dir, strict).resolve_all(&keys).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.lookup("a.png").is_some());
        assert!(set.lookup("gone.png").is_none());
    }
}
