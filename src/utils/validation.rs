// file: src/utils/validation.rs
// description: path and content validation helpers shared by the pipeline stages
// reference: input validation patterns

use crate::error::{PipelineError, Result};
use std::path::Path;

const REMOTE_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "data:", "mailto:"];

pub struct Validator;

impl Validator {
    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(PipelineError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_markdown_extension(path: &Path) -> Result<()> {
        if Self::is_markdown_file(path) {
            Ok(())
        } else {
            Err(PipelineError::Validation(format!(
                "File is not a markdown file: {}",
                path.display()
            )))
        }
    }

    pub fn is_markdown_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
            .unwrap_or(false)
    }

    pub fn validate_content_not_empty(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PipelineError::Validation("Content is empty".to_string()));
        }
        Ok(())
    }

    pub fn is_remote_url(reference: &str) -> bool {
        let lower = reference.trim().to_ascii_lowercase();
        REMOTE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) || lower.starts_with("//")
    }

    /// Backslashes become forward slashes and doubled separators collapse.
    pub fn sanitize_file_path(path: &str) -> String {
        let mut cleaned = path.trim().replace('\\', "/");
        while cleaned.contains("//") {
            cleaned = cleaned.replace("//", "/");
        }
        cleaned
    }

    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            let truncated: String = text.chars().take(max_chars).collect();
            format!("{}...", truncated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_directory() {
        let temp = TempDir::new().unwrap();
        assert!(Validator::validate_directory(temp.path()).is_ok());
        assert!(Validator::validate_directory(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_markdown_extension() {
        assert!(Validator::validate_markdown_extension(Path::new("test.md")).is_ok());
        assert!(Validator::validate_markdown_extension(Path::new("test.markdown")).is_ok());
        assert!(Validator::validate_markdown_extension(Path::new("TEST.MD")).is_ok());
        assert!(Validator::validate_markdown_extension(Path::new("test.txt")).is_err());
    }

    #[test]
    fn test_validate_content_not_empty() {
        assert!(Validator::validate_content_not_empty("content").is_ok());
        assert!(Validator::validate_content_not_empty("").is_err());
        assert!(Validator::validate_content_not_empty("   ").is_err());
    }

    #[test]
    fn test_remote_urls() {
        assert!(Validator::is_remote_url("https://example.com/a.png"));
        assert!(Validator::is_remote_url("HTTP://example.com"));
        assert!(!Validator::is_remote_url("images/a.png"));
    }

    #[test]
    fn test_sanitize_file_path() {
        assert_eq!(
            Validator::sanitize_file_path("path\\to\\file"),
            "path/to/file"
        );
        assert_eq!(
            Validator::sanitize_file_path("path///to//file"),
            "path/to/file"
        );
        assert_eq!(
            Validator::sanitize_file_path("  path/to/file  "),
            "path/to/file"
        );
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(
            Validator::truncate_text("this is a very long text", 10),
            "this is a ..."
        );
        assert_eq!(Validator::truncate_text("ééééé", 2), "éé...");
    }
}
