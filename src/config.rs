// file: src/config.rs
// description: application configuration management with toml and json support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub source_directory: PathBuf,
    pub output_directory: PathBuf,
    pub resources_directory: String,
    pub processing_options: ProcessingOptions,
    pub html_options: HtmlOptions,
    pub resource_options: ResourceOptions,
    pub enex_options: EnexOptions,
    pub enml_options: EnmlOptions,
    pub pipeline: PipelineConfig,
}

/// Toggles for the structural extraction passes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub normalize_markdown: bool,
    pub extract_frontmatter: bool,
    pub remove_code_block_markers: bool,
    pub convert_inline_code: bool,
    pub remove_heading_markers: bool,
    pub handle_image_references: bool,
    pub process_links: bool,
    pub handle_special_chars: bool,
    pub preserve_image_markdown: bool,
    pub preserve_link_markdown: bool,
    pub escape_html_chars: bool,
    pub escape_single_quotes: bool,
    pub special_char_replacements: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkdownEngineKind {
    Auto,
    PulldownCmark,
    Basic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HtmlOptions {
    pub markdown_engine: MarkdownEngineKind,
    pub enable_tables: bool,
    pub enable_fenced_code: bool,
    pub create_full_document: bool,
    pub document_title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceOptions {
    /// Largest file, in bytes, that gets embedded.
    pub max_resource_size: u64,
    pub include_unknown_resources: bool,
    pub include_resource_attributes: bool,
    pub fail_on_oversized: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnexOptions {
    pub add_creation_date: bool,
    pub add_update_date: bool,
    pub add_source_url: bool,
    pub default_author: String,
    pub enex_version: String,
    pub application_name: String,
    pub folders_as_notebooks: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnmlOptions {
    pub autolink_urls: bool,
    pub preserve_block_spacing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parallel_workers: usize,
    pub skip_patterns: Vec<String>,
    pub max_file_size_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("."),
            output_directory: PathBuf::from("./output"),
            resources_directory: "_resources".to_string(),
            processing_options: ProcessingOptions::default(),
            html_options: HtmlOptions::default(),
            resource_options: ResourceOptions::default(),
            enex_options: EnexOptions::default(),
            enml_options: EnmlOptions::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            normalize_markdown: true,
            extract_frontmatter: true,
            remove_code_block_markers: true,
            convert_inline_code: true,
            remove_heading_markers: true,
            handle_image_references: true,
            process_links: true,
            handle_special_chars: true,
            preserve_image_markdown: false,
            preserve_link_markdown: false,
            escape_html_chars: true,
            escape_single_quotes: false,
            special_char_replacements: BTreeMap::new(),
        }
    }
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            markdown_engine: MarkdownEngineKind::Auto,
            enable_tables: true,
            enable_fenced_code: true,
            create_full_document: false,
            document_title: "Converted Note".to_string(),
        }
    }
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            max_resource_size: 50 * 1024 * 1024,
            include_unknown_resources: true,
            include_resource_attributes: true,
            fail_on_oversized: false,
        }
    }
}

impl Default for EnexOptions {
    fn default() -> Self {
        Self {
            add_creation_date: true,
            add_update_date: true,
            add_source_url: false,
            default_author: "markdown-to-enex".to_string(),
            enex_version: "1.0".to_string(),
            application_name: "markdown-to-enex".to_string(),
            folders_as_notebooks: false,
        }
    }
}

impl Default for EnmlOptions {
    fn default() -> Self {
        Self {
            autolink_urls: true,
            preserve_block_spacing: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
            skip_patterns: vec![".git/".to_string(), ".obsidian/".to_string()],
            max_file_size_mb: 10,
        }
    }
}

impl Config {
    /// Layers an optional config file (json or toml, by extension) and
    /// `MD2ENEX__*` environment variables over the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MD2ENEX")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.parallel_workers == 0 {
            return Err(PipelineError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.resource_options.max_resource_size == 0 {
            return Err(PipelineError::Config(
                "max_resource_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks the directories a conversion run depends on, creating the
    /// output directory when needed.
    pub fn validate_directories(&self) -> Result<()> {
        if !self.source_directory.is_dir() {
            return Err(PipelineError::Config(format!(
                "Source directory does not exist: {}",
                self.source_directory.display()
            )));
        }

        if !self.output_directory.exists() {
            fs::create_dir_all(&self.output_directory).map_err(|e| {
                PipelineError::Config(format!(
                    "Cannot create output directory {}: {}",
                    self.output_directory.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default_config();
        assert!(config.processing_options.escape_html_chars);
        assert!(!config.processing_options.escape_single_quotes);
        assert_eq!(config.resource_options.max_resource_size, 52_428_800);
        assert_eq!(config.enex_options.default_author, "markdown-to-enex");
        assert_eq!(config.html_options.markdown_engine, MarkdownEngineKind::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json_ignores_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "source_directory": "notes",
                "unknown_group": {"x": 1},
                "processing_options": {"escape_single_quotes": true, "not_an_option": false},
                "html_options": {"markdown_engine": "basic"}
            }"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.source_directory, PathBuf::from("notes"));
        assert!(config.processing_options.escape_single_quotes);
        assert!(config.processing_options.remove_heading_markers);
        assert_eq!(config.html_options.markdown_engine, MarkdownEngineKind::Basic);
    }

    #[test]
    fn test_load_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        fs::write(
            &path,
            "[resource_options]\nmax_resource_size = 1024\ninclude_unknown_resources = false\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.resource_options.max_resource_size, 1024);
        assert!(!config.resource_options.include_unknown_resources);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default_config();
        config.pipeline.parallel_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_source_directory_is_fatal() {
        let mut config = Config::default_config();
        config.source_directory = PathBuf::from("/nonexistent/notes");
        let err = config.validate_directories().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.toml");
        fs::write(&path, "[enex_options]\ndefault_author = \"someone\"\n").unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.enex_options.default_author, "someone");
        assert_eq!(loaded.resource_options.max_resource_size, 52_428_800);
        assert!(loaded.processing_options.escape_html_chars);
    }
}
