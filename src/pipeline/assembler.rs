// file: src/pipeline/assembler.rs
// description: builds the exported note from sanitized content, metadata and resources
// reference: frontmatter first, then file attributes, then defaults

use crate::config::EnexOptions;
use crate::enml::EnmlDocument;
use crate::models::{Note, ResourceSet};
use crate::parser::first_heading;
use crate::pipeline::processor::PreparedNote;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

const SOURCE_URL_KEYS: &[&str] = &["source", "source_url", "url"];

pub struct NoteAssembler {
    options: EnexOptions,
}

impl NoteAssembler {
    pub fn new(options: EnexOptions) -> Self {
        Self { options }
    }

    /// Attaches only the resources this note's content references, one per hash.
    pub fn assemble(
        &self,
        prepared: &PreparedNote,
        document: &EnmlDocument,
        resources: &ResourceSet,
    ) -> Note {
        let mut note = Note::new(
            self.title(prepared),
            document.content.clone(),
            self.author(prepared),
        );

        let (created, updated) = self.dates(prepared);
        note.created = created;
        note.updated = updated;
        note.tags = self.tags(prepared);
        note.notebook = self.notebook(prepared);
        note.source_url = SOURCE_URL_KEYS
            .iter()
            .find_map(|key| prepared.frontmatter.get_text(key))
            .map(str::to_string);

        for key in &document.used_resources {
            match resources.lookup(key) {
                Some(record) => {
                    if !note.attach_resource(record.clone()) {
                        debug!("{} shares its content with an attached resource", key);
                    }
                }
                None => warn!("Used resource {} has no record", key),
            }
        }

        note
    }

    fn title(&self, prepared: &PreparedNote) -> String {
        prepared
            .frontmatter
            .get_text("title")
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .or_else(|| first_heading(&prepared.markdown))
            .unwrap_or_else(|| prepared.raw.file_stem())
    }

    fn author(&self, prepared: &PreparedNote) -> String {
        prepared
            .frontmatter
            .get_text("author")
            .map(str::to_string)
            .unwrap_or_else(|| self.options.default_author.clone())
    }

    fn dates(&self, prepared: &PreparedNote) -> (DateTime<Utc>, DateTime<Utc>) {
        let frontmatter = &prepared.frontmatter;
        let file = prepared.file.as_ref();

        let created = frontmatter
            .get_date("created")
            .or_else(|| frontmatter.get_date("date"))
            .map(|date| date.and_utc())
            .or_else(|| file.and_then(|f| f.created))
            .or_else(|| file.and_then(|f| f.modified))
            .unwrap_or_else(Utc::now);

        let updated = frontmatter
            .get_date("updated")
            .map(|date| date.and_utc())
            .or_else(|| file.and_then(|f| f.modified))
            .unwrap_or(created);

        (created, updated)
    }

    fn tags(&self, prepared: &PreparedNote) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for key in ["tags", "keywords"] {
            for tag in prepared.frontmatter.get_list(key).unwrap_or_default() {
                let tag = tag.trim_start_matches('#');
                if !tag.is_empty() && !tags.iter().any(|existing| existing.as_str() == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }

    /// An explicit `notebook` key wins; otherwise the folder path names the
    /// notebook when folders map to notebooks.
    fn notebook(&self, prepared: &PreparedNote) -> Option<String> {
        if let Some(notebook) = prepared.frontmatter.get_text("notebook") {
            return Some(notebook.to_string());
        }
        if !self.options.folders_as_notebooks {
            return None;
        }

        let folder = match &prepared.file {
            Some(file) => file.folder_path.clone(),
            None => prepared
                .raw
                .relative_path
                .rsplit_once('/')
                .map(|(folder, _)| folder.to_string())
                .unwrap_or_default(),
        };

        if folder.is_empty() {
            None
        } else {
            Some(folder.replace('/', "_"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{RawNote, ResourceRecord};
    use crate::pipeline::processor::NoteProcessor;
    use crate::source::ScannedFile;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn prepare(text: &str, relative_path: &str, file: Option<ScannedFile>) -> PreparedNote {
        let processor = NoteProcessor::new(&Config::default());
        let raw = RawNote::new(format!("/notes/{}", relative_path), relative_path, text.to_string());
        processor.prepare(raw, file)
    }

    fn document(used: &[&str]) -> EnmlDocument {
        EnmlDocument {
            content: "<![CDATA[x]]>".to_string(),
            used_resources: used.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            missing_images: Vec::new(),
        }
    }

    fn record(key: &str, hash: &str) -> ResourceRecord {
        ResourceRecord {
            key: key.to_string(),
            hash: hash.to_string(),
            mime: "image/png".to_string(),
            data_base64: String::new(),
            file_name: key.to_string(),
            size: 1,
            width: None,
            height: None,
            placeholder: false,
            fallback: None,
        }
    }

    #[test]
    fn test_frontmatter_metadata_wins() {
        let text = "---\ntitle: From Meta\nauthor: Ada\ncreated: 2023-01-02\nupdated: 2023-02-03 10:00:00\ntags: [a, \"#b\", a]\nkeywords: c\nsource: https://example.com\n---\n# Heading\n";
        let prepared = prepare(text, "n.md", None);
        let note = NoteAssembler::new(EnexOptions::default()).assemble(&prepared, &document(&[]), &ResourceSet::new());

        assert_eq!(note.title, "From Meta");
        assert_eq!(note.author, "Ada");
        assert_eq!(note.created, Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(note.updated, Utc.with_ymd_and_hms(2023, 2, 3, 10, 0, 0).unwrap());
        assert_eq!(note.tags, vec!["a", "b", "c"]);
        assert_eq!(note.source_url.as_deref(), Some("https://example.com"));
        assert_eq!(note.content, "<![CDATA[x]]>");
    }

    #[test]
    fn test_fallbacks_to_heading_file_and_defaults() {
        let modified = Utc.with_ymd_and_hms(2022, 5, 6, 7, 8, 9).unwrap();
        let file = ScannedFile {
            path: "/notes/work/plan.md".into(),
            relative_path: "work/plan.md".to_string(),
            folder_path: "work".to_string(),
            size: 10,
            created: None,
            modified: Some(modified),
        };

        let prepared = prepare("intro\n\n## The Plan\n", "work/plan.md", Some(file));
        let note = NoteAssembler::new(EnexOptions::default()).assemble(&prepared, &document(&[]), &ResourceSet::new());
        assert_eq!(note.title, "The Plan");
        assert_eq!(note.author, "markdown-to-enex");
        assert_eq!(note.created, modified);
        assert_eq!(note.updated, modified);
        assert!(note.notebook.is_none());

        let untitled = prepare("no heading", "work/plan.md", None);
        let note = NoteAssembler::new(EnexOptions::default()).assemble(&untitled, &document(&[]), &ResourceSet::new());
        assert_eq!(note.title, "plan");
    }

    #[test]
    fn test_folders_as_notebooks() {
        let options = EnexOptions {
            folders_as_notebooks: true,
            ..EnexOptions::default()
        };
        let assembler = NoteAssembler::new(options);

        let nested = prepare("x", "work/projects/plan.md", None);
        let note = assembler.assemble(&nested, &document(&[]), &ResourceSet::new());
        assert_eq!(note.notebook.as_deref(), Some("work_projects"));

        let root = prepare("x", "plan.md", None);
        assert!(assembler.assemble(&root, &document(&[]), &ResourceSet::new()).notebook.is_none());
    }

    #[test]
    fn test_resources_deduplicated_by_hash() {
        let resources: ResourceSet = vec![
            record("a.png", "same"),
            record("copy/a-copy.png", "same"),
            record("b.png", "other"),
            record("unused.png", "unused"),
        ]
        .into_iter()
        .collect();
        let prepared = prepare("x", "n.md", None);

        let note = NoteAssembler::new(EnexOptions::default()).assemble(
            &prepared,
            &document(&["a.png", "b.png", "copy/a-copy.png"]),
            &resources,
        );

        let hashes: Vec<&str> = note.resources.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, vec!["same", "other"]);
    }
}
