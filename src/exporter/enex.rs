// file: src/exporter/enex.rs
// description: serializes assembled notes into an evernote export document
// reference: http://xml.evernote.com/pub/evernote-export3.dtd

use crate::config::{Config, EnexOptions};
use crate::error::{PipelineError, Result};
use crate::models::{Note, ResourceRecord};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const ENEX_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const ENEX_DOCTYPE: &str = r#"en-export SYSTEM "http://xml.evernote.com/pub/evernote-export3.dtd""#;

pub struct EnexWriter {
    options: EnexOptions,
    include_resource_attributes: bool,
}

impl EnexWriter {
    pub fn new(options: EnexOptions, include_resource_attributes: bool) -> Self {
        Self {
            options,
            include_resource_attributes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.enex_options.clone(),
            config.resource_options.include_resource_attributes,
        )
    }

    pub fn to_xml(&self, notes: &[Note]) -> Result<String> {
        self.to_xml_at(notes, Utc::now())
    }

    pub fn to_xml_at(&self, notes: &[Note], export_date: DateTime<Utc>) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::DocType(BytesText::from_escaped(ENEX_DOCTYPE)))
            .map_err(xml_error)?;

        let export_date = format_date(&export_date);
        let mut root = BytesStart::new("en-export");
        root.push_attribute(("export-date", export_date.as_str()));
        root.push_attribute(("application", self.options.application_name.as_str()));
        root.push_attribute(("version", self.options.enex_version.as_str()));
        writer.write_event(Event::Start(root)).map_err(xml_error)?;

        for note in notes {
            self.write_note(&mut writer, note)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("en-export")))
            .map_err(xml_error)?;

        String::from_utf8(writer.into_inner()).map_err(|e| PipelineError::Xml(e.to_string()))
    }

    pub fn write_file(&self, notes: &[Note], path: &Path) -> Result<()> {
        let xml = self.to_xml(notes)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| PipelineError::FileOperation {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, xml).map_err(|source| PipelineError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Wrote {} notes to {}", notes.len(), path.display());
        Ok(())
    }

    /// `notebook` is not part of the evernote-export3 DTD. It is written last in
    /// `note-attributes` for importers that read it; Evernote skips it.
    fn write_note<W: Write>(&self, writer: &mut Writer<W>, note: &Note) -> Result<()> {
        writer
            .write_event(Event::Start(BytesStart::new("note")))
            .map_err(xml_error)?;

        text_element(writer, "title", &note.title)?;

        if note.content.starts_with("<![CDATA[") {
            writer
                .create_element("content")
                .write_text_content(BytesText::from_escaped(note.content.as_str()))
                .map_err(xml_error)?;
        } else {
            writer
                .create_element("content")
                .write_cdata_content(BytesCData::new(note.content.as_str()))
                .map_err(xml_error)?;
        }

        if self.options.add_creation_date {
            text_element(writer, "created", &format_date(&note.created))?;
        }
        if self.options.add_update_date {
            text_element(writer, "updated", &format_date(&note.updated))?;
        }
        for tag in &note.tags {
            text_element(writer, "tag", tag)?;
        }

        writer
            .write_event(Event::Start(BytesStart::new("note-attributes")))
            .map_err(xml_error)?;
        text_element(writer, "author", &note.author)?;
        if self.options.add_source_url
            && let Some(url) = &note.source_url
        {
            text_element(writer, "source-url", url)?;
        }
        text_element(writer, "source-application", &self.options.application_name)?;
        if let Some(notebook) = &note.notebook {
            text_element(writer, "notebook", notebook)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("note-attributes")))
            .map_err(xml_error)?;

        for resource in &note.resources {
            self.write_resource(writer, resource)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("note")))
            .map_err(xml_error)?;
        Ok(())
    }

    fn write_resource<W: Write>(&self, writer: &mut Writer<W>, resource: &ResourceRecord) -> Result<()> {
        writer
            .write_event(Event::Start(BytesStart::new("resource")))
            .map_err(xml_error)?;

        writer
            .create_element("data")
            .with_attribute(("encoding", "base64"))
            .write_text_content(BytesText::new(&resource.data_base64))
            .map_err(xml_error)?;
        text_element(writer, "mime", &resource.mime)?;
        if let Some(width) = resource.width {
            text_element(writer, "width", &width.to_string())?;
        }
        if let Some(height) = resource.height {
            text_element(writer, "height", &height.to_string())?;
        }

        if self.include_resource_attributes && !resource.file_name.is_empty() {
            writer
                .write_event(Event::Start(BytesStart::new("resource-attributes")))
                .map_err(xml_error)?;
            text_element(writer, "file-name", &resource.file_name)?;
            writer
                .write_event(Event::End(BytesEnd::new("resource-attributes")))
                .map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("resource")))
            .map_err(xml_error)?;
        Ok(())
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(ENEX_DATE_FORMAT).to_string()
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Xml(err.to_string())
}
