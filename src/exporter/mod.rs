// file: src/exporter/mod.rs
// description: output writers for enex documents and json reports
// reference: exporter module exports

pub mod enex;
pub mod json;

pub use enex::{ENEX_DATE_FORMAT, EnexWriter, format_date};
pub use json::{JsonExporter, MANIFEST_FILE, ScanManifest};
