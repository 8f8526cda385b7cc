// file: src/enml/mod.rs
// description: enml conversion module exports
// reference: internal module structure

pub mod markup;
pub mod sanitizer;

pub use sanitizer::{ENML_DOCTYPE, EnmlDocument, EnmlSanitizer};
