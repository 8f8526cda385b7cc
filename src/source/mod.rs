// file: src/source/mod.rs
// description: note source module exports
// reference: internal module structure

pub mod scanner;

pub use scanner::{FileScanner, ScannedFile};
