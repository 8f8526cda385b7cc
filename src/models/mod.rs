// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod image;
pub mod note;
pub mod resource;

pub use image::ImageReference;
pub use note::{Note, RawNote};
pub use resource::{ResourceFallback, ResourceRecord, ResourceSet};
