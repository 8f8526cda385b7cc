// file: src/resources/mod.rs
// description: resource resolution module exports
// reference: internal module structure

pub mod dimensions;
pub mod mime;
pub mod resolver;

pub use dimensions::image_dimensions;
pub use mime::mime_for_path;
pub use resolver::{PLACEHOLDER_PNG_BASE64, ResourceResolver, placeholder_hash, placeholder_record};
