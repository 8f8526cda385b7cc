// file: src/render/mod.rs
// description: html rendering module exports
// reference: internal module structure

pub mod engine;
pub mod html;

pub use engine::{BasicEngine, MarkdownEngine, PulldownEngine, engine_for};
pub use html::{EMPTY_BLOCK, HtmlRenderer};
