// file: src/utils/mod.rs
// description: utility functions module exports
// reference: internal module structure

pub mod logging;
pub mod text;

pub use text::{ceil_char_boundary, context_snippet, floor_char_boundary, normalize_for_matching};
