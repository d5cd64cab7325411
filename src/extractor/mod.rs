// file: src/extractor/mod.rs
// description: indicator extraction module exports
// reference: internal module structure

pub mod ioc;
pub mod patterns;
pub mod refang;
pub mod reference;

pub use ioc::IocExtractor;
pub use refang::refang;
pub use reference::ReferenceData;
