// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod entity;
pub mod ioc;

pub use entity::{normalize_entity_name, Entity, EntityKind};
pub use ioc::{Finding, IndicatorRecord, IocType, Mention, URL_NOT_FOUND};
