//! Core types for Mosaic
//!
//! This crate defines the foundational types used throughout the system:
//! - MosaicError: Error type hierarchy
//! - Schema: Typed descriptions of dataset types (object, list, set, map)
//! - FilterConfig: Declarative include/exclude of types and fields
//! - ReadEngineConfig: Memory mode and consumer behavior configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod filter;
pub mod schema;

pub use config::{DoubleSnapshotConfig, MemoryMode, ObjectLongevityConfig, ReadEngineConfig};
pub use error::{MosaicError, MosaicResult};
pub use filter::FilterConfig;
pub use schema::{FieldType, ObjectField, ObjectSchema, Schema, SchemaKind};
