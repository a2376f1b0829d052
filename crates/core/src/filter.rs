//! Filter configuration
//!
//! A declarative include/exclude tree applied during snapshot ingestion:
//! per type name, and for object types per field name. Excluded data is
//! parsed-and-discarded rather than retained, so the blob position after
//! a filtered read equals the position a full read would have consumed.
//!
//! The default configuration includes everything. Embedders typically
//! ship this as JSON, so the whole tree is serde round-trippable.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Per-type filter entry: whether the type is included and, for object
/// types, any per-field overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TypeFilter {
    /// Overrides the config-level default for this type
    include: Option<bool>,
    /// Per-field overrides; a field absent here follows the type
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    fields: FxHashMap<String, bool>,
}

/// Declarative include/exclude of types and object fields.
///
/// ```
/// use mosaic_core::FilterConfig;
///
/// let mut filter = FilterConfig::new_include_all();
/// filter.exclude_type("Junk");
/// filter.exclude_field("Movie", "synopsis");
///
/// assert!(filter.includes_type("Movie"));
/// assert!(!filter.includes_type("Junk"));
/// assert!(!filter.includes_field("Movie", "synopsis"));
/// assert!(filter.includes_field("Movie", "title"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Whether types with no explicit entry are included
    include_by_default: bool,
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    types: FxHashMap<String, TypeFilter>,
}

impl FilterConfig {
    /// A filter that includes every type and every field.
    pub fn new_include_all() -> FilterConfig {
        FilterConfig {
            include_by_default: true,
            types: FxHashMap::default(),
        }
    }

    /// A filter that excludes everything not explicitly included.
    pub fn new_exclude_all() -> FilterConfig {
        FilterConfig {
            include_by_default: false,
            types: FxHashMap::default(),
        }
    }

    /// Include a type (and, absent field overrides, all of its fields).
    pub fn include_type(&mut self, type_name: &str) -> &mut Self {
        self.types.entry(type_name.to_string()).or_default().include = Some(true);
        self
    }

    /// Exclude a type entirely; its sub-stream is discarded on ingest.
    pub fn exclude_type(&mut self, type_name: &str) -> &mut Self {
        self.types.entry(type_name.to_string()).or_default().include = Some(false);
        self
    }

    /// Include a single field of an object type. Also includes the type.
    pub fn include_field(&mut self, type_name: &str, field_name: &str) -> &mut Self {
        let entry = self.types.entry(type_name.to_string()).or_default();
        entry.include = Some(true);
        entry.fields.insert(field_name.to_string(), true);
        self
    }

    /// Exclude a single field of an object type; its streams are skipped
    /// during population.
    pub fn exclude_field(&mut self, type_name: &str, field_name: &str) -> &mut Self {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .fields
            .insert(field_name.to_string(), false);
        self
    }

    /// Whether the named type is retained on ingest.
    pub fn includes_type(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .and_then(|t| t.include)
            .unwrap_or(self.include_by_default)
    }

    /// Whether the named object field is retained on ingest. A field of
    /// an excluded type is never included.
    pub fn includes_field(&self, type_name: &str, field_name: &str) -> bool {
        if !self.includes_type(type_name) {
            return false;
        }
        match self.types.get(type_name) {
            Some(t) => t.fields.get(field_name).copied().unwrap_or(true),
            None => true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig::new_include_all()
    }
}
