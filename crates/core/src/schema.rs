//! Schema model
//!
//! Typed descriptions of the dataset types carried by a blob: object
//! (named fields + field types), list, set, and map. Schema names are
//! unique within a blob; a delta's schemas must match the resident
//! snapshot schemas structurally.

use crate::filter::FilterConfig;

/// Discriminates the four schema kinds. Wire values are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchemaKind {
    /// Named fields with typed values
    Object = 0,
    /// Ordered collection of element ordinals
    List = 1,
    /// Unordered collection of element ordinals
    Set = 2,
    /// Key ordinal to value ordinal entries
    Map = 3,
}

impl SchemaKind {
    /// Parse a wire kind byte
    pub fn from_u8(value: u8) -> Option<SchemaKind> {
        match value {
            0 => Some(SchemaKind::Object),
            1 => Some(SchemaKind::List),
            2 => Some(SchemaKind::Set),
            3 => Some(SchemaKind::Map),
            _ => None,
        }
    }
}

/// The type of a single object field. Wire values are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    /// 32-bit signed integer, ZigZag-folded into its packed slot
    Int = 0,
    /// 64-bit signed integer, ZigZag-folded into its packed slot
    Long = 1,
    /// 32-bit IEEE float stored by bit pattern
    Float = 2,
    /// 64-bit IEEE float stored by bit pattern
    Double = 3,
    /// Single bit
    Boolean = 4,
    /// Variable-width UTF-8, heap-backed
    String = 5,
    /// Variable-width raw bytes, heap-backed
    Bytes = 6,
    /// Ordinal of a record in another (or the same) type
    Reference = 7,
}

impl FieldType {
    /// Parse a wire field-kind byte
    pub fn from_u8(value: u8) -> Option<FieldType> {
        match value {
            0 => Some(FieldType::Int),
            1 => Some(FieldType::Long),
            2 => Some(FieldType::Float),
            3 => Some(FieldType::Double),
            4 => Some(FieldType::Boolean),
            5 => Some(FieldType::String),
            6 => Some(FieldType::Bytes),
            7 => Some(FieldType::Reference),
            _ => None,
        }
    }

    /// Whether values of this type live in a var-byte heap, with the
    /// packed slot holding an offset instead of the value itself.
    pub fn is_var_width(self) -> bool {
        matches!(self, FieldType::String | FieldType::Bytes)
    }
}

/// One field of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectField {
    /// Field name, unique within its object schema
    pub name: String,
    /// Value type
    pub field_type: FieldType,
    /// Referenced type name, present iff `field_type` is `Reference`
    pub referenced_type: Option<String>,
    /// Position of this field in the stored (wire) schema. A filtered
    /// schema keeps the stored positions of the fields it retains so the
    /// populator can skip the gaps byte-exactly.
    pub stored_position: usize,
}

/// Schema of an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Type name, unique within a blob
    pub name: String,
    /// Ordered fields
    pub fields: Vec<ObjectField>,
    /// Primary-key field path, empty if the type declares none
    pub primary_key: Vec<String>,
}

impl ObjectSchema {
    /// Derive the schema containing only the fields `filter` includes,
    /// preserving stored field positions.
    pub fn filter(&self, filter: &FilterConfig) -> ObjectSchema {
        ObjectSchema {
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .filter(|f| filter.includes_field(&self.name, &f.name))
                .cloned()
                .collect(),
            primary_key: self.primary_key.clone(),
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&ObjectField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Index of a field by name within this (possibly filtered) schema
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Schema of a list type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSchema {
    /// Type name
    pub name: String,
    /// Name of the element type
    pub element_type: String,
}

/// Schema of a set type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSchema {
    /// Type name
    pub name: String,
    /// Name of the element type
    pub element_type: String,
    /// Field paths into the element type used to hash members
    pub hash_key_paths: Vec<String>,
}

/// Schema of a map type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSchema {
    /// Type name
    pub name: String,
    /// Name of the key type
    pub key_type: String,
    /// Name of the value type
    pub value_type: String,
    /// Field paths into the key type used to hash entries
    pub hash_key_paths: Vec<String>,
}

/// A dataset type schema: tagged variant over the four kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Object schema
    Object(ObjectSchema),
    /// List schema
    List(ListSchema),
    /// Set schema
    Set(SetSchema),
    /// Map schema
    Map(MapSchema),
}

impl Schema {
    /// The type name this schema declares
    pub fn name(&self) -> &str {
        match self {
            Schema::Object(s) => &s.name,
            Schema::List(s) => &s.name,
            Schema::Set(s) => &s.name,
            Schema::Map(s) => &s.name,
        }
    }

    /// The schema kind
    pub fn kind(&self) -> SchemaKind {
        match self {
            Schema::Object(_) => SchemaKind::Object,
            Schema::List(_) => SchemaKind::List,
            Schema::Set(_) => SchemaKind::Set,
            Schema::Map(_) => SchemaKind::Map,
        }
    }

    /// Names of every other type this schema references. Used by the
    /// engine to wire type states together after a snapshot load.
    pub fn referenced_types(&self) -> Vec<&str> {
        match self {
            Schema::Object(s) => s
                .fields
                .iter()
                .filter_map(|f| f.referenced_type.as_deref())
                .collect(),
            Schema::List(s) => vec![&s.element_type],
            Schema::Set(s) => vec![&s.element_type],
            Schema::Map(s) => vec![&s.key_type, &s.value_type],
        }
    }

    /// Check that `other` is structurally compatible with this schema.
    ///
    /// Used when a delta carries a schema for a type the engine already
    /// holds: names, kinds, field order, field types, and referenced
    /// types must all agree.
    pub fn check_compatible(&self, other: &Schema) -> Result<(), String> {
        if self.name() != other.name() {
            return Err(format!(
                "name {:?} != {:?}",
                self.name(),
                other.name()
            ));
        }
        if self.kind() != other.kind() {
            return Err(format!("kind {:?} != {:?}", self.kind(), other.kind()));
        }
        match (self, other) {
            (Schema::Object(a), Schema::Object(b)) => {
                if a.fields.len() != b.fields.len() {
                    return Err(format!(
                        "field count {} != {}",
                        a.fields.len(),
                        b.fields.len()
                    ));
                }
                for (fa, fb) in a.fields.iter().zip(&b.fields) {
                    if fa.name != fb.name
                        || fa.field_type != fb.field_type
                        || fa.referenced_type != fb.referenced_type
                    {
                        return Err(format!("field {:?} differs", fa.name));
                    }
                }
                Ok(())
            }
            (Schema::List(a), Schema::List(b)) => {
                if a.element_type != b.element_type {
                    return Err("element type differs".to_string());
                }
                Ok(())
            }
            (Schema::Set(a), Schema::Set(b)) => {
                if a.element_type != b.element_type {
                    return Err("element type differs".to_string());
                }
                Ok(())
            }
            (Schema::Map(a), Schema::Map(b)) => {
                if a.key_type != b.key_type || a.value_type != b.value_type {
                    return Err("key or value type differs".to_string());
                }
                Ok(())
            }
            _ => unreachable!("kinds already compared"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_schema() -> ObjectSchema {
        ObjectSchema {
            name: "Movie".to_string(),
            fields: vec![
                ObjectField {
                    name: "id".to_string(),
                    field_type: FieldType::Int,
                    referenced_type: None,
                    stored_position: 0,
                },
                ObjectField {
                    name: "title".to_string(),
                    field_type: FieldType::String,
                    referenced_type: None,
                    stored_position: 1,
                },
                ObjectField {
                    name: "studio".to_string(),
                    field_type: FieldType::Reference,
                    referenced_type: Some("Studio".to_string()),
                    stored_position: 2,
                },
            ],
            primary_key: vec!["id".to_string()],
        }
    }

    #[test]
    fn test_schema_kind_wire_values() {
        assert_eq!(SchemaKind::from_u8(0), Some(SchemaKind::Object));
        assert_eq!(SchemaKind::from_u8(3), Some(SchemaKind::Map));
        assert_eq!(SchemaKind::from_u8(4), None);
    }

    #[test]
    fn test_field_type_var_width() {
        assert!(FieldType::String.is_var_width());
        assert!(FieldType::Bytes.is_var_width());
        assert!(!FieldType::Long.is_var_width());
        assert!(!FieldType::Reference.is_var_width());
    }

    #[test]
    fn test_filter_preserves_stored_positions() {
        let schema = movie_schema();
        let mut filter = FilterConfig::new_include_all();
        filter.exclude_field("Movie", "title");

        let filtered = schema.filter(&filter);
        assert_eq!(filtered.fields.len(), 2);
        assert_eq!(filtered.fields[0].name, "id");
        assert_eq!(filtered.fields[0].stored_position, 0);
        assert_eq!(filtered.fields[1].name, "studio");
        assert_eq!(filtered.fields[1].stored_position, 2);
    }

    #[test]
    fn test_referenced_types() {
        let schema = Schema::Object(movie_schema());
        assert_eq!(schema.referenced_types(), vec!["Studio"]);

        let list = Schema::List(ListSchema {
            name: "MovieList".to_string(),
            element_type: "Movie".to_string(),
        });
        assert_eq!(list.referenced_types(), vec!["Movie"]);

        let map = Schema::Map(MapSchema {
            name: "MoviesById".to_string(),
            key_type: "MovieId".to_string(),
            value_type: "Movie".to_string(),
            hash_key_paths: vec![],
        });
        assert_eq!(map.referenced_types(), vec!["MovieId", "Movie"]);
    }

    #[test]
    fn test_compatibility_same_schema() {
        let a = Schema::Object(movie_schema());
        let b = Schema::Object(movie_schema());
        assert!(a.check_compatible(&b).is_ok());
    }

    #[test]
    fn test_compatibility_field_type_differs() {
        let a = Schema::Object(movie_schema());
        let mut other = movie_schema();
        other.fields[0].field_type = FieldType::Long;
        let b = Schema::Object(other);

        let err = a.check_compatible(&b).unwrap_err();
        assert!(err.contains("id"));
    }

    #[test]
    fn test_compatibility_kind_differs() {
        let a = Schema::Object(movie_schema());
        let b = Schema::List(ListSchema {
            name: "Movie".to_string(),
            element_type: "X".to_string(),
        });
        assert!(a.check_compatible(&b).is_err());
    }

    #[test]
    fn test_field_lookup() {
        let schema = movie_schema();
        assert_eq!(schema.field_index("title"), Some(1));
        assert!(schema.field("missing").is_none());
    }
}
