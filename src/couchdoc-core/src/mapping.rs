use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// FieldMapping renames JSON members to entity fields and back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    renames: Vec<(String, String)>, // (json name, entity field name)
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, json_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        self.renames.push((json_name.into(), field_name.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Apply on read: JSON member names become entity field names
    pub fn to_entity(&self, mut object: Map<String, Value>) -> Map<String, Value> {
        for (json_name, field_name) in &self.renames {
            if let Some(value) = object.remove(json_name) {
                object.insert(field_name.clone(), value);
            }
        }
        object
    }

    /// Apply on write: entity field names become JSON member names
    pub fn to_json(&self, mut object: Map<String, Value>) -> Map<String, Value> {
        for (json_name, field_name) in &self.renames {
            if let Some(value) = object.remove(field_name) {
                object.insert(json_name.clone(), value);
            }
        }
        object
    }
}

/// EntityMapping is the untyped half of an [`EntityMeta`]: the target type name
/// and an optional explicit field mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    pub type_name: &'static str,
    pub fields: Option<FieldMapping>,
}

/// EntityMeta describes how documents map onto `T`
pub struct EntityMeta<T> {
    mapping: EntityMapping,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EntityMeta<T> {
    pub fn new() -> Self {
        Self {
            mapping: EntityMapping {
                type_name: std::any::type_name::<T>(),
                fields: None,
            },
            _marker: PhantomData,
        }
    }

    /// Map the JSON member `json_name` onto the field `field_name`
    pub fn with_field(mut self, json_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        let fields = self.mapping.fields.take().unwrap_or_default();
        self.mapping.fields = Some(fields.rename(json_name, field_name));
        self
    }

    pub fn with_mapping(mut self, fields: FieldMapping) -> Self {
        self.mapping.fields = Some(fields);
        self
    }

    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    pub fn type_name(&self) -> &'static str {
        self.mapping.type_name
    }
}

impl<T> Default for EntityMeta<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EntityMeta<T> {
    fn clone(&self) -> Self {
        Self {
            mapping: self.mapping.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for EntityMeta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("type_name", &self.mapping.type_name)
            .field("fields", &self.mapping.fields)
            .finish()
    }
}
