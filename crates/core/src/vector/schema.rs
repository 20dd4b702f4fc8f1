//! Field schema of a vector layer

use serde::{Deserialize, Serialize};

use super::AttributeValue;
use crate::error::{Error, Result};

/// Declared type of an attribute field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Real => "real",
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
        }
    }

    /// Whether a value can be stored in a field of this type.
    ///
    /// Null fits everywhere; integers are accepted by real fields.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (_, AttributeValue::Null)
                | (FieldType::Integer, AttributeValue::Int(_))
                | (FieldType::Real, AttributeValue::Float(_))
                | (FieldType::Real, AttributeValue::Int(_))
                | (FieldType::Text, AttributeValue::String(_))
                | (FieldType::Boolean, AttributeValue::Bool(_))
        )
    }
}

/// A named, typed attribute slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Declared maximum length (bytes for text), 0 when unlimited
    #[serde(default)]
    pub length: usize,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: 0,
        }
    }

    /// Text field with a declared maximum byte length
    pub fn text(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Text,
            length,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

/// Ordered set of fields, unique by case-insensitive name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            let clash = fields[..i]
                .iter()
                .any(|f| f.name.eq_ignore_ascii_case(&field.name));
            if clash {
                return Err(Error::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Index of the field whose name matches case-insensitively
    pub fn lookup(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.fields
            .iter()
            .position(|f| f.name.to_lowercase() == wanted)
    }

    /// Exact-name field access
    pub fn by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl TryFrom<Vec<Field>> for Fields {
    type Error = Error;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Fields::new(fields)
    }
}

impl From<Fields> for Vec<Field> {
    fn from(fields: Fields) -> Self {
        fields.fields
    }
}
