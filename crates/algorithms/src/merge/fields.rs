//! Schema resolution into typed field handles

use parcelmerge_core::{AttributeValue, Field, FieldType, Fields};
use tracing::{debug, warn};

use super::error::MergeError;
use super::params::MergeParams;

/// A resolved attribute field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHandle {
    /// Position in the layer schema
    pub index: usize,
    pub name: String,
    pub field_type: FieldType,
    /// Declared maximum length, 0 when unlimited
    pub max_length: usize,
}

impl FieldHandle {
    fn new(index: usize, field: &Field) -> Self {
        Self {
            index,
            name: field.name.clone(),
            field_type: field.field_type,
            max_length: field.length,
        }
    }
}

/// The merge fields found in a layer schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHandles {
    pub parcel: Option<FieldHandle>,
    pub area: Option<FieldHandle>,
}

impl FieldHandles {
    /// Resolve the parcel and area fields.
    ///
    /// A missing field is not an error; a parcel field that is not text is.
    /// Boolean fields never receive an area. When several area fields are
    /// present the last one in schema order is used.
    pub fn resolve(fields: &Fields, params: &MergeParams) -> Result<Self, MergeError> {
        let found = fields
            .lookup(&params.parcel_field)
            .and_then(|index| fields.get(index).map(|field| (index, field)));
        let parcel = match found {
            Some((index, field)) => {
                if field.field_type != FieldType::Text {
                    return Err(MergeError::ParcelFieldNotText {
                        field: field.name.clone(),
                        found: field.field_type.name(),
                    });
                }
                Some(FieldHandle::new(index, field))
            }
            None => {
                debug!("No '{}' field, parcel ids are not concatenated", params.parcel_field);
                None
            }
        };

        let area = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.field_type != FieldType::Boolean && params.is_area_field(&f.name))
            .last()
            .map(|(i, f)| FieldHandle::new(i, f));
        if area.is_none() {
            warn!(
                "No area field ({}) found, skipping area update",
                params.area_fields.join(", ")
            );
        }

        Ok(Self { parcel, area })
    }

    /// Whether `name` is one of the computed fields
    pub fn is_computed(&self, name: &str) -> bool {
        [&self.parcel, &self.area]
            .iter()
            .any(|h| h.as_ref().is_some_and(|h| h.name == name))
    }
}

/// Store a number in a field of the given type
pub(crate) fn coerce_number(value: f64, field_type: FieldType) -> AttributeValue {
    match field_type {
        FieldType::Integer => AttributeValue::Int(value.round() as i64),
        FieldType::Text => AttributeValue::String(format!("{:.2}", value)),
        FieldType::Real | FieldType::Boolean => AttributeValue::Float(value),
    }
}
