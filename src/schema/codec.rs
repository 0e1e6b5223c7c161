//! Backend value codecs
//!
//! Each backend stores values in its own native form. A codec translates
//! between [`Value`] and that form for a given [`FieldType`], and names the
//! neutral value used when an optional field is left empty.

use super::types::FieldType;
use super::value::Value;

/// Translation between tagged values and a backend's stored representation.
pub trait ValueCodec {
    /// The backend's native cell type
    type Stored;

    /// Encodes an already-coerced value for storage
    fn encode(&self, field_type: &FieldType, value: &Value) -> Self::Stored;

    /// Decodes a stored cell. Never fails: cells that do not parse as the
    /// field's type are surfaced as text.
    fn decode(&self, field_type: &FieldType, stored: Self::Stored) -> Value;

    /// Value for an optional field absent from insert input
    fn neutral(&self, field_type: &FieldType) -> Value;
}
