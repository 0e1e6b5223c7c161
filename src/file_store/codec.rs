//! Text codec for CSV cells

use crate::schema::{coerce, FieldType, Value, ValueCodec};

/// Every value is stored as its canonical text; the empty cell is the
/// neutral value.
///
/// Text-like fields (text, date, time) decode the empty cell as empty text,
/// every other type as Null. Cells that no longer parse as their field's
/// type (hand-edited files) decode as text rather than failing the read.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl ValueCodec for TextCodec {
    type Stored = String;

    fn encode(&self, _field_type: &FieldType, value: &Value) -> String {
        value.to_text()
    }

    fn decode(&self, field_type: &FieldType, stored: String) -> Value {
        if stored.is_empty() {
            return self.neutral(field_type);
        }
        if field_type.is_textual() {
            return Value::Text(stored);
        }
        let raw = Value::Text(stored);
        coerce("", field_type, raw.clone()).unwrap_or(raw)
    }

    fn neutral(&self, field_type: &FieldType) -> Value {
        if field_type.is_textual() {
            Value::Text(String::new())
        } else {
            Value::Null
        }
    }
}

impl TextCodec {
    /// Text form of a filter operand: coerced to the field type where
    /// possible, so `"1"`, `1` and `1.0` all select an integer 1.
    pub fn filter_text(&self, field_type: &FieldType, operand: &Value) -> String {
        match coerce("", field_type, operand.clone()) {
            Ok(coerced) => self.encode(field_type, &coerced),
            Err(_) => operand.to_text(),
        }
    }
}
