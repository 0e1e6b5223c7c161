//! Filters and their parsed predicates

use super::operator::Operator;
use crate::schema::{Record, Value};

/// Right-hand side of one filter term
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl FilterValue {
    /// Operand as a single value; lists become a JSON array
    pub fn into_scalar(self) -> Value {
        match self {
            FilterValue::Scalar(v) => v,
            FilterValue::List(values) => {
                Value::Json(serde_json::Value::Array(values.iter().map(Value::to_json).collect()))
            }
        }
    }

    /// Operand as a list; a JSON array expands, any other scalar is a
    /// one-element list
    pub fn into_list(self) -> Vec<Value> {
        match self {
            FilterValue::Scalar(Value::Json(serde_json::Value::Array(items))) => {
                items.into_iter().map(Value::from_json).collect()
            }
            FilterValue::Scalar(v) => vec![v],
            FilterValue::List(values) => values,
        }
    }
}

/// Conjunction of `(key, value)` terms, kept in insertion order.
///
/// Keys are field names, optionally suffixed with an operator
/// (`age__gte`, `id__in`). An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term under a raw, possibly suffixed, key
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key.into(), FilterValue::Scalar(value.into()))
    }

    fn push(mut self, key: String, value: FilterValue) -> Self {
        self.terms.push((key, value));
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.suffixed(field, Operator::Gt, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.suffixed(field, Operator::Gte, value.into())
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.suffixed(field, Operator::Lt, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.suffixed(field, Operator::Lte, value.into())
    }

    pub fn like(self, field: &str, pattern: &str) -> Self {
        self.suffixed(field, Operator::Like, Value::from(pattern))
    }

    pub fn ilike(self, field: &str, pattern: &str) -> Self {
        self.suffixed(field, Operator::Ilike, Value::from(pattern))
    }

    /// `field__in` over the given values
    pub fn any_of<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = format!("{}__{}", field, Operator::In.suffix());
        self.push(key, FilterValue::List(values.into_iter().map(Into::into).collect()))
    }

    fn suffixed(self, field: &str, op: Operator, value: Value) -> Self {
        let key = format!("{}__{}", field, op.suffix());
        self.push(key, FilterValue::Scalar(value))
    }

    pub fn terms(&self) -> &[(String, FilterValue)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Equality on every entry of the record
impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        record
            .into_iter()
            .fold(Filter::new(), |f, (name, value)| f.with(name, value))
    }
}

/// One parsed filter term
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub operator: Operator,
    pub operand: FilterValue,
}

/// A filter with every key split into field and operator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    comparisons: Vec<Comparison>,
}

impl Predicate {
    pub fn parse(filter: &Filter) -> Self {
        let comparisons = filter
            .terms()
            .iter()
            .map(|(key, value)| {
                let (field, operator) = Operator::split_key(key);
                let operand = match operator {
                    Operator::In => FilterValue::List(value.clone().into_list()),
                    _ => FilterValue::Scalar(value.clone().into_scalar()),
                };
                Comparison {
                    field: field.to_string(),
                    operator,
                    operand,
                }
            })
            .collect();
        Self { comparisons }
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }

    /// First comparison that is not a plain equality
    pub fn first_non_equality(&self) -> Option<&Comparison> {
        self.comparisons.iter().find(|c| c.operator != Operator::Eq)
    }
}
