//! Record filters
//!
//! A filter is a conjunction of terms. There is no OR and no nesting.
//!
//! - File backend: every term is a textual equality on a field name.
//! - Relational backend: a key suffix (`__gt`, `__lt`, `__gte`, `__lte`,
//!   `__like`, `__ilike`, `__in`) selects a typed SQL comparison; no suffix
//!   means equality.

mod operator;
mod predicate;

pub use operator::Operator;
pub use predicate::{Comparison, Filter, FilterValue, Predicate};
