//! Comparison operators and key suffix parsing

use std::fmt;

/// Comparison operators, selected by a `__op` key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equals (no suffix)
    Eq,
    /// Greater than (`__gt`)
    Gt,
    /// Less than (`__lt`)
    Lt,
    /// Greater than or equal (`__gte`)
    Gte,
    /// Less than or equal (`__lte`)
    Lte,
    /// Case-sensitive pattern match (`__like`)
    Like,
    /// Case-insensitive pattern match (`__ilike`)
    Ilike,
    /// Membership in a list (`__in`)
    In,
}

impl Operator {
    /// Key suffix without the leading `__`; empty for equality
    pub fn suffix(&self) -> &'static str {
        match self {
            Operator::Eq => "",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::In => "in",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Operator::Gt),
            "lt" => Some(Operator::Lt),
            "gte" => Some(Operator::Gte),
            "lte" => Some(Operator::Lte),
            "like" => Some(Operator::Like),
            "ilike" => Some(Operator::Ilike),
            "in" => Some(Operator::In),
            _ => None,
        }
    }

    /// Splits a filter key into field name and operator.
    ///
    /// A key whose last `__` segment is not a known operator is taken whole
    /// as an equality on that name.
    pub fn split_key(key: &str) -> (&str, Operator) {
        match key.rsplit_once("__") {
            Some((field, suffix)) if !field.is_empty() => match Self::from_suffix(suffix) {
                Some(op) => (field, op),
                None => (key, Operator::Eq),
            },
            _ => (key, Operator::Eq),
        }
    }

    /// SQL comparison symbol for binary operators
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like | Operator::Ilike => "LIKE",
            Operator::In => "IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "eq"),
            other => write!(f, "{}", other.suffix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key() {
        assert_eq!(Operator::split_key("age__gte"), ("age", Operator::Gte));
        assert_eq!(Operator::split_key("id__in"), ("id", Operator::In));
        assert_eq!(Operator::split_key("name"), ("name", Operator::Eq));
        assert_eq!(Operator::split_key("title__ilike"), ("title", Operator::Ilike));
    }

    #[test]
    fn test_unknown_suffix_is_whole_key() {
        assert_eq!(Operator::split_key("age__between"), ("age__between", Operator::Eq));
        assert_eq!(Operator::split_key("__gt"), ("__gt", Operator::Eq));
    }
}
