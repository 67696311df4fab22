//! # Field Capability Registry
//!
//! Comparison operators and the fixed operator set each field type accepts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::FieldType;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Overlap,
    ContainsAll,
    ContainsNone,
}

/// What kind of value an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No value at all
    Nothing,
    /// A single scalar
    Scalar,
    /// A non-empty list
    List,
    /// An ordered (low, high) pair
    Pair,
}

impl ValueShape {
    pub fn describe(&self) -> &'static str {
        match self {
            ValueShape::Nothing => "no value",
            ValueShape::Scalar => "a single value",
            ValueShape::List => "a non-empty list of values",
            ValueShape::Pair => "exactly two values (low, high)",
        }
    }
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Between,
        Operator::In,
        Operator::NotIn,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::Overlap,
        Operator::ContainsAll,
        Operator::ContainsNone,
    ];

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
            Operator::Overlap => "overlap",
            Operator::ContainsAll => "containsAll",
            Operator::ContainsNone => "containsNone",
        }
    }

    /// Parse a canonical name or one of the common short forms.
    pub fn parse(name: &str) -> Option<Operator> {
        let op = match name {
            "equals" | "eq" | "=" | "is" => Operator::Equals,
            "notEquals" | "not_equals" | "neq" | "ne" | "!=" | "not" => Operator::NotEquals,
            "contains" | "like" => Operator::Contains,
            "startsWith" | "starts_with" => Operator::StartsWith,
            "endsWith" | "ends_with" => Operator::EndsWith,
            "gt" | ">" => Operator::Gt,
            "gte" | ">=" => Operator::Gte,
            "lt" | "<" => Operator::Lt,
            "lte" | "<=" => Operator::Lte,
            "between" | "range" => Operator::Between,
            "in" => Operator::In,
            "notIn" | "not_in" | "nin" => Operator::NotIn,
            "isNull" | "is_null" | "null" => Operator::IsNull,
            "isNotNull" | "is_not_null" | "not_null" | "notnull" => Operator::IsNotNull,
            "overlap" => Operator::Overlap,
            "containsAll" | "contains_all" => Operator::ContainsAll,
            "containsNone" | "contains_none" => Operator::ContainsNone,
            _ => return None,
        };
        Some(op)
    }

    /// Human-readable description for error messages
    pub fn description(&self) -> &'static str {
        match self {
            Operator::Equals => "is equal to the value",
            Operator::NotEquals => "is not equal to the value",
            Operator::Contains => "contains the text anywhere",
            Operator::StartsWith => "starts with the text",
            Operator::EndsWith => "ends with the text",
            Operator::Gt => "is greater than the value",
            Operator::Gte => "is greater than or equal to the value",
            Operator::Lt => "is less than the value",
            Operator::Lte => "is less than or equal to the value",
            Operator::Between => "lies between two values (inclusive)",
            Operator::In => "is one of the listed values",
            Operator::NotIn => "is none of the listed values",
            Operator::IsNull => "has no value",
            Operator::IsNotNull => "has a value",
            Operator::Overlap => "shares at least one value with the list",
            Operator::ContainsAll => "contains every listed value",
            Operator::ContainsNone => "contains none of the listed values",
        }
    }

    /// Value shape the operator requires
    pub fn value_shape(&self) -> ValueShape {
        match self {
            Operator::IsNull | Operator::IsNotNull => ValueShape::Nothing,
            Operator::In
            | Operator::NotIn
            | Operator::Overlap
            | Operator::ContainsAll
            | Operator::ContainsNone => ValueShape::List,
            Operator::Between => ValueShape::Pair,
            _ => ValueShape::Scalar,
        }
    }

    /// True for the LIKE family
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TEXT_OPS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

const ORDERED_OPS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
    Operator::Between,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

const BOOLEAN_OPS: &[Operator] = &[Operator::Equals, Operator::NotEquals];

const ENUM_OPS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

const MULTI_ENUM_OPS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Overlap,
    Operator::ContainsAll,
    Operator::ContainsNone,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

// Secrets and binary payloads: presence checks only
const PRESENCE_OPS: &[Operator] = &[Operator::IsNull, Operator::IsNotNull];

const REFERENCE_OPS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::IsNull,
    Operator::IsNotNull,
];

fn operator_table(field_type: FieldType) -> &'static [Operator] {
    match field_type {
        FieldType::Text | FieldType::Email | FieldType::BigText => TEXT_OPS,
        FieldType::Integer | FieldType::Float | FieldType::Date | FieldType::DateTime => {
            ORDERED_OPS
        }
        FieldType::Boolean => BOOLEAN_OPS,
        FieldType::Enum => ENUM_OPS,
        FieldType::MultiEnum => MULTI_ENUM_OPS,
        FieldType::Password | FieldType::Image => PRESENCE_OPS,
        FieldType::RelatedRecord | FieldType::Id => REFERENCE_OPS,
    }
}

/// Default operator set for a field type
pub fn supported_operators(field_type: FieldType) -> BTreeSet<Operator> {
    operator_table(field_type).iter().copied().collect()
}

/// Check a (type, operator) pair against the defaults
pub fn supports_operator(field_type: FieldType, op: Operator) -> bool {
    operator_table(field_type).contains(&op)
}

/// "name: description" lines, in declaration order
pub fn describe_operators(ops: &BTreeSet<Operator>) -> Vec<String> {
    ops.iter()
        .map(|op| format!("{}: {}", op.as_str(), op.description()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_presence_only() {
        let ops = supported_operators(FieldType::Password);
        assert_eq!(ops.len(), 2);
        assert!(supports_operator(FieldType::Password, Operator::IsNull));
        assert!(!supports_operator(FieldType::Password, Operator::Equals));
        assert!(!supports_operator(FieldType::Password, Operator::Contains));
    }

    #[test]
    fn test_text_has_pattern_ops_but_no_ranges() {
        assert!(supports_operator(FieldType::Text, Operator::Contains));
        assert!(supports_operator(FieldType::Email, Operator::StartsWith));
        assert!(!supports_operator(FieldType::Text, Operator::Between));
        assert!(!supports_operator(FieldType::BigText, Operator::Gt));
    }

    #[test]
    fn test_ordered_types_have_ranges() {
        for ty in [
            FieldType::Integer,
            FieldType::Float,
            FieldType::Date,
            FieldType::DateTime,
        ] {
            assert!(supports_operator(ty, Operator::Between));
            assert!(!supports_operator(ty, Operator::Contains));
        }
    }

    #[test]
    fn test_multi_enum_set_ops() {
        assert!(supports_operator(FieldType::MultiEnum, Operator::Overlap));
        assert!(supports_operator(FieldType::MultiEnum, Operator::ContainsNone));
        assert!(!supports_operator(FieldType::Enum, Operator::Overlap));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Operator::parse("eq"), Some(Operator::Equals));
        assert_eq!(Operator::parse(">="), Some(Operator::Gte));
        assert_eq!(Operator::parse("not_in"), Some(Operator::NotIn));
        assert_eq!(Operator::parse("isNotNull"), Some(Operator::IsNotNull));
        assert_eq!(Operator::parse("fuzzy"), None);
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }

    #[test]
    fn test_value_shapes() {
        assert_eq!(Operator::IsNull.value_shape(), ValueShape::Nothing);
        assert_eq!(Operator::In.value_shape(), ValueShape::List);
        assert_eq!(Operator::Between.value_shape(), ValueShape::Pair);
        assert_eq!(Operator::Contains.value_shape(), ValueShape::Scalar);
    }

    #[test]
    fn test_describe_operators() {
        let lines = describe_operators(&supported_operators(FieldType::Password));
        assert_eq!(lines, vec!["isNull: has no value", "isNotNull: has a value"]);
    }
}
