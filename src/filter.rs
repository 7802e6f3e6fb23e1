//! Attribute range filters pushed into the feature layer.
//!
//! A filter is kept in the style-expression form used by vector map renderers, e.g.
//! `["all", [">=", "_timestamp", 10], ["<=", "_timestamp", 20]]`, and can also be evaluated
//! directly against a feature's properties.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Feature properties a filter is evaluated against.
pub type Properties = serde_json::Map<String, Value>;

/// Value used for cleared filters. Real timestamps and experience counts are never negative.
const NO_MATCH_SENTINEL: f64 = -1.0;

/// The attribute a sub-filter constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    /// Time of the last edit.
    Time,
    /// Experience of the last editor.
    Experience,
}

impl FilterKind {
    /// The feature property this kind filters on.
    pub fn attribute(self) -> &'static str {
        match self {
            FilterKind::Time => "_timestamp",
            FilterKind::Experience => "_userExperience",
        }
    }
}

/// An inclusive numeric range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterRange {
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
}

impl FilterRange {
    /// Creates a range.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// A predicate over feature properties.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterExpr {
    /// Matches nothing.
    Nothing {
        /// Attribute named in the serialized form.
        attribute: String,
    },
    /// `attribute >= value`.
    AtLeast {
        /// Attribute to compare.
        attribute: String,
        /// Lower bound.
        value: f64,
    },
    /// `attribute <= value`.
    AtMost {
        /// Attribute to compare.
        attribute: String,
        /// Upper bound.
        value: f64,
    },
    /// All sub-expressions match. Empty matches everything.
    All(Vec<FilterExpr>),
}

impl FilterExpr {
    /// The sub-filter for `kind`: an inclusive range, or match-nothing when cleared.
    pub fn for_range(kind: FilterKind, range: Option<FilterRange>) -> Self {
        let attribute = kind.attribute().to_string();
        match range {
            None => FilterExpr::Nothing { attribute },
            Some(FilterRange { min, max }) => FilterExpr::All(vec![
                FilterExpr::AtLeast {
                    attribute: attribute.clone(),
                    value: min,
                },
                FilterExpr::AtMost {
                    attribute,
                    value: max,
                },
            ]),
        }
    }

    /// Evaluates the predicate. Missing or non-numeric attributes fail every comparison.
    pub fn matches(&self, properties: &Properties) -> bool {
        let number = |attribute: &str| properties.get(attribute).and_then(Value::as_f64);
        match self {
            FilterExpr::Nothing { .. } => false,
            FilterExpr::AtLeast { attribute, value } => number(attribute).is_some_and(|v| v >= *value),
            FilterExpr::AtMost { attribute, value } => number(attribute).is_some_and(|v| v <= *value),
            FilterExpr::All(exprs) => exprs.iter().all(|e| e.matches(properties)),
        }
    }

    /// The style-expression form of the predicate.
    pub fn to_json(&self) -> Value {
        match self {
            FilterExpr::Nothing { attribute } => json!(["==", attribute, NO_MATCH_SENTINEL]),
            FilterExpr::AtLeast { attribute, value } => json!([">=", attribute, value]),
            FilterExpr::AtMost { attribute, value } => json!(["<=", attribute, value]),
            FilterExpr::All(exprs) => {
                let mut items = vec![json!("all")];
                items.extend(exprs.iter().map(FilterExpr::to_json));
                Value::Array(items)
            }
        }
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(attribute: &str, value: Value) -> Properties {
        let mut p = Properties::new();
        p.insert(attribute.to_string(), value);
        p
    }

    #[test]
    fn range_is_inclusive() {
        let filter = FilterExpr::for_range(FilterKind::Experience, Some(FilterRange::new(0.0, 10.0)));
        let at = |v: f64| filter.matches(&props("_userExperience", json!(v)));
        assert!(at(0.0));
        assert!(at(10.0));
        assert!(at(5.5));
        assert!(!at(-1.0));
        assert!(!at(11.0));
    }

    #[test]
    fn cleared_filter_matches_nothing() {
        let filter = FilterExpr::for_range(FilterKind::Time, None);
        for v in [-1.5, -1.0, -0.5, 0.0, 1.0, 1.0e12] {
            assert!(!filter.matches(&props("_timestamp", json!(v))), "matched {v}");
        }
        assert!(!filter.matches(&Properties::new()));
    }

    #[test]
    fn missing_or_non_numeric_attribute_fails() {
        let filter = FilterExpr::for_range(FilterKind::Time, Some(FilterRange::new(0.0, 10.0)));
        assert!(!filter.matches(&Properties::new()));
        assert!(!filter.matches(&props("_timestamp", json!("5"))));
        assert!(!filter.matches(&props("_userExperience", json!(5))));
    }

    #[test]
    fn empty_all_matches_everything() {
        assert!(FilterExpr::All(vec![]).matches(&Properties::new()));
    }

    #[test]
    fn style_expression_form() {
        let filter = FilterExpr::for_range(FilterKind::Time, Some(FilterRange::new(100.0, 200.0)));
        assert_eq!(
            filter.to_json(),
            json!(["all", [">=", "_timestamp", 100.0], ["<=", "_timestamp", 200.0]])
        );
        assert_eq!(
            FilterExpr::for_range(FilterKind::Experience, None).to_json(),
            json!(["==", "_userExperience", -1.0])
        );
        assert_eq!(
            serde_json::to_string(&FilterExpr::for_range(FilterKind::Time, None)).unwrap(),
            r#"["==","_timestamp",-1.0]"#
        );
    }
}
