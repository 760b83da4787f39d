//! Condition operators and their compiled form.
//!
//! A condition is the wire pair `{operator_name: value}`. Registration turns
//! it into a [`Condition`] once, compiling regular expressions eagerly, so
//! evaluation on the request path never has to parse anything.

use crate::error::MockError;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Wire name of [`Operator::Equal`].
pub const OPERATOR_EQUAL: &str = "equal_to";
/// Wire name of [`Operator::Contains`].
pub const OPERATOR_CONTAINS: &str = "contains";
/// Wire name of [`Operator::Pattern`].
pub const OPERATOR_PATTERN: &str = "pattern";

/// Wire form of a single condition: operator name to literal value.
pub type ConditionDescriptor = BTreeMap<String, String>;

/// Comparison strategy of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Exact string equality
    Equal,
    /// Observed value contains the configured value
    Contains,
    /// Configured value is a regex found anywhere in the observed value
    Pattern,
    /// Unsupported operator name; a condition is never compiled from it
    Undefined,
}

impl Operator {
    /// Resolve a wire name. Unknown names map to [`Operator::Undefined`].
    pub fn from_name(name: &str) -> Self {
        match name {
            OPERATOR_EQUAL => Operator::Equal,
            OPERATOR_CONTAINS => Operator::Contains,
            OPERATOR_PATTERN => Operator::Pattern,
            _ => Operator::Undefined,
        }
    }

    /// Wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => OPERATOR_EQUAL,
            Operator::Contains => OPERATOR_CONTAINS,
            Operator::Pattern => OPERATOR_PATTERN,
            Operator::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Equal(String),
    Contains(String),
    Pattern(Regex),
}

/// A compiled test of one observed string.
#[derive(Debug, Clone)]
pub struct Condition {
    predicate: Predicate,
}

impl Condition {
    /// Compile a condition, validating the operator and any pattern.
    ///
    /// [`Operator::Undefined`] is rejected, so every compiled condition
    /// carries one of the three supported operators.
    pub fn compile(operator: Operator, value: impl Into<String>) -> Result<Self, MockError> {
        let value = value.into();
        let predicate = match operator {
            Operator::Equal => Predicate::Equal(value),
            Operator::Contains => Predicate::Contains(value),
            Operator::Pattern => {
                let regex = Regex::new(&value).map_err(|e| {
                    MockError::invalid(format!("the pattern {} is not valid: {}", value, e))
                })?;
                Predicate::Pattern(regex)
            }
            Operator::Undefined => {
                return Err(MockError::invalid(format!(
                    "the operator {} is not supported.",
                    operator
                )))
            }
        };
        Ok(Self { predicate })
    }

    /// Compile the wire form `{operator_name: value}` found under `field`.
    pub fn from_descriptor(
        field: &str,
        descriptor: &ConditionDescriptor,
    ) -> Result<Self, MockError> {
        let mut entries = descriptor.iter();
        let (name, value) = match (entries.next(), entries.next()) {
            (None, _) => {
                return Err(MockError::invalid(format!(
                    "the field {} has not any condition.",
                    field
                )))
            }
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => {
                return Err(MockError::invalid(format!(
                    "the field {} has more than one condition.",
                    field
                )))
            }
        };

        match Operator::from_name(name) {
            Operator::Undefined => Err(MockError::invalid(format!(
                "the operator {} is not supported.",
                name
            ))),
            operator => Self::compile(operator, value.as_str()),
        }
    }

    /// Operator this condition applies.
    pub fn operator(&self) -> Operator {
        match &self.predicate {
            Predicate::Equal(_) => Operator::Equal,
            Predicate::Contains(_) => Operator::Contains,
            Predicate::Pattern(_) => Operator::Pattern,
        }
    }

    /// Configured literal (the pattern source for regex conditions).
    pub fn value(&self) -> &str {
        match &self.predicate {
            Predicate::Equal(v) | Predicate::Contains(v) => v,
            Predicate::Pattern(regex) => regex.as_str(),
        }
    }

    /// Test an observed value.
    pub fn test(&self, observed: &str) -> bool {
        match &self.predicate {
            Predicate::Equal(expected) => observed == expected,
            Predicate::Contains(needle) => observed.contains(needle.as_str()),
            Predicate::Pattern(regex) => regex.is_match(observed),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.operator(), self.value())
    }
}

/// A condition on one named entry of a header or query mapping.
#[derive(Debug, Clone)]
pub struct FieldCondition {
    field: String,
    condition: Condition,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>, condition: Condition) -> Self {
        Self {
            field: field.into(),
            condition,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Test the named entry. A missing entry never matches.
    pub fn test(&self, fields: &HashMap<String, String>) -> bool {
        fields
            .get(&self.field)
            .map(|observed| self.condition.test(observed))
            .unwrap_or(false)
    }
}

/// Compile a `{field: {operator: value}}` mapping, one condition per field.
///
/// Field names pass through `normalize` so header names can be folded to
/// lowercase while query parameter names stay as given.
pub fn compile_field_conditions(
    descriptors: &BTreeMap<String, ConditionDescriptor>,
    normalize: impl Fn(&str) -> String,
) -> Result<Vec<FieldCondition>, MockError> {
    descriptors
        .iter()
        .map(|(field, descriptor)| {
            let condition = Condition::from_descriptor(field, descriptor)?;
            Ok(FieldCondition::new(normalize(field), condition))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(entries: &[(&str, &str)]) -> ConditionDescriptor {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn assert_invalid(result: Result<Condition, MockError>, fragment: &str) {
        match result {
            Err(MockError::InvalidRequest(cause)) => {
                assert!(cause.contains(fragment), "unexpected cause: {}", cause)
            }
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    fn compiled(operator: Operator, value: &str) -> Condition {
        Condition::compile(operator, value).unwrap()
    }

    #[test]
    fn test_equal_operator() {
        for s in ["", "abc", "/orders", "ünïcode"] {
            assert!(compiled(Operator::Equal, s).test(s));
        }
        assert!(!compiled(Operator::Equal, "abc").test("abd"));
        assert!(!compiled(Operator::Equal, "abc").test("ABC"));
    }

    #[test]
    fn test_contains_operator() {
        assert!(compiled(Operator::Contains, "zip").test("gzip, deflate"));
        assert!(!compiled(Operator::Contains, "br").test("gzip, deflate"));
        assert!(compiled(Operator::Contains, "").test(""));
        assert!(compiled(Operator::Contains, "").test("anything"));
        // Observed contains configured, not the other way round.
        assert!(!compiled(Operator::Contains, "gzip, deflate").test("gzip"));
    }

    #[test]
    fn test_pattern_operator_is_unanchored() {
        assert!(compiled(Operator::Pattern, "[0-9]+").test("/orders/42/items"));
        assert!(!compiled(Operator::Pattern, "^[0-9]+$").test("/orders/42"));
        assert!(compiled(Operator::Pattern, "^/orders/[0-9]+$").test("/orders/42"));
    }

    #[test]
    fn test_undefined_operator_cannot_be_compiled() {
        for value in ["", "a", ".*"] {
            assert_invalid(
                Condition::compile(Operator::Undefined, value),
                "the operator undefined is not supported.",
            );
        }
        assert_eq!(Operator::from_name("regex"), Operator::Undefined);
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(Operator::from_name("equal_to"), Operator::Equal);
        assert_eq!(Operator::from_name("contains"), Operator::Contains);
        assert_eq!(Operator::from_name("pattern"), Operator::Pattern);
        assert_eq!(Operator::from_name("starts_with"), Operator::Undefined);
        assert_eq!(Operator::from_name("EQUAL_TO"), Operator::Undefined);
        assert_eq!(Operator::Pattern.to_string(), "pattern");
    }

    #[test]
    fn test_compiled_condition_keeps_operator_and_value() {
        let cases = [
            (Operator::Equal, "/orders", "/orders", true),
            (Operator::Equal, "/orders", "/orders/1", false),
            (Operator::Contains, "order", "/orders", true),
            (Operator::Contains, "x", "/orders", false),
            (Operator::Pattern, "^/o.+s$", "/orders", true),
            (Operator::Pattern, "^/o.+s$", "/order", false),
        ];
        for (operator, configured, observed, expected) in cases {
            let condition = compiled(operator, configured);
            assert_eq!(condition.test(observed), expected, "{}", condition);
            assert_eq!(condition.operator(), operator);
            assert_eq!(condition.value(), configured);
        }
    }

    #[test]
    fn test_compile_rejects_malformed_pattern() {
        assert_invalid(Condition::compile(Operator::Pattern, "(unclosed"), "(unclosed");
        assert_invalid(Condition::compile(Operator::Pattern, "[a-"), "[a-");
    }

    #[test]
    fn test_from_descriptor() {
        let condition =
            Condition::from_descriptor("url", &descriptor(&[("contains", "order")])).unwrap();
        assert_eq!(condition.operator(), Operator::Contains);
        assert!(condition.test("/orders"));
    }

    #[test]
    fn test_from_descriptor_rejects_empty() {
        assert_invalid(Condition::from_descriptor("url", &descriptor(&[])), "url");
    }

    #[test]
    fn test_from_descriptor_rejects_unknown_operator() {
        assert_invalid(
            Condition::from_descriptor("url", &descriptor(&[("starts_with", "/a")])),
            "starts_with",
        );
    }

    #[test]
    fn test_from_descriptor_rejects_multiple_entries() {
        // The wire shape allows several operators per field, but which one
        // would apply is ambiguous, so registration refuses them.
        assert_invalid(
            Condition::from_descriptor(
                "body",
                &descriptor(&[("equal_to", "a"), ("contains", "b")]),
            ),
            "more than one condition",
        );
    }

    #[test]
    fn test_field_condition_missing_field_never_matches() {
        let fields = HashMap::from([("present".to_string(), "value".to_string())]);
        for operator in [Operator::Equal, Operator::Contains, Operator::Pattern] {
            let condition = FieldCondition::new("absent", compiled(operator, ""));
            assert!(!condition.test(&fields));
            assert!(!condition.test(&HashMap::new()));
        }
        let present = FieldCondition::new("present", compiled(Operator::Contains, ""));
        assert!(present.test(&fields));
    }

    #[test]
    fn test_compile_field_conditions_normalizes_names() {
        let descriptors = BTreeMap::from([
            ("Accept-Encoding".to_string(), descriptor(&[("contains", "gzip")])),
            ("X-Trace".to_string(), descriptor(&[("pattern", "^[a-f0-9]+$")])),
        ]);
        let conditions =
            compile_field_conditions(&descriptors, |name| name.to_ascii_lowercase()).unwrap();
        let fields: Vec<_> = conditions.iter().map(FieldCondition::field).collect();
        assert_eq!(fields, vec!["accept-encoding", "x-trace"]);
    }

    #[test]
    fn test_compile_field_conditions_names_failing_field() {
        let descriptors = BTreeMap::from([("page".to_string(), descriptor(&[]))]);
        match compile_field_conditions(&descriptors, str::to_string) {
            Err(MockError::InvalidRequest(cause)) => assert!(cause.contains("page")),
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }
}
