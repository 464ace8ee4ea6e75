//! Condition evaluation against a single document.
//!
//! This module provides the matching engine behind every read and write operation. It walks a
//! parsed [`Condition`] tree and compares field values using native JSON ordering.
//!
//! # Field-level logical operators
//!
//! `$or`, `$and` and `$not` may appear inside a field's operator map. They are evaluated against
//! the whole document, and their result is returned as the result of the *entire* condition:
//! fields and operators not yet visited are skipped. For example
//! `{ "a": { "$or": [{ "x": 1 }] }, "b": 2 }` matches `{ "x": 1, "b": 3 }` because `a` is
//! visited first and its `$or` holds. This is long-standing query behavior and is kept as is.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Number, Value};

use crate::{
    document::Document,
    query::{Condition, FieldPredicate, Operator},
};

/// Type-erased, comparable representation of JSON values.
///
/// Integers compare exactly; a float compared with anything goes through `f64`, so `1` and `1.0`
/// are equal. Only numbers and strings are
/// ordered; everything else is equal-or-unequal only. `Missing` stands for an absent field and
/// is equal to nothing, including another `Missing`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Field not present in the document
    Missing,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value
    Number(&'a Number),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> Comparable<'a> {
    pub(crate) fn of_field(document: &'a Document, field: &str) -> Self {
        document
            .get(field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Missing)
    }
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value),
            Value::String(value) => Comparable::String(value),
            Value::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => {
                compare_numbers(a, b) == Some(Ordering::Equal)
            }
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => compare_numbers(a, b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two JSON numbers, exactly when both are integers.
fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    // Above i64::MAX on one side, negative on the other.
    if a.as_u64().is_some() && b.as_i64().is_some() {
        return Some(Ordering::Greater);
    }
    if a.as_i64().is_some() && b.as_u64().is_some() {
        return Some(Ordering::Less);
    }

    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// Outcome of checking one operator of a field-map condition.
enum Step {
    /// The operator holds; keep visiting.
    Continue,
    /// The whole condition is decided with this result.
    Decided(bool),
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Or(conditions) => self.any(conditions),
            Condition::And(conditions) => self.all(conditions),
            Condition::Not(conditions) => self.none(conditions),
            Condition::Fields(fields) => {
                for (field, predicate) in fields {
                    if let Step::Decided(result) = self.check_field(field, predicate) {
                        return result;
                    }
                }

                true
            }
        }
    }

    fn any(&self, conditions: &[Condition]) -> bool {
        conditions.iter().any(|c| self.evaluate(c))
    }

    fn all(&self, conditions: &[Condition]) -> bool {
        conditions.iter().all(|c| self.evaluate(c))
    }

    fn none(&self, conditions: &[Condition]) -> bool {
        !self.any(conditions)
    }

    fn check_field(&self, field: &str, predicate: &FieldPredicate) -> Step {
        let actual = Comparable::of_field(self.document, field);

        match predicate {
            FieldPredicate::Literal(expected) => {
                if actual == Comparable::from(expected) {
                    Step::Continue
                } else {
                    Step::Decided(false)
                }
            }
            FieldPredicate::Operators(operators) => {
                for op in operators {
                    let holds = match op {
                        Operator::Or(conditions) => return Step::Decided(self.any(conditions)),
                        Operator::And(conditions) => return Step::Decided(self.all(conditions)),
                        Operator::Not(conditions) => return Step::Decided(self.none(conditions)),
                        Operator::Eq(value) => actual == Comparable::from(value),
                        Operator::Ne(value) => actual != Comparable::from(value),
                        Operator::Gt(value) => ordered(&actual, value, |o| o == Ordering::Greater),
                        Operator::Gte(value) => ordered(&actual, value, |o| o != Ordering::Less),
                        Operator::Lt(value) => ordered(&actual, value, |o| o == Ordering::Less),
                        Operator::Lte(value) => ordered(&actual, value, |o| o != Ordering::Greater),
                        Operator::In(values) => values.iter().any(|v| actual == Comparable::from(v)),
                        Operator::Nin(values) => !values.iter().any(|v| actual == Comparable::from(v)),
                    };

                    if !holds {
                        return Step::Decided(false);
                    }
                }

                Step::Continue
            }
        }
    }
}

fn ordered(actual: &Comparable<'_>, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    actual
        .partial_cmp(&Comparable::from(expected))
        .map(accept)
        .unwrap_or(false)
}

/// Evaluates a condition against a document.
pub fn matches(document: &Document, condition: &Condition) -> bool {
    DocumentEvaluator::new(document).evaluate(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    fn cond(value: Value) -> Condition {
        Condition::parse(&value).unwrap()
    }

    #[test]
    fn comparison_operators_follow_native_ordering() {
        let d = doc(json!({ "age": 30, "name": "bob" }));

        for (v, gt, gte, lt, lte, eq) in [
            (20, true, true, false, false, false),
            (30, false, true, false, true, true),
            (40, false, false, true, true, false),
        ] {
            assert_eq!(matches(&d, &Filter::gt("age", v)), gt);
            assert_eq!(matches(&d, &Filter::gte("age", v)), gte);
            assert_eq!(matches(&d, &Filter::lt("age", v)), lt);
            assert_eq!(matches(&d, &Filter::lte("age", v)), lte);
            assert_eq!(matches(&d, &cond(json!({ "age": { "$eq": v } }))), eq);
            assert_eq!(matches(&d, &Filter::ne("age", v)), !eq);
        }

        assert!(matches(&d, &Filter::gt("name", "alice")));
        assert!(matches(&d, &Filter::lt("name", "carol")));
    }

    #[test]
    fn mismatched_types_do_not_order() {
        let d = doc(json!({ "age": "30" }));

        assert!(!matches(&d, &Filter::gt("age", 10)));
        assert!(!matches(&d, &Filter::lt("age", 10)));
    }

    #[test]
    fn integers_and_floats_compare_by_value() {
        let d = doc(json!({ "score": 1 }));

        assert!(matches(&d, &Filter::eq("score", 1.0)));
        assert!(matches(&d, &Filter::gte("score", 0.5)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = (1u64 << 53) + 1;
        let d = doc(json!({ "n": big, "m": u64::MAX }));

        assert!(!matches(&d, &Filter::eq("n", 1u64 << 53)));
        assert!(matches(&d, &Filter::gt("n", 1u64 << 53)));
        assert!(matches(&d, &Filter::eq("n", big)));
        assert!(matches(&d, &Filter::gt("m", -1)));
        assert!(matches(&d, &Filter::lt("n", 1e300)));
    }

    #[test]
    fn literal_equality_is_case_sensitive() {
        let d = doc(json!({ "city": "New York" }));

        assert!(matches(&d, &cond(json!({ "city": "New York" }))));
        assert!(!matches(&d, &cond(json!({ "city": "new york" }))));
    }

    #[test]
    fn missing_fields_equal_nothing() {
        let d = doc(json!({ "a": null }));

        assert!(matches(&d, &Filter::eq("a", Value::Null)));
        assert!(!matches(&d, &Filter::eq("b", Value::Null)));
        assert!(matches(&d, &Filter::ne("b", 1)));
        assert!(!matches(&d, &Filter::is_in("b", [1, 2])));
        assert!(matches(&d, &Filter::not_in("b", [1, 2])));
        assert!(!matches(&d, &Filter::gt("b", 1)));
    }

    #[test]
    fn membership_operators() {
        let d = doc(json!({ "tag": "red", "dims": [1, 2] }));

        assert!(matches(&d, &Filter::is_in("tag", ["red", "blue"])));
        assert!(!matches(&d, &Filter::not_in("tag", ["red", "blue"])));
        assert!(matches(&d, &cond(json!({ "dims": { "$in": [[1, 2], [3]] } }))));
    }

    #[test]
    fn logical_nodes() {
        let d = doc(json!({ "a": 1, "b": 2 }));
        let yes = Filter::eq("a", 1);
        let no = Filter::eq("b", 3);

        assert!(matches(&d, &Filter::and([yes.clone(), yes.clone()])));
        assert!(!matches(&d, &Filter::and([yes.clone(), no.clone()])));
        assert!(matches(&d, &Filter::or([no.clone(), yes.clone()])));
        assert!(!matches(&d, &Filter::or([no.clone(), no.clone()])));
        assert!(matches(&d, &Filter::not([no.clone(), no.clone()])));
        assert!(!matches(&d, &Filter::not([no.clone(), yes.clone()])));
        assert!(!matches(&d, &cond(json!({ "$not": { "a": 1 } }))));
        assert!(matches(&d, &Filter::and([])));
        assert!(!matches(&d, &Filter::or([])));
    }

    #[test]
    fn multiple_fields_must_all_hold() {
        let d = doc(json!({ "a": 1, "b": 2 }));

        assert!(matches(&d, &cond(json!({ "a": 1, "b": { "$gt": 1, "$lt": 3 } }))));
        assert!(!matches(&d, &cond(json!({ "a": 1, "b": { "$gt": 1, "$lt": 2 } }))));
        assert!(matches(&d, &Condition::all()));
    }

    #[test]
    fn field_level_logical_operators_decide_the_whole_condition() {
        let d = doc(json!({ "x": 1, "b": 3 }));

        // "a" is visited before "b"; its $or holds, so "b": 2 is never checked.
        let condition = cond(json!({ "a": { "$or": [{ "x": 1 }] }, "b": 2 }));
        assert!(matches(&d, &condition));

        // Operators after a nested $and in the same map are skipped as well.
        let condition = Filter::eq("b", 3).and_field(
            "c",
            vec![Operator::And(vec![Filter::eq("x", 1)]), Operator::Eq(json!("never"))],
        );
        assert!(matches(&d, &condition));

        // A failing nested $not decides false even when later fields would match.
        let condition = Condition::Fields(vec![
            ("a".to_string(), Operator::Not(vec![Filter::eq("x", 1)]).into()),
            ("b".to_string(), FieldPredicate::Literal(json!(3))),
        ]);
        assert!(!matches(&d, &condition));
    }
}
