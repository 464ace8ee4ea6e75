//! Query construction and parsing.
//!
//! Queries are written either as JSON values (the form hooks observe and transform) or with
//! the typed [`Filter`] builder. Both end up as a [`Query`]: a list of [`Condition`]s of which
//! at least one must match.
//!
//! # JSON form
//!
//! ```ignore
//! use serde_json::json;
//!
//! // Field equality and operators
//! json!({ "city": "Oslo", "age": { "$gte": 18, "$lt": 65 } });
//!
//! // Logical nodes
//! json!({ "$or": [{ "city": "Oslo" }, { "city": "Bergen" }] });
//! json!({ "$not": [{ "banned": true }, { "age": { "$lt": 18 } }] });
//!
//! // A top-level array ORs its conditions together
//! json!([{ "city": "Oslo" }, { "age": 20 }]);
//! ```
//!
//! Unknown `$` operators are rejected when the query is parsed.
//!
//! # Filter Expression API
//!
//! ```ignore
//! use docstash::query::Filter;
//!
//! let condition = Filter::eq("city", "Oslo").and_field("age", Operator::Gte(18.into()));
//! let either = Filter::or([Filter::eq("city", "Oslo"), Filter::gt("age", 60)]);
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    document::{Document, json_type_name},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::DocumentEvaluator,
};

/// Sort direction for cursor results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> DocumentStoreResult<Self> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DocumentStoreError::validation(format!(
                "Sort order must be \"asc\" or \"desc\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

/// A single operator applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `$gt`
    Gt(Value),
    /// `$lt`
    Lt(Value),
    /// `$gte`
    Gte(Value),
    /// `$lte`
    Lte(Value),
    /// `$eq`
    Eq(Value),
    /// `$ne`
    Ne(Value),
    /// `$in`: the field value is one of the listed values.
    In(Vec<Value>),
    /// `$nin`: the field value is none of the listed values.
    Nin(Vec<Value>),
    /// `$or` nested under a field. Evaluated against the whole document; its result decides
    /// the entire condition.
    Or(Vec<Condition>),
    /// `$and` nested under a field. Same short-circuit rule as [`Operator::Or`].
    And(Vec<Condition>),
    /// `$not` nested under a field. Same short-circuit rule as [`Operator::Or`].
    Not(Vec<Condition>),
}

impl Operator {
    /// The operator tag as written in JSON queries.
    pub fn tag(&self) -> &'static str {
        match self {
            Operator::Gt(_) => "$gt",
            Operator::Lt(_) => "$lt",
            Operator::Gte(_) => "$gte",
            Operator::Lte(_) => "$lte",
            Operator::Eq(_) => "$eq",
            Operator::Ne(_) => "$ne",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Or(_) => "$or",
            Operator::And(_) => "$and",
            Operator::Not(_) => "$not",
        }
    }

    fn parse(tag: &str, operand: &Value) -> DocumentStoreResult<Self> {
        Ok(match tag {
            "$gt" => Operator::Gt(operand.clone()),
            "$lt" => Operator::Lt(operand.clone()),
            "$gte" => Operator::Gte(operand.clone()),
            "$lte" => Operator::Lte(operand.clone()),
            "$eq" => Operator::Eq(operand.clone()),
            "$ne" => Operator::Ne(operand.clone()),
            "$in" => Operator::In(expect_array(tag, operand)?.clone()),
            "$nin" => Operator::Nin(expect_array(tag, operand)?.clone()),
            "$or" => Operator::Or(parse_condition_list(tag, operand)?),
            "$and" => Operator::And(parse_condition_list(tag, operand)?),
            "$not" => Operator::Not(parse_negated(operand)?),
            other => {
                return Err(DocumentStoreError::validation(format!(
                    "Unknown query operator {other:?}"
                )));
            }
        })
    }

    fn operand_value(&self) -> Value {
        match self {
            Operator::Gt(v)
            | Operator::Lt(v)
            | Operator::Gte(v)
            | Operator::Lte(v)
            | Operator::Eq(v)
            | Operator::Ne(v) => v.clone(),
            Operator::In(values) | Operator::Nin(values) => Value::Array(values.clone()),
            Operator::Or(conditions) | Operator::And(conditions) | Operator::Not(conditions) => {
                conditions_to_value(conditions)
            }
        }
    }
}

/// What a single field of a field-map condition must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    /// The field must equal this value exactly.
    Literal(Value),
    /// Every operator must hold, visited in order.
    Operators(Vec<Operator>),
}

/// A predicate tree evaluated against one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Matches if any sub-condition matches.
    Or(Vec<Condition>),
    /// Matches if every sub-condition matches.
    And(Vec<Condition>),
    /// Matches if none of the sub-conditions match.
    Not(Vec<Condition>),
    /// Field-by-field predicates, visited in order. An empty list matches every document.
    Fields(Vec<(String, FieldPredicate)>),
}

impl Condition {
    /// A condition that matches every document.
    pub fn all() -> Self {
        Condition::Fields(Vec::new())
    }

    /// Parses a JSON object into a condition.
    ///
    /// An object holding `$or`, `$and` or `$not` is a logical node. When several of them (or
    /// field keys) appear together, the first of `$or`, `$and`, `$not` present wins and the
    /// other keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if the value is not an object, if an operand
    /// has the wrong shape or if an operator tag is unknown.
    pub fn parse(value: &Value) -> DocumentStoreResult<Self> {
        let map = value.as_object().ok_or_else(|| {
            DocumentStoreError::validation(format!(
                "A condition must be an object, found {}",
                json_type_name(value)
            ))
        })?;

        // Logical keys take precedence in this order; sibling keys are ignored.
        for logical in ["$or", "$and", "$not"] {
            if let Some(operand) = map.get(logical) {
                return Ok(match logical {
                    "$or" => Condition::Or(parse_condition_list(logical, operand)?),
                    "$and" => Condition::And(parse_condition_list(logical, operand)?),
                    _ => Condition::Not(parse_negated(operand)?),
                });
            }
        }

        let mut fields = Vec::with_capacity(map.len());

        for (field, predicate) in map {
            if field.starts_with('$') {
                return Err(DocumentStoreError::validation(format!(
                    "Unknown query operator {field:?}"
                )));
            }

            let predicate = match predicate {
                Value::Object(operators) => FieldPredicate::Operators(
                    operators
                        .iter()
                        .map(|(tag, operand)| Operator::parse(tag, operand))
                        .collect::<DocumentStoreResult<Vec<_>>>()?,
                ),
                literal => FieldPredicate::Literal(literal.clone()),
            };

            fields.push((field.clone(), predicate));
        }

        Ok(Condition::Fields(fields))
    }

    /// Adds a field predicate to a field-map condition.
    ///
    /// If this condition is a logical node, the result is an AND of this condition and the new
    /// field predicate.
    pub fn and_field(self, field: impl Into<String>, predicate: impl Into<FieldPredicate>) -> Self {
        match self {
            Condition::Fields(mut fields) => {
                fields.push((field.into(), predicate.into()));
                Condition::Fields(fields)
            }
            other => Condition::And(vec![
                other,
                Condition::Fields(vec![(field.into(), predicate.into())]),
            ]),
        }
    }

    /// Evaluates the condition against a document.
    pub fn matches(&self, document: &Document) -> bool {
        DocumentEvaluator::new(document).evaluate(self)
    }

    /// Converts the condition back into its JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            Condition::Or(conditions) => single("$or", conditions_to_value(conditions)),
            Condition::And(conditions) => single("$and", conditions_to_value(conditions)),
            Condition::Not(conditions) => single("$not", conditions_to_value(conditions)),
            Condition::Fields(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(field, predicate)| {
                        let value = match predicate {
                            FieldPredicate::Literal(value) => value.clone(),
                            FieldPredicate::Operators(operators) => Value::Object(
                                operators
                                    .iter()
                                    .map(|op| (op.tag().to_string(), op.operand_value()))
                                    .collect(),
                            ),
                        };
                        (field.clone(), value)
                    })
                    .collect(),
            ),
        }
    }
}

impl From<Operator> for FieldPredicate {
    fn from(op: Operator) -> Self {
        FieldPredicate::Operators(vec![op])
    }
}

impl From<Vec<Operator>> for FieldPredicate {
    fn from(ops: Vec<Operator>) -> Self {
        FieldPredicate::Operators(ops)
    }
}

impl From<Value> for FieldPredicate {
    fn from(value: Value) -> Self {
        FieldPredicate::Literal(value)
    }
}

impl TryFrom<&Value> for Condition {
    type Error = DocumentStoreError;

    fn try_from(value: &Value) -> DocumentStoreResult<Self> {
        Condition::parse(value)
    }
}

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        condition.to_value()
    }
}

/// A top-level query: a list of conditions combined with OR.
///
/// An empty list matches nothing, except for [`remove`](crate::collection::Collection::remove),
/// which treats it as "every document".
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The alternatives; a document matches if it matches any of them.
    pub conditions: Vec<Condition>,
}

impl Query {
    /// Creates a query from its alternatives.
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// A query matching every document (`{}`).
    pub fn all() -> Self {
        Self::new(vec![Condition::all()])
    }

    /// Parses a JSON query: one condition object or an array of them.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for any other shape or for an invalid
    /// condition.
    pub fn parse(value: &Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Object(_) => Ok(Self::new(vec![Condition::parse(value)?])),
            Value::Array(items) => Ok(Self::new(
                items
                    .iter()
                    .map(Condition::parse)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )),
            other => Err(DocumentStoreError::validation(format!(
                "Invalid query: expected an object or an array, found {}",
                json_type_name(other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns `true` if the document matches any condition.
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .any(|condition| condition.matches(document))
    }

    /// Converts the query back into JSON. Single-condition queries become a plain object.
    pub fn to_value(&self) -> Value {
        match self.conditions.as_slice() {
            [condition] => condition.to_value(),
            conditions => conditions_to_value(conditions),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Condition> for Query {
    fn from(condition: Condition) -> Self {
        Self::new(vec![condition])
    }
}

impl From<Vec<Condition>> for Query {
    fn from(conditions: Vec<Condition>) -> Self {
        Self::new(conditions)
    }
}

impl From<Query> for Value {
    fn from(query: Query) -> Self {
        query.to_value()
    }
}

/// Helper struct for constructing conditions.
///
/// Provides static methods to construct common conditions in a type-safe manner.
/// All methods accept field names as `Into<String>` and values as `Into<Value>`.
///
/// # Example
///
/// ```ignore
/// use docstash::query::Filter;
///
/// let adults_in_oslo = Filter::and([Filter::eq("city", "Oslo"), Filter::gte("age", 18)]);
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value (literal equality).
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Condition::Fields(vec![(field.into(), FieldPredicate::Literal(value.into()))])
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Self::op(field, Operator::Ne(value.into()))
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Self::op(field, Operator::Gt(value.into()))
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Self::op(field, Operator::Gte(value.into()))
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Self::op(field, Operator::Lt(value.into()))
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Condition {
        Self::op(field, Operator::Lte(value.into()))
    }

    /// Matches documents where the field equals one of the values.
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Condition {
        Self::op(field, Operator::In(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field equals none of the values.
    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Condition {
        Self::op(field, Operator::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents matching any of the conditions.
    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::Or(conditions.into_iter().collect())
    }

    /// Matches documents matching all of the conditions.
    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::And(conditions.into_iter().collect())
    }

    /// Matches documents matching none of the conditions.
    pub fn not(conditions: impl IntoIterator<Item = Condition>) -> Condition {
        Condition::Not(conditions.into_iter().collect())
    }

    fn op(field: impl Into<String>, op: Operator) -> Condition {
        Condition::Fields(vec![(field.into(), FieldPredicate::Operators(vec![op]))])
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn conditions_to_value(conditions: &[Condition]) -> Value {
    Value::Array(conditions.iter().map(Condition::to_value).collect())
}

fn expect_array<'v>(tag: &str, operand: &'v Value) -> DocumentStoreResult<&'v Vec<Value>> {
    operand.as_array().ok_or_else(|| {
        DocumentStoreError::validation(format!(
            "{tag} expects an array, found {}",
            json_type_name(operand)
        ))
    })
}

fn parse_condition_list(tag: &str, operand: &Value) -> DocumentStoreResult<Vec<Condition>> {
    expect_array(tag, operand)?
        .iter()
        .map(Condition::parse)
        .collect()
}

// $not takes either one condition or a list of them.
fn parse_negated(operand: &Value) -> DocumentStoreResult<Vec<Condition>> {
    match operand {
        Value::Array(items) => items.iter().map(Condition::parse).collect(),
        single => Ok(vec![Condition::parse(single)?]),
    }
}
