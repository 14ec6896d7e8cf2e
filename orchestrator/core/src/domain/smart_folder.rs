// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Smart Folder Value Objects
//!
//! A smart folder stores a filter set and a list of aggregations instead of
//! children. Filters are `(field, operator, value)` triples combined with AND.
//! Aggregations reduce one field of the filtered node set with a named
//! formula; an unknown formula or field fails the whole evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use regex::Regex;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "match")]
    Match,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl NodeFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn test(&self, node: &Node, pattern: Option<&Regex>) -> bool {
        let actual = node.field_value(&self.field);
        match self.operator {
            FilterOperator::Eq => actual.as_ref() == Some(&self.value),
            FilterOperator::Ne => actual.as_ref() != Some(&self.value),
            FilterOperator::Lt => compare(actual.as_ref(), &self.value).is_some_and(|o| o.is_lt()),
            FilterOperator::Lte => compare(actual.as_ref(), &self.value).is_some_and(|o| o.is_le()),
            FilterOperator::Gt => compare(actual.as_ref(), &self.value).is_some_and(|o| o.is_gt()),
            FilterOperator::Gte => compare(actual.as_ref(), &self.value).is_some_and(|o| o.is_ge()),
            FilterOperator::In => match (&actual, &self.value) {
                (Some(v), Value::Array(options)) => options.contains(v),
                _ => false,
            },
            FilterOperator::NotIn => match (&actual, &self.value) {
                (Some(v), Value::Array(options)) => !options.contains(v),
                (None, _) => true,
                _ => false,
            },
            FilterOperator::Contains => match (&actual, &self.value) {
                (Some(Value::Array(items)), v) => items.contains(v),
                (Some(Value::String(s)), Value::String(needle)) => s.contains(needle.as_str()),
                _ => false,
            },
            FilterOperator::Match => match (&actual, pattern) {
                (Some(Value::String(s)), Some(re)) => re.is_match(s),
                _ => false,
            },
        }
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter on '{field}' has an invalid pattern: {reason}")]
    InvalidPattern { field: String, reason: String },
}

/// Filters prepared for one query. `match` patterns are compiled here, once,
/// and an invalid pattern rejects the whole query.
pub struct FilterSet<'a> {
    filters: Vec<(&'a NodeFilter, Option<Regex>)>,
}

impl<'a> FilterSet<'a> {
    pub fn compile(filters: &'a [NodeFilter]) -> Result<Self, FilterError> {
        let filters = filters
            .iter()
            .map(|filter| {
                if filter.operator != FilterOperator::Match {
                    return Ok((filter, None));
                }
                let invalid = |reason: String| FilterError::InvalidPattern {
                    field: filter.field.clone(),
                    reason,
                };
                let pattern = filter
                    .value
                    .as_str()
                    .ok_or_else(|| invalid("pattern must be a string".to_string()))?;
                let re = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
                Ok((filter, Some(re)))
            })
            .collect::<Result<Vec<_>, FilterError>>()?;
        Ok(Self { filters })
    }

    /// All filters hold (AND).
    pub fn matches(&self, node: &Node) -> bool {
        self.filters
            .iter()
            .all(|(filter, pattern)| filter.test(node, pattern.as_ref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFormula {
    Count,
    Sum,
    Avg,
    Med,
    Max,
    Min,
}

impl FromStr for AggregationFormula {
    type Err = AggregationFormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "med" => Ok(Self::Med),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(AggregationFormulaError::UnknownFormula(other.to_string())),
        }
    }
}

/// Declared aggregation. The formula is kept as written so a stored smart
/// folder with a bad formula still loads and fails at evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub title: String,
    pub field: String,
    pub formula: String,
}

impl Aggregation {
    pub fn new(title: impl Into<String>, field: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            field: field.into(),
            formula: formula.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartFolderSpec {
    #[serde(default)]
    pub filters: Vec<NodeFilter>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationFormulaError {
    #[error("unknown aggregation formula '{0}'")]
    UnknownFormula(String),

    #[error("aggregation '{title}' references unknown field '{field}'")]
    UnknownField { title: String, field: String },

    #[error("aggregation '{title}' needs numeric values but field '{field}' is not numeric")]
    NonNumericField { title: String, field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub nodes: Vec<Node>,
    /// Aggregation results keyed by aggregation title.
    pub aggregations: BTreeMap<String, Value>,
}

/// Compute every aggregation over `nodes`. All-or-nothing: the first invalid
/// aggregation aborts the evaluation.
pub fn aggregate(
    aggregations: &[Aggregation],
    nodes: &[Node],
) -> Result<BTreeMap<String, Value>, AggregationFormulaError> {
    let mut results = BTreeMap::new();
    for aggregation in aggregations {
        let value = aggregate_one(aggregation, nodes)?;
        results.insert(aggregation.title.clone(), value);
    }
    Ok(results)
}

fn aggregate_one(aggregation: &Aggregation, nodes: &[Node]) -> Result<Value, AggregationFormulaError> {
    let formula: AggregationFormula = aggregation.formula.parse()?;

    let values: Vec<Value> = nodes
        .iter()
        .filter_map(|n| n.field_value(&aggregation.field))
        .collect();

    // A field is known when it is a node attribute or at least one node carries it.
    if values.is_empty() && !Node::is_builtin_field(&aggregation.field) {
        return Err(AggregationFormulaError::UnknownField {
            title: aggregation.title.clone(),
            field: aggregation.field.clone(),
        });
    }

    let reduce: fn(&mut Vec<f64>) -> f64 = match formula {
        AggregationFormula::Count => return Ok(Value::from(values.len())),
        AggregationFormula::Sum => |n| n.iter().sum(),
        AggregationFormula::Avg => |n| n.iter().sum::<f64>() / n.len() as f64,
        AggregationFormula::Max => |n| n.iter().cloned().fold(f64::MIN, f64::max),
        AggregationFormula::Min => |n| n.iter().cloned().fold(f64::MAX, f64::min),
        AggregationFormula::Med => |n| {
            n.sort_by(|a, b| a.total_cmp(b));
            let mid = n.len() / 2;
            if n.len() % 2 == 0 {
                (n[mid - 1] + n[mid]) / 2.0
            } else {
                n[mid]
            }
        },
    };

    let mut numbers = values
        .iter()
        .map(|v| v.as_f64())
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| AggregationFormulaError::NonNumericField {
            title: aggregation.title.clone(),
            field: aggregation.field.clone(),
        })?;

    if numbers.is_empty() {
        return Ok(match formula {
            AggregationFormula::Sum => Value::from(0),
            _ => Value::Null,
        });
    }

    let result = reduce(&mut numbers);

    Ok(serde_json::Number::from_f64(result)
        .map(Value::Number)
        .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{NodeId, NodeVariant};
    use crate::domain::permission::PermissionSet;
    use chrono::Utc;
    use serde_json::json;

    fn node(title: &str, mimetype: &str, amount: Option<i64>) -> Node {
        let now = Utc::now();
        let mut properties = serde_json::Map::new();
        if let Some(a) = amount {
            properties.insert("amount".to_string(), json!(a));
        }
        Node {
            uuid: NodeId::new(),
            title: title.to_string(),
            parent: NodeId::ROOT,
            owner: "alice@example.com".to_string(),
            group: "eng".to_string(),
            permissions: PermissionSet::default(),
            mimetype: mimetype.to_string(),
            variant: NodeVariant::File,
            size: 10,
            aspects: vec!["invoice".to_string()],
            properties,
            smart_folder: None,
            created_at: now,
            modified_at: now,
        }
    }

    fn hit(filter: NodeFilter, node: &Node) -> bool {
        FilterSet::compile(std::slice::from_ref(&filter)).unwrap().matches(node)
    }

    #[test]
    fn test_filter_operators() {
        let n = node("invoice-2024.pdf", "application/pdf", Some(30));
        assert!(hit(NodeFilter::new("mimetype", FilterOperator::Eq, "application/pdf"), &n));
        assert!(hit(NodeFilter::new("amount", FilterOperator::Gt, 10), &n));
        assert!(!hit(NodeFilter::new("amount", FilterOperator::Lt, 10), &n));
        assert!(hit(NodeFilter::new("aspects", FilterOperator::Contains, "invoice"), &n));
        assert!(hit(NodeFilter::new("title", FilterOperator::Match, "^invoice-\\d+"), &n));
        assert!(hit(NodeFilter::new("mimetype", FilterOperator::In, json!(["application/pdf", "image/png"])), &n));
        assert!(hit(NodeFilter::new("missing", FilterOperator::NotIn, json!(["x"])), &n));
    }

    #[test]
    fn test_filters_combine_with_and() {
        let n = node("invoice-2024.pdf", "application/pdf", Some(30));
        let filters = vec![
            NodeFilter::new("mimetype", FilterOperator::Eq, "application/pdf"),
            NodeFilter::new("amount", FilterOperator::Gte, 50),
        ];
        assert!(!FilterSet::compile(&filters).unwrap().matches(&n));
        assert!(FilterSet::compile(&filters[..1]).unwrap().matches(&n));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let unbalanced = [NodeFilter::new("title", FilterOperator::Match, "invoice-(")];
        assert!(matches!(
            FilterSet::compile(&unbalanced),
            Err(FilterError::InvalidPattern { ref field, .. }) if field == "title"
        ));

        let not_a_string = [NodeFilter::new("title", FilterOperator::Match, 7)];
        assert!(FilterSet::compile(&not_a_string).is_err());
    }

    #[test]
    fn test_aggregations() {
        let nodes = vec![
            node("a", "application/pdf", Some(10)),
            node("b", "application/pdf", Some(20)),
            node("c", "application/pdf", Some(60)),
        ];
        let aggs = vec![
            Aggregation::new("total", "amount", "sum"),
            Aggregation::new("how many", "amount", "count"),
            Aggregation::new("average", "amount", "avg"),
            Aggregation::new("median", "amount", "med"),
            Aggregation::new("largest", "amount", "max"),
            Aggregation::new("smallest", "size", "min"),
        ];
        let results = aggregate(&aggs, &nodes).unwrap();
        assert_eq!(results["total"], json!(90.0));
        assert_eq!(results["how many"], json!(3));
        assert_eq!(results["average"], json!(30.0));
        assert_eq!(results["median"], json!(20.0));
        assert_eq!(results["largest"], json!(60.0));
        assert_eq!(results["smallest"], json!(10.0));
    }

    #[test]
    fn test_unknown_formula_fails() {
        let nodes = vec![node("a", "application/pdf", Some(10))];
        let err = aggregate(&[Aggregation::new("x", "amount", "stddev")], &nodes).unwrap_err();
        assert_eq!(err, AggregationFormulaError::UnknownFormula("stddev".to_string()));
    }

    #[test]
    fn test_unknown_field_fails_whole_evaluation() {
        let nodes = vec![node("a", "application/pdf", Some(10))];
        let aggs = vec![
            Aggregation::new("total", "amount", "sum"),
            Aggregation::new("bogus", "no_such_field", "sum"),
        ];
        assert!(matches!(
            aggregate(&aggs, &nodes),
            Err(AggregationFormulaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_non_numeric_field_fails() {
        let nodes = vec![node("a", "application/pdf", Some(10))];
        assert!(matches!(
            aggregate(&[Aggregation::new("t", "title", "sum")], &nodes),
            Err(AggregationFormulaError::NonNumericField { .. })
        ));
    }
}
