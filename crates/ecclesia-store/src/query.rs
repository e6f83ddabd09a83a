//! Query description shared by all backends
//!
//! Filters are top-level field equality checks. Ordering compares JSON
//! values with [`compare_values`], which orders RFC 3339 timestamps
//! chronologically so `createdAt` sorts the same on every backend.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filters, optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`. A `null` value also matches a missing field.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    /// Shorthand for the tenant filter every church-scoped query starts with
    pub fn church(church_id: &str) -> Self {
        Self::new().filter("churchId", church_id)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn newest_first(self) -> Self {
        self.order_by("createdAt", Direction::Desc)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every filter
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|(field, expected)| {
            match doc.get(field) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            }
        })
    }

    /// Object holding the non-null filters, usable with jsonb containment
    pub fn containment(&self) -> Value {
        let mut object = Map::new();
        for (field, value) in &self.filters {
            if !value.is_null() {
                object.insert(field.clone(), value.clone());
            }
        }
        Value::Object(object)
    }

    /// Sort and truncate an already filtered result set
    pub fn apply_order_and_limit(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some(order) = &self.order_by {
            docs.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&order.field).unwrap_or(&Value::Null),
                    b.get(&order.field).unwrap_or(&Value::Null),
                );
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Total order over JSON scalars used for sorting
///
/// `null` sorts first. Two strings that both parse as RFC 3339 timestamps
/// compare as instants.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_equality_and_null() {
        let doc = json!({"churchId": "c1", "status": "PENDING"});

        assert!(Query::church("c1").matches(&doc));
        assert!(!Query::church("c2").matches(&doc));
        assert!(Query::new().filter("branchId", Value::Null).matches(&doc));
        assert!(!Query::new().filter("status", Value::Null).matches(&doc));
    }

    #[test]
    fn test_containment_skips_nulls() {
        let query = Query::church("c1").filter("branchId", Value::Null);
        assert_eq!(query.containment(), json!({"churchId": "c1"}));
    }

    #[test]
    fn test_timestamps_sort_chronologically() {
        let earlier = json!("2024-05-01T10:00:00Z");
        let later = json!("2024-05-01T10:00:00.500Z");
        // Lexicographic order would put the fractional timestamp first
        assert_eq!(compare_values(&earlier, &later), Ordering::Less);
    }

    #[test]
    fn test_order_and_limit() {
        let docs = vec![
            json!({"n": 2}),
            json!({"n": 3}),
            json!({"n": 1}),
            json!({}),
        ];
        let sorted = Query::new()
            .order_by("n", Direction::Desc)
            .limit(2)
            .apply_order_and_limit(docs);
        assert_eq!(sorted, vec![json!({"n": 3}), json!({"n": 2})]);
    }
}
