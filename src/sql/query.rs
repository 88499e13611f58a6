//! Store-neutral query object built up by search handlers and hooks.

use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    NotBetween,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `column {operator} value` predicate. `In`/`NotIn` take an array value,
/// `Between`/`NotBetween` a two-element array, `IsNull`/`IsNotNull` ignore it.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Conditions are ANDed; orders apply before the implicit id tiebreaker.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub orders: Vec<Order>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, operator: Operator, value: Value) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            operator,
            value,
        });
        self
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(column, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.filter(column, Operator::IsNotNull, Value::Null)
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chaining_accumulates_clauses_in_order() {
        let q = Query::new()
            .filter("age", Operator::Gte, json!(10))
            .is_null("deleted_at")
            .order_by("created_at", Direction::Desc)
            .offset(20)
            .limit(10);
        assert_eq!(q.conditions.len(), 2);
        assert_eq!(q.conditions[0].operator.as_sql(), ">=");
        assert_eq!(q.conditions[1].column, "deleted_at");
        assert_eq!(q.orders[0].direction, Direction::Desc);
        assert_eq!((q.offset, q.limit), (Some(20), Some(10)));
    }
}
