//! Relational model of an entity listing query.
//!
//! Access checks never load candidate rows. Instead they add condition
//! groups to a [`SelectQuery`] which storage renders into its own query
//! language ([`sql::render`] for SQL databases) or which
//! [`eval::evaluate`] runs against in-memory rows.
//!
//! Joins are registered once per alias through
//! [`SelectQuery::ensure_join`] and are consumed by
//! [`Condition::Exists`] predicates. A negated existence predicate is the
//! `LEFT JOIN ... IS NULL` pattern without duplicating base rows when
//! more than one joined row matches.

pub mod eval;
pub mod sql;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheableMetadata;
use crate::error::GroupError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown table alias: {0}")]
    UnknownAlias(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

impl From<QueryError> for GroupError {
    fn from(err: QueryError) -> Self {
        GroupError::Query(err.to_string())
    }
}

/// A literal value compared against a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a list value, dropping duplicates while keeping order.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut items: Vec<Value> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !items.contains(&value) {
                items.push(value);
            }
        }
        Value::List(items)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Str(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A column qualified by the alias of the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub alias: String,
    pub name: String,
}

impl Column {
    pub fn new(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.alias, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    In,
    NotIn,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    Column(Column),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conjunction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Compare {
        column: Column,
        op: Operator,
        operand: Operand,
    },
    IsNull(Column),
    IsNotNull(Column),
    Group(ConditionGroup),
    /// Holds when some row of the join registered under `alias` matches
    /// the join's `on` conditions and `filter` (or when none does, if
    /// `negated`).
    Exists {
        alias: String,
        negated: bool,
        filter: ConditionGroup,
    },
}

impl Condition {
    pub fn compare(column: Column, op: Operator, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column,
            op,
            operand: Operand::Value(value.into()),
        }
    }

    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Self::compare(column, Operator::Eq, value)
    }

    pub fn in_list<I, V>(column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::compare(column, Operator::In, Value::list(values))
    }

    pub fn not_in_list<I, V>(column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::compare(column, Operator::NotIn, Value::list(values))
    }

    pub fn columns_eq(column: Column, other: Column) -> Self {
        Condition::Compare {
            column,
            op: Operator::Eq,
            operand: Operand::Column(other),
        }
    }

    pub fn exists(alias: impl Into<String>, filter: ConditionGroup) -> Self {
        Condition::Exists {
            alias: alias.into(),
            negated: false,
            filter,
        }
    }

    pub fn not_exists(alias: impl Into<String>, filter: ConditionGroup) -> Self {
        Condition::Exists {
            alias: alias.into(),
            negated: true,
            filter,
        }
    }
}

/// An AND or OR group of conditions.
///
/// An empty AND group holds; an empty OR group never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conjunction: Conjunction,
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn and() -> Self {
        Self {
            conjunction: Conjunction::And,
            conditions: Vec::new(),
        }
    }

    pub fn or() -> Self {
        Self {
            conjunction: Conjunction::Or,
            conditions: Vec::new(),
        }
    }

    pub fn add(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn add_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.conditions.push(Condition::Group(group));
        self
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

/// A table joined into the query under its own alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub alias: String,
    pub table: String,
    /// Correlates joined rows with rows of other aliases.
    pub on: ConditionGroup,
}

impl Join {
    pub fn new(alias: impl Into<String>, table: impl Into<String>, on: ConditionGroup) -> Self {
        Self {
            alias: alias.into(),
            table: table.into(),
            on,
        }
    }
}

/// "List rows of `table`" plus everything access checks added to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectQuery {
    table: String,
    alias: String,
    joins: Vec<Join>,
    conditions: ConditionGroup,
    always_false: bool,
    metadata: CacheableMetadata,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            joins: Vec::new(),
            conditions: ConditionGroup::and(),
            always_false: false,
            metadata: CacheableMetadata::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// A column of the base table.
    pub fn column(&self, name: &str) -> Column {
        Column::new(self.alias.clone(), name)
    }

    /// AND a condition onto the query.
    pub fn condition(&mut self, condition: Condition) -> &mut Self {
        self.conditions.add(condition);
        self
    }

    pub fn conditions(&self) -> &ConditionGroup {
        &self.conditions
    }

    /// Register a join unless one already exists under `alias`.
    ///
    /// Returns the alias so callers can reference the join whether or not
    /// this call created it.
    pub fn ensure_join(&mut self, alias: &str, build: impl FnOnce() -> Join) -> String {
        if self.join(alias).is_none() {
            let mut join = build();
            join.alias = alias.to_string();
            self.joins.push(join);
        }
        alias.to_string()
    }

    pub fn join(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|join| join.alias == alias)
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Force the query to return no rows.
    pub fn always_false(&mut self) -> &mut Self {
        self.always_false = true;
        self
    }

    pub fn is_always_false(&self) -> bool {
        self.always_false
    }

    pub fn metadata(&self) -> &CacheableMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut CacheableMetadata {
        &mut self.metadata
    }

    /// Resolve the table behind `alias`, whether base or joined.
    pub fn table_for_alias(&self, alias: &str) -> Result<&str, QueryError> {
        if alias == self.alias {
            return Ok(&self.table);
        }
        self.join(alias)
            .map(|join| join.table.as_str())
            .ok_or_else(|| QueryError::UnknownAlias(alias.to_string()))
    }
}
