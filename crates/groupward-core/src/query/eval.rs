//! In-memory execution of a [`SelectQuery`].
//!
//! Comparisons follow SQL semantics closely enough for access filtering:
//! a comparison involving a missing or null value never holds.

use std::collections::{BTreeMap, HashMap};

use super::{Column, Condition, ConditionGroup, Conjunction, Operand, Operator, QueryError, SelectQuery, Value};

pub type Row = BTreeMap<String, Value>;

/// Rows keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tables: HashMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, K, V>(&mut self, table: &str, row: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let row: Row = row
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.tables.entry(table.to_string()).or_default().push(row);
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Scope of rows bound to aliases, innermost last.
struct Scope<'a> {
    bindings: Vec<(&'a str, &'a Row)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, column: &Column) -> Result<Value, QueryError> {
        self.bindings
            .iter()
            .rev()
            .find(|(alias, _)| *alias == column.alias)
            .map(|(_, row)| row.get(&column.name).cloned().unwrap_or(Value::Null))
            .ok_or_else(|| QueryError::UnknownAlias(column.alias.clone()))
    }
}

/// Return the base-table rows the query selects.
pub fn evaluate<'d>(query: &SelectQuery, dataset: &'d Dataset) -> Result<Vec<&'d Row>, QueryError> {
    if query.is_always_false() {
        return Ok(Vec::new());
    }

    let mut selected = Vec::new();
    for row in dataset.rows(query.table()) {
        let mut scope = Scope {
            bindings: vec![(query.alias(), row)],
        };
        if eval_group(query, dataset, query.conditions(), &mut scope)? {
            selected.push(row);
        }
    }
    Ok(selected)
}

/// Convenience: the values of `column` for every selected row.
pub fn select_column<'d>(
    query: &SelectQuery,
    dataset: &'d Dataset,
    column: &str,
) -> Result<Vec<&'d Value>, QueryError> {
    Ok(evaluate(query, dataset)?
        .into_iter()
        .filter_map(|row| row.get(column))
        .collect())
}

fn eval_group<'a>(
    query: &'a SelectQuery,
    dataset: &'a Dataset,
    group: &'a ConditionGroup,
    scope: &mut Scope<'a>,
) -> Result<bool, QueryError> {
    match group.conjunction {
        Conjunction::And => {
            for condition in &group.conditions {
                if !eval_condition(query, dataset, condition, scope)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Conjunction::Or => {
            for condition in &group.conditions {
                if eval_condition(query, dataset, condition, scope)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn eval_condition<'a>(
    query: &'a SelectQuery,
    dataset: &'a Dataset,
    condition: &'a Condition,
    scope: &mut Scope<'a>,
) -> Result<bool, QueryError> {
    match condition {
        Condition::Compare {
            column,
            op,
            operand,
        } => {
            let left = scope.lookup(column)?;
            let right = match operand {
                Operand::Value(value) => value.clone(),
                Operand::Column(other) => scope.lookup(other)?,
            };
            Ok(compare(&left, *op, &right))
        }
        Condition::IsNull(column) => Ok(scope.lookup(column)?.is_null()),
        Condition::IsNotNull(column) => Ok(!scope.lookup(column)?.is_null()),
        Condition::Group(group) => eval_group(query, dataset, group, scope),
        Condition::Exists {
            alias,
            negated,
            filter,
        } => {
            let join = query
                .join(alias)
                .ok_or_else(|| QueryError::UnknownAlias(alias.clone()))?;
            let mut found = false;
            for row in dataset.rows(&join.table) {
                scope.bindings.push((join.alias.as_str(), row));
                let matched = match eval_group(query, dataset, &join.on, scope) {
                    Ok(true) => eval_group(query, dataset, filter, scope),
                    other => other,
                };
                scope.bindings.pop();
                if matched? {
                    found = true;
                    break;
                }
            }
            Ok(found != *negated)
        }
    }
}

fn compare(left: &Value, op: Operator, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        Operator::Eq => left == right,
        Operator::NotEq => left != right,
        Operator::In => matches!(right, Value::List(items) if items.contains(left)),
        Operator::NotIn => matches!(right, Value::List(items) if !items.contains(left)),
    }
}
