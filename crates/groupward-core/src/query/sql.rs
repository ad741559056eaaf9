//! Render a [`SelectQuery`] as parameterised standard SQL.

use super::{Condition, ConditionGroup, Conjunction, Operand, Operator, QueryError, SelectQuery, Value};

/// SQL text with `?` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn render(query: &SelectQuery) -> Result<SqlStatement, QueryError> {
    let mut params = Vec::new();
    let mut sql = format!(
        "SELECT {alias}.* FROM {table} AS {alias}",
        alias = ident(query.alias()),
        table = ident(query.table()),
    );

    if query.is_always_false() {
        sql.push_str(" WHERE 1 = 0");
    } else if !query.conditions().is_empty() {
        let clause = render_group(query, query.conditions(), &mut params)?;
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    Ok(SqlStatement { sql, params })
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_group(
    query: &SelectQuery,
    group: &ConditionGroup,
    params: &mut Vec<Value>,
) -> Result<String, QueryError> {
    if group.is_empty() {
        return Ok(match group.conjunction {
            Conjunction::And => "1 = 1".into(),
            Conjunction::Or => "1 = 0".into(),
        });
    }

    let glue = match group.conjunction {
        Conjunction::And => " AND ",
        Conjunction::Or => " OR ",
    };
    let parts = group
        .conditions
        .iter()
        .map(|condition| render_condition(query, condition, params))
        .collect::<Result<Vec<_>, _>>()?;

    if parts.len() == 1 {
        Ok(parts.into_iter().next().unwrap_or_default())
    } else {
        Ok(format!("({})", parts.join(glue)))
    }
}

fn render_condition(
    query: &SelectQuery,
    condition: &Condition,
    params: &mut Vec<Value>,
) -> Result<String, QueryError> {
    match condition {
        Condition::Compare {
            column,
            op,
            operand,
        } => {
            query.table_for_alias(&column.alias)?;
            let left = format!("{}.{}", ident(&column.alias), ident(&column.name));
            match operand {
                Operand::Column(other) => {
                    query.table_for_alias(&other.alias)?;
                    let right = format!("{}.{}", ident(&other.alias), ident(&other.name));
                    Ok(format!("{left} {} {right}", binary(*op)?))
                }
                Operand::Value(Value::List(items)) => {
                    let (keyword, empty) = match op {
                        Operator::In => ("IN", "1 = 0"),
                        Operator::NotIn => ("NOT IN", "1 = 1"),
                        other => {
                            return Err(QueryError::Unsupported(format!(
                                "{other:?} against a list"
                            )));
                        }
                    };
                    if items.is_empty() {
                        return Ok(empty.into());
                    }
                    let placeholders = vec!["?"; items.len()].join(", ");
                    params.extend(items.iter().cloned());
                    Ok(format!("{left} {keyword} ({placeholders})"))
                }
                Operand::Value(value) => {
                    params.push(value.clone());
                    Ok(format!("{left} {} ?", binary(*op)?))
                }
            }
        }
        Condition::IsNull(column) => {
            query.table_for_alias(&column.alias)?;
            Ok(format!("{}.{} IS NULL", ident(&column.alias), ident(&column.name)))
        }
        Condition::IsNotNull(column) => {
            query.table_for_alias(&column.alias)?;
            Ok(format!(
                "{}.{} IS NOT NULL",
                ident(&column.alias),
                ident(&column.name)
            ))
        }
        Condition::Group(group) => render_group(query, group, params),
        Condition::Exists {
            alias,
            negated,
            filter,
        } => {
            let join = query
                .join(alias)
                .ok_or_else(|| QueryError::UnknownAlias(alias.clone()))?;
            let mut inner = join.on.clone();
            if !filter.is_empty() {
                inner.add_group(filter.clone());
            }
            let clause = render_group(query, &inner, params)?;
            Ok(format!(
                "{}EXISTS (SELECT 1 FROM {} AS {} WHERE {clause})",
                if *negated { "NOT " } else { "" },
                ident(&join.table),
                ident(&join.alias),
            ))
        }
    }
}

fn binary(op: Operator) -> Result<&'static str, QueryError> {
    match op {
        Operator::Eq => Ok("="),
        Operator::NotEq => Ok("<>"),
        other => Err(QueryError::Unsupported(format!("{other:?} against a scalar"))),
    }
}
