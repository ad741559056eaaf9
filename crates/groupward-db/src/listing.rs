//! Running altered listing queries against SurrealDB.
//!
//! A [`SelectQuery`] is rendered as a `SELECT VALUE meta::id(id)` over its
//! base table. Existence checks become correlated subqueries; inside one,
//! the enclosing row is reachable as `$parent`, so a join condition may
//! reference its own table and the immediately enclosing one but nothing
//! further out.

use groupward_core::query::{
    Column, Condition, ConditionGroup, Conjunction, Operand, Operator, QueryError, SelectQuery,
    Value,
};
use surrealdb::{Connection, Surreal};

use crate::error::DbError;

/// SurrealQL text and the variables bound into it.
#[derive(Debug, Clone, PartialEq)]
pub struct SurqlStatement {
    pub sql: String,
    pub bindings: Vec<(String, serde_json::Value)>,
}

/// Render `query` as a statement returning the IDs of the rows it selects.
pub fn render_ids(query: &SelectQuery) -> Result<SurqlStatement, QueryError> {
    let mut renderer = Renderer {
        query,
        bindings: Vec::new(),
        scopes: vec![query.alias().to_string()],
    };
    let table = ident(query.table())?;
    let filter = if query.is_always_false() {
        "false".to_string()
    } else {
        renderer.group(query.conditions())?
    };
    Ok(SurqlStatement {
        sql: format!("SELECT VALUE meta::id(id) FROM {table} WHERE {filter}"),
        bindings: renderer.bindings,
    })
}

/// Execute `query` and return the record IDs it selects.
pub async fn list_ids<C: Connection>(
    db: &Surreal<C>,
    query: &SelectQuery,
) -> Result<Vec<String>, DbError> {
    if query.is_always_false() {
        return Ok(Vec::new());
    }
    let statement = render_ids(query)?;
    tracing::trace!(sql = %statement.sql, "running listing query");

    let mut builder = db.query(statement.sql);
    for binding in statement.bindings {
        builder = builder.bind(binding);
    }
    let result = builder.await.map_err(DbError::from)?;
    let mut result = result
        .check()
        .map_err(|e| DbError::Statement(e.to_string()))?;
    let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
    Ok(ids)
}

fn ident(name: &str) -> Result<String, QueryError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(QueryError::Unsupported(format!("identifier {name:?}")))
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

struct Renderer<'q> {
    query: &'q SelectQuery,
    bindings: Vec<(String, serde_json::Value)>,
    /// Aliases of the enclosing selects, innermost last.
    scopes: Vec<String>,
}

impl Renderer<'_> {
    fn bind(&mut self, value: &Value) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings.push((name.clone(), to_json(value)));
        format!("${name}")
    }

    fn column(&self, column: &Column) -> Result<String, QueryError> {
        self.query.table_for_alias(&column.alias)?;
        let name = ident(&column.name)?;
        let depth = self
            .scopes
            .iter()
            .rev()
            .position(|alias| *alias == column.alias)
            .ok_or_else(|| {
                QueryError::Unsupported(format!("{column} referenced outside its subquery"))
            })?;
        let record = match depth {
            0 => "",
            1 => "$parent.",
            _ => {
                return Err(QueryError::Unsupported(format!(
                    "{column} is more than one subquery out"
                )));
            }
        };
        Ok(if name == "id" {
            format!("meta::id({record}id)")
        } else {
            format!("{record}{name}")
        })
    }

    fn group(&mut self, group: &ConditionGroup) -> Result<String, QueryError> {
        if group.is_empty() {
            return Ok(match group.conjunction {
                Conjunction::And => "true".into(),
                Conjunction::Or => "false".into(),
            });
        }
        let glue = match group.conjunction {
            Conjunction::And => " AND ",
            Conjunction::Or => " OR ",
        };
        let mut parts = Vec::with_capacity(group.len());
        for condition in &group.conditions {
            parts.push(self.condition(condition)?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            format!("({})", parts.join(glue))
        })
    }

    fn condition(&mut self, condition: &Condition) -> Result<String, QueryError> {
        match condition {
            Condition::Compare {
                column,
                op,
                operand,
            } => {
                let left = self.column(column)?;
                match operand {
                    Operand::Column(other) => {
                        let right = self.column(other)?;
                        Ok(format!("{left} {} {right}", scalar_operator(*op)?))
                    }
                    Operand::Value(Value::Null) => Ok("false".into()),
                    Operand::Value(Value::List(items)) => {
                        let keyword = match op {
                            Operator::In if items.is_empty() => return Ok("false".into()),
                            Operator::NotIn if items.is_empty() => return Ok("true".into()),
                            Operator::In => "INSIDE",
                            Operator::NotIn => "NOTINSIDE",
                            other => {
                                return Err(QueryError::Unsupported(format!(
                                    "{other:?} against a list"
                                )));
                            }
                        };
                        let value = self.bind(&Value::List(items.clone()));
                        Ok(format!("{left} {keyword} {value}"))
                    }
                    Operand::Value(value) => {
                        let operator = scalar_operator(*op)?;
                        let value = self.bind(value);
                        Ok(format!("{left} {operator} {value}"))
                    }
                }
            }
            Condition::IsNull(column) => {
                let column = self.column(column)?;
                Ok(format!("({column} IS NONE OR {column} IS NULL)"))
            }
            Condition::IsNotNull(column) => {
                let column = self.column(column)?;
                Ok(format!("({column} IS NOT NONE AND {column} IS NOT NULL)"))
            }
            Condition::Group(group) => self.group(group),
            Condition::Exists {
                alias,
                negated,
                filter,
            } => {
                let query = self.query;
                let join = query
                    .join(alias)
                    .ok_or_else(|| QueryError::UnknownAlias(alias.clone()))?;
                let table = ident(&join.table)?;
                let mut inner = join.on.clone();
                if !filter.is_empty() {
                    inner.add_group(filter.clone());
                }

                self.scopes.push(join.alias.clone());
                let clause = self.group(&inner);
                self.scopes.pop();

                Ok(format!(
                    "array::len((SELECT VALUE true FROM {table} WHERE {} LIMIT 1)) {} 0",
                    clause?,
                    if *negated { "=" } else { ">" },
                ))
            }
        }
    }
}

fn scalar_operator(op: Operator) -> Result<&'static str, QueryError> {
    match op {
        Operator::Eq => Ok("="),
        Operator::NotEq => Ok("!="),
        other => Err(QueryError::Unsupported(format!("{other:?} against a scalar"))),
    }
}
