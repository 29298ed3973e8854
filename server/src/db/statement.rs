//! Parameterized SQL statements built from a tagged list of fragments.
//!
//! A statement is a sequence of literal SQL text and bound values. Placeholders
//! (`$1`, `$2`, ...) are only assigned when the statement is rendered, by the
//! position of each bound value in the sequence, and the value list is
//! collected in the same pass. Callers never write a placeholder number and
//! values never become part of the SQL text.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryAs};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(i64),
    Text(String),
    NullableText(Option<String>),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub(crate) fn bind<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::NullableText(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        }
    }

    pub(crate) fn bind_as<'q, O>(
        self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        match self {
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::NullableText(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        SqlValue::NullableText(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Sql(String),
    Bind(SqlValue),
}

/// A piece of SQL with the values it binds, e.g. `title = <value>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    prefix: String,
    value: SqlValue,
}

impl Clause {
    pub fn new(prefix: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            prefix: prefix.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlStatement {
    fragments: Vec<Fragment>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        let mut statement = Self::default();
        statement.push(sql);
        statement
    }

    pub fn push(&mut self, sql: impl Into<String>) -> &mut Self {
        self.fragments.push(Fragment::Sql(sql.into()));
        self
    }

    pub fn push_bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.fragments.push(Fragment::Bind(value.into()));
        self
    }

    fn push_clause(&mut self, clause: Clause) -> &mut Self {
        self.push(clause.prefix);
        self.push_bind(clause.value)
    }

    /// Appends the clauses joined by `separator`. Nothing is appended for an
    /// empty list.
    pub fn push_separated<I>(&mut self, clauses: I, separator: &str) -> &mut Self
    where
        I: IntoIterator<Item = Clause>,
    {
        for (i, clause) in clauses.into_iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.push_clause(clause);
        }
        self
    }

    /// Appends ` WHERE c1 AND c2 ...`, or nothing when there are no conditions.
    pub fn push_conditions<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = Clause>,
    {
        let conditions: Vec<Clause> = conditions.into_iter().collect();
        if !conditions.is_empty() {
            self.push(" WHERE ");
            self.push_separated(conditions, " AND ");
        }
        self
    }

    pub fn bind_count(&self) -> usize {
        self.fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Bind(_)))
            .count()
    }

    /// Rendered SQL text, for logging and tests.
    pub fn sql(&self) -> String {
        self.clone().render().0
    }

    /// Produces the SQL text and the values in placeholder order.
    pub fn render(self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut values = Vec::with_capacity(self.bind_count());

        for fragment in self.fragments {
            match fragment {
                Fragment::Sql(text) => sql.push_str(&text),
                Fragment::Bind(value) => {
                    values.push(value);
                    sql.push('$');
                    sql.push_str(&values.len().to_string());
                }
            }
        }

        (sql, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_follow_bind_order() {
        let mut statement = SqlStatement::new("SELECT * FROM t WHERE a = ");
        statement
            .push_bind(1_i64)
            .push(" AND b = ")
            .push_bind("x".to_string());

        let (sql, values) = statement.render();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(
            values,
            vec![SqlValue::BigInt(1), SqlValue::Text("x".to_string())]
        );
    }

    #[test]
    fn test_separated_clauses() {
        let mut statement = SqlStatement::new("UPDATE t SET ");
        statement.push_separated(
            vec![
                Clause::new("a = ", "one".to_string()),
                Clause::new("b = ", None::<String>),
            ],
            ", ",
        );

        assert_eq!(statement.sql(), "UPDATE t SET a = $1, b = $2");
        assert_eq!(statement.bind_count(), 2);
    }

    #[test]
    fn test_no_conditions_renders_no_where() {
        let mut statement = SqlStatement::new("SELECT * FROM t");
        statement.push_conditions(Vec::new());

        assert_eq!(statement.sql(), "SELECT * FROM t");
        assert_eq!(statement.bind_count(), 0);
    }

    #[test]
    fn test_conditions_joined_with_and() {
        let mut statement = SqlStatement::new("SELECT * FROM t");
        statement
            .push_conditions(vec![Clause::new("a >= ", 1_i64), Clause::new("a <= ", 9_i64)])
            .push(" LIMIT ")
            .push_bind(5_i64);

        let (sql, values) = statement.render();
        assert_eq!(sql, "SELECT * FROM t WHERE a >= $1 AND a <= $2 LIMIT $3");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_values_never_appear_in_sql_text() {
        let hostile = "'; DROP TABLE events; --".to_string();
        let mut statement = SqlStatement::new("SELECT * FROM events WHERE title = ");
        statement.push_bind(hostile.clone());

        let (sql, values) = statement.render();
        assert!(!sql.contains("DROP"));
        assert_eq!(values, vec![SqlValue::Text(hostile)]);
    }

    #[test]
    fn test_double_digit_placeholders() {
        let mut statement = SqlStatement::new("VALUES (");
        statement.push_separated((0..12_i64).map(|i| Clause::new("", i)), ", ");
        statement.push(")");

        let (sql, values) = statement.render();
        assert!(sql.ends_with("$11, $12)"));
        assert_eq!(values.len(), 12);
    }
}
