use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Executor, Sqlite};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Binds every value in order onto a `query`, `query_as` or `query_scalar`.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut q = $query;
        for value in $values {
            q = match value.clone() {
                $crate::utils::db_utils::SqlValue::Text(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::I64(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::F64(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Bool(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Date(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::DateTime(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Null => q.bind(None::<String>),
            };
        }
        q
    }};
}
pub(crate) use bind_values;

/// ===============================
/// Dynamic WHERE clause
/// ===============================
#[derive(Debug, Default)]
pub struct Filters {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl Filters {
    /// `clause` holds one `?` per value, in order.
    pub fn push(&mut self, clause: &str, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.extend(values);
        self
    }

    pub fn eq(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.push(&format!("{column} = ?"), [value.into()])
    }

    pub fn contains(&mut self, column: &str, needle: &str) -> &mut Self {
        self.push(&format!("{column} LIKE ?"), [SqlValue::Text(format!("%{needle}%"))])
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// `""` when empty, otherwise `" WHERE a AND b"`.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// ===============================
/// SQL update container
/// ===============================
/// Column names are `'static` so only code-level whitelists reach the SQL text.
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    id_column: &'static str,
    sets: Vec<(&'static str, SqlValue)>,
}

impl SqlUpdate {
    pub fn new(table: &'static str, id_column: &'static str) -> Self {
        Self {
            table,
            id_column,
            sets: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.sets.push((column, value.into()));
        self
    }

    /// Adds the column only when a value was supplied.
    pub fn set_opt<V: Into<SqlValue>>(&mut self, column: &'static str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.set(column, v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn to_sql(&self) -> String {
        let set_clause = self
            .sets
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, self.id_column
        )
    }

    /// Runs the update and returns the affected row count.
    pub async fn execute<'e, E>(&self, executor: E, id: impl Into<SqlValue>) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = self.to_sql();
        let values: Vec<SqlValue> = self
            .sets
            .iter()
            .map(|(_, v)| v.clone())
            .chain(std::iter::once(id.into()))
            .collect();

        let query = bind_values!(sqlx::query(&sql), &values);
        let result = query.execute(executor).await?;
        Ok(result.rows_affected())
    }
}
