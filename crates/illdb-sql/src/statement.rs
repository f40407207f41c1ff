//! Structured statements rendered to parameterized SQL.
//!
//! Only what the browser needs: selects with equality filters and an
//! optional `LIMIT`, and updates with equality filters. Identifiers are
//! backtick-quoted; values always travel as `?` parameters.

use std::fmt;

use crate::value::{Row, SqlValue};

/// Quote an identifier for MySQL, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `column = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: SqlValue,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<SqlValue>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }

    /// Whether a row satisfies this filter (used by in-memory evaluation).
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

fn where_clause(sql: &mut String, filters: &[Filter], params: &mut Vec<SqlValue>) {
    for (i, filter) in filters.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&quote_ident(&filter.column));
        sql.push_str(" = ?");
        params.push(filter.value.clone());
    }
}

/// `SELECT columns FROM table WHERE filters LIMIT n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub limit: Option<u64>,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render to SQL text and its bound parameters.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut sql = format!("SELECT {columns} FROM {}", quote_ident(&self.table));
        let mut params = Vec::with_capacity(self.filters.len());
        where_clause(&mut sql, &self.filters, &mut params);
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql().0)
    }
}

/// `UPDATE table SET assignments WHERE filters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, SqlValue)>,
    pub filters: Vec<Filter>,
}

impl Update {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            assignments: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.assignments.push((column.to_string(), value.into()));
        self
    }

    pub fn filter_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::with_capacity(self.assignments.len() + self.filters.len());
        let assignments = self
            .assignments
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!("{} = ?", quote_ident(column))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {assignments}", quote_ident(&self.table));
        where_clause(&mut sql, &self.filters, &mut params);
        (sql, params)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql().0)
    }
}
