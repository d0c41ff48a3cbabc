//! INSERT statement node.

use std::collections::HashSet;

use super::{Expr, Ident, Node, NodeType, Table, Visitor};
use crate::error::{SqlError, SqlResult};
use crate::value::Value;

/// `INSERT INTO table (columns) VALUES (row), ...`.
///
/// Columns are order-significant: cell `i` of every row goes to
/// column `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: Table,
    pub columns: Vec<Ident>,
    pub rows: Vec<Vec<Expr>>,
    /// `RETURNING` columns; Postgres only.
    pub returning: Vec<Ident>,
}

impl InsertStmt {
    pub fn new(table: impl Into<Table>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a row of literals.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rows
            .push(values.into_iter().map(|v| Expr::Literal(v.into())).collect());
        self
    }

    /// Append a row of arbitrary cells (literals, params, arrays).
    pub fn row<I>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        self.rows.push(cells.into_iter().collect());
        self
    }

    pub fn returning<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Check the shape: unique columns, at least one row, every row as
    /// wide as the column list.
    pub fn validate(&self) -> SqlResult<()> {
        if self.columns.is_empty() {
            return Err(SqlError::render(format!(
                "INSERT into {} has no columns",
                self.table
            )));
        }
        let mut seen = HashSet::with_capacity(self.columns.len());
        for col in &self.columns {
            if !seen.insert(col.as_str()) {
                return Err(SqlError::render(format!("duplicate column '{}'", col)));
            }
        }
        if self.rows.is_empty() {
            return Err(SqlError::render(format!(
                "INSERT into {} has no rows",
                self.table
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(SqlError::render(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

impl Node for InsertStmt {
    fn node_type(&self) -> NodeType {
        NodeType::Insert
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_insert(self)
    }
}
