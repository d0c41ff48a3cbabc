//! SQL rendering visitor and the context that supplies it.
//!
//! The compiler never builds visitors itself: a [`Context`] hands one
//! out per render. [`SqlVisitor`] is the stock implementation.

use std::collections::HashMap;

use crate::ast::{Array, Ident, InsertStmt, Node, Param, Table, Visitor};
use crate::dialect::{Dialect, DialectKind};
use crate::error::{SqlError, SqlResult};
use crate::value::Value;

/// Output of a render: SQL text plus the bind slots in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<Param>,
}

/// A visitor that accumulates SQL text.
pub trait RenderVisitor: Visitor {
    fn dialect(&self) -> &dyn Dialect;

    fn as_visitor(&mut self) -> &mut dyn Visitor;

    /// Take the accumulated output, leaving the visitor empty.
    fn finish(&mut self) -> Rendered;
}

/// Table metadata used to check statements before rendering.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<String, Vec<String>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, C>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.tables
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Known columns of a table, keyed by its display name (`schema.table`).
    pub fn columns(&self, table: &Table) -> Option<&[String]> {
        self.tables.get(&table.to_string()).map(Vec::as_slice)
    }
}

/// Supplies a visitor and schema metadata to the compiler.
pub trait Context: Send + Sync {
    fn dialect(&self) -> &'static dyn Dialect;

    fn schema(&self) -> &Schema;

    fn visitor(&self) -> Box<dyn RenderVisitor + '_>;
}

/// A fixed dialect plus schema.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    dialect: DialectKind,
    schema: Schema,
}

impl StaticContext {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            schema: Schema::default(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }
}

impl Context for StaticContext {
    fn dialect(&self) -> &'static dyn Dialect {
        self.dialect.dialect()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn visitor(&self) -> Box<dyn RenderVisitor + '_> {
        Box::new(SqlVisitor::new(self.dialect()).with_schema(&self.schema))
    }
}

/// Renders nodes to SQL with a dialect.
pub struct SqlVisitor<'a> {
    dialect: &'a dyn Dialect,
    schema: Option<&'a Schema>,
    sql: String,
    args: Vec<Param>,
}

impl<'a> SqlVisitor<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            schema: None,
            sql: String::with_capacity(128),
            args: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    fn push_list<T: Node>(&mut self, items: &[T]) -> SqlResult<()> {
        self.sql.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            item.accept(self)?;
        }
        self.sql.push(')');
        Ok(())
    }

    fn check_columns(&self, stmt: &InsertStmt) -> SqlResult<()> {
        let Some(known) = self.schema.and_then(|s| s.columns(&stmt.table)) else {
            return Ok(());
        };
        for col in stmt.columns.iter().chain(&stmt.returning) {
            if !known.iter().any(|k| k == col.as_str()) {
                return Err(SqlError::render(format!(
                    "table {} has no column '{}'",
                    stmt.table, col
                )));
            }
        }
        Ok(())
    }
}

impl Visitor for SqlVisitor<'_> {
    fn visit_table(&mut self, table: &Table) -> SqlResult<()> {
        if let Some(schema) = &table.schema {
            self.sql.push_str(&self.dialect.quote_identifier(schema));
            self.sql.push('.');
        }
        self.sql.push_str(&self.dialect.quote_identifier(&table.name));
        Ok(())
    }

    fn visit_column(&mut self, column: &Ident) -> SqlResult<()> {
        self.sql.push_str(&self.dialect.quote_identifier(column.as_str()));
        Ok(())
    }

    fn visit_literal(&mut self, value: &Value) -> SqlResult<()> {
        if matches!(value, Value::Vector(_)) && !self.dialect.supports_vector() {
            return Err(SqlError::render(format!(
                "{} does not support vector values",
                self.dialect.name()
            )));
        }
        self.sql.push_str(&self.dialect.render_value(value));
        Ok(())
    }

    fn visit_param(&mut self, param: &Param) -> SqlResult<()> {
        self.args.push(param.clone());
        self.sql.push_str(&self.dialect.placeholder(self.args.len()));
        Ok(())
    }

    fn visit_array(&mut self, array: &Array) -> SqlResult<()> {
        if array.is_empty() {
            return Err(SqlError::render("cannot render an empty list"));
        }
        self.push_list(array.values())
    }

    fn visit_insert(&mut self, stmt: &InsertStmt) -> SqlResult<()> {
        stmt.validate()?;
        self.check_columns(stmt)?;
        if !stmt.returning.is_empty() && !self.dialect.supports_returning() {
            return Err(SqlError::render(format!(
                "{} does not support INSERT ... RETURNING",
                self.dialect.name()
            )));
        }

        self.sql.push_str("INSERT INTO ");
        stmt.table.accept(self)?;
        self.sql.push(' ');
        self.push_list(&stmt.columns)?;
        self.sql.push_str(" VALUES ");
        for (i, row) in stmt.rows.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_list(row)?;
        }
        if !stmt.returning.is_empty() {
            self.sql.push_str(" RETURNING ");
            for (i, col) in stmt.returning.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                col.accept(self)?;
            }
        }
        Ok(())
    }
}

impl RenderVisitor for SqlVisitor<'_> {
    fn dialect(&self) -> &dyn Dialect {
        self.dialect
    }

    fn as_visitor(&mut self) -> &mut dyn Visitor {
        self
    }

    fn finish(&mut self) -> Rendered {
        Rendered {
            sql: std::mem::take(&mut self.sql),
            args: std::mem::take(&mut self.args),
        }
    }
}
