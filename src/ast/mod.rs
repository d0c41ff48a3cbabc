//! Statement AST.
//!
//! Node kinds are closed; rendering lives in [`Visitor`] implementations.
//! Every node dispatches to the visitor method for its own kind, so a
//! new kind means a new required `visit_*` method and every visitor
//! stops compiling until it handles it.

mod array;
mod insert;

pub use array::{Array, ArrayPool, PooledArray};
pub use insert::InsertStmt;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SqlResult;
use crate::value::Value;

/// Kind discriminant for fast dispatch without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Table,
    Column,
    Literal,
    Param,
    Array,
    Insert,
}

/// A renderable AST node.
pub trait Node {
    fn node_type(&self) -> NodeType;

    /// Call the visitor method for this node's kind, passing `self`.
    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()>;
}

/// Double-dispatch consumer of AST nodes.
pub trait Visitor {
    fn visit_table(&mut self, table: &Table) -> SqlResult<()>;
    fn visit_column(&mut self, column: &Ident) -> SqlResult<()>;
    fn visit_literal(&mut self, value: &Value) -> SqlResult<()>;
    fn visit_param(&mut self, param: &Param) -> SqlResult<()>;
    fn visit_array(&mut self, array: &Array) -> SqlResult<()>;
    fn visit_insert(&mut self, stmt: &InsertStmt) -> SqlResult<()>;
}

/// A table reference, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl From<&str> for Table {
    fn from(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => Table::new(table).in_schema(schema),
            None => Table::new(name),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Node for Table {
    fn node_type(&self) -> NodeType {
        NodeType::Table
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_table(self)
    }
}

/// A bare column identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident(pub String);

impl Ident {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident(s.to_string())
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Ident(s)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Node for Ident {
    fn node_type(&self) -> NodeType {
        NodeType::Column
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_column(self)
    }
}

impl Node for Value {
    fn node_type(&self) -> NodeType {
        NodeType::Literal
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_literal(self)
    }
}

/// A bind slot whose value is supplied per call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Param {
    /// `:name`
    Named(String),
    /// 1-based index into the call's positional arguments.
    Positional(usize),
}

impl Param {
    pub fn named(name: impl Into<String>) -> Self {
        Param::Named(name.into())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Named(name) => write!(f, ":{}", name),
            Param::Positional(n) => write!(f, "${}", n),
        }
    }
}

impl Node for Param {
    fn node_type(&self) -> NodeType {
        NodeType::Param
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        visitor.visit_param(self)
    }
}

/// A cell of an INSERT row.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Param(Param),
    Array(Array),
    Column(Ident),
}

impl Node for Expr {
    fn node_type(&self) -> NodeType {
        match self {
            Expr::Literal(v) => v.node_type(),
            Expr::Param(p) => p.node_type(),
            Expr::Array(a) => a.node_type(),
            Expr::Column(c) => c.node_type(),
        }
    }

    fn accept(&self, visitor: &mut dyn Visitor) -> SqlResult<()> {
        match self {
            Expr::Literal(v) => v.accept(visitor),
            Expr::Param(p) => p.accept(visitor),
            Expr::Array(a) => a.accept(visitor),
            Expr::Column(c) => c.accept(visitor),
        }
    }
}

impl Expr {
    pub fn lit(v: impl Into<Value>) -> Self {
        Expr::Literal(v.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(Ident(name.into()))
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<Param> for Expr {
    fn from(p: Param) -> Self {
        Expr::Param(p)
    }
}

impl From<Array> for Expr {
    fn from(a: Array) -> Self {
        Expr::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the order of visits.
    #[derive(Default)]
    struct Trace(Vec<&'static str>);

    impl Visitor for Trace {
        fn visit_table(&mut self, _: &Table) -> SqlResult<()> {
            self.0.push("table");
            Ok(())
        }
        fn visit_column(&mut self, _: &Ident) -> SqlResult<()> {
            self.0.push("column");
            Ok(())
        }
        fn visit_literal(&mut self, _: &Value) -> SqlResult<()> {
            self.0.push("literal");
            Ok(())
        }
        fn visit_param(&mut self, _: &Param) -> SqlResult<()> {
            self.0.push("param");
            Ok(())
        }
        fn visit_array(&mut self, _: &Array) -> SqlResult<()> {
            self.0.push("array");
            Ok(())
        }
        fn visit_insert(&mut self, _: &InsertStmt) -> SqlResult<()> {
            self.0.push("insert");
            Ok(())
        }
    }

    #[test]
    fn test_insert_accept_calls_visit_insert() {
        let stmt = InsertStmt::new("users").columns(["id"]).values([1i64]);
        let mut trace = Trace::default();
        stmt.accept(&mut trace).unwrap();
        assert_eq!(trace.0, vec!["insert"]);
        assert_eq!(stmt.node_type(), NodeType::Insert);
    }

    #[test]
    fn test_expr_dispatches_by_kind() {
        let cells: Vec<Expr> = vec![
            Expr::lit(1i32),
            Expr::from(Param::named("id")),
            Expr::from(Array::from(vec![Value::from(1i32)])),
            Expr::Column(Ident::from("x")),
        ];
        let mut trace = Trace::default();
        for cell in &cells {
            cell.accept(&mut trace).unwrap();
        }
        assert_eq!(trace.0, vec!["literal", "param", "array", "column"]);
        assert_eq!(cells[1].node_type(), NodeType::Param);
    }

    #[test]
    fn test_table_from_qualified_name() {
        let t = Table::from("public.users");
        assert_eq!(t.schema.as_deref(), Some("public"));
        assert_eq!(t.name, "users");
        assert_eq!(t.to_string(), "public.users");
    }
}
