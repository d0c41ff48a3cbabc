//! Query shape fingerprints.
//!
//! A fingerprint is a 64-bit hash of the parts of a statement that
//! determine its rendered SQL: node kinds, identifiers, and for inline
//! literals the value kind plus its canonical text (see
//! [`Value`]'s `Display`). Bind parameters contribute only their slot,
//! never their value. Each node kind hashes a tag first (`"array:"`,
//! `"insert:"`, ...) so different kinds with equal contents do not
//! collide.
//!
//! Collisions between different shapes are possible (64-bit birthday
//! bound). The query cache only stores SQL shape, and arguments are
//! always bound from the current call.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::ast::{Array, Expr, Ident, InsertStmt, Param, Table};
use crate::value::Value;

/// Incremental fingerprint builder.
pub struct Fingerprinter {
    hasher: DefaultHasher,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            hasher: DefaultHasher::new(),
        }
    }

    /// Hash a kind tag such as `"array:"`.
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        tag.hash(&mut self.hasher);
        self
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        s.hash(&mut self.hasher);
        self
    }

    pub fn count(&mut self, n: usize) -> &mut Self {
        n.hash(&mut self.hasher);
        self
    }

    pub fn type_id(&mut self, id: TypeId) -> &mut Self {
        id.hash(&mut self.hasher);
        self
    }

    /// Fold a literal: kind discriminant, then canonical text.
    pub fn value(&mut self, value: &Value) -> &mut Self {
        value.kind().as_str().hash(&mut self.hasher);
        value.to_string().hash(&mut self.hasher);
        self
    }

    pub fn finish(&self) -> u64 {
        self.hasher.finish()
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Nodes that can be fingerprinted.
pub trait Fingerprint {
    fn fingerprint_into(&self, fp: &mut Fingerprinter);

    fn fingerprint(&self) -> u64 {
        let mut fp = Fingerprinter::new();
        self.fingerprint_into(&mut fp);
        fp.finish()
    }
}

/// Fingerprint of a node.
pub fn fingerprint(node: &impl Fingerprint) -> u64 {
    node.fingerprint()
}

impl Fingerprint for Value {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("value:").value(self);
    }
}

impl Fingerprint for Array {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("array:").count(self.len());
        for v in self.values() {
            fp.value(v);
        }
    }
}

impl Fingerprint for Param {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("param:");
        match self {
            Param::Named(name) => fp.str(name),
            Param::Positional(n) => fp.count(*n),
        };
    }
}

impl Fingerprint for Ident {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("column:").str(self.as_str());
    }
}

impl Fingerprint for Table {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("table:")
            .str(self.schema.as_deref().unwrap_or(""))
            .str(&self.name);
    }
}

impl Fingerprint for Expr {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        match self {
            Expr::Literal(v) => v.fingerprint_into(fp),
            Expr::Param(p) => p.fingerprint_into(fp),
            Expr::Array(a) => a.fingerprint_into(fp),
            Expr::Column(c) => c.fingerprint_into(fp),
        }
    }
}

impl Fingerprint for InsertStmt {
    fn fingerprint_into(&self, fp: &mut Fingerprinter) {
        fp.tag("insert:");
        self.table.fingerprint_into(fp);
        fp.count(self.columns.len());
        for col in &self.columns {
            col.fingerprint_into(fp);
        }
        fp.count(self.rows.len());
        for row in &self.rows {
            fp.count(row.len());
            for cell in row {
                cell.fingerprint_into(fp);
            }
        }
        fp.tag("returning:").count(self.returning.len());
        for col in &self.returning {
            col.fingerprint_into(fp);
        }
    }
}
