//! # sqlcache
//!
//! Dialect-aware SQL compilation for programmatically built statements,
//! with the expensive steps memoized:
//!
//! | Cache            | Key                 | Value                      |
//! |------------------|---------------------|----------------------------|
//! | [`QueryCache`]   | shape fingerprint   | rendered SQL + bind order  |
//! | [`ScannerCache`] | destination type    | field-access plan          |
//! | [`StatementCache`] | SQL text          | prepared statement handle  |
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlcache::prelude::*;
//!
//! let ctx = StaticContext::new(DialectKind::Postgres);
//! let stmt = InsertStmt::new("users")
//!     .columns(["id", "name"])
//!     .row([Expr::from(Param::named("id")), Expr::from(Param::named("name"))]);
//!
//! let compiler = Compiler::new();
//! let query = compiler.compile(&ctx, &stmt)?;
//! // => INSERT INTO "users" ("id", "name") VALUES ($1, $2)
//!
//! let args = Bindings::new().set("id", 7i64).set("name", "Ada").resolve(&query)?;
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod fingerprint;
pub mod provider;
pub mod scan;
pub mod session;
pub mod stmt;
pub mod value;
pub mod visitor;

pub use cache::QueryCache;
pub use scan::ScannerCache;
pub use stmt::StatementCache;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::cache::{CachedQuery, CacheStats, QueryCache, RwCache, ScannerKey};
    pub use crate::compiler::{Bindings, Compiler};
    pub use crate::config::PoolConfig;
    pub use crate::dialect::{Dialect, DialectKind, MySql, Postgres, TiDb};
    pub use crate::error::*;
    pub use crate::fingerprint::{Fingerprint, Fingerprinter, fingerprint};
    pub use crate::provider::{PoolStats, Provider, SqlxProvider};
    pub use crate::scan::{Field, RowData, Scannable, ScannerCache, ScannerPlan};
    pub use crate::session::Session;
    pub use crate::stmt::{Connection, StatementCache};
    pub use crate::value::{FromValue, Value, ValueKind};
    pub use crate::visitor::{Context, RenderVisitor, Rendered, Schema, SqlVisitor, StaticContext};
}
