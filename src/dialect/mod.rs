//! SQL dialects.
//!
//! A dialect is a stateless capability object: identifier quoting,
//! placeholder syntax, literal rendering and feature flags for one
//! database family.

mod literal;
mod mysql;
mod postgres;
mod tidb;

use std::fmt;
use std::str::FromStr;

use crate::error::SqlError;
use crate::value::Value;

pub use literal::{render_value, render_value_escaping_backslashes};
pub use mysql::MySql;
pub use postgres::Postgres;
pub use tidb::TiDb;

/// Rendering rules for one database family.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Stable name, folded into query fingerprints.
    fn name(&self) -> &'static str;

    /// Wrap a bare identifier in the dialect's quotes. Embedded quote
    /// characters are not escaped.
    fn quote_identifier(&self, name: &str) -> String;

    /// Bind-parameter token for a 1-based position.
    fn placeholder(&self, position: usize) -> String;

    /// Render a literal inline.
    fn render_value(&self, value: &Value) -> String {
        render_value(value)
    }

    /// Whether vector-typed columns and operators are legal.
    fn supports_vector(&self) -> bool;

    /// Whether `INSERT ... RETURNING` is available.
    fn supports_returning(&self) -> bool;
}

static POSTGRES: Postgres = Postgres;
static MYSQL: MySql = MySql;
static TIDB: TiDb = TiDb::new();

/// Supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialectKind {
    #[default]
    Postgres,
    MySql,
    TiDb,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DialectKind::Postgres => &POSTGRES,
            DialectKind::MySql => &MYSQL,
            DialectKind::TiDb => &TIDB,
        }
    }

    /// Pick a dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self, SqlError> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| SqlError::Config(format!("database url has no scheme: {}", url)))?;
        scheme.parse()
    }
}

impl FromStr for DialectKind {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            "tidb" => Ok(DialectKind::TiDb),
            other => Err(SqlError::Config(format!("unsupported dialect: {}", other))),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect().name())
    }
}
