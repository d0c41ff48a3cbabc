use super::{Dialect, MySql};
use crate::value::Value;

/// TiDB: MySQL rendering, plus native VECTOR columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiDb {
    base: MySql,
}

impl TiDb {
    pub const fn new() -> Self {
        Self { base: MySql }
    }
}

impl Dialect for TiDb {
    fn name(&self) -> &'static str {
        "tidb"
    }

    fn quote_identifier(&self, name: &str) -> String {
        self.base.quote_identifier(name)
    }

    fn placeholder(&self, position: usize) -> String {
        self.base.placeholder(position)
    }

    fn render_value(&self, value: &Value) -> String {
        self.base.render_value(value)
    }

    fn supports_vector(&self) -> bool {
        true
    }

    fn supports_returning(&self) -> bool {
        self.base.supports_returning()
    }
}
