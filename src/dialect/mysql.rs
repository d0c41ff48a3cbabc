use super::Dialect;
use super::literal::render_value_escaping_backslashes;
use crate::value::Value;

/// MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name)
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    /// Backslash is an escape character under the default `sql_mode`.
    fn render_value(&self, value: &Value) -> String {
        render_value_escaping_backslashes(value)
    }

    fn supports_vector(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        false
    }
}
