use super::Dialect;

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name)
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn supports_vector(&self) -> bool {
        true
    }

    fn supports_returning(&self) -> bool {
        true
    }
}
