//! Database connection provider.
//!
//! [`SqlxProvider`] runs statements against PostgreSQL, MySQL or TiDB
//! through a `sqlx` any-driver pool.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow, AnyStatement};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Executor, Row, Statement, TypeInfo};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PoolConfig;
use crate::dialect::{Dialect, DialectKind};
use crate::error::{SqlError, SqlResult};
use crate::scan::RowData;
use crate::stmt::Connection;
use crate::value::{TIMESTAMP_FORMAT, Value};

/// Connection counts of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub open: usize,
    pub in_use: usize,
    pub idle: usize,
}

/// Source of connections for one database.
#[async_trait]
pub trait Provider: Sized + Send + Sync {
    async fn connect(config: &PoolConfig) -> SqlResult<Self>;

    fn dialect(&self) -> &'static dyn Dialect;

    async fn health_check(&self) -> SqlResult<()>;

    fn stats(&self) -> PoolStats;

    async fn close(&self) -> SqlResult<()>;
}

/// A `sqlx` pool plus the dialect of the database behind it.
#[derive(Clone)]
pub struct SqlxProvider {
    pool: AnyPool,
    kind: DialectKind,
}

impl SqlxProvider {
    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// TiDB speaks the MySQL protocol; `sqlx` only knows the `mysql` scheme.
fn driver_url(url: &str, kind: DialectKind) -> String {
    match (kind, url.split_once("://")) {
        (DialectKind::TiDb, Some((_, rest))) => format!("mysql://{}", rest),
        _ => url.to_string(),
    }
}

/// sqlx has no idle ceiling, only a floor (`min_connections`). The floor
/// stays at zero so `idle_timeout` can reap every idle connection;
/// `max_idle` has no pool-level counterpart here.
fn pool_options(config: &PoolConfig) -> AnyPoolOptions {
    AnyPoolOptions::new()
        .max_connections(config.max_open)
        .min_connections(0)
        .max_lifetime(Some(config.lifetime()))
        .idle_timeout(Some(config.idle_time()))
        .acquire_timeout(config.timeout())
}

#[async_trait]
impl Provider for SqlxProvider {
    async fn connect(config: &PoolConfig) -> SqlResult<Self> {
        sqlx::any::install_default_drivers();

        let config = config.clone().normalized();
        let kind = DialectKind::from_url(&config.url)?;
        let pool = pool_options(&config)
            .connect(&driver_url(&config.url, kind))
            .await
            .map_err(|e| SqlError::Connection(e.to_string()))?;

        info!("connected to {} database (max_open={})", kind, config.max_open);
        Ok(Self { pool, kind })
    }

    fn dialect(&self) -> &'static dyn Dialect {
        self.kind.dialect()
    }

    async fn health_check(&self) -> SqlResult<()> {
        self.pool
            .execute("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| SqlError::Connection(e.to_string()))
    }

    fn stats(&self) -> PoolStats {
        let open = self.pool.size() as usize;
        let idle = self.pool.num_idle();
        PoolStats {
            open,
            in_use: open.saturating_sub(idle),
            idle,
        }
    }

    async fn close(&self) -> SqlResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl Connection for SqlxProvider {
    type Statement = AnyStatement<'static>;

    async fn prepare(&self, sql: &str) -> SqlResult<Self::Statement> {
        let stmt = self
            .pool
            .prepare(sql)
            .await
            .map_err(|e| SqlError::prepare(sql, e.to_string()))?;
        Ok(Statement::to_owned(&stmt))
    }

    async fn execute(&self, stmt: &Self::Statement, args: &[Value]) -> SqlResult<u64> {
        let query = bind_all(stmt.query(), args);
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn query(&self, stmt: &Self::Statement, args: &[Value]) -> SqlResult<Vec<RowData>> {
        let query = bind_all(stmt.query(), args);
        let rows: Vec<AnyRow> = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SqlError::Execution(e.to_string()))?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        rows.iter()
            .map(|row| Ok(RowData::new(columns.clone(), row_values(row)?)))
            .collect()
    }

    /// The pool's connections own the server-side statements and release
    /// them with their own statement caches; dropping the handle is all
    /// that is left to do here.
    async fn close_statement(&self, stmt: &Self::Statement) -> SqlResult<()> {
        debug!("released statement handle for: {}", stmt.sql());
        Ok(())
    }

    fn is_stale(&self, err: &SqlError) -> bool {
        let SqlError::Execution(message) = err else {
            return false;
        };
        let message = message.to_ascii_lowercase();
        (message.contains("prepared statement") && message.contains("does not exist"))
            || message.contains("unknown prepared statement handler")
            || message.contains("cached plan must not change result type")
    }
}

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

fn bind_all<'q>(mut query: AnyQuery<'q>, args: &[Value]) -> AnyQuery<'q> {
    for arg in args {
        query = bind_value(query, arg);
    }
    query
}

/// Text sent for values the any-driver cannot encode: timestamps,
/// UUIDs, JSON, vectors and `u64` beyond `i64::MAX` travel in their
/// canonical text form.
fn wire_text(value: &Value) -> Option<String> {
    match value {
        Value::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Uuid(_) | Value::Json(_) | Value::Vector(_) => Some(value.to_string()),
        Value::U64(v) if i64::try_from(*v).is_err() => Some(v.to_string()),
        _ => None,
    }
}

fn bind_value<'q>(query: AnyQuery<'q>, value: &Value) -> AnyQuery<'q> {
    if let Some(text) = wire_text(value) {
        return query.bind(text);
    }
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::I8(v) => query.bind(i16::from(*v)),
        Value::I16(v) => query.bind(*v),
        Value::I32(v) => query.bind(*v),
        Value::I64(v) => query.bind(*v),
        Value::U8(v) => query.bind(i16::from(*v)),
        Value::U16(v) => query.bind(i32::from(*v)),
        Value::U32(v) => query.bind(i64::from(*v)),
        // Out-of-range values were sent as text above.
        Value::U64(v) => query.bind(*v as i64),
        Value::F32(v) => query.bind(*v),
        Value::F64(v) => query.bind(*v),
        Value::String(v) => query.bind(v.clone()),
        Value::Bytes(v) => query.bind(v.clone()),
        other => query.bind(other.to_string()),
    }
}

fn row_values(row: &AnyRow) -> SqlResult<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let decoded = match column.type_info().name() {
                "BOOLEAN" | "BOOL" => row.try_get::<Option<bool>, _>(i).map(Value::from),
                "SMALLINT" | "INT2" => row.try_get::<Option<i16>, _>(i).map(Value::from),
                "INTEGER" | "INT4" | "INT" => row.try_get::<Option<i32>, _>(i).map(Value::from),
                "BIGINT" | "INT8" => row.try_get::<Option<i64>, _>(i).map(Value::from),
                "REAL" | "FLOAT4" => row.try_get::<Option<f32>, _>(i).map(Value::from),
                "DOUBLE" | "FLOAT8" => row.try_get::<Option<f64>, _>(i).map(Value::from),
                "BLOB" | "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(i).map(Value::from),
                "NULL" => Ok(Value::Null),
                _ => row.try_get::<Option<String>, _>(i).map(Value::from),
            };
            decoded.map_err(|e| SqlError::scan(column.name(), e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_driver_url_rewrites_tidb() {
        assert_eq!(
            driver_url("tidb://root@db:4000/app", DialectKind::TiDb),
            "mysql://root@db:4000/app"
        );
        assert_eq!(
            driver_url("postgres://localhost/app", DialectKind::Postgres),
            "postgres://localhost/app"
        );
    }

    #[test]
    fn test_wire_text_for_untyped_values() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(wire_text(&Value::Timestamp(ts)).as_deref(), Some("2024-01-02 03:04:05.000000"));
        assert_eq!(
            wire_text(&Value::Uuid(uuid::Uuid::nil())).as_deref(),
            Some("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(wire_text(&Value::Vector(vec![1.0, 2.0])).as_deref(), Some("[1,2]"));
        assert_eq!(wire_text(&Value::U64(u64::MAX)).as_deref(), Some("18446744073709551615"));
        assert_eq!(wire_text(&Value::U64(7)), None);
        assert_eq!(wire_text(&Value::from("x")), None);
    }

    #[test]
    fn test_pool_options_keep_no_idle_floor() {
        let options = pool_options(&PoolConfig::default().normalized());
        assert_eq!(options.get_min_connections(), 0);
        assert_eq!(options.get_max_connections(), 10);
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(3600)));
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = SqlxProvider::connect(&PoolConfig::new("oracle://db/app"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SqlError::Config(_)));
    }
}
