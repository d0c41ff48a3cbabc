//! Execution path: compile → prepare → execute → hydrate.

use std::sync::Arc;
use tracing::warn;

use crate::ast::Node;
use crate::compiler::{Bindings, Compiler};
use crate::error::SqlResult;
use crate::fingerprint::Fingerprint;
use crate::scan::{RowData, Scannable, ScannerCache};
use crate::stmt::{Connection, StatementCache};
use crate::value::Value;
use crate::visitor::Context;

/// Runs statements on one connection through the three caches.
///
/// The caches are independent: a statement may be gone server-side
/// while its SQL is still cached. Executions failing with a stale
/// statement error are re-prepared and retried once.
pub struct Session<C: Connection> {
    compiler: Arc<Compiler>,
    statements: StatementCache<C>,
    scanners: Arc<ScannerCache>,
}

impl<C: Connection> Session<C> {
    /// Session with private caches.
    pub fn new(conn: Arc<C>) -> Self {
        Self::with_caches(conn, Arc::default(), Arc::default())
    }

    /// Session sharing compiled queries and scanner plans with others.
    /// Prepared statements are always per connection.
    pub fn with_caches(conn: Arc<C>, compiler: Arc<Compiler>, scanners: Arc<ScannerCache>) -> Self {
        Self {
            compiler,
            statements: StatementCache::new(conn),
            scanners,
        }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn statements(&self) -> &StatementCache<C> {
        &self.statements
    }

    pub fn scanners(&self) -> &ScannerCache {
        &self.scanners
    }

    /// Execute a statement, returning the affected row count.
    pub async fn execute<N>(&self, ctx: &dyn Context, node: &N, bindings: &Bindings) -> SqlResult<u64>
    where
        N: Node + Fingerprint,
    {
        let query = self.compiler.compile(ctx, node)?;
        let args = bindings.resolve(&query)?;
        let conn = self.statements.connection();

        let stmt = self.statements.prepare(&query.sql).await?;
        match conn.execute(&stmt, &args).await {
            Err(e) if conn.is_stale(&e) => {
                warn!("re-preparing {} after: {}", query.statement_key, e);
                self.statements.invalidate(&query.sql).await;
                let stmt = self.statements.prepare(&query.sql).await?;
                conn.execute(&stmt, &args).await
            }
            other => other,
        }
    }

    /// Run a statement and hydrate every returned row into `T`.
    pub async fn fetch_all<T, N>(&self, ctx: &dyn Context, node: &N, bindings: &Bindings) -> SqlResult<Vec<T>>
    where
        T: Scannable,
        N: Node + Fingerprint,
    {
        let query = self.compiler.compile_as::<T, N>(ctx, node)?;
        let args = bindings.resolve(&query)?;
        let rows = self.query_rows(&query.sql, &query.statement_key, &args).await?;
        self.scanners.plan_for::<T>().scan_all(rows)
    }

    /// Run a statement and return the raw rows.
    pub async fn fetch_rows<N>(&self, ctx: &dyn Context, node: &N, bindings: &Bindings) -> SqlResult<Vec<RowData>>
    where
        N: Node + Fingerprint,
    {
        let query = self.compiler.compile(ctx, node)?;
        let args = bindings.resolve(&query)?;
        self.query_rows(&query.sql, &query.statement_key, &args).await
    }

    /// Close every prepared statement held for this connection.
    pub async fn close(&self) -> SqlResult<()> {
        self.statements.close_all().await
    }

    async fn query_rows(&self, sql: &str, key: &str, args: &[Value]) -> SqlResult<Vec<RowData>> {
        let conn = self.statements.connection();
        let stmt = self.statements.prepare(sql).await?;
        match conn.query(&stmt, args).await {
            Err(e) if conn.is_stale(&e) => {
                warn!("re-preparing {} after: {}", key, e);
                self.statements.invalidate(sql).await;
                let stmt = self.statements.prepare(sql).await?;
                conn.query(&stmt, args).await
            }
            other => other,
        }
    }
}
