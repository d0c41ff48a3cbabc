//! Prepared-statement cache.
//!
//! Maps SQL text to a live prepared statement on one [`Connection`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use crate::cache::statement_key;
use crate::error::{SqlError, SqlResult};
use crate::scan::RowData;
use crate::value::Value;

/// The database side of the statement cache.
///
/// Deadlines and cancellation belong to the caller: wrapping a call in
/// `tokio::time::timeout` drops the in-flight prepare, and nothing is
/// cached.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Statement: Send + Sync + 'static;

    async fn prepare(&self, sql: &str) -> SqlResult<Self::Statement>;

    /// Run a statement, returning the affected row count.
    async fn execute(&self, stmt: &Self::Statement, args: &[Value]) -> SqlResult<u64>;

    async fn query(&self, stmt: &Self::Statement, args: &[Value]) -> SqlResult<Vec<RowData>>;

    async fn close_statement(&self, stmt: &Self::Statement) -> SqlResult<()>;

    /// Whether an execution error means the prepared statement no longer
    /// exists server-side and should be prepared again.
    fn is_stale(&self, _err: &SqlError) -> bool {
        false
    }
}

type Slot<S> = Arc<OnceCell<Arc<S>>>;

/// SQL text → prepared statement, on one connection.
///
/// Each SQL text owns a slot that is filled by exactly one prepare. The
/// map lock is only held to look up or insert slots, never across a
/// prepare, so hits and prepares of other SQL never wait on the network.
pub struct StatementCache<C: Connection> {
    conn: Arc<C>,
    statements: RwLock<HashMap<String, Slot<C::Statement>>>,
}

impl<C: Connection> StatementCache<C> {
    pub fn new(conn: Arc<C>) -> Self {
        Self {
            conn,
            statements: RwLock::new(HashMap::new()),
        }
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Cached statement for `sql`, preparing it on first use.
    ///
    /// Concurrent first use of the same SQL prepares once; the other
    /// callers wait on that slot only. A failed prepare is returned and
    /// its slot removed, so nothing is stored.
    pub async fn prepare(&self, sql: &str) -> SqlResult<Arc<C::Statement>> {
        let slot = self.slot(sql).await;
        if let Some(stmt) = slot.get() {
            return Ok(stmt.clone());
        }

        let prepared = slot
            .get_or_try_init(|| async {
                debug!("preparing {} for: {}", statement_key(sql), sql);
                self.conn.prepare(sql).await.map(Arc::new)
            })
            .await;

        match prepared {
            Ok(stmt) => Ok(stmt.clone()),
            Err(e) => {
                let mut statements = self.statements.write().await;
                if statements.get(sql).is_some_and(|s| Arc::ptr_eq(s, &slot) && !s.initialized()) {
                    statements.remove(sql);
                }
                Err(e)
            }
        }
    }

    async fn slot(&self, sql: &str) -> Slot<C::Statement> {
        if let Some(slot) = self.statements.read().await.get(sql) {
            return slot.clone();
        }
        self.statements
            .write()
            .await
            .entry(sql.to_string())
            .or_default()
            .clone()
    }

    /// Drop the statement for `sql` and close it server-side.
    pub async fn invalidate(&self, sql: &str) {
        let removed = self.statements.write().await.remove(sql);
        if let Some(stmt) = removed.as_deref().and_then(OnceCell::get) {
            if let Err(e) = self.conn.close_statement(stmt).await {
                warn!("closing invalidated statement {} failed: {}", statement_key(sql), e);
            }
        }
    }

    /// Close every cached statement and empty the cache.
    ///
    /// Every close is attempted; failures are collected into one
    /// [`SqlError::Teardown`].
    pub async fn close_all(&self) -> SqlResult<()> {
        let drained = std::mem::take(&mut *self.statements.write().await);
        let mut failures = Vec::new();
        for (sql, slot) in drained {
            let Some(stmt) = slot.get() else {
                continue;
            };
            if let Err(e) = self.conn.close_statement(stmt).await {
                warn!("closing statement {} failed: {}", statement_key(&sql), e);
                failures.push(format!("{}: {}", statement_key(&sql), e));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SqlError::Teardown(failures))
        }
    }

    /// Number of prepared statements held; in-flight prepares excluded.
    pub async fn len(&self) -> usize {
        self.statements
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct MockStatement {
        id: usize,
        sql: String,
    }

    #[derive(Default)]
    struct MockConn {
        prepares: AtomicUsize,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Connection for MockConn {
        type Statement = MockStatement;

        async fn prepare(&self, sql: &str) -> SqlResult<MockStatement> {
            let delay = if sql.contains("SLOW") { 300 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if sql.contains("BAD") {
                return Err(SqlError::prepare(sql, "syntax error"));
            }
            let id = self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(MockStatement {
                id,
                sql: sql.to_string(),
            })
        }

        async fn execute(&self, _stmt: &MockStatement, _args: &[Value]) -> SqlResult<u64> {
            Ok(0)
        }

        async fn query(&self, _stmt: &MockStatement, _args: &[Value]) -> SqlResult<Vec<RowData>> {
            Ok(Vec::new())
        }

        async fn close_statement(&self, stmt: &MockStatement) -> SqlResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if stmt.sql.contains("STUCK") {
                return Err(SqlError::Connection("connection reset".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prepare_is_cached() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        let a = cache.prepare("SELECT 1").await.unwrap();
        let b = cache.prepare("SELECT 1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.connection().prepares.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_prepare_runs_once() {
        let cache = Arc::new(StatementCache::new(Arc::new(MockConn::default())));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.prepare("INSERT INTO t VALUES ($1)").await })
            })
            .collect();

        let mut stmts = Vec::new();
        for h in handles {
            stmts.push(h.await.unwrap().unwrap());
        }
        assert_eq!(cache.connection().prepares.load(Ordering::SeqCst), 1);
        assert!(stmts.iter().all(|s| Arc::ptr_eq(s, &stmts[0])));
    }

    #[tokio::test]
    async fn test_failed_prepare_not_cached() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        let err = cache.prepare("BAD SQL").await.unwrap_err();
        assert!(matches!(err, SqlError::Prepare { .. }));
        assert!(cache.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_prepare_does_not_block_other_sql() {
        let cache = Arc::new(StatementCache::new(Arc::new(MockConn::default())));
        cache.prepare("SELECT FAST").await.unwrap();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.prepare("SELECT SLOW").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        cache.prepare("SELECT FAST").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));

        let started = Instant::now();
        cache.prepare("SELECT OTHER").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(cache.len().await, 2);

        slow.await.unwrap().unwrap();
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_failed_prepare_retries() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        assert!(cache.prepare("BAD SQL").await.is_err());
        assert!(cache.prepare("BAD SQL").await.is_err());
        assert!(cache.statements.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_then_reprepare() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        let before = cache.prepare("SELECT 1").await.unwrap();
        cache.close_all().await.unwrap();
        assert!(cache.is_empty().await);

        let after = cache.prepare("SELECT 1").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_ne!(before.id, after.id);
    }

    #[tokio::test]
    async fn test_close_all_attempts_every_handle() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        cache.prepare("SELECT 1").await.unwrap();
        cache.prepare("SELECT STUCK").await.unwrap();
        cache.prepare("SELECT 2").await.unwrap();
        cache.prepare("SELECT STUCK 2").await.unwrap();

        match cache.close_all().await {
            Err(SqlError::Teardown(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("expected teardown error, got {:?}", other),
        }
        assert_eq!(cache.connection().closes.load(Ordering::SeqCst), 4);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_timeout_caches_nothing() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        let res = tokio::time::timeout(Duration::from_millis(1), cache.prepare("SELECT 1")).await;
        assert!(res.is_err());
        assert!(cache.is_empty().await);

        cache.prepare("SELECT 1").await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_closes() {
        let cache = StatementCache::new(Arc::new(MockConn::default()));
        cache.prepare("SELECT 1").await.unwrap();
        cache.invalidate("SELECT 1").await;
        assert!(cache.is_empty().await);
        assert_eq!(cache.connection().closes.load(Ordering::SeqCst), 1);
    }
}
