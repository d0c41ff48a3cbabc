//! End-to-end tests: compile → prepare → execute → hydrate, against an
//! in-memory connection.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sqlcache::cache::statement_key;
use sqlcache::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct FakeStatement {
    generation: usize,
    sql: String,
}

/// Records every call; `drop_statements` makes the next execution fail
/// as if the server had discarded its prepared statements.
#[derive(Default)]
struct FakeConn {
    prepares: AtomicUsize,
    closes: AtomicUsize,
    generation: AtomicUsize,
    drop_statements: AtomicBool,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeConn {
    fn check_live(&self, stmt: &FakeStatement) -> SqlResult<()> {
        if self.drop_statements.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        if stmt.generation != self.generation.load(Ordering::SeqCst) {
            return Err(SqlError::Execution(format!(
                "prepared statement \"{}\" does not exist",
                statement_key(&stmt.sql)
            )));
        }
        Ok(())
    }

    fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for FakeConn {
    type Statement = FakeStatement;

    async fn prepare(&self, sql: &str) -> SqlResult<FakeStatement> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStatement {
            generation: self.generation.load(Ordering::SeqCst),
            sql: sql.to_string(),
        })
    }

    async fn execute(&self, stmt: &FakeStatement, args: &[Value]) -> SqlResult<u64> {
        self.check_live(stmt)?;
        self.executed
            .lock()
            .unwrap()
            .push((stmt.sql.clone(), args.to_vec()));
        Ok(1)
    }

    async fn query(&self, stmt: &FakeStatement, args: &[Value]) -> SqlResult<Vec<RowData>> {
        self.check_live(stmt)?;
        self.executed
            .lock()
            .unwrap()
            .push((stmt.sql.clone(), args.to_vec()));

        let columns: Arc<[String]> = ["id", "name", "address.city"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        Ok(vec![RowData::new(
            columns,
            vec![args[0].clone(), args[1].clone(), Value::from("Oslo")],
        )])
    }

    async fn close_statement(&self, _stmt: &FakeStatement) -> SqlResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_stale(&self, err: &SqlError) -> bool {
        matches!(err, SqlError::Execution(m) if m.contains("does not exist"))
    }
}

#[derive(Debug, Default, PartialEq)]
struct Address {
    city: String,
}

impl Scannable for Address {
    fn fields() -> Vec<Field<Self>> {
        vec![Field::new("city", |a: &mut Address, v: String| a.city = v)]
    }
}

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
    address: Address,
}

impl Scannable for User {
    fn fields() -> Vec<Field<Self>> {
        let mut fields = vec![
            Field::new("id", |u: &mut User, v: i64| u.id = v),
            Field::new("name", |u: &mut User, v: String| u.name = v),
        ];
        fields.extend(Field::nested("address", |u: &mut User| &mut u.address));
        fields
    }
}

fn insert_user() -> InsertStmt {
    InsertStmt::new("users")
        .columns(["id", "name"])
        .row([Expr::from(Param::named("id")), Expr::from(Param::named("name"))])
}

fn session() -> (Arc<FakeConn>, Session<FakeConn>) {
    let conn = Arc::new(FakeConn::default());
    (conn.clone(), Session::new(conn))
}

#[tokio::test]
async fn test_execute_binds_per_call() {
    let (conn, session) = session();
    let ctx = StaticContext::new(DialectKind::Postgres);

    for (id, name) in [(1i64, "Ada"), (2, "Grace")] {
        let bindings = Bindings::new().set("id", id).set("name", name);
        let affected = session.execute(&ctx, &insert_user(), &bindings).await.unwrap();
        assert_eq!(affected, 1);
    }

    let sql = r#"INSERT INTO "users" ("id", "name") VALUES ($1, $2)"#.to_string();
    assert_eq!(
        conn.executed(),
        vec![
            (sql.clone(), vec![Value::I64(1), Value::from("Ada")]),
            (sql, vec![Value::I64(2), Value::from("Grace")]),
        ]
    );

    let stats = session.compiler().queries().stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(conn.prepares.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dialects_get_separate_entries() {
    let (conn, session) = session();
    let bindings = Bindings::new().set("id", 1i64).set("name", "Ada");

    for kind in [DialectKind::Postgres, DialectKind::MySql, DialectKind::TiDb] {
        let ctx = StaticContext::new(kind);
        session.execute(&ctx, &insert_user(), &bindings).await.unwrap();
    }

    assert_eq!(session.compiler().queries().len(), 3);
    // MySQL and TiDB render the same text and share one prepared statement.
    assert_eq!(conn.prepares.load(Ordering::SeqCst), 2);
    assert_eq!(session.statements().len().await, 2);
}

#[tokio::test]
async fn test_fetch_all_hydrates_nested() {
    let (_conn, session) = session();
    let ctx = StaticContext::new(DialectKind::MySql);
    let bindings = Bindings::new().set("id", 7i64).set("name", "Ada");

    let users: Vec<User> = session
        .fetch_all(&ctx, &insert_user(), &bindings)
        .await
        .unwrap();
    assert_eq!(
        users,
        vec![User {
            id: 7,
            name: "Ada".into(),
            address: Address {
                city: "Oslo".into(),
            },
        }]
    );
    assert_eq!(session.scanners().len(), 1);

    session.fetch_all::<User, _>(&ctx, &insert_user(), &bindings).await.unwrap();
    assert_eq!(session.scanners().len(), 1);
    assert_eq!(session.compiler().queries().stats().hits, 1);
}

#[tokio::test]
async fn test_stale_statement_is_reprepared() {
    let (conn, session) = session();
    let ctx = StaticContext::new(DialectKind::Postgres);
    let bindings = Bindings::new().set("id", 1i64).set("name", "Ada");

    session.execute(&ctx, &insert_user(), &bindings).await.unwrap();
    conn.drop_statements.store(true, Ordering::SeqCst);
    session.execute(&ctx, &insert_user(), &bindings).await.unwrap();

    assert_eq!(conn.prepares.load(Ordering::SeqCst), 2);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
    assert_eq!(conn.executed().len(), 2);
    // The compiled query survived; only the statement was replaced.
    assert_eq!(session.compiler().queries().len(), 1);
}

#[tokio::test]
async fn test_missing_argument_fails_before_prepare() {
    let (conn, session) = session();
    let ctx = StaticContext::new(DialectKind::Postgres);
    let bindings = Bindings::new().set("id", 1i64);

    let err = session
        .execute(&ctx, &insert_user(), &bindings)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), SqlError::MissingArgument(":name".into()).to_string());
    assert_eq!(conn.prepares.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shared_caches_across_sessions() {
    let compiler = Arc::new(Compiler::new());
    let scanners = Arc::new(ScannerCache::new());
    let a = Session::with_caches(Arc::new(FakeConn::default()), compiler.clone(), scanners.clone());
    let b = Session::with_caches(Arc::new(FakeConn::default()), compiler.clone(), scanners.clone());
    let ctx = StaticContext::new(DialectKind::Postgres);
    let bindings = Bindings::new().set("id", 1i64).set("name", "Ada");

    a.fetch_all::<User, _>(&ctx, &insert_user(), &bindings).await.unwrap();
    b.fetch_all::<User, _>(&ctx, &insert_user(), &bindings).await.unwrap();

    assert_eq!(compiler.queries().len(), 1);
    assert_eq!(scanners.len(), 1);
    assert_eq!(a.statements().connection().prepares.load(Ordering::SeqCst), 1);
    assert_eq!(b.statements().connection().prepares.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_then_reuse() {
    let (conn, session) = session();
    let ctx = StaticContext::new(DialectKind::Postgres);
    let bindings = Bindings::new().set("id", 1i64).set("name", "Ada");

    session.execute(&ctx, &insert_user(), &bindings).await.unwrap();
    session.close().await.unwrap();
    assert!(session.statements().is_empty().await);
    assert_eq!(conn.closes.load(Ordering::SeqCst), 1);

    session.execute(&ctx, &insert_user(), &bindings).await.unwrap();
    assert_eq!(conn.prepares.load(Ordering::SeqCst), 2);
}

#[test]
fn test_render_returning_postgres_only() {
    let compiler = Compiler::new();
    let stmt = insert_user().returning(["id"]);

    let pg = compiler
        .compile(&StaticContext::new(DialectKind::Postgres), &stmt)
        .unwrap();
    assert_eq!(
        pg.sql,
        r#"INSERT INTO "users" ("id", "name") VALUES ($1, $2) RETURNING "id""#
    );

    let err = compiler
        .compile(&StaticContext::new(DialectKind::MySql), &stmt)
        .unwrap_err();
    assert!(matches!(err, SqlError::Render(_)));
}
