//! sqlcache: compile and run INSERT statements from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL for a dialect
//! sqlcache render --dialect mysql --table users --columns id,name --row ':id,:name'
//!
//! # Run it
//! sqlcache exec --table users --columns id,name --row ':id,:name' --bind id=7 --bind name=Ada
//! ```

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use sqlcache::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlcache")]
#[command(version)]
#[command(about = "Dialect-aware SQL compilation with cached plans", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlcache render --dialect pg --table users --columns id,name --row '1,Ada' --row '2,Grace'
    sqlcache render --dialect tidb --table users --columns id,tags --row ':id,[a;b]'
    sqlcache exec --table users --columns id --row '$1' --bind 1=42")]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an INSERT statement and show its SQL and bind order
    Render {
        #[command(flatten)]
        stmt: StmtArgs,

        /// Target dialect (postgres, mysql, tidb)
        #[arg(short, long, default_value = "postgres")]
        dialect: DialectKind,
    },
    /// Show the resolved pool configuration
    Config,
    /// Compile and execute an INSERT statement
    Exec {
        #[command(flatten)]
        stmt: StmtArgs,

        /// Database connection URL
        #[arg(long, env = "SQLCACHE_DATABASE_URL")]
        database_url: Option<String>,

        /// Argument values: `name=value` for `:name`, `n=value` for `$n`
        #[arg(short, long)]
        bind: Vec<String>,
    },
}

#[derive(Args)]
struct StmtArgs {
    /// Target table (`schema.table` allowed)
    #[arg(short, long)]
    table: String,

    /// Column names
    #[arg(short, long, value_delimiter = ',', required = true)]
    columns: Vec<String>,

    /// One row of cells, comma separated (commas inside 'quoted' text are
    /// kept); repeat for multiple rows
    #[arg(short, long, required = true)]
    row: Vec<String>,

    /// RETURNING columns
    #[arg(long, value_delimiter = ',')]
    returning: Vec<String>,
}

impl StmtArgs {
    fn build(&self) -> InsertStmt {
        let mut stmt = InsertStmt::new(self.table.as_str())
            .columns(self.columns.iter().map(String::as_str))
            .returning(self.returning.iter().map(String::as_str));
        for row in &self.row {
            stmt = stmt.row(split_cells(row).into_iter().map(|cell| parse_cell(cell.trim())));
        }
        stmt
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("sqlcache=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sqlcache=warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match &cli.command {
        Commands::Render { stmt, dialect } => render(stmt, *dialect),
        Commands::Config => show_config(),
        Commands::Exec {
            stmt,
            database_url,
            bind,
        } => exec(stmt, database_url.as_deref(), bind).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn render(args: &StmtArgs, dialect: DialectKind) -> Result<()> {
    let stmt = args.build();
    stmt.validate()?;

    let ctx = StaticContext::new(dialect);
    let compiler = Compiler::new();
    let query = compiler.compile(&ctx, &stmt)?;

    println!("{} {}", "Dialect:".dimmed(), dialect.to_string().cyan());
    println!(
        "{} {:016x}",
        "Fingerprint:".dimmed(),
        Compiler::fingerprint(&ctx, &stmt, None)
    );
    println!("{} {}", "Statement:".dimmed(), query.statement_key);
    println!();
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", query.sql.white());

    if !query.args.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, param) in query.args.iter().enumerate() {
            println!("  {} <- {}", dialect.dialect().placeholder(i + 1), param.to_string().yellow());
        }
    }
    Ok(())
}

fn show_config() -> Result<()> {
    match PoolConfig::default_path() {
        Some(path) if path.exists() => println!("{} {}", "Config file:".dimmed(), path.display()),
        Some(path) => println!("{} {} (not found)", "Config file:".dimmed(), path.display()),
        None => println!("{}", "No config directory on this platform".yellow()),
    }
    let config = PoolConfig::load_default()?;
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

async fn exec(args: &StmtArgs, database_url: Option<&str>, binds: &[String]) -> Result<()> {
    let mut config = PoolConfig::load_default()?;
    if let Some(url) = database_url {
        config.url = url.to_string();
    }

    let stmt = args.build();
    stmt.validate()?;
    let bindings = parse_bindings(binds)?;

    let provider = Arc::new(
        SqlxProvider::connect(&config)
            .await
            .with_context(|| format!("connecting to {}", config.url))?,
    );
    let ctx = StaticContext::new(provider.kind());
    let session = Session::new(provider.clone());

    let affected = session.execute(&ctx, &stmt, &bindings).await;
    let closed = session.close().await;
    provider.close().await?;

    println!("{} {}", "Rows affected:".green().bold(), affected?);
    closed?;
    Ok(())
}

/// Split a row on commas outside single-quoted literals. `''` inside a
/// literal is an escaped quote.
fn split_cells(row: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in row.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                cells.push(&row[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(&row[start..]);
    cells
}

/// `:name` and `$n` become parameters, `[a;b]` an array, anything else
/// a literal.
fn parse_cell(cell: &str) -> Expr {
    if let Some(name) = cell.strip_prefix(':') {
        return Expr::from(Param::named(name));
    }
    if let Some(n) = cell.strip_prefix('$').and_then(|n| n.parse().ok()) {
        return Expr::from(Param::Positional(n));
    }
    if let Some(inner) = cell.strip_prefix('[').and_then(|c| c.strip_suffix(']')) {
        let values: Array = inner
            .split(';')
            .filter(|v| !v.is_empty())
            .map(|v| parse_literal(v.trim()))
            .collect();
        return Expr::from(values);
    }
    Expr::Literal(parse_literal(cell))
}

fn parse_literal(s: &str) -> Value {
    if s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(b) = s.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::I64(n);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::F64(f);
    }
    match s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => Value::from(quoted.replace("''", "'")),
        None => Value::from(s),
    }
}

fn parse_bindings(binds: &[String]) -> Result<Bindings> {
    let mut positional: Vec<(usize, Value)> = Vec::new();
    let mut bindings = Bindings::new();
    for bind in binds {
        let Some((key, value)) = bind.split_once('=') else {
            bail!("binding must be key=value: {}", bind);
        };
        let value = parse_literal(value);
        match key.parse::<usize>() {
            Ok(0) => bail!("positional bindings start at 1"),
            Ok(n) => positional.push((n, value)),
            Err(_) => bindings = bindings.set(key, value),
        }
    }

    positional.sort_by_key(|(n, _)| *n);
    for (i, (n, value)) in positional.into_iter().enumerate() {
        if n != i + 1 {
            bail!("missing positional binding ${}", i + 1);
        }
        bindings = bindings.arg(value);
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_cells_keeps_quoted_commas() {
        assert_eq!(split_cells("1,'Smith, J'"), vec!["1", "'Smith, J'"]);
        assert_eq!(split_cells("'a,''b'',c',2"), vec!["'a,''b'',c'", "2"]);
        assert_eq!(split_cells(":id,:name"), vec![":id", ":name"]);
    }

    #[test]
    fn test_quoted_row_builds_two_cells() {
        let args = StmtArgs {
            table: "users".into(),
            columns: vec!["id".into(), "name".into()],
            row: vec!["1, 'Smith, J'".into()],
            returning: vec![],
        };
        let stmt = args.build();
        assert!(stmt.validate().is_ok());
        assert_eq!(stmt.rows[0][1], Expr::Literal(Value::from("Smith, J")));
    }

    #[test]
    fn test_parse_literal_unescapes_quotes() {
        assert_eq!(parse_literal("'O''Brien'"), Value::from("O'Brien"));
        assert_eq!(parse_literal("42"), Value::I64(42));
        assert_eq!(parse_literal("null"), Value::Null);
    }
}
