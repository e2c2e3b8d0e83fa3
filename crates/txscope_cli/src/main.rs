//! Operator CLI for bind configuration checks and read-only queries.
//!
//! # Responsibility
//! - Load a bind configuration and build its engines, surfacing config
//!   errors the way application startup would.
//! - Run statements only inside transient blocks, so nothing is persisted.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::types::Value;
use std::path::{Path, PathBuf};
use txscope_core::sql::{RegexTableExtractor, TableNameExtractor};
use txscope_core::{core_version, init_logging, Database, DatabaseConfig, ExecuteOptions, ExecuteResult};

#[derive(Parser)]
#[command(name = "txscope")]
#[command(about = "Check bind configuration and query SQLite binds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the core version.
    Version,
    /// Validate a config file, build every bind and run `SELECT 1` on each.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the table names found in a SQL statement.
    Tables { sql: String },
    /// Run a statement in a transient block and print the rows.
    Query {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        bind: Option<String>,
        sql: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("txscope_core version={}", core_version());
            Ok(())
        }
        Command::Check { config } => check(&config),
        Command::Tables { sql } => {
            for table in RegexTableExtractor.find_table_names(&sql) {
                println!("{table}");
            }
            Ok(())
        }
        Command::Query { config, bind, sql } => query(&config, bind, &sql),
    }
}

fn open(path: &Path) -> Result<Database> {
    let config = DatabaseConfig::from_path(path)
        .with_context(|| format!("failed to load config '{}'", path.display()))?;
    if let Some(logging) = &config.logging {
        init_logging(logging).map_err(|err| anyhow!("failed to init logging: {err}"))?;
    }
    Database::open(config).context("failed to build engines")
}

fn check(path: &Path) -> Result<()> {
    let db = open(path)?;
    for bind_name in db.engines().bind_names() {
        let engine = db.engines().bind_engine(bind_name)?;
        let config = engine.config();
        db.transient(|session| {
            session.execute("SELECT 1", ExecuteOptions::bind(bind_name).with_transient(true))
        })
        .with_context(|| format!("bind '{bind_name}' is not reachable"))?;
        println!(
            "bind={} url={} pool_size={} max_connections={} journal_mode={} status=ok",
            bind_name,
            engine.url(),
            config.pool_size,
            config.max_connections(),
            config.journal_mode
        );
    }
    Ok(())
}

fn query(path: &Path, bind: Option<String>, sql: &str) -> Result<()> {
    let db = open(path)?;
    let options = ExecuteOptions {
        bind_name: bind,
        transient: true,
    };
    let result = db.transient(|session| session.execute(sql, options))?;
    print!("{}", render(&result));
    Ok(())
}

fn render(result: &ExecuteResult) -> String {
    let mut out = format!("# bind={}\n", result.bind_name);
    if result.columns.is_empty() {
        out.push_str(&format!("rows_affected={}\n", result.rows_affected));
        return out;
    }
    out.push_str(&result.columns.join("\t"));
    out.push('\n');
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(format_value).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => value.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
