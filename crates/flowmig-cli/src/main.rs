use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowmig_config::{AppConfig, ConfigLoader, LogConfig};
use flowmig_db::{Dialect, FLOW_NUM_LIMIT, Runner, STEP_NUM_LIMIT, make_id};
use rusqlite::Connection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod flows;

#[derive(Parser, Debug)]
#[command(name = "flowmig", version, about = "Apply the application's schema migrations")]
struct Cli {
    /// Path to config.yml or config.toml
    #[arg(short, long, env = "FLOWMIG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the config file)
    #[arg(long, env = "FLOWMIG_DATABASE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every migration that has not been applied yet
    Up,
    /// List registered migrations and whether each one is applied
    Status,
    /// Print the migration ID for a prefix, flow number and step number
    Id {
        prefix: String,
        #[arg(value_parser = clap::value_parser!(u32).range(0..=i64::from(FLOW_NUM_LIMIT)))]
        flow: u32,
        #[arg(value_parser = clap::value_parser!(u32).range(0..=i64::from(STEP_NUM_LIMIT)))]
        step: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }
    init_tracing(&config.log);

    match cli.command {
        Command::Up => {
            if let Err(e) = run_up(&config) {
                error!("migrations failed, refusing to continue: {e:#}");
                return Err(e);
            }
        }
        Command::Status => run_status(&config)?,
        Command::Id { prefix, flow, step } => println!("{}", make_id(&prefix, flow, step)),
    }
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_database(config: &AppConfig) -> Result<Connection> {
    let path = config.database.resolved_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let conn = Connection::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .context("failed to set pragmas")?;
    info!("opened database at {}", path.display());
    Ok(conn)
}

fn configured_runner<'db>(
    conn: &'db mut Connection,
    config: &AppConfig,
) -> Result<Runner<'db, Connection>> {
    let mut runner = Runner::new(conn).with_tracking_table(&config.migrations.tracking_table);
    if let Some(schema) = &config.migrations.schema {
        runner = runner.with_schema(schema.clone());
    }
    if let Some(dialect) = &config.database.dialect {
        let dialect: Dialect = dialect.parse()?;
        runner = runner.with_dialect(dialect);
    }
    Ok(runner.with_flows(flows::all()))
}

fn run_up(config: &AppConfig) -> Result<()> {
    let mut conn = open_database(config)?;
    let applied = configured_runner(&mut conn, config)?.up()?;
    if applied == 0 {
        info!("schema is up to date");
    }
    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let mut conn = open_database(config)?;
    let status = configured_runner(&mut conn, config)?.status()?;

    println!("{:<12} {:<8} APPLIED AT", "ID", "STATE");
    for step in &status {
        let state = if step.applied { "applied" } else { "pending" };
        let at = step
            .applied_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<12} {state:<8} {at}", step.id);
    }
    Ok(())
}
