//! ibcscan — query and load the IBC block record store.

mod commands;
mod config;
mod import;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ibcscan_store::AsyncBlockStore;
use ibcscan_store_lmdb::{check_integrity, LmdbEnvironment};
use ibcscan_types::BlockHash;
use ibcscan_utils::LogFormat;

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "ibcscan", about = "IBC block record store")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "IBCSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the block store.
    #[arg(long, env = "IBCSCAN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "IBCSCAN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "IBCSCAN_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Deadline for each store call, in milliseconds.
    #[arg(long, env = "IBCSCAN_QUERY_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the block with the greatest height.
    Latest,
    /// Print the block with the given hash.
    Get { hash: String },
    /// Print every block at a height.
    AtHeight { height: u64 },
    /// Print the newest blocks, highest first.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the number of stored blocks.
    Count,
    /// Load newline-delimited JSON block records from a file.
    Import {
        file: PathBuf,
        /// Records per write transaction.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Verify that records and the height index agree.
    Check,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<DaemonConfig> {
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(ms) = cli.timeout_ms {
        config.query_timeout_ms = ms;
    }
    if let Command::Import {
        batch_size: Some(size),
        ..
    } = &cli.command
    {
        config.import_batch_size = *size;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    ibcscan_utils::init_logging(config.log_format, &config.log_level);

    if let Some(path) = &cli.config {
        tracing::debug!(path = %path.display(), "loaded config file");
    }

    let env = LmdbEnvironment::open(&config.data_dir, &config.store_config())
        .with_context(|| format!("opening block store at {}", config.data_dir.display()))?;
    let env = Arc::new(env);
    let store = AsyncBlockStore::new(Arc::new(env.block_store()), config.query_timeout());
    let mut out = std::io::stdout();

    let found = match cli.command {
        Command::Latest => {
            commands::latest(&store, &mut out).await?;
            true
        }
        Command::Get { hash } => {
            let found = commands::get(&store, BlockHash::new(hash.clone()), &mut out).await?;
            if !found {
                eprintln!("block {hash} not found");
            }
            found
        }
        Command::AtHeight { height } => {
            let found = commands::at_height(&store, height, &mut out).await?;
            if !found {
                eprintln!("no block at height {height}");
            }
            found
        }
        Command::Recent { limit } => {
            commands::recent(&store, limit, &mut out).await?;
            true
        }
        Command::Count => {
            commands::count(&store, &mut out).await?;
            true
        }
        Command::Import { file, .. } => {
            let reader = BufReader::new(
                File::open(&file).with_context(|| format!("opening {}", file.display()))?,
            );
            let batch_size = config.import_batch_size;
            let import_env = Arc::clone(&env);
            let summary = tokio::task::spawn_blocking(move || {
                import::import_records(&import_env, reader, batch_size)
            })
            .await??;
            tracing::info!(
                inserted = summary.inserted,
                duplicates = summary.duplicates,
                file = %file.display(),
                "import finished"
            );
            println!(
                "inserted {}, skipped {} already stored",
                summary.inserted, summary.duplicates
            );
            true
        }
        Command::Check => {
            let check_env = Arc::clone(&env);
            let report = tokio::task::spawn_blocking(move || {
                check_env.wait_for_height_index()?;
                anyhow::Ok(check_integrity(&check_env)?)
            })
            .await??;
            println!(
                "checked {} databases: {} records, {} index rows",
                report.databases_checked, report.records, report.index_entries
            );
            for error in &report.errors {
                println!("error: {error}");
            }
            report.is_healthy()
        }
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
