mod commands;
mod config;
mod output;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use trailwatch_core::EventType;

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "trailwatch", version, about = "Filesystem audit trail: watch, query and verify")]
struct Cli {
	/// Config file (default: <config dir>/trailwatch/config.toml if present)
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Watch a folder and log events to the audit trail
	Watch(WatchArgs),
	/// Print the most recent audit events
	Tail(TailArgs),
	/// Search audit events with filters
	Search(SearchArgs),
	/// Compare recorded hashes with the files on disk
	Verify(VerifyArgs),
	/// Create the audit schema (safe to run repeatedly)
	Init(InitArgs),
}

#[derive(Debug, Args)]
struct WatchArgs {
	/// Folder to watch
	#[arg(long)]
	folder: PathBuf,
	/// Path to the audit database
	#[arg(long)]
	db: Option<PathBuf>,
	/// Watch subfolders too
	#[arg(long)]
	recursive: bool,
	/// Log directory events too (default: files only)
	#[arg(long)]
	include_dirs: bool,
	/// Print watcher status messages
	#[arg(long)]
	verbose: bool,
	/// Ignore pattern (repeatable), e.g. --ignore '*.log' --ignore '*/node_modules/*'
	#[arg(long)]
	ignore: Vec<String>,
	/// Record SHA-256 of created, modified and moved files
	#[arg(long)]
	hash: bool,
	/// Minimum seconds between two `modified` records for the same path
	#[arg(long, value_name = "SECS")]
	debounce: Option<f64>,
}

#[derive(Debug, Args)]
struct TailArgs {
	#[arg(long)]
	db: Option<PathBuf>,
	/// Number of rows to print
	#[arg(long, default_value_t = 20)]
	limit: usize,
	/// Show size and hash columns
	#[arg(long)]
	show_hash: bool,
}

#[derive(Debug, Args)]
struct SearchArgs {
	#[arg(long)]
	db: Option<PathBuf>,
	/// Filter by event type (created, modified, deleted, moved, startup, shutdown)
	#[arg(long = "type", value_name = "TYPE")]
	event_type: Option<EventType>,
	/// Substring match against source or destination path
	#[arg(long)]
	contains: Option<String>,
	/// Only events at or after this time (RFC 3339 or YYYY-MM-DD, UTC)
	#[arg(long, value_parser = output::parse_since)]
	since: Option<chrono::DateTime<chrono::Utc>>,
	/// Max rows to print
	#[arg(long, default_value_t = 50)]
	limit: usize,
	#[arg(long)]
	show_hash: bool,
}

#[derive(Debug, Args)]
struct VerifyArgs {
	/// Folder whose recorded files are checked
	#[arg(long)]
	folder: PathBuf,
	#[arg(long)]
	db: Option<PathBuf>,
	/// Also write the report as JSON
	#[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "verify_report.json")]
	json: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InitArgs {
	#[arg(long)]
	db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let settings = Settings::load(cli.config.as_deref())?;

	let verbose = matches!(&cli.command, Command::Watch(args) if args.verbose);
	init_tracing(&settings.log_dir(), verbose);

	match cli.command {
		Command::Watch(args) => commands::watch(args, &settings).await,
		Command::Tail(args) => commands::tail(args, &settings).await,
		Command::Search(args) => commands::search(args, &settings).await,
		Command::Verify(args) => commands::verify(args, &settings).await,
		Command::Init(args) => commands::init(args, &settings).await,
	}
}

/// File log in `log_dir`, plus stderr filtered by `RUST_LOG` (default `info`
/// with --verbose, `warn` otherwise).
fn init_tracing(log_dir: &Path, verbose: bool) {
	let default_level = if verbose { "info" } else { "warn" };
	let stderr_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	let stderr_layer = fmt::layer()
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_filter(stderr_filter);

	// A log directory we cannot create only costs us the file layer.
	let file_layer = std::fs::create_dir_all(log_dir).ok().map(|_| {
		let file_appender = tracing_appender::rolling::never(log_dir, "trailwatch.log");
		fmt::layer()
			.with_writer(file_appender)
			.with_ansi(false)
			.with_filter(EnvFilter::new("info"))
	});

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();
}
