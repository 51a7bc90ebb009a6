use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use trailwatch_daemon::{db, resolve_folder, run_watch, verify as verify_folder, AuditStore, SearchFilter, WatchOptions};

use crate::{
	config::{debounce_from_secs, Settings},
	output, InitArgs, SearchArgs, TailArgs, VerifyArgs, WatchArgs,
};

async fn open_store(db_arg: Option<PathBuf>, settings: &Settings) -> anyhow::Result<AuditStore> {
	let path = db_arg.unwrap_or_else(|| settings.db.clone());
	let handle = db::open(&path)
		.await
		.with_context(|| format!("cannot open audit database {}", path.display()))?;
	Ok(AuditStore::open(handle).await?)
}

pub async fn watch(args: WatchArgs, settings: &Settings) -> anyhow::Result<()> {
	let debounce = match args.debounce {
		Some(secs) => debounce_from_secs(secs)?,
		None => settings.debounce()?,
	};

	let mut options = WatchOptions::new(&args.folder);
	options.recursive = args.recursive || settings.recursive;
	options.include_dirs = args.include_dirs || settings.include_dirs;
	options.hash_enabled = args.hash || settings.hash;
	options.debounce = debounce;
	options.ignore = settings.ignore.iter().chain(&args.ignore).cloned().collect();
	options.channel_capacity = settings.channel_capacity;

	// Fail on a bad folder before touching the database.
	let folder = resolve_folder(&args.folder)?;
	let store = open_store(args.db, settings).await?;

	if args.verbose {
		println!(
			"Watching: {} (recursive={}, include_dirs={}, hash={})",
			folder.display(),
			options.recursive,
			options.include_dirs,
			options.hash_enabled
		);
		println!("Press Ctrl+C to stop.\n");
	}

	let stats = run_watch(store, options, async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "cannot listen for Ctrl+C; stopping");
		}
	})
	.await?;

	if args.verbose {
		println!(
			"\nStopped. {} notification(s), {} recorded, {} filtered.",
			stats.received, stats.recorded, stats.suppressed
		);
	}
	Ok(())
}

pub async fn tail(args: TailArgs, settings: &Settings) -> anyhow::Result<()> {
	let store = open_store(args.db, settings).await?;
	let records = store.latest(args.limit).await?;

	if records.is_empty() {
		println!("No audit events found.");
		return Ok(());
	}
	output::print_rows(&records, args.show_hash);
	Ok(())
}

pub async fn search(args: SearchArgs, settings: &Settings) -> anyhow::Result<()> {
	let store = open_store(args.db, settings).await?;
	let filter = SearchFilter {
		event_type: args.event_type,
		contains: args.contains,
		since: args.since,
		limit: args.limit,
	};
	let records = store.search(&filter).await?;

	if records.is_empty() {
		println!("No matching audit events found.");
		return Ok(());
	}
	output::print_rows(&records, args.show_hash);
	Ok(())
}

pub async fn verify(args: VerifyArgs, settings: &Settings) -> anyhow::Result<()> {
	let store = open_store(args.db, settings).await?;
	let report = verify_folder(&args.folder, &store).await?;

	output::print_report(&report);

	if let Some(path) = args.json {
		write_json(&path, &report)?;
		println!("Report written to {}", path.display());
	}
	Ok(())
}

pub async fn init(args: InitArgs, settings: &Settings) -> anyhow::Result<()> {
	let path = args.db.clone().unwrap_or_else(|| settings.db.clone());
	let store = open_store(args.db, settings).await?;
	let count = store.count().await?;
	info!(db = %path.display(), count, "schema initialized");
	println!("Audit database ready: {} ({} event(s))", path.display(), count);
	Ok(())
}

fn write_json(path: &Path, report: &trailwatch_core::VerifyReport) -> anyhow::Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}
	let json = serde_json::to_string_pretty(report)?;
	std::fs::write(path, json).with_context(|| format!("cannot write report {}", path.display()))
}
