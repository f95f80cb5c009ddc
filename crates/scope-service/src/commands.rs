//! Subcommand implementations.
//!
//! Each command works on the feed named in the configuration and prints its
//! result to stdout, as JSON when `--json` is given.

use crate::server;
use scope_core::{ScopeContext, SystemClock};
use scope_types::{AccountInfo, AccountRef};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn init(context: &ScopeContext, json: bool) -> Result<(), Box<dyn Error>> {
	let feed = context.init_feed().await?;
	let configuration = feed.configuration();
	if json {
		println!("{}", serde_json::to_string_pretty(configuration)?);
	} else {
		println!(
			"Initialized feed '{}' with {} slots (admin {})",
			configuration.feed_id,
			feed.capacity(),
			configuration.admin
		);
	}
	Ok(())
}

/// Imports provider accounts, then maps every configured token.
pub async fn upload(
	context: &ScopeContext,
	accounts_dir: Option<&Path>,
	signer: Option<AccountRef>,
	json: bool,
) -> Result<(), Box<dyn Error>> {
	if let Some(dir) = accounts_dir {
		let imported = import_accounts(context, dir).await?;
		tracing::info!(count = imported, dir = %dir.display(), "Accounts imported");
	}

	let signer = signer.unwrap_or(context.config().feed.admin);
	let slots = context.upload_mappings(&signer).await?;
	if json {
		println!("{}", serde_json::to_string(&slots)?);
	} else {
		println!("Uploaded {} mappings", slots.len());
	}
	Ok(())
}

/// Reads every `<hex account ref>.bin` file in `dir` into the account store.
async fn import_accounts(context: &ScopeContext, dir: &Path) -> Result<usize, Box<dyn Error>> {
	let mut entries = tokio::fs::read_dir(dir).await?;
	let mut imported = 0;
	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();
		if path.extension().and_then(|ext| ext.to_str()) != Some("bin") {
			continue;
		}
		let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
			continue;
		};
		let key: AccountRef = match stem.parse() {
			Ok(key) => key,
			Err(e) => {
				tracing::warn!(file = %path.display(), error = %e, "Skipping file without an account name");
				continue;
			},
		};
		let data = tokio::fs::read(&path).await?;
		context.store().store_account(&AccountInfo::new(key, data)).await?;
		imported += 1;
	}
	Ok(imported)
}

/// Writes the current mapping table as `[tokens.<slot>]` tables.
pub async fn download(context: &ScopeContext, output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
	let tokens = context.download_mappings().await?;
	let mut table = toml::Table::new();
	for (slot, token) in tokens {
		table.insert(slot.to_string(), toml::Value::try_from(token)?);
	}
	let mut document = toml::Table::new();
	document.insert("tokens".to_string(), toml::Value::Table(table));
	let rendered = toml::to_string_pretty(&document)?;

	match output {
		Some(path) => {
			tokio::fs::write(&path, rendered).await?;
			tracing::info!(path = %path.display(), "Mappings written");
		},
		None => print!("{}", rendered),
	}
	Ok(())
}

pub async fn show(context: &ScopeContext, json: bool) -> Result<(), Box<dyn Error>> {
	let rows = context.price_rows().await?;
	if json {
		println!("{}", serde_json::to_string_pretty(&rows)?);
		return Ok(());
	}
	for row in rows {
		println!(
			"{:>4}  {:<24} {:<24} {:>28}  marker {:<12} {}",
			row.slot,
			row.token,
			row.kind.as_str(),
			row.value.as_deref().unwrap_or("-"),
			row.last_updated_marker,
			source_time(row.unix_timestamp)
		);
	}
	Ok(())
}

/// Provider timestamp in RFC 3339, or `-` when the provider reports none.
fn source_time(unix_timestamp: u64) -> String {
	i64::try_from(unix_timestamp)
		.ok()
		.filter(|ts| *ts > 0)
		.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
		.map(|time| time.to_rfc3339())
		.unwrap_or_else(|| "-".to_string())
}

pub async fn get_pubkeys(context: &ScopeContext, json: bool) -> Result<(), Box<dyn Error>> {
	let keys = context.pubkeys().await?;
	if json {
		println!("{}", serde_json::to_string(&keys)?);
	} else {
		for key in keys {
			println!("{}", key);
		}
	}
	Ok(())
}

/// Runs the crank, and the HTTP API when enabled, until Ctrl-C.
pub async fn crank(context: ScopeContext, start_slot: u64) -> Result<(), Box<dyn Error>> {
	let clock = Arc::new(SystemClock::new(start_slot, context.config().crank.ms_per_slot));
	let engine = Arc::new(context.crank_engine(clock).await?);
	engine.initialize().await?;

	let api = context.config().api.clone().filter(|api| api.enabled);
	let context = Arc::new(context);

	let crank_task = {
		let engine = engine.clone();
		tokio::spawn(async move { engine.run().await })
	};

	let api_task = async {
		match api {
			Some(api) => server::start_server(api, context.clone()).await,
			None => std::future::pending().await,
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received interrupt");
		}
		result = api_task => {
			tracing::info!("API server finished");
			result?;
		}
	}

	engine.shutdown().await?;
	crank_task.await??;
	Ok(())
}
