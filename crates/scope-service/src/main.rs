//! Command-line entry point for the Scope price oracle.
//!
//! Every subcommand operates on the feed described by the configuration
//! file: `init` creates it, `upload` maps the configured tokens, `download`
//! exports the current mappings, `show` prints prices, `get-pubkeys` lists
//! the accounts a refresh reads and `crank` keeps the prices fresh.

use clap::{Parser, Subcommand};
use scope_config::Config;
use scope_types::AccountRef;
use std::path::PathBuf;

mod apis;
mod commands;
mod factory_registry;
mod server;

/// Command-line arguments for the scope binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", global = true)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	/// Print command output and logs as JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create the feed named in the configuration
	Init,
	/// Map every configured token to its provider account
	Upload {
		/// Directory of `<account>.bin` files to import first
		#[arg(long)]
		accounts: Option<PathBuf>,
		/// Signer of the mapping updates; defaults to the configured admin
		#[arg(long)]
		signer: Option<AccountRef>,
	},
	/// Export the current mappings as token configuration
	Download {
		/// Output file; stdout when omitted
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// Print the prices of every mapped slot
	Show,
	/// Refresh prices until interrupted
	Crank {
		/// Ledger slot the clock starts from
		#[arg(long, default_value_t = 0)]
		start_slot: u64,
	},
	/// List every account the feed reads
	GetPubkeys,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	init_tracing(&args.log_level, args.json);

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.feed.id);

	let context = factory_registry::build_context_from_config(config)?;

	match args.command {
		Command::Init => commands::init(&context, args.json).await?,
		Command::Upload { accounts, signer } => {
			commands::upload(&context, accounts.as_deref(), signer, args.json).await?
		},
		Command::Download { output } => commands::download(&context, output).await?,
		Command::Show => commands::show(&context, args.json).await?,
		Command::GetPubkeys => commands::get_pubkeys(&context, args.json).await?,
		Command::Crank { start_slot } => commands::crank(context, start_slot).await?,
	}
	Ok(())
}

/// `RUST_LOG` takes precedence over `--log-level`.
fn init_tracing(log_level: &str, json: bool) {
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
	let builder = fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true);

	if json {
		builder.json().init();
	} else {
		builder.with_thread_ids(true).init();
	}
}
