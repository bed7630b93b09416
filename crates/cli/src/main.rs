//! Herald command line front end.
//!
//! Renders markup messages to the terminal, either for the console or for a
//! simulated player, using the same parse, queue and dispatch path a host
//! would use.

mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use herald::{Herald, HeraldConfig, HostCapabilities, RecipientHandle, Substitutions};
use tracing::info;
use uuid::Uuid;

use crate::sink::TerminalSink;

/// How long to wait for queued messages to render before exiting.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Herald command line arguments.
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Render herald markup messages to the terminal")]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Deliver to a simulated player instead of the console
	#[arg(short, long, value_name = "NAME")]
	player: Option<String>,

	/// Region the simulated player belongs to
	#[arg(long, default_value_t = 0)]
	region: u32,

	/// Placeholder value, repeatable
	#[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
	set: Vec<String>,

	/// Send a message registered in the configuration, repeatable
	#[arg(short, long, value_name = "KEY")]
	named: Vec<String>,

	/// Let the dispatcher use region contexts and an async pool
	#[arg(long)]
	partitioned: bool,

	/// Print execution context and queue statistics before exiting
	#[arg(long)]
	status: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,

	/// Raw messages to render, in order
	messages: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => HeraldConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => HeraldConfig::default(),
	};
	let substitutions = parse_substitutions(&args.set)?;

	let herald = Herald::builder(Arc::new(TerminalSink))
		.config(config)
		.probe(HostCapabilities {
			partitioned: args.partitioned,
			async_pool: args.partitioned,
		})
		.start()?;
	info!(strategy = %herald.strategy(), "herald started");

	let recipient = match &args.player {
		Some(name) => {
			let handle = RecipientHandle::player(Uuid::new_v4(), name.clone(), args.region);
			herald.directory().join(handle.clone());
			handle
		}
		None => herald.console(),
	};

	let mut expected = 0u64;
	for raw in &args.messages {
		herald.submit(recipient.identity(), raw, substitutions.clone())?;
		expected += 1;
	}
	for key in &args.named {
		if herald.send_named(key, &recipient, substitutions.clone())? {
			expected += 1;
		} else {
			eprintln!("no message registered under '{key}'");
		}
	}

	drain(&herald, expected).await;

	if args.status {
		for record in herald.snapshots() {
			println!(
				"{:<16} threads={} executed={} panicked={} pending={}",
				record.name, record.threads, record.executed, record.panicked, record.pending
			);
		}
		let stats = herald.queue_stats();
		println!("delivered={} dropped={} queues={}", stats.delivered, stats.dropped, stats.queues);
	}

	herald.shutdown();
	Ok(())
}

async fn drain(herald: &Herald, expected: u64) {
	let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
	loop {
		let stats = herald.queue_stats();
		if stats.delivered + stats.dropped >= expected {
			return;
		}
		if tokio::time::Instant::now() >= deadline {
			tracing::warn!(expected, delivered = stats.delivered, dropped = stats.dropped, "drain timed out");
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

fn parse_substitutions(pairs: &[String]) -> anyhow::Result<Substitutions> {
	let mut substitutions = Substitutions::new();
	for pair in pairs {
		let Some((key, value)) = pair.split_once('=') else {
			bail!("expected KEY=VALUE, got '{pair}'");
		};
		if key.is_empty() {
			bail!("placeholder key cannot be empty in '{pair}'");
		}
		substitutions = substitutions.with(key, value);
	}
	Ok(substitutions)
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("HERALD_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.unwrap_or_else(|_| if verbose { EnvFilter::new("herald=debug,info") } else { EnvFilter::new("herald=info,warn") })
	};

	if let Some(log_dir) = std::env::var("HERALD_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("herald.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);
			tracing_subscriber::registry().with(filter()).with(file_layer).init();
			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn substitutions_parse_key_value_pairs() {
		let subs = parse_substitutions(&["player=Steve".into(), "msg=a=b".into()]).unwrap();
		let pairs: Vec<_> = subs.iter().map(|p| (p.key().to_string(), p.value().to_string())).collect();
		assert_eq!(
			pairs,
			vec![("player".to_string(), "Steve".to_string()), ("msg".to_string(), "a=b".to_string())]
		);
	}

	#[test]
	fn malformed_pairs_are_rejected() {
		assert!(parse_substitutions(&["novalue".into()]).is_err());
		assert!(parse_substitutions(&["=x".into()]).is_err());
	}

	#[test]
	fn args_accept_repeated_placeholders() {
		let args = Args::try_parse_from(["herald", "-p", "Steve", "-s", "a=1", "-s", "b=2", "hello", "<sound:CLICK>"]).unwrap();
		assert_eq!(args.player.as_deref(), Some("Steve"));
		assert_eq!(args.set.len(), 2);
		assert_eq!(args.messages, vec!["hello", "<sound:CLICK>"]);
	}
}
