//! chimera command line.
//!
//! Builds the same pipeline a document host would: requests leave through the
//! in-process bridge and a host task forwards them to the HTTP service.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chimera_annotate::{ChimeraConfig, DocumentTree, LookupOutcome, LookupView, MemoryTree, Scheduler};
use chimera_bridge::{HttpTransport, LookupRecord, ServiceClient, ServiceError, channel};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tracing::info;

/// Bounded queue between the pipeline and the bridge host task.
const BRIDGE_CAPACITY: usize = 64;

/// chimera command line arguments.
#[derive(Parser, Debug)]
#[command(name = "chimera")]
#[command(about = "Annotate target-script text through a local annotation service")]
struct Args {
	/// Configuration file (defaults to the platform config dir)
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Service base URL, overriding the configuration
	#[arg(short, long, value_name = "URL", global = true)]
	server: Option<String>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Annotate every script run in a text file (stdin when omitted)
	Annotate {
		/// Input file, one paragraph per line
		file: Option<PathBuf>,
	},
	/// Look up a selected phrase
	Lookup {
		/// Raw selection text
		text: String,
	},
	/// Print the service version
	Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let mut config = ChimeraConfig::load(args.config.as_deref()).context("loading configuration")?;
	if let Some(server) = args.server {
		config.service.base_url = server;
	}

	let (sender, receiver) = channel::channel(BRIDGE_CAPACITY);
	tokio::spawn(receiver.serve(Arc::new(HttpTransport::new(config.service.base_url.clone()))));
	let client = ServiceClient::new(Arc::new(sender), config.client_config());

	match args.command {
		Command::Annotate { file } => {
			probe_version(&client).await;
			annotate(&config, client, file.as_deref()).await
		}
		Command::Lookup { text } => {
			probe_version(&client).await;
			lookup(&config, client, &text).await;
			Ok(())
		}
		Command::Version => {
			let version = client.version().await.context("version probe failed")?;
			println!("{version}");
			Ok(())
		}
	}
}

async fn probe_version(client: &ServiceClient) {
	match client.version().await {
		Ok(version) => info!(%version, "service.version"),
		Err(error) => tracing::warn!(%error, "service.version_unavailable"),
	}
}

async fn annotate(config: &ChimeraConfig, client: ServiceClient, file: Option<&Path>) -> anyhow::Result<()> {
	let input = match file {
		Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
		None => {
			let mut input = String::new();
			std::io::stdin().read_to_string(&mut input).context("reading stdin")?;
			input
		}
	};

	let mut tree = MemoryTree::new();
	let root = tree.root();
	for line in input.lines().filter(|line| !line.trim().is_empty()) {
		let p = tree.append_element(root, "p")?;
		tree.append_text(p, line)?;
	}
	let tree = Arc::new(Mutex::new(tree));

	let annotator = Arc::new(config.annotator(tree.clone(), client)?);
	let mut scheduler_config = config.scheduler_config();
	scheduler_config.initial_pass = true;
	let handle = Scheduler::new(annotator, scheduler_config).spawn();
	handle.settled().await;
	let stats = handle.stats();
	handle.shutdown().await;

	info!(passes = stats.passes, spliced = stats.spliced, fallbacks = stats.fallbacks, "annotate.done");
	println!("{}", tree.lock().render());
	Ok(())
}

/// Prints lookup states as they arrive.
struct TerminalView;

impl LookupView for TerminalView {
	fn loading(&mut self, phrase: &str) {
		eprintln!("looking up {phrase}...");
	}

	fn ready(&mut self, phrase: &str, record: &LookupRecord) {
		println!("{phrase}  {}", record.transcription);
		println!("  {}", record.translation);
		if !record.usage.is_empty() {
			println!("  usage: {}", record.usage);
		}
		for example in &record.examples {
			println!("  - {} / {}", example.transcription, example.translation);
		}
	}

	fn failed(&mut self, phrase: &str, error: &ServiceError) {
		eprintln!("lookup of {phrase} failed: {error}");
	}
}

async fn lookup(config: &ChimeraConfig, client: ServiceClient, text: &str) {
	let pipeline = config.lookup_pipeline(client);
	if let LookupOutcome::Rejected(reason) = pipeline.request(text, &mut TerminalView).await {
		info!(%reason, "lookup.ignored");
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("CHIMERA_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("chimera=debug,chimera_annotate=debug,chimera_bridge=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
