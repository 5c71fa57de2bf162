//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Unknown keys are rejected to catch typos.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chimera_bridge::{ClientConfig, ServiceClient};
use chimera_primitives::{Scanner, ScriptRange, ScriptRangeError};
use serde::Deserialize;

use crate::annotator::{Annotator, DEFAULT_TREE_CACHE_CAPACITY, SharedTree};
use crate::lookup::{DEFAULT_LOOKUP_CACHE_CAPACITY, DEFAULT_MAX_CHARS, LookupPipeline};
use crate::scheduler::{DEFAULT_DEBOUNCE, SchedulerConfig};
use crate::tree::DocumentTree;
use crate::walk::{DEFAULT_SKIP_TAGS, WalkFilter};

/// Address of the local annotation service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The file could not be read.
	#[error("failed to read {path}: {source}")]
	Io {
		/// File that failed.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: std::io::Error,
	},
	/// The file is not valid configuration TOML.
	#[error("invalid configuration: {0}")]
	Parse(String),
	/// `[scan]` names an invalid script range.
	#[error("invalid [scan] range: {0}")]
	Range(#[from] ScriptRangeError),
}

/// `[service]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSection {
	/// Base URL of the annotation service.
	pub base_url: String,
	/// Per-request timeout in milliseconds; 0 disables it.
	pub request_timeout_ms: u64,
	/// Capacity of the client's annotation cache.
	pub cache_capacity: usize,
}

impl Default for ServiceSection {
	fn default() -> Self {
		let client = ClientConfig::default();
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			request_timeout_ms: client.request_timeout.as_millis() as u64,
			cache_capacity: client.cache_capacity,
		}
	}
}

/// `[scan]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSection {
	/// First code point of the target script, inclusive.
	pub first: u32,
	/// Last code point of the target script, inclusive.
	pub last: u32,
	/// Debounce window in milliseconds.
	pub debounce_ms: u64,
	/// Capacity of the in-tree annotation cache.
	pub cache_capacity: usize,
	/// Run a pass at start-up.
	pub initial_pass: bool,
	/// Element tags whose content is never annotated.
	pub skip_tags: Vec<String>,
}

impl Default for ScanSection {
	fn default() -> Self {
		let range = ScriptRange::default();
		Self {
			first: range.first() as u32,
			last: range.last() as u32,
			debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
			cache_capacity: DEFAULT_TREE_CACHE_CAPACITY,
			initial_pass: true,
			skip_tags: DEFAULT_SKIP_TAGS.iter().map(|tag| tag.to_string()).collect(),
		}
	}
}

/// `[lookup]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupSection {
	/// Selection length ceiling, in characters.
	pub max_chars: usize,
	/// Capacity of the lookup cache.
	pub cache_capacity: usize,
}

impl Default for LookupSection {
	fn default() -> Self {
		Self {
			max_chars: DEFAULT_MAX_CHARS,
			cache_capacity: DEFAULT_LOOKUP_CACHE_CAPACITY,
		}
	}
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChimeraConfig {
	/// Annotation service client.
	pub service: ServiceSection,
	/// Streaming annotation of the document.
	pub scan: ScanSection,
	/// On-demand lookups.
	pub lookup: LookupSection,
}

impl ChimeraConfig {
	/// `chimera/config.toml` under the platform config directory.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("chimera").join("config.toml"))
	}

	/// Parses and validates a configuration document.
	pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
		config.scanner()?;
		Ok(config)
	}

	/// Loads `path`, or the default location when `path` is `None`.
	///
	/// An explicit path must exist. A missing file at the default location
	/// yields the defaults.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let (path, required) = match path {
			Some(path) => (path.to_path_buf(), true),
			None => match Self::default_path() {
				Some(path) => (path, false),
				None => return Ok(Self::default()),
			},
		};

		match std::fs::read_to_string(&path) {
			Ok(source) => {
				tracing::debug!(path = %path.display(), "config.load");
				Self::from_toml(&source)
			}
			Err(error) if !required && error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
			Err(source) => Err(ConfigError::Io { path, source }),
		}
	}

	/// Service client settings.
	pub fn client_config(&self) -> ClientConfig {
		ClientConfig::default()
			.cache_capacity(self.service.cache_capacity)
			.request_timeout(Duration::from_millis(self.service.request_timeout_ms))
	}

	/// Scanner for the configured script range.
	pub fn scanner(&self) -> Result<Scanner, ScriptRangeError> {
		ScriptRange::from_code_points(self.scan.first, self.scan.last).map(Scanner::new)
	}

	/// Walk filter for the configured skip tags.
	pub fn filter(&self) -> WalkFilter {
		WalkFilter::new(&self.scan.skip_tags)
	}

	/// Scheduler settings.
	pub fn scheduler_config(&self) -> SchedulerConfig {
		SchedulerConfig {
			debounce: Duration::from_millis(self.scan.debounce_ms),
			initial_pass: self.scan.initial_pass,
		}
	}

	/// Builds a configured annotator over `tree`.
	pub fn annotator<T: DocumentTree>(&self, tree: SharedTree<T>, client: ServiceClient) -> Result<Annotator<T>, ConfigError> {
		Ok(Annotator::new(tree, client)
			.with_scanner(self.scanner()?)
			.with_filter(self.filter())
			.with_cache_capacity(self.scan.cache_capacity))
	}

	/// Builds a configured lookup pipeline.
	pub fn lookup_pipeline(&self, client: ServiceClient) -> LookupPipeline {
		LookupPipeline::new(client)
			.with_max_chars(self.lookup.max_chars)
			.with_cache_capacity(self.lookup.cache_capacity)
	}
}

#[cfg(test)]
mod tests;
