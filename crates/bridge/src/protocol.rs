//! Message shapes exchanged with the annotation service.
//!
//! Requests are a closed, tagged set. Replies arrive as untyped JSON and are
//! decoded per request mode, so unexpected shapes become a distinct
//! [`ServiceError::Malformed`] failure instead of leaking loosely typed data.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ServiceError};

/// Maximum number of usage examples kept on a [`LookupRecord`].
pub const MAX_EXAMPLES: usize = 2;

/// A request understood by the annotation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeRequest {
	/// Streaming-annotation mode: transcribe one script run.
	#[serde(rename = "CHIMERA_PINYIN")]
	Annotate {
		/// The script-run text.
		text: String,
	},
	/// Rich-lookup mode: dictionary record for a cleaned phrase.
	#[serde(rename = "DICT_LOOKUP")]
	Lookup {
		/// The cleaned selection.
		text: String,
	},
	/// Version probe, used for diagnostics only.
	#[serde(rename = "DICT_VERSION")]
	Version,
}

impl BridgeRequest {
	/// Short label for logs.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Annotate { .. } => "annotate",
			Self::Lookup { .. } => "lookup",
			Self::Version => "version",
		}
	}
}

/// One usage example of a looked-up phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageExample {
	/// Phonetic transcription of the example sentence.
	#[serde(alias = "pinyin")]
	pub transcription: String,
	/// Translation of the example sentence.
	#[serde(alias = "english")]
	pub translation: String,
}

/// Structured result of a rich lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
	/// Primary phonetic transcription.
	#[serde(alias = "pinyin")]
	pub transcription: String,
	/// Gloss in the reader's language.
	#[serde(alias = "english")]
	pub translation: String,
	/// Short usage note.
	#[serde(default)]
	pub usage: String,
	/// At most [`MAX_EXAMPLES`] examples.
	#[serde(default)]
	pub examples: Vec<UsageExample>,
}

/// Diagnostic version descriptor reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
	/// Implementation version string.
	pub version: String,
	/// Backing model, when the service uses one.
	#[serde(default)]
	pub model: Option<String>,
	/// Service clock in unix seconds.
	#[serde(default)]
	pub time: Option<i64>,
}

impl fmt::Display for VersionInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.version)?;
		if let Some(model) = &self.model {
			write!(f, " ({model})")?;
		}
		Ok(())
	}
}

fn default_ok() -> bool {
	true
}

#[derive(Deserialize)]
struct AnnotateReply {
	#[serde(default = "default_ok")]
	ok: bool,
	#[serde(default, alias = "pinyin")]
	annotation: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Deserialize)]
struct LookupReply {
	ok: bool,
	#[serde(default)]
	data: Option<Value>,
	#[serde(default)]
	error: Option<String>,
}

fn rejected(error: Option<String>) -> ServiceError {
	ServiceError::Rejected(error.unwrap_or_else(|| "no error message".to_string()))
}

/// Decodes a streaming-annotation reply.
///
/// A reply that cannot be read as an annotation is an empty annotation, not a
/// failure. Only an explicit `ok: false` is surfaced as [`ServiceError::Rejected`].
pub fn decode_annotation(value: Value) -> Result<String> {
	match serde_json::from_value::<AnnotateReply>(value) {
		Ok(reply) if !reply.ok => Err(rejected(reply.error)),
		Ok(reply) => Ok(reply.annotation.unwrap_or_default()),
		Err(error) => {
			tracing::debug!(%error, "bridge.annotate.malformed");
			Ok(String::new())
		}
	}
}

/// Decodes a rich-lookup reply of the form `{ok, data | error}`.
pub fn decode_lookup(value: Value) -> Result<LookupRecord> {
	let reply: LookupReply = serde_json::from_value(value).map_err(|e| ServiceError::Malformed(e.to_string()))?;
	if !reply.ok {
		return Err(rejected(reply.error));
	}

	let data = reply
		.data
		.ok_or_else(|| ServiceError::Malformed("missing `data`".to_string()))?;
	let mut record: LookupRecord = serde_json::from_value(data).map_err(|e| ServiceError::Malformed(e.to_string()))?;
	record.examples.truncate(MAX_EXAMPLES);
	Ok(record)
}

/// Decodes a version probe reply.
pub fn decode_version(value: Value) -> Result<VersionInfo> {
	serde_json::from_value(value).map_err(|e| ServiceError::Malformed(e.to_string()))
}
