//! Selection-triggered rich lookup.
//!
//! Independent of the scheduler: a selection is cleaned, guarded, and resolved
//! through the pipeline's own cache or the service client, and every state
//! change is pushed to a [`LookupView`].

use chimera_bridge::{LookupRecord, ServiceClient, ServiceError};
use chimera_primitives::{BoundedCache, CleanError, clean_selection};
use parking_lot::Mutex;

/// Default selection length ceiling, in characters.
pub const DEFAULT_MAX_CHARS: usize = 120;

/// Default capacity of the lookup cache.
pub const DEFAULT_LOOKUP_CACHE_CAPACITY: usize = 256;

/// Receives lookup states for display.
pub trait LookupView {
	/// A lookup for `phrase` was accepted and is in progress.
	fn loading(&mut self, phrase: &str);
	/// The lookup for `phrase` finished.
	fn ready(&mut self, phrase: &str, record: &LookupRecord);
	/// The lookup for `phrase` failed.
	fn failed(&mut self, phrase: &str, error: &ServiceError);
}

/// How a selection was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
	/// Dropped by the input guard; the view was not touched.
	Rejected(CleanError),
	/// Answered by the lookup cache.
	Cached(LookupRecord),
	/// Answered by the service.
	Resolved(LookupRecord),
	/// The service call failed; the view shows the error.
	Failed(ServiceError),
}

/// On-demand lookup pipeline.
#[derive(Debug)]
pub struct LookupPipeline {
	client: ServiceClient,
	cache: Mutex<BoundedCache<String, LookupRecord>>,
	max_chars: usize,
}

impl LookupPipeline {
	/// Creates a pipeline with the default ceiling and cache capacity.
	pub fn new(client: ServiceClient) -> Self {
		Self {
			client,
			cache: Mutex::new(BoundedCache::new(DEFAULT_LOOKUP_CACHE_CAPACITY)),
			max_chars: DEFAULT_MAX_CHARS,
		}
	}

	/// Sets the selection length ceiling.
	pub fn with_max_chars(mut self, max_chars: usize) -> Self {
		self.max_chars = max_chars;
		self
	}

	/// Replaces the cache with an empty one of `capacity`.
	pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
		self.cache = Mutex::new(BoundedCache::new(capacity));
		self
	}

	/// Cached record for an already cleaned phrase.
	pub fn cached(&self, phrase: &str) -> Option<LookupRecord> {
		self.cache.lock().get(phrase).cloned()
	}

	/// Handles one selection event carrying `raw` selected text.
	pub async fn request<V: LookupView + ?Sized>(&self, raw: &str, view: &mut V) -> LookupOutcome {
		let phrase = match clean_selection(raw, self.max_chars) {
			Ok(phrase) => phrase,
			Err(reason) => {
				tracing::trace!(%reason, "lookup.rejected");
				return LookupOutcome::Rejected(reason);
			}
		};

		view.loading(&phrase);

		let cached = self.cached(&phrase);
		if let Some(record) = cached {
			view.ready(&phrase, &record);
			return LookupOutcome::Cached(record);
		}

		match self.client.lookup(&phrase).await {
			Ok(record) => {
				self.cache.lock().insert(phrase.clone(), record.clone());
				view.ready(&phrase, &record);
				LookupOutcome::Resolved(record)
			}
			Err(error) => {
				tracing::warn!(phrase = %phrase, %error, "lookup.failed");
				view.failed(&phrase, &error);
				LookupOutcome::Failed(error)
			}
		}
	}
}
