//! One annotation pass over the document.
//!
//! A pass walks the tree, resolves every script run of every candidate leaf
//! through the in-tree cache or the service client, and splices each leaf as
//! soon as its runs are resolved. Leaves are handled in document order, one at
//! a time, and the tree lock is only taken between service calls.

use std::sync::Arc;

use chimera_bridge::ServiceClient;
use chimera_primitives::{BoundedCache, Scanner, SegmentKind};
use parking_lot::Mutex;

use crate::splice::{ResolvedSegment, SpliceOutcome, splice_leaf};
use crate::tree::{ChangeKind, DocumentTree, NodeKind, TreeChange};
use crate::walk::{Candidate, WalkFilter, any_candidate, collect_candidates};

/// Default capacity of the in-tree annotation cache.
pub const DEFAULT_TREE_CACHE_CAPACITY: usize = 5000;

/// Document shared between the pipeline and whoever else mutates it.
pub type SharedTree<T> = Arc<Mutex<T>>;

/// Summary of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
	/// Leaves selected by the walk.
	pub candidates: usize,
	/// Leaves replaced by their fragment.
	pub spliced: usize,
	/// Leaves left alone because they changed or vanished mid-pass.
	pub skipped: usize,
	/// Script runs resolved.
	pub runs: usize,
	/// Runs answered by the in-tree cache.
	pub cache_hits: usize,
	/// Runs rendered as their source text after a failed call.
	pub fallbacks: usize,
}

/// Resolves and splices script runs in a shared document.
pub struct Annotator<T: DocumentTree> {
	tree: SharedTree<T>,
	client: ServiceClient,
	cache: Mutex<BoundedCache<String, String>>,
	scanner: Scanner,
	filter: WalkFilter,
}

impl<T: DocumentTree> std::fmt::Debug for Annotator<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Annotator")
			.field("scanner", &self.scanner)
			.field("filter", &self.filter)
			.field("cached", &self.cache.lock().len())
			.finish_non_exhaustive()
	}
}

impl<T: DocumentTree> Annotator<T> {
	/// Creates an annotator with the default script range, skip tags, and
	/// cache capacity.
	pub fn new(tree: SharedTree<T>, client: ServiceClient) -> Self {
		Self {
			tree,
			client,
			cache: Mutex::new(BoundedCache::new(DEFAULT_TREE_CACHE_CAPACITY)),
			scanner: Scanner::default(),
			filter: WalkFilter::default(),
		}
	}

	/// Replaces the scanner.
	pub fn with_scanner(mut self, scanner: Scanner) -> Self {
		self.scanner = scanner;
		self
	}

	/// Replaces the walk filter.
	pub fn with_filter(mut self, filter: WalkFilter) -> Self {
		self.filter = filter;
		self
	}

	/// Replaces the in-tree cache with an empty one of `capacity`.
	pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
		self.cache = Mutex::new(BoundedCache::new(capacity));
		self
	}

	/// The annotated document.
	pub fn tree(&self) -> &SharedTree<T> {
		&self.tree
	}

	/// The service client used for cache misses.
	pub fn client(&self) -> &ServiceClient {
		&self.client
	}

	/// In-tree cached annotation for a script run.
	pub fn cached(&self, run: &str) -> Option<String> {
		self.cache.lock().get(run).cloned()
	}

	/// Whether `change` introduced content a pass would annotate.
	///
	/// Changes inside generated or skipped subtrees never qualify, which is
	/// what keeps the pipeline's own splices from rescheduling it.
	pub fn is_relevant(&self, change: &TreeChange<T::NodeId>) -> bool {
		let tree = self.tree.lock();
		let admissible = |id: T::NodeId| tree.is_attached(id) && !self.filter.is_excluded(&*tree, id);

		match change.kind {
			ChangeKind::CharacterData => {
				matches!(tree.kind(change.target), Some(NodeKind::Text(text)) if self.scanner.has_runs(text))
					&& admissible(change.target)
			}
			ChangeKind::ChildList => change
				.added
				.iter()
				.any(|&id| admissible(id) && any_candidate(&*tree, id, &self.filter, &self.scanner)),
		}
	}

	/// Runs one full pass and reports what it did.
	///
	/// Never fails: a failed service call degrades to the run's source text
	/// and a leaf that cannot be spliced is skipped.
	pub async fn run_pass(&self) -> PassReport {
		let candidates = {
			let tree = self.tree.lock();
			collect_candidates(&*tree, tree.root(), &self.filter, &self.scanner)
		};
		let mut report = PassReport {
			candidates: candidates.len(),
			..PassReport::default()
		};

		for Candidate { leaf, text } in candidates {
			if !self.still_current(leaf, &text) {
				report.skipped += 1;
				continue;
			}

			let mut resolved = Vec::new();
			for segment in self.scanner.segments(&text) {
				match segment.kind {
					SegmentKind::Plain => resolved.push(ResolvedSegment::Plain(segment.text.to_string())),
					SegmentKind::Run => {
						let annotation = self.resolve(segment.text, &mut report).await;
						resolved.push(ResolvedSegment::Run {
							source: segment.text.to_string(),
							annotation,
						});
					}
				}
			}

			let outcome = splice_leaf(&mut *self.tree.lock(), leaf, &text, resolved);
			match outcome {
				Ok(SpliceOutcome::Spliced(_)) => report.spliced += 1,
				Ok(other) => {
					report.skipped += 1;
					tracing::trace!(leaf = ?leaf, outcome = other.label(), "annotate.splice_skipped");
				}
				Err(error) => {
					report.skipped += 1;
					tracing::warn!(leaf = ?leaf, %error, "annotate.splice_failed");
				}
			}
		}

		tracing::debug!(
			candidates = report.candidates,
			spliced = report.spliced,
			runs = report.runs,
			fallbacks = report.fallbacks,
			"annotate.pass"
		);
		report
	}

	fn still_current(&self, leaf: T::NodeId, text: &str) -> bool {
		let tree = self.tree.lock();
		matches!(tree.kind(leaf), Some(NodeKind::Text(current)) if current == text) && tree.is_attached(leaf)
	}

	async fn resolve(&self, run: &str, report: &mut PassReport) -> String {
		report.runs += 1;
		let cached = self.cache.lock().get(run).cloned();
		if let Some(hit) = cached {
			report.cache_hits += 1;
			return hit;
		}

		match self.client.annotate(run).await {
			Ok(annotation) => {
				self.cache.lock().insert(run.to_string(), annotation.clone());
				annotation
			}
			Err(error) => {
				report.fallbacks += 1;
				tracing::warn!(run, %error, "annotate.fallback");
				run.to_string()
			}
		}
	}
}
