//! Document-order traversal to candidate leaves.

use std::ops::ControlFlow;

use chimera_primitives::Scanner;
use rustc_hash::FxHashSet;

use crate::tree::{DocumentTree, NodeKind};

/// Element tags whose content is never annotated.
pub const DEFAULT_SKIP_TAGS: &[&str] = &["script", "style", "textarea", "input", "code", "pre", "noscript"];

/// Decides which subtrees the walk enters.
#[derive(Debug, Clone)]
pub struct WalkFilter {
	skip_tags: FxHashSet<String>,
}

impl Default for WalkFilter {
	fn default() -> Self {
		Self::new(DEFAULT_SKIP_TAGS.iter().copied())
	}
}

impl WalkFilter {
	/// Builds a filter skipping `tags`, compared case-insensitively.
	pub fn new<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Self {
		Self {
			skip_tags: tags.into_iter().map(|tag| tag.as_ref().to_ascii_lowercase()).collect(),
		}
	}

	/// Whether an element with `tag` is skipped.
	pub fn skips(&self, tag: &str) -> bool {
		self.skip_tags.contains(&tag.to_ascii_lowercase())
	}

	fn rejects(&self, kind: NodeKind<'_>) -> bool {
		match kind {
			NodeKind::Element { marker: Some(_), .. } => true,
			NodeKind::Element { tag, .. } => self.skips(tag),
			NodeKind::Text(_) => false,
		}
	}

	/// Whether `id` or any ancestor is marked or skip-tagged.
	pub fn is_excluded<T: DocumentTree + ?Sized>(&self, tree: &T, id: T::NodeId) -> bool {
		let mut current = Some(id);
		while let Some(node) = current {
			match tree.kind(node) {
				Some(kind) if self.rejects(kind) => return true,
				Some(_) => current = tree.parent(node),
				None => return true,
			}
		}
		false
	}
}

/// A leaf selected for annotation together with the text it was selected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<Id> {
	/// The text leaf.
	pub leaf: Id,
	/// Its text at collection time.
	pub text: String,
}

/// Collects text leaves under `from` that hold at least one target-script
/// character, in document order.
///
/// Marked and skip-tagged subtrees are not entered. `from` itself is assumed
/// to be admissible; callers check [`WalkFilter::is_excluded`] first when
/// starting below the root.
pub fn collect_candidates<T: DocumentTree + ?Sized>(tree: &T, from: T::NodeId, filter: &WalkFilter, scanner: &Scanner) -> Vec<Candidate<T::NodeId>> {
	let mut out = Vec::new();
	let _ = visit_candidates(tree, from, filter, scanner, |leaf, text| {
		out.push(Candidate { leaf, text: text.to_string() });
		ControlFlow::<()>::Continue(())
	});
	out
}

/// Whether [`collect_candidates`] would find anything under `from`.
///
/// Stops at the first match and copies no text.
pub fn any_candidate<T: DocumentTree + ?Sized>(tree: &T, from: T::NodeId, filter: &WalkFilter, scanner: &Scanner) -> bool {
	visit_candidates(tree, from, filter, scanner, |_, _| ControlFlow::Break(())).is_break()
}

fn visit_candidates<T, B>(
	tree: &T,
	from: T::NodeId,
	filter: &WalkFilter,
	scanner: &Scanner,
	mut visit: impl FnMut(T::NodeId, &str) -> ControlFlow<B>,
) -> ControlFlow<B>
where
	T: DocumentTree + ?Sized,
{
	let mut stack = vec![from];
	while let Some(id) = stack.pop() {
		match tree.kind(id) {
			Some(NodeKind::Text(text)) => {
				if scanner.has_runs(text) {
					visit(id, text)?;
				}
			}
			Some(kind) if id != from && filter.rejects(kind) => {}
			Some(NodeKind::Element { .. }) => {
				let mark = stack.len();
				stack.extend(tree.children(id));
				stack[mark..].reverse();
			}
			None => {}
		}
	}
	ControlFlow::Continue(())
}
