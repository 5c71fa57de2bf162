//! Replaces one scanned leaf with its annotated fragment.

use crate::tree::{AnnotationMarker, DocumentTree, Fragment, NodeKind, TreeError, marked_ancestor};

/// A scanned segment after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSegment {
	/// Text kept as a plain leaf.
	Plain(String),
	/// Script run rendered as an annotation node.
	Run {
		/// The run's text.
		source: String,
		/// Annotation, or `source` after a fallback.
		annotation: String,
	},
}

impl ResolvedSegment {
	fn into_fragment(self) -> Fragment {
		match self {
			Self::Plain(text) => Fragment::Text(text),
			Self::Run { source, annotation } => Fragment::Annotation(AnnotationMarker {
				source,
				resolved: annotation,
			}),
		}
	}
}

/// What [`splice_leaf`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceOutcome<Id> {
	/// The leaf was replaced by these nodes.
	Spliced(Vec<Id>),
	/// The leaf left the document while it was being resolved.
	Detached,
	/// The leaf's text changed since it was scanned; the change notification
	/// schedules the follow-up pass that handles it.
	Stale,
	/// The leaf sits under a generated node.
	Generated,
	/// The node is not a text leaf.
	NotText,
}

impl<Id> SpliceOutcome<Id> {
	/// Short label for logs.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Spliced(_) => "spliced",
			Self::Detached => "detached",
			Self::Stale => "stale",
			Self::Generated => "generated",
			Self::NotText => "not_text",
		}
	}
}

/// Commits `segments` in place of `leaf` as a single structural write.
///
/// `scanned` is the text the segments were computed from. Any leaf that no
/// longer matches it, is gone, or lies under a marker is left alone, which
/// keeps repeated or overlapping passes from annotating anything twice.
pub fn splice_leaf<T: DocumentTree + ?Sized>(tree: &mut T, leaf: T::NodeId, scanned: &str, segments: Vec<ResolvedSegment>) -> Result<SpliceOutcome<T::NodeId>, TreeError> {
	if !tree.is_attached(leaf) {
		return Ok(SpliceOutcome::Detached);
	}
	match tree.kind(leaf) {
		Some(NodeKind::Text(current)) if current == scanned => {}
		Some(NodeKind::Text(_)) => return Ok(SpliceOutcome::Stale),
		Some(NodeKind::Element { .. }) => return Ok(SpliceOutcome::NotText),
		None => return Ok(SpliceOutcome::Detached),
	}
	if marked_ancestor(tree, leaf).is_some() {
		return Ok(SpliceOutcome::Generated);
	}

	let fragment = segments.into_iter().map(ResolvedSegment::into_fragment).collect();
	tree.replace_with_fragment(leaf, fragment).map(SpliceOutcome::Spliced)
}
