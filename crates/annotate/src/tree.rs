//! Document tree seam.
//!
//! The pipeline reads and rewrites the document only through [`DocumentTree`].
//! Implementations report every structural or character-data write, including
//! the pipeline's own, on the channel returned by [`DocumentTree::observe`].

use std::fmt::Debug;
use std::hash::Hash;

use tokio::sync::mpsc;

mod memory;

pub use memory::{MemoryTree, NodeId};

/// Identity tag carried by every node the pipeline generates.
///
/// A marked node and everything beneath it is never scanned again and never
/// retriggers the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMarker {
	/// Script-run text the node replaced.
	pub source: String,
	/// Resolved annotation; the source itself after a failed call.
	pub resolved: String,
}

impl AnnotationMarker {
	/// Text the node shows: the annotation, or the source when it is empty.
	pub fn display_text(&self) -> &str {
		if self.resolved.is_empty() { &self.source } else { &self.resolved }
	}
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
	/// Container node.
	Element {
		/// Lowercase tag name.
		tag: &'a str,
		/// Present on generated annotation nodes.
		marker: Option<&'a AnnotationMarker>,
	},
	/// Text leaf.
	Text(&'a str),
}

/// One piece of a replacement sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
	/// A plain text leaf.
	Text(String),
	/// A marked annotation node.
	Annotation(AnnotationMarker),
}

/// What a [`TreeChange`] touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	/// Children of `target` were added or removed.
	ChildList,
	/// Text of the leaf `target` was rewritten.
	CharacterData,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange<Id> {
	/// Node whose children or text changed.
	pub target: Id,
	/// Change category.
	pub kind: ChangeKind,
	/// Nodes inserted by a child-list change, in document order.
	pub added: Vec<Id>,
}

/// Tree write failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
	/// The node was removed.
	#[error("node no longer exists")]
	Missing,
	/// The node exists but is not reachable from the root.
	#[error("node is detached from the document")]
	Detached,
	/// The operation needs a text leaf.
	#[error("node is not a text leaf")]
	NotText,
	/// The operation needs an element.
	#[error("node is not an element")]
	NotElement,
	/// The root cannot be replaced or removed.
	#[error("the document root cannot be replaced")]
	Root,
}

/// Mutable document tree observed by the pipeline.
pub trait DocumentTree: Send + 'static {
	/// Stable node handle. Handles of removed nodes must never alias live ones.
	type NodeId: Copy + Eq + Hash + Debug + Send + Sync + 'static;

	/// The document root.
	fn root(&self) -> Self::NodeId;

	/// Returns the node's kind, or `None` once it has been removed.
	fn kind(&self, id: Self::NodeId) -> Option<NodeKind<'_>>;

	/// Children of `id` in document order.
	fn children(&self, id: Self::NodeId) -> impl Iterator<Item = Self::NodeId> + '_;

	/// Parent of `id`.
	fn parent(&self, id: Self::NodeId) -> Option<Self::NodeId>;

	/// Whether `id` still exists and is reachable from the root.
	fn is_attached(&self, id: Self::NodeId) -> bool {
		let mut current = id;
		if self.kind(current).is_none() {
			return false;
		}
		loop {
			if current == self.root() {
				return true;
			}
			match self.parent(current) {
				Some(parent) => current = parent,
				None => return false,
			}
		}
	}

	/// Replaces `id` in place with `fragment`, as a single structural write.
	///
	/// Returns the inserted nodes in order.
	fn replace_with_fragment(&mut self, id: Self::NodeId, fragment: Vec<Fragment>) -> Result<Vec<Self::NodeId>, TreeError>;

	/// Subscribes to change notifications from now on.
	fn observe(&mut self) -> mpsc::UnboundedReceiver<TreeChange<Self::NodeId>>;
}

/// Marker on `id` or its nearest marked ancestor.
pub fn marked_ancestor<T: DocumentTree + ?Sized>(tree: &T, id: T::NodeId) -> Option<&AnnotationMarker> {
	let mut current = Some(id);
	while let Some(node) = current {
		if let Some(NodeKind::Element { marker: Some(marker), .. }) = tree.kind(node) {
			return Some(marker);
		}
		current = tree.parent(node);
	}
	None
}
