//! Arena-backed in-memory document.

use std::fmt::Write as _;

use slotmap::{SlotMap, new_key_type};
use tokio::sync::mpsc;

use super::{AnnotationMarker, ChangeKind, DocumentTree, Fragment, NodeKind, TreeChange, TreeError};

new_key_type! {
	/// Handle to a [`MemoryTree`] node.
	pub struct NodeId;
}

/// Tag used for generated annotation nodes.
pub const ANNOTATION_TAG: &str = "span";

#[derive(Debug, Clone)]
enum NodeData {
	Element { tag: String, marker: Option<AnnotationMarker> },
	Text(String),
}

#[derive(Debug, Clone)]
struct Node {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	data: NodeData,
}

/// In-memory [`DocumentTree`].
///
/// The root is a `body` element. Mutation helpers stand in for the external
/// forces that rewrite a live document; each one notifies observers the same
/// way pipeline writes do. An annotation node is a marked `span` holding a
/// single text leaf with the marker's display text.
#[derive(Debug)]
pub struct MemoryTree {
	nodes: SlotMap<NodeId, Node>,
	root: NodeId,
	observers: Vec<mpsc::UnboundedSender<TreeChange<NodeId>>>,
}

impl Default for MemoryTree {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryTree {
	/// Creates a document holding an empty `body`.
	pub fn new() -> Self {
		let mut nodes = SlotMap::with_key();
		let root = nodes.insert(Node {
			parent: None,
			children: Vec::new(),
			data: NodeData::Element {
				tag: "body".to_string(),
				marker: None,
			},
		});
		Self {
			nodes,
			root,
			observers: Vec::new(),
		}
	}

	/// Appends an element under `parent`.
	pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, TreeError> {
		self.append(
			parent,
			NodeData::Element {
				tag: tag.to_ascii_lowercase(),
				marker: None,
			},
		)
	}

	/// Appends a text leaf under `parent`.
	pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, TreeError> {
		self.append(parent, NodeData::Text(text.to_string()))
	}

	/// Rewrites a text leaf in place.
	pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
		match self.nodes.get_mut(id).map(|node| &mut node.data) {
			Some(NodeData::Text(current)) => {
				text.clone_into(current);
			}
			Some(NodeData::Element { .. }) => return Err(TreeError::NotText),
			None => return Err(TreeError::Missing),
		}
		self.notify(TreeChange {
			target: id,
			kind: ChangeKind::CharacterData,
			added: Vec::new(),
		});
		Ok(())
	}

	/// Removes `id` and its subtree.
	pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
		if id == self.root {
			return Err(TreeError::Root);
		}
		let parent = self.nodes.get(id).ok_or(TreeError::Missing)?.parent;
		if let Some(parent) = parent {
			self.nodes[parent].children.retain(|child| *child != id);
		}
		self.drop_subtree(id);
		if let Some(parent) = parent {
			self.notify(TreeChange {
				target: parent,
				kind: ChangeKind::ChildList,
				added: Vec::new(),
			});
		}
		Ok(())
	}

	/// Concatenated text under `id`, as a reader would see it.
	pub fn text_content(&self, id: NodeId) -> String {
		let mut out = String::new();
		self.collect_text(id, &mut out);
		out
	}

	/// Markup dump of the whole document.
	///
	/// Annotation nodes render as `<span data-chimera="source">shown</span>`.
	/// `&`, `<` and `"` in text and attribute values are escaped.
	pub fn render(&self) -> String {
		let mut out = String::new();
		self.render_node(self.root, &mut out);
		out
	}

	/// Number of nodes in the arena.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	fn append(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId, TreeError> {
		match self.nodes.get(parent).map(|node| &node.data) {
			Some(NodeData::Element { .. }) => {}
			Some(NodeData::Text(_)) => return Err(TreeError::NotElement),
			None => return Err(TreeError::Missing),
		}
		let id = self.nodes.insert(Node {
			parent: Some(parent),
			children: Vec::new(),
			data,
		});
		self.nodes[parent].children.push(id);
		self.notify(TreeChange {
			target: parent,
			kind: ChangeKind::ChildList,
			added: vec![id],
		});
		Ok(id)
	}

	fn build(&mut self, parent: NodeId, fragment: Fragment) -> NodeId {
		match fragment {
			Fragment::Text(text) => self.nodes.insert(Node {
				parent: Some(parent),
				children: Vec::new(),
				data: NodeData::Text(text),
			}),
			Fragment::Annotation(marker) => {
				let shown = marker.display_text().to_string();
				let span = self.nodes.insert(Node {
					parent: Some(parent),
					children: Vec::new(),
					data: NodeData::Element {
						tag: ANNOTATION_TAG.to_string(),
						marker: Some(marker),
					},
				});
				let text = self.nodes.insert(Node {
					parent: Some(span),
					children: Vec::new(),
					data: NodeData::Text(shown),
				});
				self.nodes[span].children.push(text);
				span
			}
		}
	}

	fn drop_subtree(&mut self, id: NodeId) {
		let mut stack = vec![id];
		while let Some(next) = stack.pop() {
			if let Some(node) = self.nodes.remove(next) {
				stack.extend(node.children);
			}
		}
	}

	fn notify(&mut self, change: TreeChange<NodeId>) {
		self.observers.retain(|tx| tx.send(change.clone()).is_ok());
	}

	fn collect_text(&self, id: NodeId, out: &mut String) {
		let Some(node) = self.nodes.get(id) else {
			return;
		};
		match &node.data {
			NodeData::Text(text) => out.push_str(text),
			NodeData::Element { .. } => {
				for child in &node.children {
					self.collect_text(*child, out);
				}
			}
		}
	}

	fn render_node(&self, id: NodeId, out: &mut String) {
		let Some(node) = self.nodes.get(id) else {
			return;
		};
		match &node.data {
			NodeData::Text(text) => escape_into(text, out),
			NodeData::Element { tag, marker } => {
				match marker {
					Some(marker) => {
						let _ = write!(out, "<{tag} data-chimera=\"");
						escape_into(&marker.source, out);
						out.push_str("\">");
					}
					None => {
						let _ = write!(out, "<{tag}>");
					}
				}
				for child in &node.children {
					self.render_node(*child, out);
				}
				let _ = write!(out, "</{tag}>");
			}
		}
	}
}

fn escape_into(text: &str, out: &mut String) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'"' => out.push_str("&quot;"),
			c => out.push(c),
		}
	}
}

impl DocumentTree for MemoryTree {
	type NodeId = NodeId;

	fn root(&self) -> NodeId {
		self.root
	}

	fn kind(&self, id: NodeId) -> Option<NodeKind<'_>> {
		self.nodes.get(id).map(|node| match &node.data {
			NodeData::Element { tag, marker } => NodeKind::Element {
				tag,
				marker: marker.as_ref(),
			},
			NodeData::Text(text) => NodeKind::Text(text),
		})
	}

	fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		self.nodes.get(id).into_iter().flat_map(|node| node.children.iter().copied())
	}

	fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(id).and_then(|node| node.parent)
	}

	fn replace_with_fragment(&mut self, id: NodeId, fragment: Vec<Fragment>) -> Result<Vec<NodeId>, TreeError> {
		if id == self.root {
			return Err(TreeError::Root);
		}
		if !self.is_attached(id) {
			return Err(if self.nodes.contains_key(id) { TreeError::Detached } else { TreeError::Missing });
		}
		let parent = self.nodes[id].parent.ok_or(TreeError::Detached)?;
		let position = self.nodes[parent]
			.children
			.iter()
			.position(|child| *child == id)
			.ok_or(TreeError::Detached)?;

		let added: Vec<NodeId> = fragment.into_iter().map(|piece| self.build(parent, piece)).collect();
		self.nodes[parent].children.splice(position..=position, added.iter().copied());
		self.drop_subtree(id);

		self.notify(TreeChange {
			target: parent,
			kind: ChangeKind::ChildList,
			added: added.clone(),
		});
		Ok(added)
	}

	fn observe(&mut self) -> mpsc::UnboundedReceiver<TreeChange<NodeId>> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.observers.push(tx);
		rx
	}
}
