use std::sync::Arc;
use std::time::Duration;

use chimera_bridge::testing::MockTransport;
use chimera_bridge::{ClientConfig, ServiceClient};
use chimera_primitives::Scanner;
use parking_lot::Mutex;
use proptest::prelude::*;

use crate::annotator::{Annotator, SharedTree};
use crate::scheduler::{DEFAULT_DEBOUNCE, Scheduler, SchedulerConfig};
use crate::tree::{DocumentTree, MemoryTree, NodeKind, marked_ancestor};
use crate::walk::{WalkFilter, collect_candidates};

fn shared(lines: &[String]) -> SharedTree<MemoryTree> {
	let mut tree = MemoryTree::new();
	let root = tree.root();
	for line in lines {
		let p = tree.append_element(root, "p").unwrap();
		tree.append_text(p, line).unwrap();
	}
	Arc::new(Mutex::new(tree))
}

fn echo_client() -> ServiceClient {
	let transport = MockTransport::new(|request| match request {
		chimera_bridge::BridgeRequest::Annotate { text } => Ok(chimera_bridge::testing::annotation_reply(&format!("<{text}>"))),
		_ => Err(chimera_bridge::TransportError::Status(404)),
	});
	ServiceClient::new(Arc::new(transport), ClientConfig::default().request_timeout(Duration::ZERO))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
	tokio::runtime::Builder::new_current_thread()
		.enable_time()
		.build()
		.unwrap()
		.block_on(future)
}

fn mixed_lines() -> impl Strategy<Value = Vec<String>> {
	prop::collection::vec("[a-z !]{0,4}[一-龥]{0,3}[a-z ]{0,3}[一-龥]{0,2}", 1..6)
}

proptest! {
	/// Must never yield a generated node as a scan candidate.
	///
	/// * Enforced in: `collect_candidates`, `WalkFilter::is_excluded`
	/// * Failure symptom: annotations get annotated again, nesting markup on every pass.
	#[test]
	fn test_walk_never_yields_marked_nodes(lines in mixed_lines()) {
		let tree = shared(&lines);
		let annotator = Annotator::new(tree.clone(), echo_client());
		block_on(annotator.run_pass());

		let tree = tree.lock();
		let scanner = Scanner::default();
		prop_assert!(collect_candidates(&*tree, tree.root(), &WalkFilter::default(), &scanner).is_empty());

		let mut stack = vec![tree.root()];
		while let Some(id) = stack.pop() {
			if let Some(NodeKind::Text(text)) = tree.kind(id) {
				prop_assert!(!scanner.has_runs(text) || marked_ancestor(&*tree, id).is_some());
			}
			stack.extend(tree.children(id));
		}
	}

	/// Must leave the document unchanged on a second pass without external
	/// mutation.
	///
	/// * Enforced in: `Annotator::run_pass`, `splice_leaf`
	/// * Failure symptom: repeated passes keep rewriting the document and issuing calls.
	#[test]
	fn test_second_pass_is_idempotent(lines in mixed_lines()) {
		let tree = shared(&lines);
		let annotator = Annotator::new(tree.clone(), echo_client());
		let first = block_on(annotator.run_pass());
		let rendered = tree.lock().render();
		let second = block_on(annotator.run_pass());

		prop_assert_eq!(second.spliced, 0);
		prop_assert_eq!(second.runs, 0);
		prop_assert_eq!(tree.lock().render(), rendered);
		prop_assert!(first.spliced <= lines.len());
	}

	/// Must preserve every plain character of a leaf in order.
	///
	/// * Enforced in: `splice_leaf`, `Scanner::segments`
	/// * Failure symptom: text around script runs is dropped or reordered.
	#[test]
	fn test_splice_preserves_plain_text(lines in mixed_lines()) {
		let tree = shared(&lines);
		let annotator = Annotator::new(tree.clone(), echo_client());
		block_on(annotator.run_pass());

		let tree = tree.lock();
		let root = tree.root();
		let paragraphs: Vec<_> = tree.children(root).collect();
		for (line, p) in lines.iter().zip(paragraphs) {
			let expected: String = Scanner::default()
				.segments(line)
				.map(|segment| if segment.is_run() { format!("<{}>", segment.text) } else { segment.text.to_string() })
				.collect();
			prop_assert_eq!(tree.text_content(p), expected);
		}
	}
}

/// Must coalesce a burst of relevant notifications inside the debounce window
/// into exactly one pass.
///
/// * Enforced in: `Runner::run` (`ScanPending` re-arm)
/// * Failure symptom: a page rewriting many nodes triggers one pass per node.
#[cfg_attr(test, tokio::test(start_paused = true))]
pub(crate) async fn test_debounce_coalesces_bursts() {
	let tree = shared(&[]);
	let annotator = Arc::new(Annotator::new(tree.clone(), echo_client()));
	let config = SchedulerConfig {
		initial_pass: false,
		..SchedulerConfig::default()
	};
	let handle = Scheduler::new(annotator, config).spawn();

	for i in 0..20 {
		{
			let mut tree = tree.lock();
			let root = tree.root();
			tree.append_text(root, if i % 2 == 0 { "左" } else { "右" }).unwrap();
		}
		tokio::time::sleep(DEFAULT_DEBOUNCE / 4).await;
	}
	handle.settled().await;

	assert_eq!(handle.stats().passes, 1);
	assert_eq!(handle.stats().spliced, 20);
	handle.shutdown().await;
}

/// Must not start a pass while another is running.
///
/// * Enforced in: `Runner::run` (`Scanning` follow-up flag)
/// * Failure symptom: overlapping passes splice the same leaf twice or race on the tree.
#[cfg_attr(test, tokio::test(start_paused = true))]
pub(crate) async fn test_passes_never_overlap() {
	let (transport, gate) = MockTransport::annotations([("甲", "jiǎ"), ("乙", "yǐ"), ("丙", "bǐng")]).gated();
	let transport = Arc::new(transport);
	let client = ServiceClient::new(transport.clone(), ClientConfig::default().request_timeout(Duration::ZERO));
	let tree = shared(&["甲".to_string()]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client));
	let handle = Scheduler::new(annotator, SchedulerConfig::default()).spawn();
	let mut phases = handle.subscribe();

	phases
		.wait_for(|phase| matches!(phase, crate::scheduler::SchedulerPhase::Scanning { .. }))
		.await
		.unwrap();
	for text in ["乙", "丙"] {
		let mut tree = tree.lock();
		let root = tree.root();
		tree.append_text(root, text).unwrap();
	}
	tokio::time::sleep(DEFAULT_DEBOUNCE * 4).await;
	assert_eq!(transport.call_count(), 1, "no second pass may start before the first ends");

	gate.add_permits(3);
	handle.settled().await;

	assert_eq!(handle.stats().passes, 2);
	assert_eq!(transport.call_count(), 3);
	handle.shutdown().await;
}

/// Must never cache a failed resolution.
///
/// * Enforced in: `Annotator::resolve`, `ServiceClient::annotate`
/// * Failure symptom: a transient outage freezes source text in place for the whole session.
#[cfg_attr(test, tokio::test)]
pub(crate) async fn test_failures_are_never_cached() {
	let tree = shared(&["失败".to_string()]);
	let transport = Arc::new(MockTransport::annotations([]));
	let client = ServiceClient::new(transport.clone(), ClientConfig::default());
	let annotator = Annotator::new(tree.clone(), client.clone());

	let report = annotator.run_pass().await;

	assert_eq!(report.fallbacks, 1);
	assert_eq!(annotator.cached("失败"), None);
	assert_eq!(client.cached_annotation("失败"), None);
	let tree = tree.lock();
	let root = tree.root();
	let p = tree.children(root).next().unwrap();
	let span = tree.children(p).next().unwrap();
	assert!(matches!(tree.kind(span), Some(NodeKind::Element { marker: Some(m), .. }) if m.resolved == "失败"));
}
