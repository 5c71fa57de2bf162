use std::sync::Arc;
use std::time::Duration;

use chimera_bridge::testing::MockTransport;
use chimera_bridge::{ClientConfig, ServiceClient};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::time::{Instant, sleep};

use super::*;
use crate::annotator::SharedTree;
use crate::tree::MemoryTree;

fn client(transport: &Arc<MockTransport>) -> ServiceClient {
	ServiceClient::new(transport.clone(), ClientConfig::default().request_timeout(Duration::ZERO))
}

fn document(lines: &[&str]) -> SharedTree<MemoryTree> {
	let mut tree = MemoryTree::new();
	let root = tree.root();
	for line in lines {
		let p = tree.append_element(root, "p").unwrap();
		tree.append_text(p, line).unwrap();
	}
	Arc::new(Mutex::new(tree))
}

fn append(tree: &SharedTree<MemoryTree>, text: &str) {
	let mut tree = tree.lock();
	let root = tree.root();
	tree.append_text(root, text).unwrap();
}

fn quiet() -> SchedulerConfig {
	SchedulerConfig {
		initial_pass: false,
		..SchedulerConfig::default()
	}
}

#[tokio::test(start_paused = true)]
async fn test_initial_pass_annotates_existing_content() {
	let transport = Arc::new(MockTransport::annotations([("早上好", "zǎo shang hǎo")]));
	let tree = document(&["早上好!"]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));

	let handle = Scheduler::new(annotator, SchedulerConfig::default()).spawn();
	handle.settled().await;

	assert_eq!(handle.stats().passes, 1);
	assert_eq!(handle.stats().spliced, 1);
	assert_eq!(tree.lock().render(), "<body><p><span data-chimera=\"早上好\">zǎo shang hǎo</span>!</p></body>");
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_relevant_change_arms_the_debounce_deadline() {
	let transport = Arc::new(MockTransport::annotations([]));
	let tree = document(&[]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, quiet()).spawn();
	let mut phases = handle.subscribe();
	assert_eq!(handle.phase(), SchedulerPhase::Idle);

	let start = Instant::now();
	append(&tree, "新闻");
	phases.changed().await.unwrap();

	assert_eq!(handle.phase(), SchedulerPhase::ScanPending { deadline: start + DEFAULT_DEBOUNCE });
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_runs_one_pass_after_the_last() {
	let transport = Arc::new(MockTransport::annotations([("一", "yī")]));
	let tree = document(&[]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, quiet()).spawn();

	let start = Instant::now();
	for _ in 0..5 {
		append(&tree, "一");
		sleep(Duration::from_millis(50)).await;
	}
	handle.settled().await;

	assert_eq!(handle.stats().passes, 1);
	assert_eq!(handle.stats().spliced, 5);
	assert_eq!(handle.stats().relevant, 5);
	assert!(start.elapsed() >= Duration::from_millis(200) + DEFAULT_DEBOUNCE);
	assert_eq!(transport.call_count(), 1);
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_change_during_pass_schedules_follow_up() {
	let (transport, gate) = MockTransport::annotations([("一", "yī"), ("二", "èr")]).gated();
	let transport = Arc::new(transport);
	let tree = document(&["一"]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, SchedulerConfig::default()).spawn();
	let mut phases = handle.subscribe();

	phases.wait_for(|phase| matches!(phase, SchedulerPhase::Scanning { .. })).await.unwrap();
	assert_eq!(transport.call_count(), 1);

	append(&tree, "二");
	phases
		.wait_for(|phase| *phase == SchedulerPhase::Scanning { follow_up: true })
		.await
		.unwrap();
	gate.add_permits(2);
	handle.settled().await;

	assert_eq!(handle.stats().passes, 2);
	assert_eq!(
		tree.lock().render(),
		"<body><p><span data-chimera=\"一\">yī</span></p><span data-chimera=\"二\">èr</span></body>"
	);
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_own_splices_never_reschedule() {
	let transport = Arc::new(MockTransport::annotations([("字", "zì")]));
	let tree = document(&["a 字 b", "字"]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, SchedulerConfig::default()).spawn();

	handle.settled().await;
	sleep(Duration::from_secs(5)).await;

	let stats = handle.stats();
	assert_eq!(stats.passes, 1);
	assert_eq!(stats.ignored, 2);
	assert_eq!(stats.relevant, 0);
	assert_eq!(handle.phase(), SchedulerPhase::Idle);
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_runs_are_counted_and_retried_on_next_occurrence() {
	let transport = Arc::new(MockTransport::annotations([]));
	let tree = document(&["错"]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, SchedulerConfig::default()).spawn();
	handle.settled().await;

	append(&tree, "错");
	sleep(DEFAULT_DEBOUNCE * 2).await;
	handle.settled().await;

	assert_eq!(handle.stats().passes, 2);
	assert_eq!(handle.stats().fallbacks, 2);
	assert_eq!(transport.call_count(), 2);
	handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_task() {
	let transport = Arc::new(MockTransport::annotations([]));
	let tree = document(&[]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(annotator, quiet()).spawn();
	let phases = handle.subscribe();

	handle.shutdown().await;
	append(&tree, "晚安");
	sleep(Duration::from_secs(1)).await;

	assert_eq!(*phases.borrow(), SchedulerPhase::Idle);
	assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_pass_leaves_no_stranded_request() {
	let (transport, gate) = MockTransport::annotations([("晚安", "wǎn ān")]).gated();
	let transport = Arc::new(transport);
	let tree = document(&["晚安"]);
	let annotator = Arc::new(Annotator::new(tree.clone(), client(&transport)));
	let handle = Scheduler::new(Arc::clone(&annotator), SchedulerConfig::default()).spawn();

	sleep(Duration::from_millis(10)).await;
	assert_eq!(handle.phase(), SchedulerPhase::Scanning { follow_up: false });
	assert_eq!(annotator.client().in_flight(), 1);

	handle.shutdown().await;
	gate.add_permits(1);
	sleep(Duration::from_millis(10)).await;

	assert_eq!(annotator.client().in_flight(), 0);
	assert_eq!(annotator.client().cached_annotation("晚安").as_deref(), Some("wǎn ān"));
	assert_eq!(tree.lock().render(), "<body><p>晚安</p></body>");
	assert_eq!(transport.call_count(), 1);
}
