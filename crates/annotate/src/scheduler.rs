//! Mutation-driven re-annotation.
//!
//! The scheduler owns the document's change stream and turns bursts of
//! relevant changes into single passes:
//!
//! * `Idle`: waiting for a relevant change.
//! * `ScanPending`: a pass is due at `deadline`; every further relevant change
//!   pushes the deadline back by the debounce window.
//! * `Scanning`: a pass is running. Relevant changes set the follow-up flag
//!   instead of starting a second pass; when the pass ends the scheduler goes
//!   back to `ScanPending` rather than `Idle`.
//!
//! Passes never overlap and are never preempted. Irrelevant changes, which
//! include every splice the pipeline makes, are counted and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::annotator::{Annotator, PassReport};
use crate::tree::{DocumentTree, TreeChange};

/// Default quiet period before a pass starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Scheduler state, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
	/// No pass is due.
	Idle,
	/// A pass starts at `deadline` unless another relevant change arrives.
	ScanPending {
		/// When the pass starts.
		deadline: Instant,
	},
	/// A pass is running.
	Scanning {
		/// A relevant change arrived during this pass.
		follow_up: bool,
	},
}

impl SchedulerPhase {
	/// Short label for logs.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::ScanPending { .. } => "scan_pending",
			Self::Scanning { .. } => "scanning",
		}
	}
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
	/// Quiet period between the last relevant change and a pass.
	pub debounce: Duration,
	/// Run a pass immediately at start-up.
	pub initial_pass: bool,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			debounce: DEFAULT_DEBOUNCE,
			initial_pass: true,
		}
	}
}

/// Counters shared between the scheduler task and its handle.
#[derive(Debug, Default)]
struct Metrics {
	passes: AtomicU64,
	spliced: AtomicU64,
	fallbacks: AtomicU64,
	relevant: AtomicU64,
	ignored: AtomicU64,
}

impl Metrics {
	fn record_pass(&self, report: &PassReport) {
		self.passes.fetch_add(1, Ordering::Relaxed);
		self.spliced.fetch_add(report.spliced as u64, Ordering::Relaxed);
		self.fallbacks.fetch_add(report.fallbacks as u64, Ordering::Relaxed);
	}
}

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
	/// Completed passes.
	pub passes: u64,
	/// Leaves spliced across all passes.
	pub spliced: u64,
	/// Runs rendered as source text after failed calls.
	pub fallbacks: u64,
	/// Change notifications that scheduled or extended a pass.
	pub relevant: u64,
	/// Change notifications dropped as irrelevant.
	pub ignored: u64,
}

/// Drives an [`Annotator`] from its document's change notifications.
pub struct Scheduler<T: DocumentTree> {
	annotator: Arc<Annotator<T>>,
	config: SchedulerConfig,
}

impl<T: DocumentTree> Scheduler<T> {
	/// Creates a scheduler for `annotator`.
	pub fn new(annotator: Arc<Annotator<T>>, config: SchedulerConfig) -> Self {
		Self { annotator, config }
	}

	/// Subscribes to the document and starts the scheduler task.
	///
	/// Must be called inside a tokio runtime. The task runs until the handle
	/// cancels it or the document drops its observers.
	pub fn spawn(self) -> SchedulerHandle {
		let changes = self.annotator.tree().lock().observe();
		let initial = if self.config.initial_pass {
			SchedulerPhase::ScanPending { deadline: Instant::now() }
		} else {
			SchedulerPhase::Idle
		};
		let (phase_tx, phase_rx) = watch::channel(initial);
		let metrics = Arc::new(Metrics::default());
		let cancel = CancellationToken::new();

		let task = tokio::spawn(
			Runner {
				annotator: self.annotator,
				config: self.config,
				phase_tx,
				metrics: Arc::clone(&metrics),
				cancel: cancel.clone(),
			}
			.run(initial, changes),
		);

		SchedulerHandle {
			phase: phase_rx,
			metrics,
			cancel,
			task,
		}
	}
}

/// Owner-side view of a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
	phase: watch::Receiver<SchedulerPhase>,
	metrics: Arc<Metrics>,
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl SchedulerHandle {
	/// Current phase.
	pub fn phase(&self) -> SchedulerPhase {
		*self.phase.borrow()
	}

	/// Receiver notified on every phase transition.
	pub fn subscribe(&self) -> watch::Receiver<SchedulerPhase> {
		self.phase.clone()
	}

	/// Waits until a completed pass leaves the scheduler idle.
	///
	/// Returns immediately if it is idle already; returns early if the task
	/// has stopped.
	pub async fn settled(&self) {
		let mut phase = self.phase.clone();
		let _ = phase.wait_for(|phase| *phase == SchedulerPhase::Idle).await;
	}

	/// Activity counters.
	pub fn stats(&self) -> SchedulerStats {
		SchedulerStats {
			passes: self.metrics.passes.load(Ordering::Relaxed),
			spliced: self.metrics.spliced.load(Ordering::Relaxed),
			fallbacks: self.metrics.fallbacks.load(Ordering::Relaxed),
			relevant: self.metrics.relevant.load(Ordering::Relaxed),
			ignored: self.metrics.ignored.load(Ordering::Relaxed),
		}
	}

	/// Stops the scheduler. A running pass is dropped at its next suspension
	/// point; splices it already committed stay.
	pub async fn shutdown(self) {
		self.cancel.cancel();
		if let Err(error) = self.task.await {
			tracing::error!(%error, "scheduler.join_failed");
		}
	}
}

struct Runner<T: DocumentTree> {
	annotator: Arc<Annotator<T>>,
	config: SchedulerConfig,
	phase_tx: watch::Sender<SchedulerPhase>,
	metrics: Arc<Metrics>,
	cancel: CancellationToken,
}

impl<T: DocumentTree> Runner<T> {
	fn enter(&self, phase: SchedulerPhase) -> SchedulerPhase {
		tracing::trace!(phase = phase.label(), "scheduler.phase");
		self.phase_tx.send_replace(phase);
		phase
	}

	fn pending(&self) -> SchedulerPhase {
		self.enter(SchedulerPhase::ScanPending {
			deadline: Instant::now() + self.config.debounce,
		})
	}

	fn triage(&self, change: &TreeChange<T::NodeId>) -> bool {
		let relevant = self.annotator.is_relevant(change);
		let counter = if relevant { &self.metrics.relevant } else { &self.metrics.ignored };
		counter.fetch_add(1, Ordering::Relaxed);
		relevant
	}

	async fn run(self, initial: SchedulerPhase, mut changes: mpsc::UnboundedReceiver<TreeChange<T::NodeId>>) {
		let mut open = true;
		let mut phase = initial;

		'run: loop {
			phase = match phase {
				SchedulerPhase::Idle => {
					if !open {
						break 'run;
					}
					tokio::select! {
						biased;
						_ = self.cancel.cancelled() => break 'run,
						change = changes.recv() => match change {
							Some(change) if self.triage(&change) => self.pending(),
							Some(_) => SchedulerPhase::Idle,
							None => {
								open = false;
								SchedulerPhase::Idle
							}
						},
					}
				}
				SchedulerPhase::ScanPending { deadline } => {
					tokio::select! {
						biased;
						_ = self.cancel.cancelled() => break 'run,
						change = changes.recv(), if open => match change {
							Some(change) if self.triage(&change) => self.pending(),
							Some(_) => phase,
							None => {
								open = false;
								phase
							}
						},
						_ = tokio::time::sleep_until(deadline) => self.enter(SchedulerPhase::Scanning { follow_up: false }),
					}
				}
				SchedulerPhase::Scanning { .. } => {
					let mut follow_up = false;
					let pass = self.annotator.run_pass();
					tokio::pin!(pass);

					let report = loop {
						tokio::select! {
							biased;
							_ = self.cancel.cancelled() => break 'run,
							report = &mut pass => break report,
							change = changes.recv(), if open => match change {
								Some(change) if self.triage(&change) && !follow_up => {
									follow_up = true;
									self.enter(SchedulerPhase::Scanning { follow_up });
								}
								Some(_) => {}
								None => open = false,
							},
						}
					};

					self.metrics.record_pass(&report);
					tracing::debug!(
						spliced = report.spliced,
						skipped = report.skipped,
						fallbacks = report.fallbacks,
						follow_up,
						"scheduler.pass_done"
					);
					if follow_up { self.pending() } else { self.enter(SchedulerPhase::Idle) }
				}
			};
		}

		self.enter(SchedulerPhase::Idle);
		tracing::debug!("scheduler.stopped");
	}
}

#[cfg(test)]
mod tests;
