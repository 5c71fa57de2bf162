//! In-process host bridge.
//!
//! The pipeline side holds a [`BridgeSender`] and awaits replies; the host
//! side drains a [`BridgeReceiver`] and answers each [`Envelope`] through its
//! oneshot. The two halves may live on different tasks or threads, so the
//! pipeline never assumes a synchronous call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::protocol::BridgeRequest;
use crate::transport::Transport;

/// A request in transit together with its reply slot.
#[derive(Debug)]
pub struct Envelope {
	/// Correlation id, unique per bridge.
	pub id: u64,
	/// The carried request.
	pub request: BridgeRequest,
	reply: oneshot::Sender<Result<Value, TransportError>>,
}

impl Envelope {
	/// Delivers the reply. Returns false if the requester stopped waiting.
	pub fn respond(self, result: Result<Value, TransportError>) -> bool {
		self.reply.send(result).is_ok()
	}
}

/// Requesting half of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSender {
	tx: mpsc::Sender<Envelope>,
	next_id: Arc<AtomicU64>,
}

/// Answering half of the bridge.
#[derive(Debug)]
pub struct BridgeReceiver {
	rx: mpsc::Receiver<Envelope>,
}

/// Creates a bridge holding at most `capacity` undelivered requests.
pub fn channel(capacity: usize) -> (BridgeSender, BridgeReceiver) {
	let (tx, rx) = mpsc::channel(capacity.max(1));
	(
		BridgeSender {
			tx,
			next_id: Arc::new(AtomicU64::new(0)),
		},
		BridgeReceiver { rx },
	)
}

#[async_trait]
impl Transport for BridgeSender {
	async fn request(&self, request: BridgeRequest) -> Result<Value, TransportError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (reply_tx, reply_rx) = oneshot::channel();
		tracing::trace!(id, kind = request.label(), "bridge.request");

		self.tx
			.send(Envelope {
				id,
				request,
				reply: reply_tx,
			})
			.await
			.map_err(|_| TransportError::Closed)?;

		reply_rx.await.map_err(|_| TransportError::Closed)?
	}
}

impl BridgeReceiver {
	/// Receives the next envelope, or `None` once every sender is gone.
	pub async fn recv(&mut self) -> Option<Envelope> {
		self.rx.recv().await
	}

	/// Answers every request through `handler` until all senders drop.
	///
	/// Requests are handled concurrently; replies are routed by envelope, so
	/// ordering between them is not preserved.
	pub async fn serve<H: Transport>(mut self, handler: Arc<H>) {
		while let Some(envelope) = self.rx.recv().await {
			let handler = Arc::clone(&handler);
			tokio::spawn(async move {
				let id = envelope.id;
				let result = handler.request(envelope.request.clone()).await;
				if let Err(error) = &result {
					tracing::debug!(id, %error, "bridge.handler_failed");
				}
				if !envelope.respond(result) {
					tracing::debug!(id, "bridge.reply_dropped");
				}
			});
		}
		tracing::debug!("bridge.closed");
	}
}
