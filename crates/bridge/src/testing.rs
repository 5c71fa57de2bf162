//! Scriptable in-memory [`Transport`] for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::protocol::BridgeRequest;
use crate::transport::Transport;

type Responder = Box<dyn Fn(&BridgeRequest) -> Result<Value, TransportError> + Send + Sync>;

/// Transport that answers from a closure and records every request.
///
/// A gated transport holds each request until a permit is added to the gate,
/// which lets tests observe in-flight state deterministically.
pub struct MockTransport {
	responder: Responder,
	calls: Mutex<Vec<BridgeRequest>>,
	gate: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for MockTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MockTransport")
			.field("calls", &self.calls.lock().len())
			.field("gated", &self.gate.is_some())
			.finish_non_exhaustive()
	}
}

impl MockTransport {
	/// Answers every request with `responder`.
	pub fn new(responder: impl Fn(&BridgeRequest) -> Result<Value, TransportError> + Send + Sync + 'static) -> Self {
		Self {
			responder: Box::new(responder),
			calls: Mutex::new(Vec::new()),
			gate: None,
		}
	}

	/// Answers annotate requests from a fixture table.
	///
	/// Unknown runs fail with HTTP 500; lookups fail with HTTP 404; the
	/// version probe reports `"mock"`.
	pub fn annotations<'a>(fixtures: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let table: FxHashMap<String, String> = fixtures.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		Self::new(move |request| match request {
			BridgeRequest::Annotate { text } => table
				.get(text)
				.map(|annotation| annotation_reply(annotation))
				.ok_or(TransportError::Status(500)),
			BridgeRequest::Lookup { .. } => Err(TransportError::Status(404)),
			BridgeRequest::Version => Ok(json!({"ok": true, "version": "mock"})),
		})
	}

	/// Holds every request until the returned gate receives a permit.
	pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
		let gate = Arc::new(Semaphore::new(0));
		self.gate = Some(Arc::clone(&gate));
		(self, gate)
	}

	/// Requests received so far, in arrival order.
	pub fn calls(&self) -> Vec<BridgeRequest> {
		self.calls.lock().clone()
	}

	/// Number of requests received so far.
	pub fn call_count(&self) -> usize {
		self.calls.lock().len()
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn request(&self, request: BridgeRequest) -> Result<Value, TransportError> {
		self.calls.lock().push(request.clone());
		if let Some(gate) = &self.gate {
			gate.acquire().await.map_err(|_| TransportError::Closed)?.forget();
		}
		(self.responder)(&request)
	}
}

/// Successful streaming-annotation reply.
pub fn annotation_reply(annotation: &str) -> Value {
	json!({"ok": true, "pinyin": annotation})
}

/// Successful rich-lookup reply with one example.
pub fn lookup_reply(transcription: &str, translation: &str) -> Value {
	json!({
		"ok": true,
		"data": {
			"pinyin": transcription,
			"english": translation,
			"usage": "",
			"examples": [{"pinyin": transcription, "english": translation}]
		}
	})
}
