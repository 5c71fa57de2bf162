//! Deduplicating annotation service client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chimera_primitives::BoundedCache;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Result, ServiceError, TransportError};
use crate::protocol::{self, BridgeRequest, LookupRecord, VersionInfo};
use crate::transport::Transport;

/// Tuning for a [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Capacity of the client's annotation cache.
	pub cache_capacity: usize,
	/// Per-request timeout; zero disables it.
	pub request_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			cache_capacity: 2000,
			request_timeout: Duration::from_secs(10),
		}
	}
}

impl ClientConfig {
	/// Set the annotation cache capacity.
	pub fn cache_capacity(mut self, capacity: usize) -> Self {
		self.cache_capacity = capacity;
		self
	}

	/// Set the per-request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}
}

/// Counters describing client traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
	/// Requests handed to the transport.
	pub requests_sent: u64,
	/// Calls that joined an identical in-flight request.
	pub deduplicated: u64,
	/// Annotate calls answered from the cache.
	pub cache_hits: u64,
}

type SharedReply<T> = Shared<BoxFuture<'static, Result<T>>>;

/// At most one in-flight request per key; late callers join the first.
struct Singleflight<T> {
	inflight: Mutex<FxHashMap<String, SharedReply<T>>>,
}

impl<T> Singleflight<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn new() -> Self {
		Self {
			inflight: Mutex::new(FxHashMap::default()),
		}
	}

	/// Returns the in-flight reply for `key`, starting `work` if there is none.
	///
	/// The work runs on its own task, so it completes and releases `key` even
	/// when every caller stops waiting. The second element is true when an
	/// existing request was joined.
	fn join_or_start(self: &Arc<Self>, key: &str, work: impl FnOnce() -> BoxFuture<'static, Result<T>>) -> (SharedReply<T>, bool) {
		let mut inflight = self.inflight.lock();
		if let Some(existing) = inflight.get(key) {
			return (existing.clone(), true);
		}

		let (sender, receiver) = oneshot::channel();
		let reply = async move {
			receiver.await.unwrap_or_else(|_| {
				tracing::warn!("client.request_task_lost");
				Err(TransportError::Closed.into())
			})
		}
		.boxed()
		.shared();
		inflight.insert(key.to_owned(), reply.clone());
		drop(inflight);

		let release = Release {
			owner: Arc::clone(self),
			key: key.to_owned(),
		};
		let work = work();
		tokio::spawn(async move {
			let result = work.await;
			drop(release);
			let _ = sender.send(result);
		});
		(reply, false)
	}

	fn len(&self) -> usize {
		self.inflight.lock().len()
	}
}

/// Drops the in-flight entry once its task finishes, panics or is cancelled.
struct Release<T> {
	owner: Arc<Singleflight<T>>,
	key: String,
}

impl<T> Drop for Release<T> {
	fn drop(&mut self) {
		self.owner.inflight.lock().remove(&self.key);
	}
}

struct ClientInner {
	transport: Arc<dyn Transport>,
	request_timeout: Duration,
	annotations: Mutex<BoundedCache<String, String>>,
	pending_annotations: Arc<Singleflight<String>>,
	pending_lookups: Arc<Singleflight<LookupRecord>>,
	requests_sent: AtomicU64,
	deduplicated: AtomicU64,
	cache_hits: AtomicU64,
}

impl ClientInner {
	async fn call(&self, request: BridgeRequest) -> Result<Value> {
		self.requests_sent.fetch_add(1, Ordering::Relaxed);
		let kind = request.label();

		let outcome = if self.request_timeout.is_zero() {
			self.transport.request(request).await.map_err(ServiceError::from)
		} else {
			match tokio::time::timeout(self.request_timeout, self.transport.request(request)).await {
				Ok(reply) => reply.map_err(ServiceError::from),
				Err(_) => Err(ServiceError::Timeout(self.request_timeout)),
			}
		};

		if let Err(error) = &outcome {
			tracing::debug!(kind, %error, "client.request_failed");
		}
		outcome
	}
}

/// Client for the annotation service.
///
/// Cheap to clone; clones share caches and in-flight requests. Concurrent
/// identical requests are collapsed into one outbound call whose value or
/// failure every caller observes. Only successful annotations are cached, so
/// a failed key is attempted again on its next occurrence.
#[derive(Clone)]
pub struct ServiceClient {
	inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ServiceClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServiceClient")
			.field("request_timeout", &self.inner.request_timeout)
			.field("cached", &self.inner.annotations.lock().len())
			.field("in_flight", &self.in_flight())
			.finish_non_exhaustive()
	}
}

impl ServiceClient {
	/// Creates a client sending through `transport`.
	pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
		Self {
			inner: Arc::new(ClientInner {
				transport,
				request_timeout: config.request_timeout,
				annotations: Mutex::new(BoundedCache::new(config.cache_capacity)),
				pending_annotations: Arc::new(Singleflight::new()),
				pending_lookups: Arc::new(Singleflight::new()),
				requests_sent: AtomicU64::new(0),
				deduplicated: AtomicU64::new(0),
				cache_hits: AtomicU64::new(0),
			}),
		}
	}

	/// Streaming-annotation mode: transcribes one script run.
	///
	/// Callers own the fallback policy; this only reports the failure.
	pub async fn annotate(&self, text: &str) -> Result<String> {
		let cached = self.inner.annotations.lock().get(text).cloned();
		if let Some(hit) = cached {
			self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
			return Ok(hit);
		}

		let inner = Arc::clone(&self.inner);
		let key = text.to_owned();
		let (reply, joined) = self.inner.pending_annotations.join_or_start(text, move || {
			async move {
				let result = inner
					.call(BridgeRequest::Annotate { text: key.clone() })
					.await
					.and_then(protocol::decode_annotation);
				if let Ok(annotation) = &result {
					inner.annotations.lock().insert(key, annotation.clone());
				}
				result
			}
			.boxed()
		});
		self.note_joined(joined, "annotate");
		reply.await
	}

	/// Rich-lookup mode: fetches the dictionary record for a cleaned phrase.
	pub async fn lookup(&self, phrase: &str) -> Result<LookupRecord> {
		let inner = Arc::clone(&self.inner);
		let key = phrase.to_owned();
		let (reply, joined) = self.inner.pending_lookups.join_or_start(phrase, move || {
			async move {
				inner
					.call(BridgeRequest::Lookup { text: key })
					.await
					.and_then(protocol::decode_lookup)
			}
			.boxed()
		});
		self.note_joined(joined, "lookup");
		reply.await
	}

	/// Version probe.
	pub async fn version(&self) -> Result<VersionInfo> {
		self.inner
			.call(BridgeRequest::Version)
			.await
			.and_then(protocol::decode_version)
	}

	/// Returns the cached annotation for `text`, if any.
	pub fn cached_annotation(&self, text: &str) -> Option<String> {
		self.inner.annotations.lock().get(text).cloned()
	}

	/// Number of requests currently in flight across both modes.
	pub fn in_flight(&self) -> usize {
		self.inner.pending_annotations.len() + self.inner.pending_lookups.len()
	}

	/// Snapshot of the traffic counters.
	pub fn stats(&self) -> ClientStats {
		ClientStats {
			requests_sent: self.inner.requests_sent.load(Ordering::Relaxed),
			deduplicated: self.inner.deduplicated.load(Ordering::Relaxed),
			cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
		}
	}

	fn note_joined(&self, joined: bool, kind: &'static str) {
		if joined {
			self.inner.deduplicated.fetch_add(1, Ordering::Relaxed);
			tracing::trace!(kind, "client.join_in_flight");
		}
	}
}
