//! The request/response seam between the client and whatever carries messages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::protocol::BridgeRequest;

/// Carries one [`BridgeRequest`] and yields exactly one reply.
///
/// Implementations must not assume they run in the same task as the caller;
/// the reply may be produced on another task or thread.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	/// Sends `request` and waits for its raw JSON reply.
	async fn request(&self, request: BridgeRequest) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
	async fn request(&self, request: BridgeRequest) -> Result<Value, TransportError> {
		(**self).request(request).await
	}
}
