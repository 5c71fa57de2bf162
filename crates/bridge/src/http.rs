//! HTTP transport for the local annotation service.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::protocol::BridgeRequest;
use crate::transport::Transport;

/// Forwards requests to the service over HTTP.
///
/// * annotate: `POST {base}/pinyin` with `{"text": ...}`
/// * lookup: `POST {base}/lookup` with `{"text": ...}`
/// * version: `GET {base}/version`
///
/// The response body is handed back as-is; decoding belongs to the client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: reqwest::Client,
	base_url: String,
}

impl HttpTransport {
	/// Creates a transport for the service at `base_url`.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self::with_client(reqwest::Client::new(), base_url)
	}

	/// Creates a transport reusing an existing reqwest client.
	pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
		let mut base_url = base_url.into();
		while base_url.ends_with('/') {
			base_url.pop();
		}
		Self { client, base_url }
	}

	/// Base URL without a trailing slash.
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}/{path}", self.base_url)
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn request(&self, request: BridgeRequest) -> Result<Value, TransportError> {
		let builder = match &request {
			BridgeRequest::Annotate { text } => self.client.post(self.endpoint("pinyin")).json(&json!({ "text": text })),
			BridgeRequest::Lookup { text } => self.client.post(self.endpoint("lookup")).json(&json!({ "text": text })),
			BridgeRequest::Version => self.client.get(self.endpoint("version")),
		};

		let response = builder
			.send()
			.await
			.map_err(|e| TransportError::Unreachable(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			tracing::debug!(kind = request.label(), status = status.as_u16(), "http.status");
			return Err(TransportError::Status(status.as_u16()));
		}

		response.json::<Value>().await.map_err(|e| TransportError::Body(e.to_string()))
	}
}
