//! Error types for transports and the service client.
//!
//! Both enums are `Clone` so a single in-flight request can hand the same
//! failure to every caller waiting on it.

use std::time::Duration;

/// A convenient type alias for `Result` with `E` = [`ServiceError`].
pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

/// Failure to deliver a request or receive its reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
	/// The bridge peer went away before replying.
	#[error("bridge closed")]
	Closed,
	/// The service could not be reached.
	#[error("service unreachable: {0}")]
	Unreachable(String),
	/// The service answered with a non-success status.
	#[error("service returned HTTP {0}")]
	Status(u16),
	/// The reply body was not valid JSON.
	#[error("undecodable reply body: {0}")]
	Body(String),
}

/// Uniform failure of a service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
	/// Delivery failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The service replied `ok: false`.
	#[error("service reported failure: {0}")]
	Rejected(String),
	/// The reply lacked fields required by the request mode.
	#[error("malformed reply: {0}")]
	Malformed(String),
	/// No reply arrived within the client's request timeout.
	#[error("request timed out after {0:?}")]
	Timeout(Duration),
}
