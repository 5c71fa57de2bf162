//! Client side of the annotation service.
//!
//! This crate owns everything between the annotation pipeline and the remote
//! service:
//! * [`protocol`]: tagged request variants and per-mode response decoding
//! * [`Transport`]: the single awaitable request/response seam
//! * [`channel`]: an in-process host bridge that correlates requests issued
//!   from one task with replies produced in another
//! * [`http`]: a reqwest-backed transport speaking to the local service
//! * [`ServiceClient`]: deduplicating, caching client used by the pipelines

#![warn(missing_docs)]

pub mod channel;
pub mod client;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod protocol;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;

pub use channel::{BridgeReceiver, BridgeSender, Envelope};
pub use client::{ClientConfig, ClientStats, ServiceClient};
pub use error::{Result, ServiceError, TransportError};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use protocol::{BridgeRequest, LookupRecord, MAX_EXAMPLES, UsageExample, VersionInfo};
pub use transport::Transport;
