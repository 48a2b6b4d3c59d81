//! Transport primitives for management API calls.
//!
//! The dispatcher builds fully-formed [`http::Request`] values (headers set, body serialized,
//! signature applied) and hands them to an [`HttpTransport`]. Keeping the transport this thin
//! lets tests and embedders swap the HTTP stack without touching authentication or decoding.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{Request, Response};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response<Vec<u8>>, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a prepared request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back every clone of a
/// [`Client`](crate::client::Client). Non-2xx responses are not errors at this layer; the
/// dispatcher decodes the body regardless of status.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the full response body.
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the configured timeout and certificate policy.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(StdDuration::from_secs(config.timeout_secs()))
			.danger_accept_invalid_certs(config.skip_verify_certificate())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();
			let mut response_new = Response::new(body);

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
