//! Shared fixtures for the integration suites.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use http::{Method, Request, Response, StatusCode};
use httpmock::MockServer;
use parking_lot::Mutex;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
// self
use cloudngfw::{
	auth::{
		IssueFuture, IssuedToken, PermissionScope, StaticCredentialSource, TemporaryCredentials,
		TokenIssuer,
	},
	client::Client,
	config::{ClientConfig, Protocol},
	context::CallContext,
	error::TransportError,
	http::{HttpTransport, ReqwestTransport, TransportFuture},
	wait::WaitBudget,
};

pub const ROLE: &str = "arn:aws:iam::123456789012:role/cloudngfw-it";
pub const REGION: &str = "us-east-1";
pub const SESSION_TOKEN: &str = "session-token";

/// Fast budgets so waits finish in milliseconds.
pub const FAST: WaitBudget = WaitBudget::new(5, StdDuration::from_millis(5));

/// Configuration pointing every endpoint at `address` over plain HTTP.
pub fn config_for(address: impl ToString) -> ClientConfig {
	let address = address.to_string();

	ClientConfig::new(REGION)
		.with_host(address.clone())
		.with_v2_host(address.clone())
		.with_mp_region_host(address)
		.with_protocol(Protocol::Http)
		.with_shared_role(ROLE)
		.with_wait_budget(FAST)
		.with_conflict_budget(FAST)
}

pub fn server_config(server: &MockServer) -> ClientConfig {
	config_for(server.address())
}

pub fn credentials() -> Arc<StaticCredentialSource> {
	Arc::new(StaticCredentialSource::new(
		TemporaryCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
			.with_session_token(SESSION_TOKEN),
	))
}

/// Client that issues tokens through the mock server's token endpoint.
pub fn signed_client(config: ClientConfig) -> (Client, Arc<StaticCredentialSource>) {
	let credentials = credentials();
	let client = Client::with_transport(
		config,
		credentials.clone(),
		Arc::new(ReqwestTransport::default()),
	)
	.expect("Client should build from the test configuration.");

	(client, credentials)
}

/// Token issuance response body.
pub fn token_body(token: &str, key: &str) -> String {
	envelope(json!({
		"TokenId": token,
		"SubscriptionKey": key,
		"ExpiryTime": 120,
		"Enabled": true
	}))
}

/// Successful envelope around `payload`.
pub fn envelope(payload: Value) -> String {
	json!({ "Response": payload, "ResponseStatus": { "ErrorCode": 0 } }).to_string()
}

/// Failed envelope with `reason`.
pub fn failure(code: i64, reason: &str) -> String {
	json!({ "ResponseStatus": { "ErrorCode": code, "Reason": reason } }).to_string()
}

pub fn ctx() -> CallContext {
	CallContext::new()
}

/// Issuer handing out fixed tokens without any network traffic.
#[derive(Debug, Default)]
pub struct FixedIssuer {
	calls: AtomicU32,
}
impl FixedIssuer {
	pub fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenIssuer for FixedIssuer {
	fn issue<'a>(&'a self, _: &'a CallContext, scope: PermissionScope) -> IssueFuture<'a> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(IssuedToken {
				bearer: format!("{scope}-token").into(),
				subscription_key: format!("{scope}-key").into(),
				expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
			})
		})
	}
}

/// Request observed by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Seen {
	pub method: Method,
	pub path: String,
	pub query: Option<String>,
	pub body: Value,
}

/// Transport replaying scripted responses in order and recording every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	replies: Mutex<VecDeque<(u16, String)>>,
	seen: Mutex<Vec<Seen>>,
}
impl ScriptedTransport {
	pub fn new<I>(replies: I) -> Arc<Self>
	where
		I: IntoIterator<Item = String>,
	{
		Arc::new(Self {
			replies: Mutex::new(replies.into_iter().map(|body| (200, body)).collect()),
			seen: Mutex::default(),
		})
	}

	pub fn seen(&self) -> Vec<Seen> {
		self.seen.lock().clone()
	}

	pub fn remaining(&self) -> usize {
		self.replies.lock().len()
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_> {
		let body = serde_json::from_slice(request.body()).unwrap_or(Value::Null);

		self.seen.lock().push(Seen {
			method: request.method().clone(),
			path: request.uri().path().to_owned(),
			query: request.uri().query().map(str::to_owned),
			body,
		});

		let next = self.replies.lock().pop_front();

		Box::pin(async move {
			let (status, body) = next.ok_or_else(|| {
				TransportError::Io(std::io::Error::other("No scripted response is left."))
			})?;
			let mut response = Response::new(body.into_bytes());

			*response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

			Ok(response)
		})
	}
}

/// Client over `transport` with tokens from a [`FixedIssuer`].
pub fn scripted_client(config: ClientConfig, transport: Arc<ScriptedTransport>) -> Client {
	Client::with_issuer(config, transport, Arc::new(FixedIssuer::default()))
		.expect("Client should build from the test configuration.")
}
