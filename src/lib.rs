//! Authenticated request pipeline for the Cloud NGFW management API: per-scope token caching,
//! signed token issuance, uniform response decoding, conflict retries, and bounded waits on
//! firewall provisioning and rule-stack commits.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod firewall;
pub mod http;
pub mod obs;
pub mod response;
pub mod rulestack;
pub mod wait;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use crate::{
		auth::{
			IssueFuture, IssuedToken, PermissionScope, StaticCredentialSource, TemporaryCredentials,
			TokenIssuer,
		},
		client::Client,
		config::{ClientConfig, Protocol},
		context::CallContext,
		http::ReqwestTransport,
		wait::WaitBudget,
	};

	/// Role bound to every scope by [`test_config`].
	pub const TEST_ROLE: &str = "arn:aws:iam::123456789012:role/cloudngfw-test";
	/// Region used by [`test_config`].
	pub const TEST_REGION: &str = "us-east-1";

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Configuration pointing every host at `address` (`host:port`) over plain HTTP, with a shared
	/// role and millisecond budgets.
	pub fn test_config(address: impl Display) -> ClientConfig {
		let address = address.to_string();
		let fast = WaitBudget::new(5, StdDuration::from_millis(10));

		ClientConfig::new(TEST_REGION)
			.with_host(address.clone())
			.with_v2_host(address.clone())
			.with_mp_region_host(address)
			.with_protocol(Protocol::Http)
			.with_shared_role(TEST_ROLE)
			.with_wait_budget(fast)
			.with_conflict_budget(fast)
	}

	/// Static credentials handed out for every role.
	pub fn test_credentials() -> Arc<StaticCredentialSource> {
		Arc::new(StaticCredentialSource::new(
			TemporaryCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
				.with_session_token("session-token"),
		))
	}

	/// Builds a client that issues tokens through the signed token endpoint of the mock server.
	pub fn build_test_client(config: ClientConfig) -> (Client, Arc<StaticCredentialSource>) {
		let credentials = test_credentials();
		let client =
			Client::with_transport(config, credentials.clone(), Arc::new(test_reqwest_transport()))
				.expect("Failed to build test client.");

		(client, credentials)
	}

	/// Builds a client whose tokens come from `issuer` instead of the token endpoint.
	pub fn build_test_client_with_issuer(
		config: ClientConfig,
		issuer: Arc<dyn TokenIssuer>,
	) -> Client {
		Client::with_issuer(config, Arc::new(test_reqwest_transport()), issuer)
			.expect("Failed to build test client.")
	}

	/// Issuer handing out `<scope>-<n>` bearer tokens that stay valid for an hour.
	#[derive(Debug, Default)]
	pub struct ScriptedIssuer {
		calls: AtomicU32,
	}
	impl ScriptedIssuer {
		/// Number of tokens issued so far.
		pub fn calls(&self) -> u32 {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenIssuer for ScriptedIssuer {
		fn issue<'a>(&'a self, _: &'a CallContext, scope: PermissionScope) -> IssueFuture<'a> {
			Box::pin(async move {
				let n = self.calls.fetch_add(1, Ordering::SeqCst);

				Ok(IssuedToken {
					bearer: format!("{scope}-{n}").into(),
					subscription_key: format!("{scope}-key").into(),
					expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
				})
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
