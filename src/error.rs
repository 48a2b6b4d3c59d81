//! Client-level error types shared across the token cache, dispatcher, and watchers.

// self
use crate::{_prelude::*, auth::PermissionScope, response::ResponseStatus};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for collaborator failures the client surfaces verbatim.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// Backend reported a failure inside an otherwise valid response envelope.
	#[error("{0}")]
	Api(ResponseStatus),
	/// Backend returned a body that is not the expected response envelope.
	#[error("Unknown response from `{path}` (HTTP {status}): {message}.")]
	UnknownResponse {
		/// HTTP status code of the response.
		status: u16,
		/// Request path that produced the response.
		path: String,
		/// Message extracted from the body, or a description of why it was rejected.
		message: String,
	},
	/// Role assumption failed in the credential source.
	#[error("Failed to assume role `{role}`: {source}")]
	CredentialSource {
		/// Role identifier passed to the credential source.
		role: String,
		/// Error returned by the credential source.
		#[source]
		source: BoxError,
	},
	/// The caller cancelled the operation.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// The caller's deadline passed before the operation finished.
	#[error("Operation deadline exceeded.")]
	DeadlineExceeded,
	/// A polled operation has not reached the expected state yet.
	#[error("{reason}")]
	Pending {
		/// Human-readable description of the observed state.
		reason: String,
	},
	/// A polled operation reached a terminal failure state.
	#[error("{reason}")]
	OperationFailed {
		/// Failure description reported by the backend.
		reason: String,
	},
	/// A bounded wait or retry loop ran out of attempts.
	#[error("Operation timed out after {attempts} attempts: {last}")]
	Timeout {
		/// Number of attempts made.
		attempts: u32,
		/// Error produced by the final attempt.
		last: Box<Error>,
	},
}
impl Error {
	/// Returns the backend status when this error is an API failure.
	pub fn as_status(&self) -> Option<&ResponseStatus> {
		match self {
			Self::Api(status) => Some(status),
			_ => None,
		}
	}

	/// Returns `true` when the backend rejected the request due to a stale update token.
	pub fn is_token_conflict(&self) -> bool {
		self.as_status().is_some_and(ResponseStatus::is_token_conflict)
	}

	/// Returns `true` when the backend reported a missing object.
	pub fn is_object_not_found(&self) -> bool {
		self.as_status().is_some_and(ResponseStatus::is_object_not_found)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// Endpoint URL could not be assembled.
	#[error("Endpoint URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// No role identifier is bound to the scope, either directly or through the shared role.
	#[error("No role is configured for the {scope} scope.")]
	MissingRoleBinding {
		/// Scope that was requested.
		scope: PermissionScope,
	},
	/// No scope has a role binding, so no token can ever be issued.
	#[error("No role is configured for any permission scope.")]
	NoRoleBindings,
	/// The scope does not carry a bearer token.
	#[error("The {scope} scope does not use bearer tokens.")]
	TokenlessScope {
		/// Scope that was requested.
		scope: PermissionScope,
	},
	/// Region is required but missing.
	#[error("Region must be configured.")]
	MissingRegion,
	/// Protocol is neither `http` nor `https`.
	#[error("Protocol `{protocol}` is invalid; expected http or https.")]
	InvalidProtocol {
		/// Offending protocol string.
		protocol: String,
	},
	/// Request timeout is zero.
	#[error("Timeout must be greater than zero seconds.")]
	InvalidTimeout,
	/// A custom header name or value is invalid.
	#[error("Custom header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Logging category is not recognized.
	#[error("Logging category `{category}` is unknown.")]
	UnknownLogCategory {
		/// Offending category.
		category: String,
	},
	/// Rule-stack scope is neither `Local` nor `Global`.
	#[error("Rule-stack scope `{scope}` is unknown.")]
	UnknownRulestackScope {
		/// Offending scope string.
		scope: String,
	},
	/// API generation is neither `V1` nor `V2`.
	#[error("API generation `{generation}` is unknown.")]
	UnknownApiGeneration {
		/// Offending generation string.
		generation: String,
	},
	/// A wait or retry budget allows zero attempts.
	#[error("The {budget} budget must allow at least one attempt.")]
	EmptyBudget {
		/// Budget label.
		budget: &'static str,
	},
	/// Request envelope has no path usable for the session's API generation.
	#[error("Request has no path for the {generation} API.")]
	MissingPath {
		/// API generation label.
		generation: &'static str,
	},
	/// Environment variable holds a value that cannot be parsed.
	#[error("Environment variable `{name}` holds an invalid value.")]
	InvalidEnv {
		/// Variable name.
		name: String,
		/// Offending value.
		value: String,
	},
	/// Signing key derivation failed.
	#[error("Request signing key could not be derived.")]
	SigningKey,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the management API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the management API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Encoding and decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Response JSON did not match the expected shape.
	#[error("Response from `{path}` (HTTP {status}) could not be decoded.")]
	Response {
		/// Request path that produced the response.
		path: String,
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Response decoded but the payload was absent.
	#[error("Response from `{path}` is missing its payload.")]
	MissingPayload {
		/// Request path that produced the response.
		path: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be encoded.")]
	Encode(#[source] serde_json::Error),
	/// Configuration document could not be parsed.
	#[error("Configuration document could not be parsed.")]
	Config(#[source] serde_path_to_error::Error<serde_json::Error>),
	/// Commit timestamp is not in the expected format.
	#[error("Commit timestamp `{value}` could not be parsed.")]
	Timestamp {
		/// Offending timestamp.
		value: String,
	},
}
