//! Response envelope decoding and backend failure classification.
//!
//! Every management API reply wraps its payload as
//! `{ "Response": <payload>, "ResponseStatus": { "ErrorCode": int, "Reason": string } }`, and an
//! `ErrorCode` of zero means success regardless of the HTTP status. [`ApiResponse`] lets the
//! dispatcher inspect any decoded envelope for a failure, while [`FailureKind`] maps the free-form
//! `Reason` text onto the handful of conditions callers branch on.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

const OBJECT_NOT_FOUND: &str = " does not exist";
const INVALID_REQUEST: &str = "invalid request";
const TOKEN_CONFLICT: &str = "please provide latest token";
const RULESTACK_MISSING: &str = "rulestack does not exist";
const ASSOCIATION_MISSING: &str = "rulestack association does not exist";
const RESOURCE_ENTRY_MISSING: &str = "could not find an associated rulestack";

/// Status block attached to every response envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
	/// Backend error code; `0` means success.
	#[serde(rename = "ErrorCode", default)]
	pub code: i64,
	/// Backend-supplied reason text.
	#[serde(rename = "Reason", default)]
	pub reason: String,
}
impl ResponseStatus {
	/// Builds a status with the provided code and reason.
	pub fn new(code: i64, reason: impl Into<String>) -> Self {
		Self { code, reason: reason.into() }
	}

	/// Returns a copy of the status when it reports a failure.
	pub fn failed(&self) -> Option<Self> {
		if self.code != 0 { Some(self.clone()) } else { None }
	}

	/// Classifies the failure reason.
	pub fn kind(&self) -> FailureKind {
		FailureKind::classify(&self.reason)
	}

	/// Reason mentions an object that does not exist.
	pub fn is_object_not_found(&self) -> bool {
		self.reason.contains(OBJECT_NOT_FOUND)
	}

	/// Reason flags the request as invalid.
	pub fn is_invalid_request(&self) -> bool {
		self.reason.contains(INVALID_REQUEST)
	}

	/// Reason asks for the latest update token; the request may be retried.
	pub fn is_token_conflict(&self) -> bool {
		self.reason.contains(TOKEN_CONFLICT)
	}

	/// Reason reports a missing local rule stack.
	pub fn is_rulestack_missing(&self) -> bool {
		self.reason.contains(RULESTACK_MISSING)
	}

	/// Reason reports a missing rule-stack association or associated entry.
	pub fn is_association_missing(&self) -> bool {
		self.reason.contains(ASSOCIATION_MISSING) || self.reason.contains(RESOURCE_ENTRY_MISSING)
	}
}
impl Display for ResponseStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Error({}): {}", self.code, self.reason)
	}
}

/// Failure categories callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// Referenced object does not exist.
	ObjectNotFound,
	/// Request was rejected as malformed.
	InvalidRequest,
	/// Stale update token; retryable.
	TokenConflict,
	/// Local rule stack is missing.
	RulestackMissing,
	/// Rule-stack association is missing.
	AssociationMissing,
	/// Anything else.
	Unclassified,
}
impl FailureKind {
	/// Maps a reason string to the most specific matching category.
	pub fn classify(reason: &str) -> Self {
		if reason.contains(ASSOCIATION_MISSING) || reason.contains(RESOURCE_ENTRY_MISSING) {
			Self::AssociationMissing
		} else if reason.contains(RULESTACK_MISSING) {
			Self::RulestackMissing
		} else if reason.contains(TOKEN_CONFLICT) {
			Self::TokenConflict
		} else if reason.contains(INVALID_REQUEST) {
			Self::InvalidRequest
		} else if reason.contains(OBJECT_NOT_FOUND) {
			Self::ObjectNotFound
		} else {
			Self::Unclassified
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ObjectNotFound => "object_not_found",
			Self::InvalidRequest => "invalid_request",
			Self::TokenConflict => "token_conflict",
			Self::RulestackMissing => "rulestack_missing",
			Self::AssociationMissing => "association_missing",
			Self::Unclassified => "unclassified",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Decoded response that can report a backend failure.
pub trait ApiResponse
where
	Self: 'static + Send + DeserializeOwned,
{
	/// Returns the response status block, when the body carried one.
	fn status(&self) -> Option<&ResponseStatus>;

	/// Returns the failure reported by the backend, if any.
	fn failed(&self) -> Option<ResponseStatus> {
		self.status().and_then(ResponseStatus::failed)
	}
}

/// Standard `{Response, ResponseStatus}` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Envelope<T> {
	/// Payload; absent on most failures and on bare acknowledgements.
	#[serde(rename = "Response", default = "Option::default")]
	pub response: Option<T>,
	/// Status block.
	#[serde(rename = "ResponseStatus", default)]
	pub status: ResponseStatus,
}
impl<T> Envelope<T> {
	/// Consumes the envelope and returns its payload, failing when it is absent.
	pub fn into_payload(self, path: &str) -> Result<T> {
		self.response.ok_or_else(|| {
			crate::error::DecodeError::MissingPayload { path: path.to_owned() }.into()
		})
	}
}
impl<T> ApiResponse for Envelope<T>
where
	T: 'static + Send + DeserializeOwned,
{
	fn status(&self) -> Option<&ResponseStatus> {
		Some(&self.status)
	}
}

/// Envelope for callers that only care about success.
pub type GenericResponse = Envelope<serde_json::Value>;

/// Gateway-level error body (`{"message": "..."}`) returned for unknown routes or rejected auth.
#[derive(Debug, Deserialize)]
pub(crate) struct GatewayMessage {
	#[serde(default)]
	pub(crate) message: Option<String>,
}
impl GatewayMessage {
	/// Extracts the gateway message, if the body is such an envelope.
	pub(crate) fn detect(body: &[u8]) -> Option<String> {
		serde_json::from_slice::<Self>(body)
			.ok()
			.and_then(|gateway| gateway.message)
			.filter(|message| !message.is_empty())
	}
}
