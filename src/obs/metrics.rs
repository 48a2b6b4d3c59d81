// self
use crate::{
	_prelude::*,
	auth::PermissionScope,
	dispatch::ApiGeneration,
	obs::{OperationKind, OperationOutcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(kind: OperationKind, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"cloudngfw_operation_total",
			"operation" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records one dispatched request, labeled by permission scope, API generation, and result.
pub fn record_request<T>(
	scope: PermissionScope,
	generation: Option<ApiGeneration>,
	result: &Result<T>,
) {
	let result = request_result(result);
	let api = generation_label(generation);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"cloudngfw_request_total",
			"scope" => scope.as_str(),
			"api" => api,
			"result" => result
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (scope, api, result);
	}
}

/// Result label of a request: `ok`, the backend failure category, or the local error class.
pub fn request_result<T>(result: &Result<T>) -> &'static str {
	match result {
		Ok(_) => "ok",
		Err(Error::Api(status)) => status.kind().as_str(),
		Err(Error::UnknownResponse { .. }) => "unknown_response",
		Err(Error::Decode(_)) => "decode",
		Err(Error::Transport(_)) => "transport",
		Err(Error::Cancelled) => "cancelled",
		Err(Error::DeadlineExceeded) => "deadline_exceeded",
		Err(Error::Config(_)) => "config",
		Err(_) => "other",
	}
}

fn generation_label(generation: Option<ApiGeneration>) -> &'static str {
	match generation {
		Some(ApiGeneration::V1) => "v1",
		Some(ApiGeneration::V2) => "v2",
		None => "undetected",
	}
}
