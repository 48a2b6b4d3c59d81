//! Bounded polling: operation watcher, conflict retries, and the probes that drive them.
//!
//! Both loops share one primitive that calls a step, sleeps a fixed delay between attempts, and
//! gives up after a fixed number of attempts. The budgets are separate: waits on backend state
//! default to 120 attempts 30 seconds apart, conflict retries to 10 attempts 2 seconds apart.

mod probe;
mod status;

pub use probe::*;
pub use status::*;

// self
use crate::{
	_prelude::*,
	context::CallContext,
	error::ConfigError,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

/// Attempt bound and fixed delay for a polling loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitBudget {
	/// Maximum number of attempts, including the first.
	pub max_attempts: u32,
	/// Delay between attempts.
	#[serde(rename = "delay_secs", with = "delay_secs")]
	pub delay: StdDuration,
}
impl WaitBudget {
	/// Default budget for waits on backend state.
	pub const STATUS: Self = Self::new(120, StdDuration::from_secs(30));
	/// Default budget for update-token conflict retries.
	pub const CONFLICT: Self = Self::new(10, StdDuration::from_secs(2));

	/// Builds a budget.
	pub const fn new(max_attempts: u32, delay: StdDuration) -> Self {
		Self { max_attempts, delay }
	}

	/// Rejects budgets that allow no attempt at all.
	pub fn validate(&self, budget: &'static str) -> Result<(), ConfigError> {
		if self.max_attempts == 0 { Err(ConfigError::EmptyBudget { budget }) } else { Ok(()) }
	}
}

/// Result of one probe of a long-running operation.
#[derive(Debug)]
pub enum Probe {
	/// The operation reached the desired state.
	Done,
	/// Not there yet; the error describes the observed state.
	Retry(Error),
	/// The operation failed or cannot be observed; stop waiting.
	Fail(Error),
}

enum Step<T> {
	Finished(T),
	Retry(Error),
	Fail(Error),
}

/// Polls `probe` until it reports [`Probe::Done`] or [`Probe::Fail`], or the budget runs out.
///
/// The probe runs once per attempt with `budget.delay` between attempts. Exhausting the budget
/// yields [`Error::Timeout`] wrapping the last [`Probe::Retry`] error. The context is observed on
/// every probe and every sleep.
pub async fn wait_for<F, Fut>(ctx: &CallContext, budget: WaitBudget, mut probe: F) -> Result<()>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Probe>,
{
	const KIND: OperationKind = OperationKind::Wait;

	let span = OperationSpan::new(KIND, "wait_for");

	obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

	let result = span
		.instrument(bounded(ctx, budget, "wait", || {
			let fut = probe();

			async move {
				match fut.await {
					Probe::Done => Step::Finished(()),
					Probe::Retry(e) => Step::Retry(e),
					Probe::Fail(e) => Step::Fail(e),
				}
			}
		}))
		.await;

	obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

	result
}

/// Runs `op`, retrying only while it fails with an update-token conflict.
///
/// Any other error is returned after the first attempt. Exhausting the budget yields
/// [`Error::Timeout`] wrapping the last conflict.
pub async fn retry_on_conflict<T, F, Fut>(
	ctx: &CallContext,
	budget: WaitBudget,
	mut op: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	const KIND: OperationKind = OperationKind::ConflictRetry;

	let span = OperationSpan::new(KIND, "retry_on_conflict");

	obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

	let result = span
		.instrument(bounded(ctx, budget, "conflict retry", || {
			let fut = op();

			async move {
				match fut.await {
					Ok(value) => Step::Finished(value),
					Err(e) if e.is_token_conflict() => Step::Retry(e),
					Err(e) => Step::Fail(e),
				}
			}
		}))
		.await;

	obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

	result
}

async fn bounded<T, F, Fut>(
	ctx: &CallContext,
	budget: WaitBudget,
	label: &'static str,
	mut step: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Step<T>>,
{
	budget.validate(label)?;

	let mut last = None;

	for attempt in 1..=budget.max_attempts {
		match ctx.run(async { Ok(step().await) }).await? {
			Step::Finished(value) => return Ok(value),
			Step::Fail(e) => return Err(e),
			Step::Retry(e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					target: "cloudngfw",
					label,
					attempt,
					max_attempts = budget.max_attempts,
					reason = %e,
					"retrying"
				);

				last = Some(e);

				if attempt < budget.max_attempts {
					ctx.sleep(budget.delay).await?;
				}
			},
		}
	}

	Err(Error::Timeout {
		attempts: budget.max_attempts,
		last: Box::new(last.unwrap_or(Error::Pending { reason: format!("{label} never ran") })),
	})
}

mod delay_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(delay: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_f64(delay.as_secs_f64())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let secs = f64::deserialize(deserializer)?;

		StdDuration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
	}
}
