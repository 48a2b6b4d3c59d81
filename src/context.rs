//! Caller-scoped cancellation and deadlines.

// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Cancellation and deadline shared by every suspension point of one logical call.
///
/// Token refreshes, HTTP round trips, and watcher sleeps all run through
/// [`CallContext::run`], so cancelling the token or passing the deadline aborts whichever of
/// them is in flight with [`Error::Cancelled`] or [`Error::DeadlineExceeded`].
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	cancel: CancellationToken,
	deadline: Option<Instant>,
}
impl CallContext {
	/// Creates a context with no deadline.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a context driven by an existing cancellation token.
	pub fn with_token(cancel: CancellationToken) -> Self {
		Self { cancel, deadline: None }
	}

	/// Sets an absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline relative to now.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Derives a context that is cancelled with this one but can also be cancelled on its own.
	pub fn child(&self) -> Self {
		Self { cancel: self.cancel.child_token(), deadline: self.deadline }
	}

	/// Cancels the context.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once the context was cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Returns the deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Drives `fut` until it completes, the context is cancelled, or the deadline passes.
	pub async fn run<T, F>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		self.check()?;

		let deadline = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => std::future::pending().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Error::Cancelled),
			_ = deadline => Err(Error::DeadlineExceeded),
			out = fut => out,
		}
	}

	/// Sleeps for `delay` unless the context ends first.
	pub async fn sleep(&self, delay: StdDuration) -> Result<()> {
		self.run(async {
			tokio::time::sleep(delay).await;

			Ok(())
		})
		.await
	}

	fn check(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}
		if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
			return Err(Error::DeadlineExceeded);
		}

		Ok(())
	}
}
