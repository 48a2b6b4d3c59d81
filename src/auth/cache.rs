//! Per-scope token cache with serialized refresh.

mod metrics;

pub use metrics::TokenMetrics;

// crates.io
use tokio::task::JoinSet;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, PermissionScope, TokenIssuer},
	context::CallContext,
	error::ConfigError,
};

type Slot = Arc<AsyncMutex<Option<CachedToken>>>;

/// Holds one token per issuing scope and refreshes it at most once per expiry.
///
/// Each scope has its own async lock, held across the freshness check and any refresh, so
/// concurrent callers of a stale scope wait for the single in-flight issuance instead of
/// starting their own. Different scopes never wait on each other.
#[derive(Clone)]
pub struct TokenCache {
	slots: Arc<HashMap<PermissionScope, Slot>>,
	issuer: Arc<dyn TokenIssuer>,
	margins: HashMap<PermissionScope, Duration>,
	metrics: Arc<TokenMetrics>,
}
impl TokenCache {
	/// Creates an empty cache that treats tokens within `margin` of expiry as stale.
	///
	/// The margin applies to every scope until [`TokenCache::with_margin`] overrides it.
	pub fn new(issuer: Arc<dyn TokenIssuer>, margin: Duration) -> Self {
		let slots = PermissionScope::ISSUING
			.into_iter()
			.map(|scope| (scope, Slot::default()))
			.collect::<HashMap<_, _>>();
		let margins = PermissionScope::ISSUING.into_iter().map(|scope| (scope, margin)).collect();

		Self { slots: Arc::new(slots), issuer, margins, metrics: Default::default() }
	}

	/// Sets the refresh margin of one scope.
	pub fn with_margin(mut self, scope: PermissionScope, margin: Duration) -> Self {
		self.margins.insert(scope, margin);

		self
	}

	/// Counters describing cache behavior.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Refresh margin in effect for `scope`.
	pub fn margin_for(&self, scope: PermissionScope) -> Duration {
		self.margins.get(&scope).copied().unwrap_or(Duration::ZERO)
	}

	/// Returns a token for `scope`, issuing a new one if the cached token is missing or stale.
	///
	/// A failed issuance leaves the scope empty, so the next call tries again.
	pub async fn get_token(&self, ctx: &CallContext, scope: PermissionScope) -> Result<CachedToken> {
		let slot = self.slot(scope)?;

		self.metrics.record_attempt();

		let result = self.get_or_refresh(ctx, scope, slot).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		result
	}

	/// Drops the cached token for `scope`.
	pub async fn invalidate(&self, scope: PermissionScope) {
		if let Some(slot) = self.slots.get(&scope) {
			*slot.lock().await = None;
		}
	}

	/// Returns the cached token for `scope` without refreshing it.
	pub async fn cached(&self, scope: PermissionScope) -> Option<CachedToken> {
		self.slots.get(&scope)?.lock().await.clone()
	}

	/// Refreshes `scopes` concurrently, failing if any of them fails.
	///
	/// Every scope runs to completion; the first error observed is returned.
	pub async fn prime<I>(&self, ctx: &CallContext, scopes: I) -> Result<()>
	where
		I: IntoIterator<Item = PermissionScope>,
	{
		let mut set = JoinSet::new();

		for scope in scopes {
			let cache = self.clone();
			let ctx = ctx.clone();

			set.spawn(async move { cache.get_token(&ctx, scope).await.map(|_| ()) });
		}

		if set.is_empty() {
			return Err(ConfigError::NoRoleBindings.into());
		}

		let mut first_error = None;

		while let Some(joined) = set.join_next().await {
			match joined {
				Ok(Ok(())) => {},
				Ok(Err(e)) => {
					first_error.get_or_insert(e);
				},
				Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
				Err(_) => {
					first_error.get_or_insert(Error::Cancelled);
				},
			}
		}

		first_error.map_or(Ok(()), Err)
	}

	fn slot(&self, scope: PermissionScope) -> Result<&Slot> {
		self.slots.get(&scope).ok_or_else(|| ConfigError::TokenlessScope { scope }.into())
	}

	async fn get_or_refresh(
		&self,
		ctx: &CallContext,
		scope: PermissionScope,
		slot: &Slot,
	) -> Result<CachedToken> {
		let mut guard = ctx.run(async { Ok(slot.lock().await) }).await?;

		let margin = self.margin_for(scope);

		if let Some(token) =
			guard.as_ref().filter(|token| token.is_fresh_at(OffsetDateTime::now_utc(), margin))
		{
			self.metrics.record_hit();

			return Ok(token.clone());
		}

		match self.issuer.issue(ctx, scope).await {
			Ok(issued) => {
				let token = CachedToken::from_issued(scope, issued);

				*guard = Some(token.clone());
				self.metrics.record_issued();

				Ok(token)
			},
			Err(e) => {
				*guard = None;

				Err(e)
			},
		}
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("margins", &self.margins)
			.field("metrics", &self.metrics)
			.finish()
	}
}
