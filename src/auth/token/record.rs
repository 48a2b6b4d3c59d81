//! Issued and cached bearer token records.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{PermissionScope, token::secret::Secret},
	dispatch::ApiGeneration,
};

/// Token material returned by a [`TokenIssuer`](crate::auth::TokenIssuer).
#[derive(Clone)]
pub struct IssuedToken {
	/// Bearer token sent in the `Authorization` header.
	pub bearer: Secret,
	/// Subscription key sent in the `x-api-key` header.
	pub subscription_key: Secret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl IssuedToken {
	/// Reads the API generation advertised by the token's `tenant_version` claim.
	///
	/// The claim is read without verifying the signature; the backend already vouched for the
	/// token when it issued it. Returns `None` when the token is not a JWT or carries no
	/// recognizable claim.
	pub fn tenant_generation(&self) -> Option<ApiGeneration> {
		#[derive(Deserialize)]
		struct Claims {
			tenant_version: Option<String>,
		}

		let payload = self.bearer.expose().split('.').nth(1)?;
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
		let claims = serde_json::from_slice::<Claims>(&bytes).ok()?;

		claims.tenant_version?.parse().ok()
	}
}
impl Debug for IssuedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedToken")
			.field("bearer", &self.bearer)
			.field("subscription_key", &self.subscription_key)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Token held by the [`TokenCache`](crate::auth::TokenCache) for one permission scope.
#[derive(Clone, Debug)]
pub struct CachedToken {
	/// Scope the token was issued for.
	pub scope: PermissionScope,
	/// Bearer token sent in the `Authorization` header.
	pub bearer: Secret,
	/// Subscription key sent in the `x-api-key` header.
	pub subscription_key: Secret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
	/// API generation advertised by the token, if any.
	pub generation: Option<ApiGeneration>,
}
impl CachedToken {
	/// Wraps freshly issued material for `scope`.
	pub fn from_issued(scope: PermissionScope, issued: IssuedToken) -> Self {
		let generation = issued.tenant_generation();

		Self {
			scope,
			bearer: issued.bearer,
			subscription_key: issued.subscription_key,
			expires_at: issued.expires_at,
			generation,
		}
	}

	/// Returns `true` when the token stays valid for longer than `margin` after `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
		self.expires_at - now > margin
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn issued(bearer: &str) -> IssuedToken {
		IssuedToken {
			bearer: Secret::new(bearer),
			subscription_key: Secret::new("key"),
			expires_at: OffsetDateTime::now_utc() + Duration::minutes(120),
		}
	}

	#[test]
	fn tenant_generation_reads_unverified_claim() {
		let claims = URL_SAFE_NO_PAD.encode(br#"{"tenant_version":"V2","sub":"tenant"}"#);
		let token = issued(&format!("header.{claims}.signature"));

		assert_eq!(token.tenant_generation(), Some(ApiGeneration::V2));
		assert_eq!(issued("opaque-token").tenant_generation(), None);
	}

	#[test]
	fn freshness_respects_margin() {
		let now = OffsetDateTime::now_utc();
		let mut token = CachedToken::from_issued(PermissionScope::Firewall, issued("opaque"));

		token.expires_at = now + Duration::seconds(30);

		assert!(token.is_fresh_at(now, Duration::seconds(10)));
		assert!(!token.is_fresh_at(now, Duration::seconds(30)));
		assert!(!token.is_fresh_at(now + Duration::seconds(25), Duration::seconds(10)));
	}
}
