//! Token issuance through role assumption and a signed call to the token endpoint.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	auth::{CredentialSource, IssuedToken, PermissionScope, RoleBindings, Secret},
	context::CallContext,
	dispatch::{ApiPath, Dispatcher, RequestEnvelope, ResolvedCredential},
	error::ConfigError,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	response::Envelope,
};

const MAX_EXPIRY_MINUTES: f64 = 7. * 24. * 60.;

/// Boxed future returned by [`TokenIssuer::issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedToken>> + 'a + Send>>;

/// Obtains a fresh token for one permission scope.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Issues a token for `scope`, observing `ctx` at every suspension point.
	fn issue<'a>(&'a self, ctx: &'a CallContext, scope: PermissionScope) -> IssueFuture<'a>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
	#[serde(rename = "ExpiryTime")]
	expiry_minutes: u32,
	#[serde(rename = "KeyInfo", skip_serializing_if = "Option::is_none")]
	key_info: Option<KeyInfo<'a>>,
}

#[derive(Serialize)]
struct KeyInfo<'a> {
	#[serde(rename = "Region")]
	region: &'a str,
	#[serde(rename = "Tenant")]
	tenant: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
	#[serde(rename = "TokenId")]
	token_id: Secret,
	#[serde(rename = "SubscriptionKey", default)]
	subscription_key: Secret,
	#[serde(rename = "ExpiryTime", default)]
	expiry_minutes: Option<f64>,
	#[serde(rename = "Enabled", default)]
	enabled: bool,
}

/// Issuer that assumes the scope's role and requests a token with a SigV4-signed call.
pub struct SignedTokenIssuer {
	dispatcher: Arc<Dispatcher>,
	roles: RoleBindings,
	credentials: Arc<dyn CredentialSource>,
	expiry_minutes: u32,
	tenant: Option<String>,
}
impl SignedTokenIssuer {
	/// Creates an issuer using the role bindings and token settings of the dispatcher's config.
	pub fn new(dispatcher: Arc<Dispatcher>, credentials: Arc<dyn CredentialSource>) -> Self {
		let config = dispatcher.config();
		let roles = config.roles.clone();
		let expiry_minutes = config.token_expiry_minutes();
		let tenant = config.tenant.clone().filter(|tenant| !tenant.is_empty());

		Self { dispatcher, roles, credentials, expiry_minutes, tenant }
	}

	async fn issue_inner(&self, ctx: &CallContext, scope: PermissionScope) -> Result<IssuedToken> {
		let suffix = scope.token_path_suffix().ok_or(ConfigError::TokenlessScope { scope })?;
		let role = self.roles.resolve(scope)?;
		let config = self.dispatcher.config();
		let region = if scope.uses_marketplace() { config.mp_region() } else { config.region()? };

		obs::log_login(config.logging(), format_args!("(login) refreshing {scope} token..."));

		let credentials = ctx
			.run(async {
				self.credentials.assume_role(role).await.map_err(|source| {
					Error::CredentialSource { role: role.to_owned(), source }
				})
			})
			.await?;
		let body = TokenRequest {
			expiry_minutes: self.expiry_minutes,
			key_info: self.tenant.as_deref().map(|tenant| KeyInfo { region, tenant }),
		};
		let envelope = RequestEnvelope::new(
			scope,
			Method::GET,
			ApiPath::v1(["v1", "mgmt", "tokens", suffix]),
		)
		.with_json(&body)?;
		let credential =
			ResolvedCredential::Signed { credentials, region: region.to_owned() };
		let issued_at = OffsetDateTime::now_utc();
		let reply = self
			.dispatcher
			.send::<Envelope<TokenPayload>>(ctx, &envelope, &credential)
			.await?;
		let path = format!("v1/mgmt/tokens/{suffix}");
		let payload = reply.value.into_payload(&path)?;
		let minutes = payload
			.expiry_minutes
			.filter(|minutes| *minutes > 0. && *minutes <= MAX_EXPIRY_MINUTES)
			.unwrap_or(f64::from(self.expiry_minutes));

		#[cfg(feature = "tracing")]
		tracing::debug!(
			target: "cloudngfw",
			scope = scope.as_str(),
			enabled = payload.enabled,
			expiry_minutes = minutes,
			"token issued"
		);
		#[cfg(not(feature = "tracing"))]
		let _ = payload.enabled;

		Ok(IssuedToken {
			bearer: payload.token_id,
			subscription_key: payload.subscription_key,
			expires_at: issued_at + Duration::seconds_f64(minutes * 60.),
		})
	}
}
impl TokenIssuer for SignedTokenIssuer {
	fn issue<'a>(&'a self, ctx: &'a CallContext, scope: PermissionScope) -> IssueFuture<'a> {
		Box::pin(async move {
			const KIND: OperationKind = OperationKind::TokenRefresh;

			let span = OperationSpan::new(KIND, scope.as_str());

			obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

			let result = span.instrument(self.issue_inner(ctx, scope)).await;

			obs::record_operation_outcome(KIND, OperationOutcome::of(&result));

			result
		})
	}
}
impl Debug for SignedTokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedTokenIssuer")
			.field("scopes", &self.roles.configured_scopes())
			.field("expiry_minutes", &self.expiry_minutes)
			.field("tenant", &self.tenant)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_request_omits_key_info_without_tenant() {
		let body = TokenRequest { expiry_minutes: 120, key_info: None };

		assert_eq!(
			serde_json::to_string(&body).expect("Token request should serialize."),
			r#"{"ExpiryTime":120}"#
		);

		let body = TokenRequest {
			expiry_minutes: 60,
			key_info: Some(KeyInfo { region: "us-east-1", tenant: "acme" }),
		};

		assert_eq!(
			serde_json::to_string(&body).expect("Token request should serialize."),
			r#"{"ExpiryTime":60,"KeyInfo":{"Region":"us-east-1","Tenant":"acme"}}"#
		);
	}

	#[test]
	fn token_payload_accepts_fractional_expiry() {
		let payload: TokenPayload = serde_json::from_str(
			r#"{"TokenId":"jwt","SubscriptionKey":"sk","ExpiryTime":59.5,"Enabled":true}"#,
		)
		.expect("Token payload should decode.");

		assert_eq!(payload.token_id.expose(), "jwt");
		assert_eq!(payload.expiry_minutes, Some(59.5));
		assert!(payload.enabled);
	}
}
