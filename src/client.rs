//! Client facade wiring the token cache, issuer, and dispatcher together.

// self
use crate::{
	_prelude::*,
	auth::{CredentialSource, PermissionScope, SignedTokenIssuer, TokenCache, TokenIssuer},
	config::ClientConfig,
	context::CallContext,
	dispatch::{ApiReply, Dispatcher, RequestEnvelope, ResolvedCredential},
	http::HttpTransport,
	response::ApiResponse,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Authenticated management API client.
///
/// Cheap to clone; clones share the token cache, the transport, and the detected API
/// generation. Every operation takes a [`CallContext`] so callers can cancel long waits.
#[derive(Clone)]
pub struct Client {
	config: Arc<ClientConfig>,
	dispatcher: Arc<Dispatcher>,
	tokens: TokenCache,
}
impl Client {
	/// Creates a client with a reqwest transport built from `config`.
	#[cfg(feature = "reqwest")]
	pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Self::with_transport(config, credentials, Arc::new(transport))
	}

	/// Creates a client sending through a caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		credentials: Arc<dyn CredentialSource>,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self> {
		let config = Arc::new(config);
		let dispatcher = Arc::new(Dispatcher::new(config.clone(), transport)?);
		let issuer = Arc::new(SignedTokenIssuer::new(dispatcher.clone(), credentials));

		Ok(Self::from_parts(config, dispatcher, issuer))
	}

	/// Creates a client that obtains tokens from a caller-provided issuer.
	pub fn with_issuer(
		config: ClientConfig,
		transport: Arc<dyn HttpTransport>,
		issuer: Arc<dyn TokenIssuer>,
	) -> Result<Self> {
		let config = Arc::new(config);
		let dispatcher = Arc::new(Dispatcher::new(config.clone(), transport)?);

		Ok(Self::from_parts(config, dispatcher, issuer))
	}

	fn from_parts(
		config: Arc<ClientConfig>,
		dispatcher: Arc<Dispatcher>,
		issuer: Arc<dyn TokenIssuer>,
	) -> Self {
		let tokens = PermissionScope::ISSUING.into_iter().fold(
			TokenCache::new(issuer, config.token_margin(PermissionScope::None)),
			|cache, scope| cache.with_margin(scope, config.token_margin(scope)),
		);

		Self { config, dispatcher, tokens }
	}

	/// Configuration the client was built from.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Dispatcher shared by every clone.
	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Token cache shared by every clone.
	pub fn tokens(&self) -> &TokenCache {
		&self.tokens
	}

	/// Issues tokens for every scope with a role binding, concurrently.
	pub async fn prime_tokens(&self, ctx: &CallContext) -> Result<()> {
		self.tokens.prime(ctx, self.config.roles.configured_scopes()).await
	}

	/// Turns `scope` into the credential attached to a request.
	///
	/// The first token that advertises an API generation fixes the generation for the client,
	/// unless the configuration already named one.
	pub async fn resolve_credential(
		&self,
		ctx: &CallContext,
		scope: PermissionScope,
	) -> Result<ResolvedCredential> {
		if !scope.requires_token() {
			return Ok(ResolvedCredential::Anonymous);
		}

		let token = self.tokens.get_token(ctx, scope).await?;

		if let Some(generation) = token.generation {
			self.dispatcher.adopt_generation(generation);
		}

		Ok(ResolvedCredential::Bearer { token: token.bearer, subscription_key: token.subscription_key })
	}

	/// Sends `envelope` with the credential of its scope and decodes the response as `T`.
	pub async fn communicate<T>(
		&self,
		ctx: &CallContext,
		envelope: &RequestEnvelope,
	) -> Result<ApiReply<T>>
	where
		T: ApiResponse,
	{
		let credential = self.resolve_credential(ctx, envelope.scope).await?;

		self.dispatcher.send(ctx, envelope, &credential).await
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("dispatcher", &self.dispatcher)
			.field("tokens", &self.tokens)
			.finish()
	}
}
