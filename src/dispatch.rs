//! Request dispatcher: endpoint selection, authentication headers, and response decoding.
//!
//! Every management call is described by a [`RequestEnvelope`] and paired with a
//! [`ResolvedCredential`]. The dispatcher picks the host and path for the session's API
//! generation, applies the credential, sends the request through the configured
//! [`HttpTransport`], and turns the body into a typed response or a classified [`Error`].

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, Request,
	header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	auth::{PermissionScope, Secret, SigningParams, TemporaryCredentials, sigv4},
	config::ClientConfig,
	context::CallContext,
	error::{ConfigError, DecodeError},
	http::HttpTransport,
	obs::{self, LogCategories, OperationKind, OperationOutcome, OperationSpan},
	response::{ApiResponse, GatewayMessage},
};

const API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const REGION_QUERY: &str = "region";

/// Management API generation a tenant is served by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiGeneration {
	/// Name-addressed v1 API on the regional host.
	V1,
	/// Id-addressed v2 API on the v2 host.
	V2,
}
impl ApiGeneration {
	/// Returns the canonical label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::V1 => "V1",
			Self::V2 => "V2",
		}
	}
}
impl FromStr for ApiGeneration {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.eq_ignore_ascii_case("v1") {
			Ok(Self::V1)
		} else if s.eq_ignore_ascii_case("v2") {
			Ok(Self::V2)
		} else {
			Err(ConfigError::UnknownApiGeneration { generation: s.to_owned() })
		}
	}
}
impl Display for ApiGeneration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-generation path of one operation, as unescaped segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiPath {
	/// Path used by v1 tenants.
	pub v1: Option<Vec<String>>,
	/// Path used by v2 tenants.
	pub v2: Option<Vec<String>>,
}
impl ApiPath {
	/// Path that only exists on the v1 API.
	pub fn v1<I, S>(segments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { v1: Some(collect(segments)), v2: None }
	}

	/// Path that only exists on the v2 API.
	pub fn v2<I, S>(segments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { v1: None, v2: Some(collect(segments)) }
	}

	/// Adds the v2 form of a v1 path.
	pub fn with_v2<I, S>(mut self, segments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.v2 = Some(collect(segments));

		self
	}
}

/// Everything the dispatcher needs to build one request.
#[derive(Clone, Debug)]
pub struct RequestEnvelope {
	/// Scope whose credential authenticates the call.
	pub scope: PermissionScope,
	/// HTTP method.
	pub method: Method,
	/// Per-generation path.
	pub path: ApiPath,
	/// Query parameters, in order.
	pub query: Vec<(String, String)>,
	/// JSON body, if any.
	pub body: Option<Vec<u8>>,
}
impl RequestEnvelope {
	/// Creates an envelope without query or body.
	pub fn new(scope: PermissionScope, method: Method, path: ApiPath) -> Self {
		Self { scope, method, path, query: Vec::new(), body: None }
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Serializes `body` as the JSON request body.
	pub fn with_json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body).map_err(DecodeError::Encode)?);

		Ok(self)
	}
}

/// Authentication applied to one request.
#[derive(Clone, Debug)]
pub enum ResolvedCredential {
	/// No authentication headers.
	Anonymous,
	/// Cached bearer token and subscription key.
	Bearer {
		/// Raw bearer token, sent as-is in `Authorization`.
		token: Secret,
		/// Subscription key sent in `x-api-key`.
		subscription_key: Secret,
	},
	/// SigV4 signature with temporary credentials.
	Signed {
		/// Credentials obtained by assuming the scope's role.
		credentials: TemporaryCredentials,
		/// Region the signature is scoped to.
		region: String,
	},
}

/// Decoded response together with the raw exchange.
#[derive(Clone, Debug)]
pub struct ApiReply<T> {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
	/// Decoded body.
	pub value: T,
}

/// Builds, sends, and decodes management API requests.
pub struct Dispatcher {
	config: Arc<ClientConfig>,
	transport: Arc<dyn HttpTransport>,
	headers: HeaderMap,
	logging: LogCategories,
	generation: RwLock<Option<ApiGeneration>>,
}
impl Dispatcher {
	/// Validates `config` and prepares a dispatcher sending through `transport`.
	pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn HttpTransport>) -> Result<Self> {
		config.validate()?;

		let headers = config.custom_headers()?;
		let logging = config.logging();
		let generation = RwLock::new(config.api_generation);

		Ok(Self { config, transport, headers, logging, generation })
	}

	/// Configuration the dispatcher was built from.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// API generation in effect, if known.
	pub fn generation(&self) -> Option<ApiGeneration> {
		*self.generation.read()
	}

	/// Records the generation learned from a token unless one is already known.
	pub fn adopt_generation(&self, generation: ApiGeneration) {
		let mut slot = self.generation.write();

		if slot.is_none() {
			*slot = Some(generation);
		}
	}

	/// Builds the HTTP request for `envelope`, authenticated with `credential`.
	///
	/// Headers are applied in a fixed order: content type and user agent, then the credential's
	/// headers, then the configured custom headers, which override anything set before them.
	/// Signing happens last so the signature covers the final header set.
	pub fn build_request(
		&self,
		envelope: &RequestEnvelope,
		credential: &ResolvedCredential,
	) -> Result<Request<Vec<u8>>> {
		let url = self.endpoint(envelope)?;
		let mut request = Request::builder()
			.method(envelope.method.clone())
			.uri(url.as_str())
			.body(envelope.body.clone().unwrap_or_default())
			.map_err(ConfigError::from)?;
		let headers = request.headers_mut();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(USER_AGENT, header_value(USER_AGENT.as_str(), self.config.agent())?);

		if let ResolvedCredential::Bearer { token, subscription_key } = credential {
			headers.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), token.expose())?);
			headers.insert(API_KEY, header_value(API_KEY.as_str(), subscription_key.expose())?);
		}
		for (name, value) in &self.headers {
			headers.insert(name, value.clone());
		}

		if let ResolvedCredential::Signed { credentials, region } = credential {
			sigv4::sign_request(
				&mut request,
				&SigningParams {
					credentials,
					region,
					service: sigv4::EXECUTE_API,
					time: OffsetDateTime::now_utc(),
				},
			)?;
		}

		Ok(request)
	}

	/// Sends `envelope` and decodes the body as `T`.
	///
	/// Gateway bodies of the form `{"message": ...}` become [`Error::UnknownResponse`], bodies
	/// that do not decode become [`Error::Decode`], and envelopes with a non-zero error code
	/// become [`Error::Api`]. The HTTP status code itself is never treated as a failure.
	pub async fn send<T>(
		&self,
		ctx: &CallContext,
		envelope: &RequestEnvelope,
		credential: &ResolvedCredential,
	) -> Result<ApiReply<T>>
	where
		T: ApiResponse,
	{
		const KIND: OperationKind = OperationKind::Dispatch;

		let span = OperationSpan::new(KIND, envelope.method.as_str());

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.send_inner(ctx, envelope, credential)).await;

		obs::record_operation_outcome(KIND, OperationOutcome::of(&result));
		obs::record_request(envelope.scope, self.generation(), &result);

		result
	}

	async fn send_inner<T>(
		&self,
		ctx: &CallContext,
		envelope: &RequestEnvelope,
		credential: &ResolvedCredential,
	) -> Result<ApiReply<T>>
	where
		T: ApiResponse,
	{
		let request = self.build_request(envelope, credential)?;
		let method = request.method().clone();
		let path = request.uri().path().to_owned();

		obs::log_action(self.logging, &method, format_args!("{method} {path}"));
		obs::log_path(self.logging, &method, request.uri());
		obs::log_send(self.logging, request.body());

		let response =
			ctx.run(async { self.transport.execute(request).await.map_err(Error::from) }).await?;
		let status = response.status().as_u16();
		let body = response.into_body();

		obs::log_receive(self.logging, status, &body);

		if let Some(message) = GatewayMessage::detect(&body) {
			return Err(Error::UnknownResponse { status, path, message });
		}

		let mut de = serde_json::Deserializer::from_slice(&body);
		let value: T = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| DecodeError::Response { path: path.clone(), status, source })?;

		if let Some(failure) = value.failed() {
			return Err(Error::Api(failure));
		}

		Ok(ApiReply { status, body, value })
	}

	fn endpoint(&self, envelope: &RequestEnvelope) -> Result<Url> {
		let generation = self.generation();
		let (host, segments, regional) = if envelope.scope.uses_marketplace() {
			(self.config.mp_region_host(), envelope.path.v1.as_ref(), false)
		} else {
			match (generation, envelope.path.v2.as_ref()) {
				(Some(ApiGeneration::V2), Some(v2)) => (self.config.v2_host(), Some(v2), true),
				_ => (self.config.host(), envelope.path.v1.as_ref(), false),
			}
		};
		let segments = segments.ok_or(ConfigError::MissingPath {
			generation: generation.unwrap_or(ApiGeneration::V1).as_str(),
		})?;
		let base = format!("{}://{host}/", self.config.protocol().as_str());
		let mut url =
			Url::parse(&base).map_err(|source| ConfigError::InvalidUrl { url: base.clone(), source })?;

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidUrl {
				url: base.clone(),
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.clear()
			.extend(segments);

		let needs_region = regional && !envelope.query.iter().any(|(name, _)| name == REGION_QUERY);

		if !envelope.query.is_empty() || needs_region {
			let mut pairs = url.query_pairs_mut();

			for (name, value) in &envelope.query {
				pairs.append_pair(name, value);
			}
			if needs_region {
				pairs.append_pair(REGION_QUERY, self.config.region()?);
			}
		}

		Ok(url)
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("host", &self.config.host())
			.field("generation", &self.generation())
			.field("logging", &self.logging)
			.finish()
	}
}

fn collect<I, S>(segments: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	segments.into_iter().map(Into::into).collect()
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader { name: name.to_owned() })
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::Response;
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::TransportFuture,
		response::{Envelope, GenericResponse},
	};

	struct CannedTransport {
		status: u16,
		body: &'static str,
		seen: Mutex<Vec<Request<Vec<u8>>>>,
	}
	impl CannedTransport {
		fn new(status: u16, body: &'static str) -> Arc<Self> {
			Arc::new(Self { status, body, seen: Mutex::new(Vec::new()) })
		}
	}
	impl HttpTransport for CannedTransport {
		fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_> {
			self.seen.lock().push(request);

			let mut response = Response::new(self.body.as_bytes().to_vec());

			*response.status_mut() =
				http::StatusCode::from_u16(self.status).unwrap_or(http::StatusCode::OK);

			Box::pin(async move { Ok::<_, TransportError>(response) })
		}
	}

	fn config() -> ClientConfig {
		ClientConfig::new("eu-west-1")
			.with_host("regional.test")
			.with_v2_host("v2.test")
			.with_mp_region_host("mp.test")
	}

	fn dispatcher(config: ClientConfig, transport: Arc<CannedTransport>) -> Dispatcher {
		Dispatcher::new(Arc::new(config), transport).expect("Dispatcher should build.")
	}

	fn bearer() -> ResolvedCredential {
		ResolvedCredential::Bearer { token: "tok".into(), subscription_key: "key".into() }
	}

	fn firewall_path() -> ApiPath {
		ApiPath::v1(["v1", "config", "ngfirewalls", "fw 1"]).with_v2([
			"v2",
			"config",
			"ngfirewalls",
			"id-1",
		])
	}

	#[test]
	fn generation_parses_case_insensitively() {
		assert_eq!("v2".parse::<ApiGeneration>().ok(), Some(ApiGeneration::V2));
		assert_eq!("V1".parse::<ApiGeneration>().ok(), Some(ApiGeneration::V1));
		assert!("v3".parse::<ApiGeneration>().is_err());
	}

	#[test]
	fn v1_requests_use_regional_host_and_escaped_segments() {
		let dispatcher = dispatcher(config(), CannedTransport::new(200, "{}"));
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let request =
			dispatcher.build_request(&envelope, &bearer()).expect("Request should build.");

		assert_eq!(request.uri().to_string(), "https://regional.test/v1/config/ngfirewalls/fw%201");
		assert_eq!(request.headers()[AUTHORIZATION], "tok");
		assert_eq!(request.headers()["x-api-key"], "key");
		assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
	}

	#[test]
	fn v2_requests_use_v2_host_and_region_query() {
		let dispatcher = dispatcher(config(), CannedTransport::new(200, "{}"));

		dispatcher.adopt_generation(ApiGeneration::V2);
		dispatcher.adopt_generation(ApiGeneration::V1);

		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let request =
			dispatcher.build_request(&envelope, &bearer()).expect("Request should build.");

		assert_eq!(dispatcher.generation(), Some(ApiGeneration::V2));
		assert_eq!(
			request.uri().to_string(),
			"https://v2.test/v2/config/ngfirewalls/id-1?region=eu-west-1"
		);

		let explicit = envelope.with_query("region", "us-west-2");
		let request =
			dispatcher.build_request(&explicit, &bearer()).expect("Request should build.");

		assert_eq!(request.uri().query(), Some("region=us-west-2"));
	}

	#[test]
	fn account_scope_uses_marketplace_host() {
		let dispatcher = dispatcher(config(), CannedTransport::new(200, "{}"));
		let envelope = RequestEnvelope::new(
			PermissionScope::Account,
			Method::GET,
			ApiPath::v1(["v1", "mgmt", "linkaccounts"]),
		);
		let request =
			dispatcher.build_request(&envelope, &bearer()).expect("Request should build.");

		assert_eq!(request.uri().host(), Some("mp.test"));
	}

	#[test]
	fn v2_only_path_requires_v2_generation() {
		let dispatcher = dispatcher(config(), CannedTransport::new(200, "{}"));
		let envelope = RequestEnvelope::new(
			PermissionScope::Firewall,
			Method::PATCH,
			ApiPath::v2(["v2", "config", "ngfirewalls", "id-1"]),
		);
		let err = dispatcher
			.build_request(&envelope, &bearer())
			.expect_err("V1 session cannot reach a v2-only path.");

		assert!(matches!(err, Error::Config(ConfigError::MissingPath { generation: "V1" })));
	}

	#[test]
	fn custom_headers_override_defaults() {
		let config = config().with_header("User-Agent", "custom").with_header("X-Trace", "1");
		let dispatcher = dispatcher(config, CannedTransport::new(200, "{}"));
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let request =
			dispatcher.build_request(&envelope, &bearer()).expect("Request should build.");

		assert_eq!(request.headers()[USER_AGENT], "custom");
		assert_eq!(request.headers()["x-trace"], "1");
	}

	#[test]
	fn signed_requests_carry_sigv4_headers() {
		let dispatcher = dispatcher(config(), CannedTransport::new(200, "{}"));
		let envelope = RequestEnvelope::new(
			PermissionScope::Firewall,
			Method::GET,
			ApiPath::v1(["v1", "mgmt", "tokens", "cloudfirewalladmin"]),
		);
		let credential = ResolvedCredential::Signed {
			credentials: TemporaryCredentials::new("AKID", "secret").with_session_token("session"),
			region: "eu-west-1".into(),
		};
		let request =
			dispatcher.build_request(&envelope, &credential).expect("Request should build.");
		let authorization = request.headers()[AUTHORIZATION]
			.to_str()
			.expect("Authorization header should be ASCII.");

		assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
		assert!(authorization.contains("/eu-west-1/execute-api/aws4_request"));
		assert_eq!(request.headers()["x-amz-security-token"], "session");
		assert!(request.headers().get("x-api-key").is_none());
	}

	#[tokio::test]
	async fn send_decodes_success_and_classifies_failures() {
		let ok = dispatcher(
			config(),
			CannedTransport::new(
				200,
				r#"{"Response":{"FirewallName":"fw"},"ResponseStatus":{"ErrorCode":0}}"#,
			),
		);
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let reply = ok
			.send::<GenericResponse>(&CallContext::new(), &envelope, &bearer())
			.await
			.expect("Successful envelope should decode.");

		assert_eq!(reply.status, 200);
		assert_eq!(
			reply.value.response.and_then(|v| v.get("FirewallName").cloned()),
			Some(serde_json::json!("fw"))
		);

		let conflict = dispatcher(
			config(),
			CannedTransport::new(
				200,
				r#"{"ResponseStatus":{"ErrorCode":409,"Reason":"please provide latest token"}}"#,
			),
		);
		let err = conflict
			.send::<GenericResponse>(&CallContext::new(), &envelope, &bearer())
			.await
			.expect_err("Non-zero error code should fail.");

		assert!(err.is_token_conflict());
	}

	#[tokio::test]
	async fn send_rejects_gateway_and_undecodable_bodies() {
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let gateway =
			dispatcher(config(), CannedTransport::new(403, r#"{"message":"Forbidden"}"#));
		let err = gateway
			.send::<GenericResponse>(&CallContext::new(), &envelope, &bearer())
			.await
			.expect_err("Gateway body should be rejected.");

		assert!(matches!(
			err,
			Error::UnknownResponse { status: 403, ref message, .. } if message == "Forbidden"
		));

		let html = dispatcher(config(), CannedTransport::new(502, "<html>bad gateway</html>"));
		let err = html
			.send::<Envelope<serde_json::Value>>(&CallContext::new(), &envelope, &bearer())
			.await
			.expect_err("Non-JSON body should fail to decode.");

		assert!(matches!(err, Error::Decode(DecodeError::Response { status: 502, .. })));
	}

	#[tokio::test]
	async fn cancelled_context_skips_transport() {
		let transport = CannedTransport::new(200, "{}");
		let dispatcher = dispatcher(config(), transport.clone());
		let ctx = CallContext::new();

		ctx.cancel();

		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall_path());
		let err = dispatcher
			.send::<GenericResponse>(&ctx, &envelope, &bearer())
			.await
			.expect_err("Cancelled call should fail.");

		assert!(matches!(err, Error::Cancelled));
		assert!(transport.seen.lock().is_empty());
	}
}
