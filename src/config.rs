//! Client configuration: defaults, auth-file parsing, and environment overlay.
//!
//! Every field is optional so the sources layer by filling gaps. Values set in code win, then
//! `CLOUDNGFWAWS_*` environment variables ([`ClientConfig::apply_env`]), then an auth-file JSON
//! document ([`ClientConfig::apply_auth_file`]); the accessors fall back to built-in defaults for
//! anything still unset.

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	auth::{PermissionScope, RoleBindings},
	dispatch::ApiGeneration,
	error::{ConfigError, DecodeError},
	obs::LogCategories,
	wait::WaitBudget,
};

/// Default API host for the regional, v2, and marketplace endpoints.
pub const DEFAULT_HOST: &str = "api.us-east-1.aws.cloudngfw.paloaltonetworks.com";
/// Default marketplace region.
pub const DEFAULT_MP_REGION: &str = "us-east-1";
/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default token lifetime requested from the issuance endpoint, in minutes.
pub const DEFAULT_TOKEN_EXPIRY_MINUTES: u32 = 120;
/// Smallest allowed token refresh margin in seconds.
pub const MIN_TOKEN_MARGIN_SECS: u64 = 10;
/// Largest allowed token refresh margin in seconds.
pub const MAX_TOKEN_MARGIN_SECS: u64 = 60;

const ENV_PREFIX: &str = "CLOUDNGFWAWS_";

/// URL scheme used for every endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
	/// Plain HTTP, for local gateways and tests.
	Http,
	/// HTTPS.
	#[default]
	Https,
}
impl Protocol {
	/// Returns the URL scheme.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Http => "http",
			Self::Https => "https",
		}
	}
}
impl FromStr for Protocol {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"http" => Ok(Self::Http),
			"https" => Ok(Self::Https),
			other => Err(ConfigError::InvalidProtocol { protocol: other.to_owned() }),
		}
	}
}
impl TryFrom<String> for Protocol {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<Protocol> for String {
	fn from(value: Protocol) -> Self {
		value.as_str().to_owned()
	}
}

/// Client settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Regional API host.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	/// Host serving the v2 API.
	#[serde(rename = "v2_host", skip_serializing_if = "Option::is_none")]
	pub v2_host: Option<String>,
	/// Host serving account-scoped (marketplace) calls.
	#[serde(rename = "mp_region_host", skip_serializing_if = "Option::is_none")]
	pub mp_region_host: Option<String>,
	/// URL scheme.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub protocol: Option<Protocol>,
	/// Region used for signing and the v2 `region` query parameter.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	/// Region used for account-scoped calls.
	#[serde(rename = "mp_region", skip_serializing_if = "Option::is_none")]
	pub mp_region: Option<String>,
	/// Per-request timeout in seconds.
	#[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
	pub timeout_secs: Option<u64>,
	/// Headers added to every request after the standard ones.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub headers: Option<BTreeMap<String, String>>,
	/// `User-Agent` header value.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub agent: Option<String>,
	/// Role bindings per permission scope.
	#[serde(flatten)]
	pub roles: RoleBindings,
	/// Tenant sent in the token request's key info.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tenant: Option<String>,
	/// API generation; detected from the first issued token when unset.
	#[serde(rename = "tenant_version", skip_serializing_if = "Option::is_none")]
	pub api_generation: Option<ApiGeneration>,
	/// Accept invalid TLS certificates.
	#[serde(rename = "skip-verify-certificate", skip_serializing_if = "Option::is_none")]
	pub skip_verify_certificate: Option<bool>,
	/// Enabled logging categories.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub logging: Option<LogCategories>,
	/// Budget for waits on backend state.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub wait: Option<WaitBudget>,
	/// Budget for retries on update-token conflicts.
	#[serde(rename = "conflict_retry", skip_serializing_if = "Option::is_none")]
	pub conflict_retry: Option<WaitBudget>,
	/// Token lifetime requested from the issuance endpoint, in minutes.
	#[serde(rename = "token_expiry_minutes", skip_serializing_if = "Option::is_none")]
	pub token_expiry_minutes: Option<u32>,
	/// Refresh margin before token expiry, in seconds.
	#[serde(rename = "token_margin", skip_serializing_if = "Option::is_none")]
	pub token_margin_secs: Option<u64>,
	/// Per-scope refresh margins in seconds, overriding `token_margin`.
	#[serde(rename = "token_margins", skip_serializing_if = "Option::is_none")]
	pub scope_token_margins: Option<BTreeMap<PermissionScope, u64>>,
}
impl ClientConfig {
	/// Creates a configuration for `region` with every other value defaulted.
	pub fn new(region: impl Into<String>) -> Self {
		Self { region: Some(region.into()), ..Default::default() }
	}

	/// Parses an auth-file JSON document.
	pub fn from_json(bytes: &[u8]) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de).map_err(|e| DecodeError::Config(e).into())
	}

	/// Fills unset values from an auth-file JSON document.
	pub fn apply_auth_file(mut self, bytes: &[u8]) -> Result<Self> {
		self.merge_missing(Self::from_json(bytes)?);

		Ok(self)
	}

	/// Fills every unset value from `other`.
	pub fn merge_missing(&mut self, other: Self) {
		fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
			if slot.is_none() {
				*slot = value;
			}
		}

		fill(&mut self.host, other.host);
		fill(&mut self.v2_host, other.v2_host);
		fill(&mut self.mp_region_host, other.mp_region_host);
		fill(&mut self.protocol, other.protocol);
		fill(&mut self.region, other.region);
		fill(&mut self.mp_region, other.mp_region);
		fill(&mut self.timeout_secs, other.timeout_secs);
		fill(&mut self.headers, other.headers);
		fill(&mut self.agent, other.agent);
		fill(&mut self.tenant, other.tenant);
		fill(&mut self.api_generation, other.api_generation);
		fill(&mut self.skip_verify_certificate, other.skip_verify_certificate);
		fill(&mut self.logging, other.logging);
		fill(&mut self.wait, other.wait);
		fill(&mut self.conflict_retry, other.conflict_retry);
		fill(&mut self.token_expiry_minutes, other.token_expiry_minutes);
		fill(&mut self.token_margin_secs, other.token_margin_secs);
		fill(&mut self.scope_token_margins, other.scope_token_margins);
		self.roles.merge_missing(other.roles);
	}

	/// Builds a configuration from `CLOUDNGFWAWS_*` environment variables alone.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::default().apply_env()
	}

	/// Fills unset values from `CLOUDNGFWAWS_*` environment variables.
	pub fn apply_env(self) -> Result<Self, ConfigError> {
		self.apply_env_with(|name| std::env::var(name).ok())
	}

	/// Fills unset values from `lookup`, which receives full variable names.
	pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |suffix: &str| {
			let name = format!("{ENV_PREFIX}{suffix}");

			lookup(&name).filter(|value| !value.is_empty()).map(|value| (name, value))
		};
		let invalid = |(name, value): (String, String)| ConfigError::InvalidEnv { name, value };

		self.merge_missing(Self {
			host: var("HOST").map(|(_, value)| value),
			v2_host: var("V2_HOST").map(|(_, value)| value),
			mp_region_host: var("MP_REGION_HOST").map(|(_, value)| value),
			region: var("REGION").map(|(_, value)| value),
			mp_region: var("MP_REGION").map(|(_, value)| value),
			..Default::default()
		});

		if self.protocol.is_none()
			&& let Some((_, value)) = var("PROTOCOL")
		{
			self.protocol = Some(value.parse()?);
		}
		if self.timeout_secs.is_none()
			&& let Some(entry) = var("TIMEOUT")
		{
			self.timeout_secs = Some(entry.1.parse().map_err(|_| invalid(entry.clone()))?);
		}
		if self.headers.is_none()
			&& let Some(entry) = var("HEADERS")
		{
			self.headers = Some(serde_json::from_str(&entry.1).map_err(|_| invalid(entry.clone()))?);
		}
		if self.skip_verify_certificate.is_none()
			&& let Some(entry) = var("SKIP_VERIFY_CERTIFICATE")
		{
			self.skip_verify_certificate =
				Some(parse_bool(&entry.1).ok_or_else(|| invalid(entry.clone()))?);
		}
		if self.logging.is_none()
			&& let Some((_, value)) = var("LOGGING")
		{
			self.logging = Some(value.parse()?);
		}

		self.roles.merge_missing(RoleBindings {
			firewall: var("LFA_ARN").map(|(_, value)| value),
			rulestack: var("LRA_ARN").map(|(_, value)| value),
			global_rulestack: var("GRA_ARN").map(|(_, value)| value),
			account: var("ACCT_ADMIN_ARN").map(|(_, value)| value),
			shared: var("ARN").map(|(_, value)| value),
		});

		Ok(self)
	}

	/// Sets the regional API host.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());

		self
	}

	/// Sets the v2 API host.
	pub fn with_v2_host(mut self, host: impl Into<String>) -> Self {
		self.v2_host = Some(host.into());

		self
	}

	/// Sets the marketplace host.
	pub fn with_mp_region_host(mut self, host: impl Into<String>) -> Self {
		self.mp_region_host = Some(host.into());

		self
	}

	/// Sets the URL scheme.
	pub fn with_protocol(mut self, protocol: Protocol) -> Self {
		self.protocol = Some(protocol);

		self
	}

	/// Sets the marketplace region.
	pub fn with_mp_region(mut self, region: impl Into<String>) -> Self {
		self.mp_region = Some(region.into());

		self
	}

	/// Adds a custom header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.get_or_insert_with(BTreeMap::new).insert(name.into(), value.into());

		self
	}

	/// Binds a role to a permission scope.
	pub fn with_role(mut self, scope: PermissionScope, role: impl Into<String>) -> Self {
		self.roles = self.roles.with_role(scope, role);

		self
	}

	/// Sets the shared fallback role.
	pub fn with_shared_role(mut self, role: impl Into<String>) -> Self {
		self.roles = self.roles.with_shared(role);

		self
	}

	/// Pins the API generation instead of detecting it from the first token.
	pub fn with_api_generation(mut self, generation: ApiGeneration) -> Self {
		self.api_generation = Some(generation);

		self
	}

	/// Sets the logging categories.
	pub fn with_logging(mut self, logging: LogCategories) -> Self {
		self.logging = Some(logging);

		self
	}

	/// Sets the budget for waits on backend state.
	pub fn with_wait_budget(mut self, budget: WaitBudget) -> Self {
		self.wait = Some(budget);

		self
	}

	/// Sets the budget for update-token conflict retries.
	pub fn with_conflict_budget(mut self, budget: WaitBudget) -> Self {
		self.conflict_retry = Some(budget);

		self
	}

	/// Sets the token refresh margin for every scope without its own.
	pub fn with_token_margin_secs(mut self, secs: u64) -> Self {
		self.token_margin_secs = Some(secs);

		self
	}

	/// Sets the token refresh margin of one scope.
	pub fn with_scope_token_margin_secs(mut self, scope: PermissionScope, secs: u64) -> Self {
		self.scope_token_margins.get_or_insert_with(BTreeMap::new).insert(scope, secs);

		self
	}

	/// Regional API host.
	pub fn host(&self) -> &str {
		self.host.as_deref().unwrap_or(DEFAULT_HOST)
	}

	/// Host serving the v2 API.
	pub fn v2_host(&self) -> &str {
		self.v2_host.as_deref().unwrap_or(DEFAULT_HOST)
	}

	/// Host serving account-scoped calls.
	pub fn mp_region_host(&self) -> &str {
		self.mp_region_host.as_deref().unwrap_or(DEFAULT_HOST)
	}

	/// URL scheme.
	pub fn protocol(&self) -> Protocol {
		self.protocol.unwrap_or_default()
	}

	/// Configured region.
	pub fn region(&self) -> Result<&str, ConfigError> {
		self.region.as_deref().filter(|region| !region.is_empty()).ok_or(ConfigError::MissingRegion)
	}

	/// Marketplace region.
	pub fn mp_region(&self) -> &str {
		self.mp_region.as_deref().unwrap_or(DEFAULT_MP_REGION)
	}

	/// Per-request timeout in seconds.
	pub fn timeout_secs(&self) -> u64 {
		self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
	}

	/// `User-Agent` header value.
	pub fn agent(&self) -> &str {
		self.agent.as_deref().unwrap_or(concat!("cloudngfw-rs/", env!("CARGO_PKG_VERSION")))
	}

	/// Whether invalid TLS certificates are accepted.
	pub fn skip_verify_certificate(&self) -> bool {
		self.skip_verify_certificate.unwrap_or(false)
	}

	/// Enabled logging categories.
	pub fn logging(&self) -> LogCategories {
		self.logging.unwrap_or_default()
	}

	/// Budget for waits on backend state.
	pub fn wait_budget(&self) -> WaitBudget {
		self.wait.unwrap_or(WaitBudget::STATUS)
	}

	/// Budget for update-token conflict retries.
	pub fn conflict_budget(&self) -> WaitBudget {
		self.conflict_retry.unwrap_or(WaitBudget::CONFLICT)
	}

	/// Token lifetime requested from the issuance endpoint.
	pub fn token_expiry_minutes(&self) -> u32 {
		self.token_expiry_minutes.unwrap_or(DEFAULT_TOKEN_EXPIRY_MINUTES)
	}

	/// Refresh margin of `scope`, clamped to the supported range.
	pub fn token_margin(&self, scope: PermissionScope) -> Duration {
		let secs = self
			.scope_token_margins
			.as_ref()
			.and_then(|margins| margins.get(&scope).copied())
			.or(self.token_margin_secs)
			.unwrap_or(MIN_TOKEN_MARGIN_SECS)
			.clamp(MIN_TOKEN_MARGIN_SECS, MAX_TOKEN_MARGIN_SECS);

		Duration::seconds(secs as i64)
	}

	/// Custom headers as a header map.
	pub fn custom_headers(&self) -> Result<HeaderMap, ConfigError> {
		let mut map = HeaderMap::new();

		for (name, value) in self.headers.iter().flatten() {
			let invalid = || ConfigError::InvalidHeader { name: name.clone() };
			let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
			let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

			map.insert(header_name, header_value);
		}

		Ok(map)
	}

	/// Checks the configuration for values the client cannot work with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.region()?;

		if self.timeout_secs() == 0 {
			return Err(ConfigError::InvalidTimeout);
		}

		self.wait_budget().validate("wait")?;
		self.conflict_budget().validate("conflict retry")?;
		self.custom_headers()?;

		Ok(())
	}
}

fn parse_bool(value: &str) -> Option<bool> {
	match value {
		"1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
		"0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
		_ => None,
	}
}
