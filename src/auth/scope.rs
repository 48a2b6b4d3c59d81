//! Permission scopes and the token-issuance routes bound to them.

// self
use crate::{_prelude::*, error::ConfigError};

/// Permission scope attached to every management API call.
///
/// Each issuing scope maps to its own cached bearer token and token-issuance path.
/// [`PermissionScope::None`] marks calls that carry no bearer token at all (token issuance
/// itself, which is signed instead).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
	/// No bearer token is attached.
	None,
	/// Firewall administration.
	Firewall,
	/// Local rule-stack administration.
	Rulestack,
	/// Global rule-stack administration.
	GlobalRulestack,
	/// Account administration, routed through the marketplace region.
	Account,
}
impl PermissionScope {
	/// Scopes that obtain bearer tokens.
	pub const ISSUING: [Self; 4] =
		[Self::Firewall, Self::Rulestack, Self::GlobalRulestack, Self::Account];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Firewall => "firewall",
			Self::Rulestack => "rulestack",
			Self::GlobalRulestack => "global_rulestack",
			Self::Account => "account",
		}
	}

	/// Final segment of the token-issuance path, or `None` for tokenless calls.
	pub const fn token_path_suffix(self) -> Option<&'static str> {
		match self {
			Self::None => None,
			Self::Firewall => Some("cloudfirewalladmin"),
			Self::Rulestack => Some("cloudrulestackadmin"),
			Self::GlobalRulestack => Some("cloudglobalrulestackadmin"),
			Self::Account => Some("cloudaccountadmin"),
		}
	}

	/// Returns `true` when calls under this scope carry a bearer token.
	pub const fn requires_token(self) -> bool {
		!matches!(self, Self::None)
	}

	/// Returns `true` when calls under this scope go to the marketplace endpoint.
	pub const fn uses_marketplace(self) -> bool {
		matches!(self, Self::Account)
	}

	/// Permission required to manage a rule stack of the given scope.
	pub const fn for_rulestack(scope: RulestackScope) -> Self {
		match scope {
			RulestackScope::Local => Self::Rulestack,
			RulestackScope::Global => Self::GlobalRulestack,
		}
	}
}
impl Display for PermissionScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Rule-stack scope as reported by the API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulestackScope {
	/// Regional rule stack; an empty scope string also means local.
	#[default]
	Local,
	/// Global rule stack.
	Global,
}
impl RulestackScope {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Local => "Local",
			Self::Global => "Global",
		}
	}
}
impl FromStr for RulestackScope {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" | "Local" => Ok(Self::Local),
			"Global" => Ok(Self::Global),
			other => Err(ConfigError::UnknownRulestackScope { scope: other.to_owned() }),
		}
	}
}
impl Display for RulestackScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
