//! Role bindings per permission scope.

// self
use crate::{_prelude::*, auth::PermissionScope, error::ConfigError};

/// Role identifiers assumed before requesting each scope's token.
///
/// Firewall and rule-stack scopes fall back to the shared role when no scope-specific role is
/// configured; the account scope never does.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindings {
	/// Role for the firewall scope.
	#[serde(rename = "lfa-arn", default, skip_serializing_if = "Option::is_none")]
	pub firewall: Option<String>,
	/// Role for the local rule-stack scope.
	#[serde(rename = "lra-arn", default, skip_serializing_if = "Option::is_none")]
	pub rulestack: Option<String>,
	/// Role for the global rule-stack scope.
	#[serde(rename = "gra-arn", default, skip_serializing_if = "Option::is_none")]
	pub global_rulestack: Option<String>,
	/// Role for the account scope.
	#[serde(rename = "account-admin-arn", default, skip_serializing_if = "Option::is_none")]
	pub account: Option<String>,
	/// Shared fallback role.
	#[serde(rename = "arn", default, skip_serializing_if = "Option::is_none")]
	pub shared: Option<String>,
}
impl RoleBindings {
	/// Binds a role to a scope. Binding [`PermissionScope::None`] sets the shared role.
	pub fn with_role(mut self, scope: PermissionScope, role: impl Into<String>) -> Self {
		*self.slot_mut(scope) = Some(role.into());

		self
	}

	/// Sets the shared fallback role.
	pub fn with_shared(mut self, role: impl Into<String>) -> Self {
		self.shared = Some(role.into());

		self
	}

	/// Resolves the role for `scope`.
	pub fn resolve(&self, scope: PermissionScope) -> Result<&str, ConfigError> {
		let specific = match scope {
			PermissionScope::None => return Err(ConfigError::TokenlessScope { scope }),
			PermissionScope::Firewall => self.firewall.as_deref(),
			PermissionScope::Rulestack => self.rulestack.as_deref(),
			PermissionScope::GlobalRulestack => self.global_rulestack.as_deref(),
			PermissionScope::Account =>
				return non_empty(self.account.as_deref())
					.ok_or(ConfigError::MissingRoleBinding { scope }),
		};

		non_empty(specific)
			.or_else(|| non_empty(self.shared.as_deref()))
			.ok_or(ConfigError::MissingRoleBinding { scope })
	}

	/// Issuing scopes with a usable role.
	pub fn configured_scopes(&self) -> Vec<PermissionScope> {
		PermissionScope::ISSUING.into_iter().filter(|scope| self.resolve(*scope).is_ok()).collect()
	}

	/// Fills unset bindings from `other`.
	pub fn merge_missing(&mut self, other: Self) {
		self.firewall = self.firewall.take().or(other.firewall);
		self.rulestack = self.rulestack.take().or(other.rulestack);
		self.global_rulestack = self.global_rulestack.take().or(other.global_rulestack);
		self.account = self.account.take().or(other.account);
		self.shared = self.shared.take().or(other.shared);
	}

	fn slot_mut(&mut self, scope: PermissionScope) -> &mut Option<String> {
		match scope {
			PermissionScope::None => &mut self.shared,
			PermissionScope::Firewall => &mut self.firewall,
			PermissionScope::Rulestack => &mut self.rulestack,
			PermissionScope::GlobalRulestack => &mut self.global_rulestack,
			PermissionScope::Account => &mut self.account,
		}
	}
}

fn non_empty(role: Option<&str>) -> Option<&str> {
	role.filter(|role| !role.is_empty())
}
