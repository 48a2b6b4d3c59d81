//! Firewall operations and the orchestrations that wait for them to settle.

// crates.io
use http::Method;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::PermissionScope,
	client::Client,
	context::CallContext,
	dispatch::{ApiPath, RequestEnvelope},
	response::{Envelope, GenericResponse},
	wait::{self, CommitInfo, CommitLevel, CommitStatus, FirewallStatus, Probe},
};

/// Identifies a firewall: by name on the v1 API, by id on the v2 API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRef {
	/// Firewall name.
	#[serde(rename = "FirewallName", default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Firewall id.
	#[serde(rename = "FirewallId", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Owning account.
	#[serde(rename = "AccountId", default, skip_serializing_if = "Option::is_none")]
	pub account_id: Option<String>,
}
impl FirewallRef {
	/// References a firewall by name.
	pub fn by_name(name: impl Into<String>) -> Self {
		Self { name: Some(name.into()), ..Default::default() }
	}

	/// References a firewall by id.
	pub fn by_id(id: impl Into<String>) -> Self {
		Self { id: Some(id.into()), ..Default::default() }
	}

	/// Sets the owning account.
	pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
		self.account_id = Some(account_id.into());

		self
	}

	fn path(&self, tail: &[&str]) -> ApiPath {
		let build = |generation: &str, key: &String| {
			[generation, "config", "ngfirewalls", key.as_str()]
				.into_iter()
				.chain(tail.iter().copied())
				.map(str::to_owned)
				.collect::<Vec<_>>()
		};

		ApiPath {
			v1: self.name.as_ref().map(|name| build("v1", name)),
			v2: self.id.as_ref().map(|id| build("v2", id)),
		}
	}

	fn body(&self) -> AccountBody<'_> {
		AccountBody { account_id: self.account_id.as_deref() }
	}
}

#[derive(Serialize)]
struct AccountBody<'a> {
	#[serde(rename = "AccountId", skip_serializing_if = "Option::is_none")]
	account_id: Option<&'a str>,
}

/// Firewall resource.
///
/// The fields the client acts on are typed; everything else round-trips through `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Firewall {
	/// Firewall name.
	#[serde(rename = "FirewallName", default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Firewall id.
	#[serde(rename = "FirewallId", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Owning account.
	#[serde(rename = "AccountId", default, skip_serializing_if = "Option::is_none")]
	pub account_id: Option<String>,
	/// Associated local rule stack.
	#[serde(rename = "RuleStackName", default, skip_serializing_if = "Option::is_none")]
	pub rulestack: Option<String>,
	/// Associated global rule stack.
	#[serde(rename = "GlobalRuleStackName", default, skip_serializing_if = "Option::is_none")]
	pub global_rulestack: Option<String>,
	/// Optimistic-concurrency token for configuration writes.
	#[serde(rename = "UpdateToken", default, skip_serializing_if = "Option::is_none")]
	pub update_token: Option<String>,
	/// Token that changes whenever a write triggers a redeployment.
	#[serde(rename = "DeploymentUpdateToken", default, skip_serializing_if = "Option::is_none")]
	pub deployment_update_token: Option<String>,
	/// Remaining attributes.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl Firewall {
	/// Reference to this firewall.
	pub fn reference(&self) -> FirewallRef {
		FirewallRef {
			name: self.name.clone(),
			id: self.id.clone(),
			account_id: self.account_id.clone(),
		}
	}
}

/// Provisioning and commit state of a firewall.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallState {
	/// Provisioning state.
	#[serde(rename = "FirewallStatus", default)]
	pub firewall_status: FirewallStatus,
	/// Reason for a failed provisioning step.
	#[serde(rename = "FailureReason", default, skip_serializing_if = "Option::is_none")]
	pub failure_reason: Option<String>,
	/// Commit state of the local rule stack.
	#[serde(rename = "RuleStackStatus", default)]
	pub rulestack_status: CommitStatus,
	/// Last local rule-stack commit.
	#[serde(rename = "RuleStackCommitInfo", default)]
	pub rulestack_commit: CommitInfo,
	/// Commit state on the firewall devices.
	#[serde(rename = "DeviceRuleStackCommitStatus", default)]
	pub device_commit_status: CommitStatus,
	/// Last device rule-stack commit.
	#[serde(rename = "DeviceRuleStackCommitInfo", default)]
	pub device_commit: CommitInfo,
	/// Remaining attributes.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Payload of a firewall read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallDescription {
	/// Firewall attributes.
	#[serde(rename = "Firewall", default)]
	pub firewall: Firewall,
	/// Firewall state.
	#[serde(rename = "Status", default)]
	pub status: FirewallState,
}

/// Result of associating or disassociating a rule stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulestackAssociation {
	/// Rule stack name.
	#[serde(rename = "RuleStackName", default)]
	pub rulestack: String,
	/// Firewall name.
	#[serde(rename = "FirewallName", default)]
	pub firewall: String,
	/// Owning account.
	#[serde(rename = "AccountId", default)]
	pub account_id: String,
	/// Update token after the change.
	#[serde(rename = "UpdateToken", default, skip_serializing_if = "Option::is_none")]
	pub update_token: Option<String>,
}

#[derive(Serialize)]
struct AssociateBody<'a> {
	#[serde(rename = "RuleStackName", skip_serializing_if = "Option::is_none")]
	rulestack: Option<&'a str>,
	#[serde(rename = "AccountId", skip_serializing_if = "Option::is_none")]
	account_id: Option<&'a str>,
	#[serde(rename = "UpdateToken", skip_serializing_if = "Option::is_none")]
	update_token: Option<&'a str>,
}

/// Which waits follow a modify.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifyWaits {
	/// Wait for `UPDATE_COMPLETE`/`UPDATE_FAIL` when the deployment token changed.
	pub deployment: bool,
	/// Wait for a device rule-stack commit newer than the modify, for endpoint or feature
	/// changes.
	pub device_commit: bool,
}

impl Client {
	/// Reads a firewall and its state.
	pub async fn read_firewall(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
	) -> Result<FirewallDescription> {
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::GET, firewall.path(&[]))
				.with_json(&firewall.body())?;
		let reply = self.communicate::<Envelope<FirewallDescription>>(ctx, &envelope).await?;

		reply.value.into_payload("ngfirewalls")
	}

	/// Creates a firewall and returns the backend's view of it.
	pub async fn create_firewall(&self, ctx: &CallContext, firewall: &Firewall) -> Result<Firewall> {
		let path =
			ApiPath::v1(["v1", "config", "ngfirewalls"]).with_v2(["v2", "config", "ngfirewalls"]);
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::POST, path).with_json(firewall)?;
		let reply = self.communicate::<Envelope<Firewall>>(ctx, &envelope).await?;

		reply.value.into_payload("ngfirewalls")
	}

	/// Patches a firewall by id; only available on the v2 API.
	pub async fn modify_firewall(&self, ctx: &CallContext, firewall: &Firewall) -> Result<Firewall> {
		let path = FirewallRef { name: None, ..firewall.reference() }.path(&[]);
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::PATCH, path).with_json(firewall)?;
		let reply = self.communicate::<Envelope<Firewall>>(ctx, &envelope).await?;

		reply.value.into_payload("ngfirewalls")
	}

	/// Deletes a firewall.
	pub async fn delete_firewall(&self, ctx: &CallContext, firewall: &FirewallRef) -> Result<()> {
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::DELETE, firewall.path(&[]))
				.with_json(&firewall.body())?;

		self.communicate::<GenericResponse>(ctx, &envelope).await?;

		Ok(())
	}

	/// Associates a local rule stack with a firewall.
	pub async fn associate_rulestack(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
		rulestack: &str,
		update_token: Option<&str>,
	) -> Result<RulestackAssociation> {
		let body = AssociateBody {
			rulestack: Some(rulestack),
			account_id: firewall.account_id.as_deref(),
			update_token,
		};
		let path = firewall.path(&["rulestack"]);
		let envelope =
			RequestEnvelope::new(PermissionScope::Firewall, Method::POST, path).with_json(&body)?;
		let reply = self.communicate::<Envelope<RulestackAssociation>>(ctx, &envelope).await?;

		Ok(reply.value.response.unwrap_or_default())
	}

	/// Removes the local rule stack from a firewall; only available on the v2 API.
	pub async fn disassociate_rulestack(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
		update_token: Option<&str>,
	) -> Result<RulestackAssociation> {
		let body = AssociateBody {
			rulestack: None,
			account_id: firewall.account_id.as_deref(),
			update_token,
		};
		let path = FirewallRef { name: None, ..firewall.clone() }.path(&["rulestack"]);
		let envelope = RequestEnvelope::new(PermissionScope::Firewall, Method::DELETE, path)
			.with_json(&body)?;
		let reply = self.communicate::<Envelope<RulestackAssociation>>(ctx, &envelope).await?;

		Ok(reply.value.response.unwrap_or_default())
	}

	/// Creates a firewall and waits until provisioning finishes.
	///
	/// The wait ends on `CREATE_COMPLETE` or `CREATE_FAIL`; a failed creation is reported as
	/// [`Error::OperationFailed`].
	pub async fn create_firewall_and_wait(
		&self,
		ctx: &CallContext,
		firewall: &Firewall,
	) -> Result<Firewall> {
		let created = self.create_firewall(ctx, firewall).await?;
		let mut reference = created.reference();

		reference.name = reference.name.or_else(|| firewall.name.clone());
		reference.account_id = reference.account_id.or_else(|| firewall.account_id.clone());

		let status =
			self.wait_for_firewall_status(ctx, &reference, &FirewallStatus::CREATE_TERMINAL).await?;

		settled(status, FirewallStatus::CreateFail)?;

		Ok(created)
	}

	/// Deletes a firewall and waits until the deletion finishes.
	pub async fn delete_firewall_and_wait(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
	) -> Result<()> {
		self.delete_firewall(ctx, firewall).await?;

		let status =
			self.wait_for_firewall_status(ctx, firewall, &FirewallStatus::DELETE_TERMINAL).await?;

		settled(status, FirewallStatus::DeleteFail)
	}

	/// Associates a rule stack and waits for a local commit newer than the association.
	pub async fn associate_rulestack_and_wait(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
		rulestack: &str,
		update_token: Option<&str>,
	) -> Result<RulestackAssociation> {
		let started_at = operation_start();
		let association = self.associate_rulestack(ctx, firewall, rulestack, update_token).await?;

		self.wait_for_commit(ctx, firewall, CommitLevel::Local, started_at).await?;

		Ok(association)
	}

	/// Modifies a firewall, absorbing update-token conflicts, then runs the requested waits.
	///
	/// A change of `RuleStackName` is applied first: a new rule stack is associated and its
	/// local commit awaited, an empty one disassociates the current rule stack. Every attempt
	/// re-reads the firewall and submits its current update tokens, so a write that lost a race
	/// is retried against fresh state within the conflict budget.
	pub async fn modify_firewall_and_wait(
		&self,
		ctx: &CallContext,
		firewall: &Firewall,
		waits: ModifyWaits,
	) -> Result<Firewall> {
		let started_at = operation_start();
		let reference = firewall.reference();
		let current = self.read_firewall(ctx, &reference).await?;
		let before = if self.sync_rulestack(ctx, firewall, &current.firewall).await? {
			self.read_firewall(ctx, &reference).await?
		} else {
			current
		};
		let modified = wait::retry_on_conflict(ctx, self.config().conflict_budget(), || {
			self.read_and_modify_firewall(ctx, firewall)
		})
		.await?;

		log_modified(self, &modified);

		if waits.deployment
			&& before.firewall.deployment_update_token != modified.deployment_update_token
		{
			let status = self
				.wait_for_firewall_status(ctx, &reference, &FirewallStatus::UPDATE_TERMINAL)
				.await?;

			settled(status, FirewallStatus::UpdateFail)?;
		}
		if waits.device_commit {
			self.wait_for_commit(ctx, &reference, CommitLevel::Device, started_at).await?;
		}

		Ok(modified)
	}

	/// Polls a firewall until its status is one of `expected` and returns that status.
	pub async fn wait_for_firewall_status(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
		expected: &[FirewallStatus],
	) -> Result<FirewallStatus> {
		let last = Mutex::new(FirewallStatus::Unknown);
		let observed = &last;

		wait::wait_for(ctx, self.config().wait_budget(), || async move {
			let read = self.read_firewall(ctx, firewall).await.map(|d| d.status.firewall_status);

			if let Ok(status) = read {
				*observed.lock() = status;
			}

			wait::firewall_status_probe(read, expected)
		})
		.await?;

		Ok(*last.lock())
	}

	/// Polls a firewall until the rule-stack commit at `level` completes after `started_at`.
	pub async fn wait_for_commit(
		&self,
		ctx: &CallContext,
		firewall: &FirewallRef,
		level: CommitLevel,
		started_at: OffsetDateTime,
	) -> Result<()> {
		wait::wait_for(ctx, self.config().wait_budget(), || async move {
			let state = match self.read_firewall(ctx, firewall).await {
				Ok(description) => description.status,
				Err(e) => return Probe::Fail(e),
			};
			let (status, info) = match level {
				CommitLevel::Local => (state.rulestack_status, &state.rulestack_commit),
				CommitLevel::Device => (state.device_commit_status, &state.device_commit),
			};

			wait::commit_probe(level, status, info, started_at)
		})
		.await
	}

	/// Brings the associated rule stack in line with `firewall`, returning whether it changed.
	async fn sync_rulestack(
		&self,
		ctx: &CallContext,
		firewall: &Firewall,
		current: &Firewall,
	) -> Result<bool> {
		let reference = &firewall.reference();
		let wanted = firewall.rulestack.as_deref().filter(|name| !name.is_empty());
		let associated = current.rulestack.as_deref().filter(|name| !name.is_empty());
		let budget = self.config().conflict_budget();

		match (wanted, associated) {
			(Some(wanted), associated) if associated != Some(wanted) => {
				wait::retry_on_conflict(ctx, budget, || async move {
					let token = self.read_firewall(ctx, reference).await?.firewall.update_token;

					self.associate_rulestack_and_wait(ctx, reference, wanted, token.as_deref()).await
				})
				.await?;
			},
			(None, Some(_)) => {
				wait::retry_on_conflict(ctx, budget, || async move {
					let token = self.read_firewall(ctx, reference).await?.firewall.update_token;

					self.disassociate_rulestack(ctx, reference, token.as_deref()).await
				})
				.await?;
			},
			_ => return Ok(false),
		}

		Ok(true)
	}

	async fn read_and_modify_firewall(
		&self,
		ctx: &CallContext,
		firewall: &Firewall,
	) -> Result<Firewall> {
		let current = self.read_firewall(ctx, &firewall.reference()).await?;
		let mut update = firewall.clone();

		update.update_token = current.firewall.update_token;
		update.deployment_update_token = current.firewall.deployment_update_token;

		self.modify_firewall(ctx, &update).await
	}
}

fn log_modified(client: &Client, modified: &Firewall) {
	crate::obs::log_action(
		client.config().logging(),
		&Method::PATCH,
		format_args!(
			"firewall {} updated with deployment update token {}",
			modified.id.as_deref().unwrap_or_default(),
			modified.deployment_update_token.as_deref().unwrap_or_default()
		),
	);
}

fn settled(status: FirewallStatus, failure: FirewallStatus) -> Result<()> {
	if status == failure {
		Err(Error::OperationFailed { reason: format!("firewall reached {status}") })
	} else {
		Ok(())
	}
}

/// Start of an operation, truncated to whole seconds like the backend's commit timestamps.
pub(crate) fn operation_start() -> OffsetDateTime {
	let now = OffsetDateTime::now_utc();

	now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn references_build_generation_paths() {
		let both =
			FirewallRef { name: Some("fw".into()), id: Some("id-9".into()), account_id: None };
		let path = both.path(&["rulestack"]);
		let segments = |v: &[&str]| Some(v.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>());

		assert_eq!(path.v1, segments(&["v1", "config", "ngfirewalls", "fw", "rulestack"]));
		assert_eq!(path.v2, segments(&["v2", "config", "ngfirewalls", "id-9", "rulestack"]));
		assert_eq!(FirewallRef::by_id("id-9").path(&[]).v1, None);
	}

	#[test]
	fn description_decodes_typed_and_extra_fields() {
		let description: FirewallDescription = serde_json::from_str(
			r#"{
				"Firewall": {
					"FirewallName": "fw",
					"FirewallId": "id-1",
					"UpdateToken": "u1",
					"DeploymentUpdateToken": "d1",
					"VpcId": "vpc-1"
				},
				"Status": {
					"FirewallStatus": "CREATING",
					"RuleStackStatus": "Success",
					"RuleStackCommitInfo": {
						"CommitMessages": ["ok"],
						"CommitTS": "2024-05-01T10:20:30 UTC"
					},
					"DeviceRuleStackCommitStatus": "Committing"
				}
			}"#,
		)
		.expect("Firewall description should decode.");

		assert_eq!(description.firewall.deployment_update_token.as_deref(), Some("d1"));
		assert_eq!(description.firewall.extra.get("VpcId"), Some(&Value::from("vpc-1")));
		assert_eq!(description.status.firewall_status, FirewallStatus::Creating);
		assert_eq!(description.status.rulestack_status, CommitStatus::Success);
		assert_eq!(description.status.rulestack_commit.messages, vec!["ok".to_owned()]);
		assert_eq!(description.status.device_commit_status, CommitStatus::Committing);
		assert_eq!(description.status.device_commit, CommitInfo::default());
	}

	#[test]
	fn firewall_serializes_without_unset_fields() {
		let firewall = Firewall { name: Some("fw".into()), ..Default::default() };

		assert_eq!(
			serde_json::to_string(&firewall).expect("Firewall should serialize."),
			r#"{"FirewallName":"fw"}"#
		);
	}

	#[test]
	fn failed_terminal_state_is_an_error() {
		assert!(settled(FirewallStatus::CreateComplete, FirewallStatus::CreateFail).is_ok());
		assert!(matches!(
			settled(FirewallStatus::CreateFail, FirewallStatus::CreateFail),
			Err(Error::OperationFailed { .. })
		));
	}

	#[test]
	fn operation_start_has_whole_seconds() {
		assert_eq!(operation_start().nanosecond(), 0);
	}
}
