//! Rule-stack commits.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	auth::{PermissionScope, RulestackScope},
	client::Client,
	context::CallContext,
	dispatch::{ApiPath, RequestEnvelope},
	response::{Envelope, GenericResponse},
	wait::{self, CommitStatus, Probe},
};

/// Commit and validation state of a rule stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulestackCommit {
	/// Rule stack name.
	#[serde(rename = "RuleStackName", default)]
	pub name: String,
	/// Commit state.
	#[serde(rename = "CommitStatus", default)]
	pub commit_status: CommitStatus,
	/// Validation state, as reported.
	#[serde(rename = "ValidateStatus", default)]
	pub validate_status: String,
	/// Commit messages.
	#[serde(rename = "CommitMessages", default)]
	pub commit_messages: Vec<String>,
	/// Validation messages.
	#[serde(rename = "ValidateMessages", default)]
	pub validate_messages: Vec<String>,
}
impl RulestackCommit {
	/// Summarizes the commit state and its messages, e.g. `Commit(Failed): a | b`.
	pub fn summary(&self) -> String {
		let mut out = format!("Commit({}):", self.commit_status);

		for (idx, message) in self.commit_messages.iter().enumerate() {
			if idx > 0 {
				out.push_str(" |");
			}

			out.push(' ');
			out.push_str(message);
		}

		out
	}

	/// Classifies this observation for [`Client::commit_rulestack_and_wait`].
	///
	/// Only `Success` finishes the wait and only `Failed` aborts it; every other state,
	/// including states this client does not know, is still in progress.
	pub fn probe(&self) -> Probe {
		match self.commit_status {
			CommitStatus::Success => Probe::Done,
			CommitStatus::Failed => Probe::Fail(Error::OperationFailed { reason: self.summary() }),
			_ => Probe::Retry(Error::Pending { reason: self.summary() }),
		}
	}
}

fn commit_path(name: &str) -> ApiPath {
	ApiPath::v1(["v1", "config", "rulestacks", name, "commit"])
}

impl Client {
	/// Starts a commit of the named rule stack.
	pub async fn commit_rulestack(
		&self,
		ctx: &CallContext,
		name: &str,
		scope: RulestackScope,
	) -> Result<()> {
		let envelope = RequestEnvelope::new(
			PermissionScope::for_rulestack(scope),
			Method::POST,
			commit_path(name),
		);

		self.communicate::<GenericResponse>(ctx, &envelope).await?;

		Ok(())
	}

	/// Reads the commit state of the named rule stack.
	pub async fn rulestack_commit_status(
		&self,
		ctx: &CallContext,
		name: &str,
		scope: RulestackScope,
	) -> Result<RulestackCommit> {
		let envelope = RequestEnvelope::new(
			PermissionScope::for_rulestack(scope),
			Method::GET,
			commit_path(name),
		);
		let reply = self.communicate::<Envelope<RulestackCommit>>(ctx, &envelope).await?;

		reply.value.into_payload("rulestacks/commit")
	}

	/// Commits the named rule stack and polls until the commit settles.
	pub async fn commit_rulestack_and_wait(
		&self,
		ctx: &CallContext,
		name: &str,
		scope: RulestackScope,
	) -> Result<RulestackCommit> {
		self.commit_rulestack(ctx, name, scope).await?;

		let last = Mutex::new(RulestackCommit::default());
		let observed = &last;

		wait::wait_for(ctx, self.config().wait_budget(), || async move {
			match self.rulestack_commit_status(ctx, name, scope).await {
				Ok(commit) => {
					let probe = commit.probe();

					*observed.lock() = commit;

					probe
				},
				Err(e) => Probe::Fail(e),
			}
		})
		.await?;

		Ok(last.into_inner())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn commit(status: CommitStatus, messages: &[&str]) -> RulestackCommit {
		RulestackCommit {
			commit_status: status,
			commit_messages: messages.iter().map(|m| (*m).to_owned()).collect(),
			..Default::default()
		}
	}

	#[test]
	fn summary_joins_messages() {
		assert_eq!(commit(CommitStatus::Failed, &["a", "b"]).summary(), "Commit(Failed): a | b");
		assert_eq!(commit(CommitStatus::Success, &[]).summary(), "Commit(Success):");
	}

	#[test]
	fn probe_follows_commit_status() {
		assert!(matches!(commit(CommitStatus::Success, &[]).probe(), Probe::Done));
		assert!(matches!(commit(CommitStatus::Pending, &[]).probe(), Probe::Retry(_)));
		assert!(matches!(commit(CommitStatus::Committing, &[]).probe(), Probe::Retry(_)));
		assert!(matches!(
			commit(CommitStatus::Failed, &["bad rule"]).probe(),
			Probe::Fail(Error::OperationFailed { ref reason }) if reason == "Commit(Failed): bad rule"
		));
	}

	#[test]
	fn commit_payload_decodes() {
		let commit: RulestackCommit = serde_json::from_str(
			r#"{
				"RuleStackName": "rs",
				"CommitStatus": "Success",
				"ValidateStatus": "Success",
				"CommitMessages": [],
				"ValidateMessages": ["ok"]
			}"#,
		)
		.expect("Commit payload should decode.");

		assert_eq!(commit.name, "rs");
		assert_eq!(commit.commit_status, CommitStatus::Success);
		assert_eq!(commit.validate_messages, vec!["ok".to_owned()]);
	}
}
