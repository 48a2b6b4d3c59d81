//! Pure probes that classify one observation of a long-running operation.

// self
use super::{CommitStatus, FirewallStatus, Probe, parse_commit_timestamp};
use crate::_prelude::*;

/// Commit details reported alongside a rule-stack commit status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
	/// Messages attached to the last commit.
	#[serde(rename = "CommitMessages", default)]
	pub messages: Vec<String>,
	/// Completion time of the last commit, as reported by the backend.
	#[serde(rename = "CommitTS", default, skip_serializing_if = "Option::is_none")]
	pub committed_at: Option<String>,
}

/// Which rule-stack commit a probe observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitLevel {
	/// Commit of the rule stack associated with the firewall.
	Local,
	/// Commit pushed to the firewall devices.
	Device,
}
impl CommitLevel {
	fn pending_reason(self) -> &'static str {
		match self {
			Self::Local => "LRS commit is not yet completed, retrying...",
			Self::Device => "DRS commit is not yet completed, retrying",
		}
	}
}

/// Classifies a firewall read against the states that end the wait.
///
/// A failed read ends the wait; any state outside `expected`, including states this client does
/// not know, keeps it going.
pub fn firewall_status_probe(read: Result<FirewallStatus>, expected: &[FirewallStatus]) -> Probe {
	let status = match read {
		Ok(status) => status,
		Err(e) => return Probe::Fail(e),
	};

	if expected.contains(&status) {
		return Probe::Done;
	}

	let expected = expected.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");

	Probe::Retry(Error::Pending {
		reason: format!(
			"firewall status did not match expected status, expected: [{expected}], got: {status}"
		),
	})
}

/// Classifies a commit observation.
///
/// The commit is done only when it reports success with a commit time strictly after
/// `started_at`; an older time belongs to a previous commit. Both instants are compared in
/// whole seconds.
pub fn commit_probe(
	level: CommitLevel,
	status: CommitStatus,
	info: &CommitInfo,
	started_at: OffsetDateTime,
) -> Probe {
	if status == CommitStatus::Failed {
		return Probe::Fail(Error::OperationFailed {
			reason: format!("commit failed, [{}]", info.messages.join(" ")),
		});
	}

	let pending = || Probe::Retry(Error::Pending { reason: level.pending_reason().to_owned() });

	if status != CommitStatus::Success {
		return pending();
	}

	let Some(raw) = info.committed_at.as_deref().filter(|raw| !raw.trim().is_empty()) else {
		return pending();
	};

	match parse_commit_timestamp(raw) {
		Ok(committed_at) if committed_at.unix_timestamp() > started_at.unix_timestamp() =>
			Probe::Done,
		Ok(_) => pending(),
		Err(e) => Probe::Fail(e.into()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const STARTED: OffsetDateTime = datetime!(2024-05-01 10:00:00 UTC);

	fn info(ts: Option<&str>) -> CommitInfo {
		CommitInfo { messages: Vec::new(), committed_at: ts.map(str::to_owned) }
	}

	#[test]
	fn firewall_probe_matches_expected_states() {
		assert!(matches!(
			firewall_status_probe(Ok(FirewallStatus::CreateComplete), &FirewallStatus::CREATE_TERMINAL),
			Probe::Done
		));

		let Probe::Retry(e) =
			firewall_status_probe(Ok(FirewallStatus::Creating), &FirewallStatus::CREATE_TERMINAL)
		else {
			panic!("In-progress status should be retried.");
		};

		assert_eq!(
			e.to_string(),
			"firewall status did not match expected status, \
			 expected: [CREATE_COMPLETE CREATE_FAIL], got: CREATING"
		);
		assert!(matches!(
			firewall_status_probe(Ok(FirewallStatus::Unknown), &FirewallStatus::DELETE_TERMINAL),
			Probe::Retry(_)
		));
	}

	#[test]
	fn firewall_probe_fails_on_read_error() {
		let probe = firewall_status_probe(
			Err(Error::Api(crate::response::ResponseStatus::new(500, "boom"))),
			&FirewallStatus::UPDATE_TERMINAL,
		);

		assert!(matches!(probe, Probe::Fail(Error::Api(_))));
	}

	#[test]
	fn stale_commit_timestamp_is_retried() {
		let probe = commit_probe(
			CommitLevel::Local,
			CommitStatus::Success,
			&info(Some("2024-05-01T09:59:59 UTC")),
			STARTED,
		);

		assert!(matches!(
			probe,
			Probe::Retry(ref e) if e.to_string() == "LRS commit is not yet completed, retrying..."
		));
		assert!(matches!(
			commit_probe(
				CommitLevel::Device,
				CommitStatus::Success,
				&info(Some("2024-05-01T10:00:00 UTC")),
				STARTED,
			),
			Probe::Retry(_)
		));
	}

	#[test]
	fn fresh_successful_commit_is_done() {
		assert!(matches!(
			commit_probe(
				CommitLevel::Device,
				CommitStatus::Success,
				&info(Some("2024-05-01T10:00:01 UTC")),
				STARTED,
			),
			Probe::Done
		));
	}

	#[test]
	fn commit_within_the_start_second_is_not_newer() {
		let started = datetime!(2024-05-01 10:00:00.7 UTC);

		assert!(matches!(
			commit_probe(
				CommitLevel::Local,
				CommitStatus::Success,
				&info(Some("2024-05-01T10:00:00.5 UTC")),
				started,
			),
			Probe::Retry(_)
		));
		assert!(matches!(
			commit_probe(
				CommitLevel::Local,
				CommitStatus::Success,
				&info(Some("2024-05-01T10:00:00.9 UTC")),
				started,
			),
			Probe::Retry(_)
		));
		assert!(matches!(
			commit_probe(
				CommitLevel::Local,
				CommitStatus::Success,
				&info(Some("2024-05-01T10:00:01.1 UTC")),
				started,
			),
			Probe::Done
		));
	}

	#[test]
	fn failed_commit_reports_every_message() {
		let info = CommitInfo { messages: vec!["x".into(), "y".into()], committed_at: None };
		let Probe::Fail(e) = commit_probe(CommitLevel::Local, CommitStatus::Failed, &info, STARTED)
		else {
			panic!("Failed commit should not be retried.");
		};
		let message = e.to_string();

		assert!(message.contains('x') && message.contains('y'));
		assert_eq!(message, "commit failed, [x y]");
	}

	#[test]
	fn missing_or_malformed_timestamps() {
		assert!(matches!(
			commit_probe(CommitLevel::Local, CommitStatus::Success, &info(Some("  ")), STARTED),
			Probe::Retry(_)
		));
		assert!(matches!(
			commit_probe(CommitLevel::Local, CommitStatus::Pending, &info(None), STARTED),
			Probe::Retry(_)
		));
		assert!(matches!(
			commit_probe(CommitLevel::Local, CommitStatus::Success, &info(Some("soon")), STARTED),
			Probe::Fail(Error::Decode(_))
		));
	}
}
