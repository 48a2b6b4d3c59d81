//! Backend state machines observed by the watcher.

// crates.io
use serde::{Deserializer, Serializer};
use time::{
	PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
	macros::format_description,
};
// self
use crate::{_prelude::*, error::DecodeError};

const COMMIT_DATETIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
	"[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);
const OFFSET_WITH_COLON: &[BorrowedFormatItem<'static>] =
	format_description!("[offset_hour sign:mandatory]:[offset_minute]");
const OFFSET_WITHOUT_COLON: &[BorrowedFormatItem<'static>] =
	format_description!("[offset_hour sign:mandatory][offset_minute]");

macro_rules! wire_enum {
	(
		$(#[$meta:meta])*
		pub enum $name:ident ($unknown:literal) {
			$($(#[$vmeta:meta])* $variant:ident => $wire:literal,)+
		}
	) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
		pub enum $name {
			$($(#[$vmeta])* $variant,)+
			/// State not known to this client.
			#[default]
			Unknown,
		}
		impl $name {
			/// Returns the wire label.
			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $wire,)+
					Self::Unknown => $unknown,
				}
			}

			/// Parses a wire label; unrecognized labels map to `Unknown`.
			pub fn from_wire(s: &str) -> Self {
				match s {
					$($wire => Self::$variant,)+
					_ => Self::Unknown,
				}
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(self.as_str())
			}
		}
		impl Serialize for $name {
			fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
			where
				S: Serializer,
			{
				serializer.serialize_str(self.as_str())
			}
		}
		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
			where
				D: Deserializer<'de>,
			{
				Ok(Self::from_wire(&String::deserialize(deserializer)?))
			}
		}
	};
}

wire_enum! {
	/// Firewall provisioning state.
	pub enum FirewallStatus ("UNKNOWN") {
		/// Creation in progress.
		Creating => "CREATING",
		/// Update in progress.
		Updating => "UPDATING",
		/// Deletion in progress.
		Deleting => "DELETING",
		/// Creation finished.
		CreateComplete => "CREATE_COMPLETE",
		/// Update finished.
		UpdateComplete => "UPDATE_COMPLETE",
		/// Creation failed.
		CreateFail => "CREATE_FAIL",
		/// Update failed.
		UpdateFail => "UPDATE_FAIL",
		/// Deletion failed.
		DeleteFail => "DELETE_FAIL",
		/// Deletion finished.
		DeleteComplete => "DELETE_COMPLETE",
	}
}
impl FirewallStatus {
	/// Terminal states after a create.
	pub const CREATE_TERMINAL: [Self; 2] = [Self::CreateComplete, Self::CreateFail];
	/// Terminal states after an update.
	pub const UPDATE_TERMINAL: [Self; 2] = [Self::UpdateComplete, Self::UpdateFail];
	/// Terminal states after a delete.
	pub const DELETE_TERMINAL: [Self; 2] = [Self::DeleteComplete, Self::DeleteFail];
}

wire_enum! {
	/// Rule-stack commit state.
	pub enum CommitStatus ("Unknown") {
		/// Commit failed.
		Failed => "Failed",
		/// Commit succeeded.
		Success => "Success",
		/// Commit queued.
		Pending => "Pending",
		/// Commit running.
		Committing => "Committing",
		/// Pre-commit stage done.
		PrecommitDone => "PrecommitDone",
		/// Pre-validation stage done.
		PrevalidateDone => "PrevalidateDone",
		/// Validation running.
		Validating => "Validating",
		/// Changes not yet committed.
		Uncommitted => "Uncommitted",
	}
}

/// Parses a commit timestamp of the form `YYYY-MM-DDTHH:MM:SS ZONE`.
///
/// Zone abbreviations are read as UTC, which is what the backend reports; numeric `±HH:MM` and
/// `±HHMM` offsets are applied.
pub fn parse_commit_timestamp(raw: &str) -> Result<OffsetDateTime, DecodeError> {
	let invalid = || DecodeError::Timestamp { value: raw.to_owned() };
	let (datetime, zone) = raw.trim().split_once(' ').ok_or_else(invalid)?;
	let datetime =
		PrimitiveDateTime::parse(datetime, COMMIT_DATETIME_FORMAT).map_err(|_| invalid())?;
	let zone = zone.trim();
	let offset = if zone.starts_with(['+', '-']) {
		UtcOffset::parse(zone, OFFSET_WITH_COLON)
			.or_else(|_| UtcOffset::parse(zone, OFFSET_WITHOUT_COLON))
			.map_err(|_| invalid())?
	} else if !zone.is_empty() && zone.chars().all(|c| c.is_ascii_alphabetic()) {
		UtcOffset::UTC
	} else {
		return Err(invalid());
	};

	Ok(datetime.assume_offset(offset))
}
