// std
use std::{fmt::Arguments, ops::BitOr};
// crates.io
use http::{Method, Uri};
// self
use crate::{_prelude::*, error::ConfigError};

/// Categories of request logging a client emits.
///
/// Logs are emitted through `tracing` under the `cloudngfw` target; the categories decide which
/// events a client produces at all, so a host subscriber only sees what the operator opted
/// into. `quiet` suppresses everything.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LogCategories(u16);
impl LogCategories {
	/// Suppresses every category.
	pub const QUIET: Self = Self(1);
	/// Token issuance.
	pub const LOGIN: Self = Self(1 << 1);
	/// `GET` calls.
	pub const GET: Self = Self(1 << 2);
	/// `POST` calls.
	pub const POST: Self = Self(1 << 3);
	/// `PUT` calls.
	pub const PUT: Self = Self(1 << 4);
	/// `PATCH` calls.
	pub const PATCH: Self = Self(1 << 5);
	/// `DELETE` calls.
	pub const DELETE: Self = Self(1 << 6);
	/// Request URLs.
	pub const PATH: Self = Self(1 << 7);
	/// Request bodies.
	pub const SEND: Self = Self(1 << 8);
	/// Response bodies.
	pub const RECEIVE: Self = Self(1 << 9);
	/// Every mutating method.
	pub const ACTION: Self = Self(Self::POST.0 | Self::PUT.0 | Self::PATCH.0 | Self::DELETE.0);
	/// Categories enabled when nothing is configured.
	pub const DEFAULT: Self = Self(Self::LOGIN.0 | Self::GET.0 | Self::ACTION.0);
	const NAMED: [(&'static str, Self); 11] = [
		("quiet", Self::QUIET),
		("login", Self::LOGIN),
		("get", Self::GET),
		("post", Self::POST),
		("put", Self::PUT),
		("patch", Self::PATCH),
		("delete", Self::DELETE),
		("action", Self::ACTION),
		("path", Self::PATH),
		("send", Self::SEND),
		("receive", Self::RECEIVE),
	];

	/// No category; distinct from [`QUIET`](Self::QUIET) only in how it combines.
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Returns `true` when every bit of `other` is enabled and the set is not quiet.
	pub const fn contains(self, other: Self) -> bool {
		self.0 & Self::QUIET.0 == 0 && self.0 & other.0 == other.0 && other.0 != 0
	}

	/// Returns `true` when calls with `method` should be logged.
	pub fn allows_method(self, method: &Method) -> bool {
		let category = if method == Method::GET {
			Self::GET
		} else if method == Method::POST {
			Self::POST
		} else if method == Method::PUT {
			Self::PUT
		} else if method == Method::PATCH {
			Self::PATCH
		} else if method == Method::DELETE {
			Self::DELETE
		} else {
			return false;
		};

		self.contains(category)
	}

	fn names(self) -> Vec<String> {
		Self::NAMED
			.iter()
			.filter(|(name, flag)| *name != "action" && self.0 & flag.0 == flag.0)
			.map(|(name, _)| (*name).to_owned())
			.collect()
	}
}
impl Default for LogCategories {
	fn default() -> Self {
		Self::DEFAULT
	}
}
impl BitOr for LogCategories {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self::Output {
		Self(self.0 | rhs.0)
	}
}
impl FromStr for LogCategories {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.split(',').map(str::trim).filter(|item| !item.is_empty()).try_fold(
			None,
			|acc: Option<Self>, item| {
				let flag = Self::NAMED
					.iter()
					.find(|(name, _)| name.eq_ignore_ascii_case(item))
					.map(|(_, flag)| *flag)
					.ok_or_else(|| ConfigError::UnknownLogCategory { category: item.to_owned() })?;

				Ok(Some(acc.map_or(flag, |acc| acc | flag)))
			},
		)
		.map(|parsed| parsed.unwrap_or_default())
	}
}
impl TryFrom<Vec<String>> for LogCategories {
	type Error = ConfigError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		value.join(",").parse()
	}
}
impl From<LogCategories> for Vec<String> {
	fn from(value: LogCategories) -> Self {
		value.names()
	}
}
impl Debug for LogCategories {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("LogCategories").field(&self.names()).finish()
	}
}

/// Logs a per-method action message when the method's category is enabled.
pub(crate) fn log_action(categories: LogCategories, method: &Method, message: Arguments) {
	if !categories.allows_method(method) {
		return;
	}

	#[cfg(feature = "tracing")]
	tracing::info!(target: "cloudngfw", method = %method, "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = message;
}

/// Logs token issuance when `login` is enabled.
pub(crate) fn log_login(categories: LogCategories, message: Arguments) {
	if !categories.contains(LogCategories::LOGIN) {
		return;
	}

	#[cfg(feature = "tracing")]
	tracing::info!(target: "cloudngfw", "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = message;
}

/// Logs the request URL when `path` is enabled.
pub(crate) fn log_path(categories: LogCategories, method: &Method, url: &Uri) {
	if !categories.contains(LogCategories::PATH) {
		return;
	}

	#[cfg(feature = "tracing")]
	tracing::debug!(target: "cloudngfw", method = %method, url = %url, "path");
	#[cfg(not(feature = "tracing"))]
	let _ = (method, url);
}

/// Logs the request body when `send` is enabled.
pub(crate) fn log_send(categories: LogCategories, body: &[u8]) {
	if !categories.contains(LogCategories::SEND) {
		return;
	}

	#[cfg(feature = "tracing")]
	tracing::trace!(target: "cloudngfw", body = %String::from_utf8_lossy(body), "sending");
	#[cfg(not(feature = "tracing"))]
	let _ = body;
}

/// Logs the response body when `receive` is enabled.
pub(crate) fn log_receive(categories: LogCategories, status: u16, body: &[u8]) {
	if !categories.contains(LogCategories::RECEIVE) {
		return;
	}

	#[cfg(feature = "tracing")]
	tracing::trace!(
		target: "cloudngfw",
		status,
		body = %String::from_utf8_lossy(body),
		"received"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (status, body);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_covers_login_get_and_actions() {
		let categories = LogCategories::default();

		assert!(categories.contains(LogCategories::LOGIN));
		assert!(categories.allows_method(&Method::GET));
		assert!(categories.allows_method(&Method::PATCH));
		assert!(!categories.contains(LogCategories::SEND));
	}

	#[test]
	fn parse_combines_and_rejects_unknown() {
		let categories: LogCategories =
			"get, path,RECEIVE".parse().expect("Known categories should parse.");

		assert!(categories.allows_method(&Method::GET));
		assert!(!categories.allows_method(&Method::POST));
		assert!(categories.contains(LogCategories::PATH | LogCategories::RECEIVE));
		assert!(matches!(
			"get,verbose".parse::<LogCategories>(),
			Err(ConfigError::UnknownLogCategory { category }) if category == "verbose"
		));
		assert_eq!("".parse::<LogCategories>().ok(), Some(LogCategories::DEFAULT));
	}

	#[test]
	fn quiet_suppresses_everything() {
		let categories: LogCategories = "quiet,get".parse().expect("Quiet should parse.");

		assert!(!categories.allows_method(&Method::GET));
		assert!(!categories.contains(LogCategories::LOGIN));
	}

	#[test]
	fn serde_uses_category_names() {
		let json = serde_json::to_string(&(LogCategories::GET | LogCategories::SEND))
			.expect("Categories should serialize.");

		assert_eq!(json, r#"["get","send"]"#);

		let parsed: LogCategories =
			serde_json::from_str(r#"["action"]"#).expect("Categories should deserialize.");

		assert!(parsed.allows_method(&Method::DELETE));
		assert!(!parsed.allows_method(&Method::GET));
	}
}
