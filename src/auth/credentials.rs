//! Role assumption boundary used to obtain temporary signing credentials.

// self
use crate::{_prelude::*, auth::Secret, error::BoxError};

/// Boxed future returned by [`CredentialSource::assume_role`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TemporaryCredentials, BoxError>> + 'a + Send>>;

/// Short-lived credentials produced by assuming a role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryCredentials {
	/// Access key identifier.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: Secret,
	/// Session token, present for assumed-role credentials.
	pub session_token: Option<Secret>,
}
impl TemporaryCredentials {
	/// Builds credentials without a session token.
	pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<Secret>) -> Self {
		Self {
			access_key_id: access_key_id.into(),
			secret_access_key: secret_access_key.into(),
			session_token: None,
		}
	}

	/// Attaches a session token.
	pub fn with_session_token(mut self, token: impl Into<Secret>) -> Self {
		self.session_token = Some(token.into());

		self
	}
}

/// Produces temporary credentials for a role identifier.
///
/// Implementations typically wrap an STS client. Errors are surfaced to callers verbatim
/// through [`Error::CredentialSource`].
pub trait CredentialSource
where
	Self: Send + Sync,
{
	/// Assumes `role` and returns the resulting credentials.
	fn assume_role<'a>(&'a self, role: &'a str) -> CredentialFuture<'a>;
}

/// Raised by [`StaticCredentialSource`] for roles it has no credentials for.
#[derive(Debug, ThisError)]
#[error("No static credentials are registered for role `{role}`.")]
pub struct UnknownRoleError {
	/// Role that was requested.
	pub role: String,
}

/// Credential source that hands out pre-assumed credentials.
///
/// Useful when credentials were obtained out of band, and in tests. Every requested role
/// is recorded so callers can assert on which roles were assumed.
#[derive(Debug, Default)]
pub struct StaticCredentialSource {
	fallback: Option<TemporaryCredentials>,
	by_role: HashMap<String, TemporaryCredentials>,
	assumed: Mutex<Vec<String>>,
}
impl StaticCredentialSource {
	/// Returns `credentials` for every role.
	pub fn new(credentials: TemporaryCredentials) -> Self {
		Self { fallback: Some(credentials), ..Default::default() }
	}

	/// Registers credentials for a specific role.
	pub fn with_role(mut self, role: impl Into<String>, credentials: TemporaryCredentials) -> Self {
		self.by_role.insert(role.into(), credentials);

		self
	}

	/// Roles assumed so far, in call order.
	pub fn assumed_roles(&self) -> Vec<String> {
		self.assumed.lock().clone()
	}
}
impl CredentialSource for StaticCredentialSource {
	fn assume_role<'a>(&'a self, role: &'a str) -> CredentialFuture<'a> {
		Box::pin(async move {
			self.assumed.lock().push(role.to_owned());

			self.by_role
				.get(role)
				.or(self.fallback.as_ref())
				.cloned()
				.ok_or_else(|| Box::new(UnknownRoleError { role: role.to_owned() }) as BoxError)
		})
	}
}
