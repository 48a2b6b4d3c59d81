//! AWS Signature Version 4 request signing for token issuance calls.

// crates.io
use hmac::{Hmac, Mac};
use http::{
	HeaderValue, Request,
	header::{AUTHORIZATION, HOST},
};
use sha2::{Digest, Sha256};
use time::{format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, auth::TemporaryCredentials, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_DATE: &str = "x-amz-date";
const AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
const UNSIGNED_HEADERS: [&str; 3] = ["authorization", "user-agent", "x-amzn-trace-id"];
const AMZ_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year][month][day]T[hour][minute][second]Z");
const SCOPE_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year][month][day]");

/// Service name used for the management API gateway.
pub const EXECUTE_API: &str = "execute-api";

/// Inputs for a single signing operation.
#[derive(Clone, Copy, Debug)]
pub struct SigningParams<'a> {
	/// Credentials used to derive the signing key.
	pub credentials: &'a TemporaryCredentials,
	/// Region the request is scoped to.
	pub region: &'a str,
	/// Service name.
	pub service: &'a str,
	/// Signing instant.
	pub time: OffsetDateTime,
}

/// Signs `request` in place.
///
/// Adds `host` (when absent), `x-amz-date`, `x-amz-security-token` (for session credentials),
/// and the `authorization` header. Every header present at signing time is signed except
/// `authorization`, `user-agent`, and `x-amzn-trace-id`, so callers must finish setting headers
/// before calling this.
pub fn sign_request(
	request: &mut Request<Vec<u8>>,
	params: &SigningParams,
) -> Result<(), ConfigError> {
	let time = params.time.to_offset(time::UtcOffset::UTC);
	let amz_date = format(time, AMZ_DATE_FORMAT)?;
	let scope_date = format(time, SCOPE_DATE_FORMAT)?;

	if !request.headers().contains_key(HOST) {
		let authority = request.uri().authority().map(|authority| authority.as_str().to_owned());

		if let Some(authority) = authority {
			request.headers_mut().insert(HOST, header_value(HOST.as_str(), &authority)?);
		}
	}

	request.headers_mut().insert(AMZ_DATE, header_value(AMZ_DATE, &amz_date)?);

	if let Some(token) = &params.credentials.session_token {
		request
			.headers_mut()
			.insert(AMZ_SECURITY_TOKEN, header_value(AMZ_SECURITY_TOKEN, token.expose())?);
	}

	let (canonical_headers, signed_headers) = canonical_headers(request);
	let canonical_request = [
		request.method().as_str().to_owned(),
		canonical_path(request.uri().path()),
		canonical_query(request.uri().query().unwrap_or_default()),
		canonical_headers,
		signed_headers.clone(),
		hex::encode(Sha256::digest(request.body())),
	]
	.join("\n");
	let credential_scope = format!("{scope_date}/{}/{}/aws4_request", params.region, params.service);
	let string_to_sign = format!(
		"{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
		hex::encode(Sha256::digest(canonical_request.as_bytes()))
	);
	let secret = format!("AWS4{}", params.credentials.secret_access_key.expose());
	let key = hmac(secret.as_bytes(), scope_date.as_bytes())?;
	let key = hmac(&key, params.region.as_bytes())?;
	let key = hmac(&key, params.service.as_bytes())?;
	let key = hmac(&key, b"aws4_request")?;
	let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);
	let authorization = format!(
		"{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
		params.credentials.access_key_id
	);

	request
		.headers_mut()
		.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &authorization)?);

	Ok(())
}

fn format(
	time: OffsetDateTime,
	items: &[BorrowedFormatItem<'static>],
) -> Result<String, ConfigError> {
	time.format(items).map_err(|_| ConfigError::SigningKey)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
	HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader { name: name.to_owned() })
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ConfigError> {
	let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| ConfigError::SigningKey)?;

	mac.update(data);

	Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_headers(request: &Request<Vec<u8>>) -> (String, String) {
	let mut headers = BTreeMap::<String, Vec<String>>::new();

	for (name, value) in request.headers() {
		if UNSIGNED_HEADERS.contains(&name.as_str()) {
			continue;
		}

		let value = String::from_utf8_lossy(value.as_bytes());

		headers
			.entry(name.as_str().to_owned())
			.or_default()
			.push(value.split_whitespace().collect::<Vec<_>>().join(" "));
	}

	let canonical = headers
		.iter()
		.map(|(name, values)| format!("{name}:{}\n", values.join(",")))
		.collect::<String>();
	let signed = headers.keys().map(String::as_str).collect::<Vec<_>>().join(";");

	(canonical, signed)
}

fn canonical_path(path: &str) -> String {
	if path.is_empty() {
		return "/".into();
	}

	// The URI path is already escaped once; non-S3 services expect it escaped again.
	path.split('/').map(encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(query: &str) -> String {
	let mut pairs = url::form_urlencoded::parse(query.as_bytes())
		.map(|(key, value)| (encode(&key), encode(&value)))
		.collect::<Vec<_>>();

	pairs.sort();

	pairs.into_iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

fn encode(value: &str) -> String {
	let mut out = String::with_capacity(value.len());

	for byte in value.bytes() {
		if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{byte:02X}"));
		}
	}

	out
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::USER_AGENT;
	use time::macros::datetime;
	// self
	use super::*;

	fn vanilla_credentials() -> TemporaryCredentials {
		TemporaryCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
	}

	#[test]
	fn get_vanilla_matches_reference_signature() {
		let mut request = Request::get("https://example.amazonaws.com/")
			.body(Vec::new())
			.expect("Vanilla request should build.");
		let credentials = vanilla_credentials();
		let params = SigningParams {
			credentials: &credentials,
			region: "us-east-1",
			service: "service",
			time: datetime!(2015-08-30 12:36:00 UTC),
		};

		sign_request(&mut request, &params).expect("Signing should succeed.");

		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.expect("Authorization header should be set.");

		assert_eq!(
			authorization,
			"AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
			 SignedHeaders=host;x-amz-date, \
			 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
		);
		assert_eq!(
			request.headers().get(AMZ_DATE).and_then(|value| value.to_str().ok()),
			Some("20150830T123600Z")
		);
	}

	#[test]
	fn session_token_is_signed_and_user_agent_is_not() {
		let mut request = Request::get("https://api.example.com/v1/mgmt/tokens/cloudfirewalladmin")
			.header(USER_AGENT, "cloudngfw-test")
			.header("content-type", "application/json")
			.body(br#"{"ExpiryTime":120}"#.to_vec())
			.expect("Token request should build.");
		let credentials = vanilla_credentials().with_session_token("session");
		let params = SigningParams {
			credentials: &credentials,
			region: "us-east-1",
			service: EXECUTE_API,
			time: OffsetDateTime::now_utc(),
		};

		sign_request(&mut request, &params).expect("Signing should succeed.");

		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.expect("Authorization header should be set.");

		assert!(
			authorization
				.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token,")
		);
		assert!(authorization.contains("/us-east-1/execute-api/aws4_request"));
		assert_eq!(
			request.headers().get(AMZ_SECURITY_TOKEN).and_then(|value| value.to_str().ok()),
			Some("session")
		);
	}

	#[test]
	fn canonical_query_sorts_and_encodes() {
		assert_eq!(
			canonical_query("region=us-east-1&AccountId=1 2&a=%2F"),
			"AccountId=1%202&a=%2F&region=us-east-1"
		);
		assert_eq!(canonical_query(""), "");
		assert_eq!(
			canonical_path("/v1/config/ngfirewalls/fw%20one"),
			"/v1/config/ngfirewalls/fw%2520one"
		);
	}
}
