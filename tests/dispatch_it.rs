mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use cloudngfw::{
	auth::{PermissionScope, RulestackScope},
	client::Client,
	config::ClientConfig,
	context::CallContext,
	dispatch::{ApiGeneration, ApiPath, RequestEnvelope},
	error::{DecodeError, Error},
	firewall::FirewallRef,
	http::ReqwestTransport,
	response::{FailureKind, GenericResponse},
};
use common::*;

fn issuer_client(config: ClientConfig) -> (Client, Arc<FixedIssuer>) {
	let issuer = Arc::new(FixedIssuer::default());
	let client =
		Client::with_issuer(config, Arc::new(ReqwestTransport::default()), issuer.clone())
			.expect("Client should build from the test configuration.");

	(client, issuer)
}

#[tokio::test]
async fn requests_carry_scope_credentials_and_custom_headers() {
	let server = MockServer::start_async().await;
	let config = server_config(&server)
		.with_header("user-agent", "terraform-provider-cloudngfw")
		.with_header("x-trace", "abc");
	let (client, issuer) = issuer_client(config);
	let commit = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/config/rulestacks/rs-global/commit")
				.header("authorization", "global_rulestack-token")
				.header("x-api-key", "global_rulestack-key")
				.header("content-type", "application/json")
				.header("user-agent", "terraform-provider-cloudngfw")
				.header("x-trace", "abc");
			then.status(200).body(envelope(json!({})));
		})
		.await;

	client
		.commit_rulestack(&ctx(), "rs-global", RulestackScope::Global)
		.await
		.expect("Commit should succeed.");
	commit.assert_calls_async(1).await;
	assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn failure_envelope_is_an_api_error_regardless_of_http_status() {
	let server = MockServer::start_async().await;
	let (client, _) = issuer_client(server_config(&server));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/config/rulestacks/rs/commit");
			then.status(200).body(failure(400, "Conflict: please provide latest token"));
		})
		.await;

	let err = client
		.commit_rulestack(&ctx(), "rs", RulestackScope::Local)
		.await
		.expect_err("Failure envelope should surface as an error.");

	assert!(err.is_token_conflict());
	assert_eq!(err.as_status().map(|status| status.kind()), Some(FailureKind::TokenConflict));
}

#[tokio::test]
async fn error_status_with_success_envelope_is_accepted() {
	let server = MockServer::start_async().await;
	let (client, _) = issuer_client(server_config(&server));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/rulestacks/rs/commit");
			then.status(202).body(envelope(json!({
				"RuleStackName": "rs",
				"CommitStatus": "Pending"
			})));
		})
		.await;

	let commit = client
		.rulestack_commit_status(&ctx(), "rs", RulestackScope::Local)
		.await
		.expect("Zero error code should decode as success.");

	assert_eq!(commit.name, "rs");
}

#[tokio::test]
async fn gateway_messages_are_unknown_responses() {
	let server = MockServer::start_async().await;
	let (client, _) = issuer_client(server_config(&server));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/ngfirewalls/fw");
			then.status(403).body(r#"{"message":"Missing Authentication Token"}"#);
		})
		.await;

	let err = client
		.read_firewall(&ctx(), &FirewallRef::by_name("fw"))
		.await
		.expect_err("Gateway body should be rejected.");

	match err {
		Error::UnknownResponse { status, path, message } => {
			assert_eq!(status, 403);
			assert_eq!(path, "/v1/config/ngfirewalls/fw");
			assert_eq!(message, "Missing Authentication Token");
		},
		other => panic!("Expected an unknown response, got {other:?}."),
	}
}

#[tokio::test]
async fn non_json_bodies_fail_to_decode() {
	let server = MockServer::start_async().await;
	let (client, _) = issuer_client(server_config(&server));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/ngfirewalls/fw");
			then.status(502).body("<html>Bad Gateway</html>");
		})
		.await;

	let err = client
		.read_firewall(&ctx(), &FirewallRef::by_name("fw"))
		.await
		.expect_err("HTML body should not decode.");

	assert!(matches!(err, Error::Decode(DecodeError::Response { status: 502, .. })));
}

#[tokio::test]
async fn explicit_region_query_wins_on_the_v2_api() {
	let server = MockServer::start_async().await;
	let (client, _) =
		issuer_client(server_config(&server).with_api_generation(ApiGeneration::V2));
	let list = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/config/ngfirewalls")
				.query_param("region", "eu-west-1")
				.query_param("maxresults", "10");
			then.status(200).body(envelope(json!({ "Firewalls": [] })));
		})
		.await;
	let request = RequestEnvelope::new(
		PermissionScope::Firewall,
		http::Method::GET,
		ApiPath::v1(["v1", "config", "ngfirewalls"]).with_v2(["v2", "config", "ngfirewalls"]),
	)
	.with_query("region", "eu-west-1")
	.with_query("maxresults", "10");
	let reply = client
		.communicate::<GenericResponse>(&ctx(), &request)
		.await
		.expect("Listing should succeed.");

	assert_eq!(reply.status, 200);
	assert_eq!(reply.value.response, Some(json!({ "Firewalls": [] })));
	list.assert_calls_async(1).await;
}

#[tokio::test]
async fn deadline_aborts_a_slow_request() {
	let server = MockServer::start_async().await;
	let (client, _) = issuer_client(server_config(&server));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/ngfirewalls/fw");
			then.status(200).delay(Duration::from_secs(2)).body(envelope(json!({})));
		})
		.await;

	let ctx = CallContext::new().with_timeout(Duration::from_millis(100));
	let err = client
		.read_firewall(&ctx, &FirewallRef::by_name("fw"))
		.await
		.expect_err("Slow request should hit the deadline.");

	assert!(matches!(err, Error::DeadlineExceeded));
}

#[tokio::test]
async fn cancelled_context_sends_nothing() {
	let server = MockServer::start_async().await;
	let (client, issuer) = issuer_client(server_config(&server));
	let any = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(200).body(envelope(json!({})));
		})
		.await;
	let ctx = CallContext::new();

	ctx.cancel();

	let err = client
		.delete_firewall(&ctx, &FirewallRef::by_name("fw"))
		.await
		.expect_err("Cancelled context should fail.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(issuer.calls(), 0);
	any.assert_calls_async(0).await;
}
