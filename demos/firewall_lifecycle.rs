//! Walks a firewall through creation and a rule-stack commit against a local mock of the
//! management API, showing how one client reuses its per-scope tokens across calls.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use cloudngfw::{
	auth::{RulestackScope, StaticCredentialSource, TemporaryCredentials},
	client::Client,
	config::{ClientConfig, Protocol},
	context::CallContext,
	firewall::Firewall,
};

fn token(id: &str) -> String {
	format!(
		r#"{{"Response":{{"TokenId":"{id}","SubscriptionKey":"demo-key","ExpiryTime":120}},"ResponseStatus":{{"ErrorCode":0}}}}"#
	)
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let firewall_token = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/mgmt/tokens/cloudfirewalladmin");
			then.status(200).body(token("demo-firewall-token"));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/mgmt/tokens/cloudrulestackadmin");
			then.status(200).body(token("demo-rulestack-token"));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/config/ngfirewalls");
			then.status(200).body(
				r#"{"Response":{"FirewallName":"demo-fw","FirewallId":"fw-1"},"ResponseStatus":{"ErrorCode":0}}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/ngfirewalls/demo-fw");
			then.status(200).body(
				r#"{"Response":{"Firewall":{"FirewallName":"demo-fw"},"Status":{"FirewallStatus":"CREATE_COMPLETE"}},"ResponseStatus":{"ErrorCode":0}}"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/config/rulestacks/demo-rs/commit");
			then.status(200).body(r#"{"ResponseStatus":{"ErrorCode":0}}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/config/rulestacks/demo-rs/commit");
			then.status(200).body(
				r#"{"Response":{"RuleStackName":"demo-rs","CommitStatus":"Success"},"ResponseStatus":{"ErrorCode":0}}"#,
			);
		})
		.await;

	let config = ClientConfig::new("us-east-1")
		.with_host(server.address().to_string())
		.with_protocol(Protocol::Http)
		.with_shared_role("arn:aws:iam::123456789012:role/cloudngfw-demo");
	let credentials = Arc::new(StaticCredentialSource::new(TemporaryCredentials::new(
		"AKIDEXAMPLE",
		"demo-secret",
	)));
	let client = Client::new(config, credentials.clone())?;
	let ctx = CallContext::new();
	let firewall = Firewall { name: Some("demo-fw".into()), ..Default::default() };
	let created = client.create_firewall_and_wait(&ctx, &firewall).await?;

	println!("Created firewall {:?}.", created.id);

	let commit = client.commit_rulestack_and_wait(&ctx, "demo-rs", RulestackScope::Local).await?;

	println!("{}", commit.summary());
	println!(
		"Issued {} tokens for roles {:?}; firewall token endpoint hits: {}.",
		client.tokens().metrics().issued(),
		credentials.assumed_roles(),
		firewall_token.calls_async().await
	);

	Ok(())
}
