#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_gatekeeper::{
	_preludet::*,
	auth::{ClientCredentials, ScopeSet, TokenSecret, TokenSet},
	manager::{Acquired, ManagerState, TokenManager},
	store::{CredentialRecord, CredentialStore, MemoryStore},
};

const WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";

async fn seeded_manager(
	server: &MockServer,
	refresh_token: Option<&str>,
	expires_in: Duration,
) -> (Arc<TokenManager>, Arc<MemoryStore>) {
	let (manager, store) = build_test_manager(test_config(&server.base_url()));
	let issued = OffsetDateTime::now_utc() - Duration::minutes(30);

	store
		.save(CredentialRecord {
			credentials: Some(ClientCredentials::public("abc123")),
			tokens: Some(TokenSet {
				access_token: TokenSecret::new("stale-access"),
				refresh_token: refresh_token.map(TokenSecret::new),
				scopes: ScopeSet::new(["email"]).expect("Scope fixture should be valid."),
				issued_at: issued,
				expires_at: Some(issued + expires_in),
			}),
		})
		.await
		.expect("Seeding the store should succeed.");

	(manager, store)
}

async fn mock_default_discovery(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(GET).path(WELL_KNOWN);
			then.status(404);
		})
		.await;
}

#[tokio::test]
async fn expired_token_is_refreshed_before_use() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-access\",\"refresh_token\":\"fresh-refresh\",\"token_type\":\"Bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let (manager, store) = seeded_manager(&server, Some("stale-refresh"), Duration::minutes(5)).await;

	match manager.acquire().await.expect("Acquire should refresh the expired token.") {
		Acquired::Bearer(secret) => assert_eq!(secret.expose(), "fresh-access"),
		Acquired::Interactive(url) => panic!("Unexpected interactive redirect to {url}."),
	}

	token.assert_async().await;
	assert_eq!(manager.state(), ManagerState::Authenticated);

	let stored = store
		.load()
		.await
		.expect("Store load should succeed.")
		.expect("Record should remain present after refresh.")
		.tokens
		.expect("Tokens should be persisted after refresh.");

	assert_eq!(stored.access_token.expose(), "fresh-access");
	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("fresh-refresh"));
}

#[tokio::test]
async fn omitted_refresh_token_carries_the_previous_grant_forward() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-access\",\"token_type\":\"Bearer\",\"expires_in\":1800}",
			);
		})
		.await;

	let (manager, _) = seeded_manager(&server, Some("keep-me"), Duration::minutes(5)).await;
	let tokens = manager.refresh().await.expect("Refresh should succeed.");

	assert_eq!(tokens.refresh_token.as_ref().map(|secret| secret.expose()), Some("keep-me"));
}

#[tokio::test]
async fn invalidate_reaches_tokens_persisted_by_an_earlier_process() {
	let server = MockServer::start_async().await;
	let (manager, store) = seeded_manager(&server, Some("stale-refresh"), Duration::hours(2)).await;

	manager.invalidate().await.expect("Invalidate should succeed.");

	assert_eq!(manager.state(), ManagerState::Expired);

	let stored = store
		.load()
		.await
		.expect("Store load should succeed.")
		.expect("Record should remain present after invalidation.")
		.tokens
		.expect("Tokens should remain persisted for a later refresh.");

	assert!(stored.expires_at.is_some_and(|at| at <= OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn concurrent_acquires_collapse_into_one_exchange() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"singleflight-access\",\"refresh_token\":\"singleflight-refresh\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let (manager, _) = seeded_manager(&server, Some("stale-refresh"), Duration::minutes(5)).await;
	let mut tasks = Vec::new();

	for _ in 0..10 {
		let manager = manager.clone();

		tasks.push(tokio::spawn(async move { manager.acquire().await }));
	}

	for task in tasks {
		match task
			.await
			.expect("Acquire task should not panic.")
			.expect("Every concurrent acquire should succeed.")
		{
			Acquired::Bearer(secret) => assert_eq!(secret.expose(), "singleflight-access"),
			Acquired::Interactive(url) => panic!("Unexpected interactive redirect to {url}."),
		}
	}

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn invalid_grant_clears_the_store_and_restarts_the_flow() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;

	let (manager, store) = seeded_manager(&server, Some("revoked"), Duration::minutes(5)).await;

	// The dead grant falls through to a fresh interactive attempt; credentials
	// survive so no re-registration happens.
	match manager.acquire().await.expect("Acquire should fall back to interactive auth.") {
		Acquired::Interactive(url) =>
			assert!(url.query().is_some_and(|q| q.contains("client_id=abc123"))),
		Acquired::Bearer(secret) => panic!("Unexpected bearer token {secret}."),
	}

	let record = store
		.load()
		.await
		.expect("Store load should succeed.")
		.expect("Record should remain present.");

	assert!(record.tokens.is_none());
	assert_eq!(record.credentials.map(|c| c.client_id), Some("abc123".to_string()));
}

#[tokio::test]
async fn transient_refresh_failures_surface_and_leave_the_token_expired() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).body("upstream maintenance");
		})
		.await;

	let (manager, store) = seeded_manager(&server, Some("still-good"), Duration::minutes(5)).await;
	let err = manager.acquire().await.expect_err("Transient failures must surface.");

	assert!(matches!(err, Error::Transient(_)));
	assert_eq!(manager.state(), ManagerState::Expired);

	let stored = store
		.load()
		.await
		.expect("Store load should succeed.")
		.expect("Record should remain present.")
		.tokens
		.expect("The expired token set must survive a transient failure.");

	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("still-good"));
}

#[tokio::test]
async fn missing_refresh_token_goes_straight_to_interactive_auth() {
	let server = MockServer::start_async().await;

	mock_default_discovery(&server).await;

	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).body("{}");
		})
		.await;
	let (manager, _) = seeded_manager(&server, None, Duration::minutes(5)).await;

	match manager.acquire().await.expect("Acquire should start interactive auth.") {
		Acquired::Interactive(url) => assert!(url.path().ends_with("authorize")),
		Acquired::Bearer(secret) => panic!("Unexpected bearer token {secret}."),
	}

	token.assert_calls_async(0).await;
}
