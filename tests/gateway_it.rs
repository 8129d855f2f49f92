#![cfg(feature = "reqwest")]

// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use zedly_gateway::{
	config::GatewayConfig,
	context::DetachedContext,
	gateway::{CallOutcome, ReqwestGateway},
	http::ReqwestTransport,
	http_types::{Method, StatusCode},
	store::{MemoryStore, SessionStore},
	url::Url,
};

struct Fixture {
	gateway: ReqwestGateway,
	store: Arc<MemoryStore>,
	context: Arc<DetachedContext>,
}

fn fixture(server: &MockServer, current_path: &str) -> Fixture {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config = GatewayConfig::builder(base).build().expect("Default config should build.");
	let store = Arc::new(MemoryStore::default());
	let context = Arc::new(DetachedContext::new(current_path));
	let gateway = ReqwestGateway::with_transport(
		config,
		ReqwestTransport::with_client(zedly_gateway::reqwest::Client::new()),
		store.clone(),
		context.clone(),
	);

	Fixture { gateway, store, context }
}

async fn seed(store: &MemoryStore, entries: &[(&str, &str)]) {
	for (key, value) in entries {
		store.set(key, value).await.expect("Seeding the memory store should succeed.");
	}
}

#[tokio::test]
async fn stored_token_is_attached_to_protected_calls() {
	let server = MockServer::start_async().await;
	let results = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/student/results").header("authorization", "Bearer A1");
			then.status(200).json_body(json!([{ "test": 1, "score": 92 }]));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(json!({ "access_token": "unused" }));
		})
		.await;
	let f = fixture(&server, "/student/dashboard");

	seed(&f.store, &[("access_token", "A1"), ("refresh_token", "R1")]).await;

	let (response, outcome) = f
		.gateway
		.fetch_with_outcome(
			f.gateway.request(Method::GET, "/api/student/results").expect("Target should resolve."),
		)
		.await
		.expect("Protected call should succeed.");

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(outcome, CallOutcome::Completed);
	results.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn expired_token_is_renewed_and_call_retried() {
	let server = MockServer::start_async().await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/student/results").header("authorization", "Bearer expired");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/refresh")
				.header("content-type", "application/json")
				.json_body(json!({ "refresh_token": "R1" }));
			then.status(200).json_body(json!({ "access_token": "A2" }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/student/results").header("authorization", "Bearer A2");
			then.status(200).body("[]");
		})
		.await;
	let f = fixture(&server, "/student/dashboard");

	seed(&f.store, &[("access_token", "expired"), ("refresh_token", "R1")]).await;

	let (response, outcome) = f
		.gateway
		.fetch_with_outcome(
			f.gateway.request(Method::GET, "/api/student/results").expect("Target should resolve."),
		)
		.await
		.expect("Renewed call should succeed.");

	assert_eq!(response.status, StatusCode::OK);
	assert_eq!(response.text(), "[]");
	assert_eq!(outcome, CallOutcome::RetriedOk);
	assert_eq!(f.store.snapshot().get("access_token").map(String::as_str), Some("A2"));
	assert_eq!(f.store.snapshot().get("refresh_token").map(String::as_str), Some("R1"));
	assert!(f.context.navigations().is_empty());
	rejected.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_refresh_token_ends_session() {
	let server = MockServer::start_async().await;
	let classes = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/teacher/classes");
			then.status(401).json_body(json!({ "error": "Token expired" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(json!({ "access_token": "unused" }));
		})
		.await;
	let f = fixture(&server, "/teacher/classes");

	seed(&f.store, &[("access_token", "stale"), ("user", r#"{"id":9,"role":"teacher"}"#)]).await;

	let (response, outcome) = f
		.gateway
		.fetch_with_outcome(
			f.gateway.request(Method::GET, "/api/teacher/classes").expect("Target should resolve."),
		)
		.await
		.expect("Renewal failures must not surface as errors.");

	assert_eq!(response.status, StatusCode::UNAUTHORIZED);
	assert_eq!(outcome, CallOutcome::LoggedOut);
	assert!(f.store.is_empty());
	assert_eq!(f.context.navigations(), vec!["/login".to_owned()]);
	classes.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn login_endpoint_401_is_returned_directly() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(401).json_body(json!({ "error": "Invalid credentials" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(json!({ "access_token": "unused" }));
		})
		.await;
	let f = fixture(&server, "/login");

	seed(&f.store, &[("access_token", "A1"), ("refresh_token", "R1")]).await;

	let request = f
		.gateway
		.request(Method::POST, "/api/auth/login")
		.expect("Target should resolve.")
		.json(&json!({ "username": "bad", "password": "bad" }))
		.expect("Body should serialize.");
	let (response, outcome) =
		f.gateway.fetch_with_outcome(request).await.expect("Login call should reach the server.");

	assert_eq!(response.status, StatusCode::UNAUTHORIZED);
	assert_eq!(outcome, CallOutcome::Bypassed);
	assert_eq!(f.store.snapshot().len(), 2);
	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn concurrent_401s_trigger_a_single_renewal() {
	let server = MockServer::start_async().await;
	let mut rejected = Vec::new();
	let mut accepted = Vec::new();

	for path in ["/api/a", "/api/b"] {
		rejected.push(
			server
				.mock_async(|when, then| {
					when.method(GET).path(path).header("authorization", "Bearer expired");
					then.status(401);
				})
				.await,
		);
		accepted.push(
			server
				.mock_async(|when, then| {
					when.method(GET).path(path).header("authorization", "Bearer A2");
					then.status(200);
				})
				.await,
		);
	}

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh").json_body(json!({ "refresh_token": "R1" }));
			then.status(200)
				.delay(Duration::from_millis(200))
				.json_body(json!({ "access_token": "A2" }));
		})
		.await;
	let f = fixture(&server, "/student/dashboard");

	seed(&f.store, &[("access_token", "expired"), ("refresh_token", "R1")]).await;

	let (a, b) = tokio::join!(f.gateway.get("/api/a"), f.gateway.get("/api/b"));

	assert_eq!(a.expect("First call should succeed.").status, StatusCode::OK);
	assert_eq!(b.expect("Second call should succeed.").status, StatusCode::OK);
	assert!(!f.gateway.renewal_in_flight());
	refresh.assert_calls_async(1).await;

	for mock in rejected.iter().chain(&accepted) {
		mock.assert_calls_async(1).await;
	}
}

#[tokio::test]
async fn static_assets_and_foreign_origins_are_untouched() {
	let server = MockServer::start_async().await;
	let asset = server
		.mock_async(|when, then| {
			when.method(GET).path("/static/app.js").header_missing("authorization");
			then.status(200).body("console.log(1)");
		})
		.await;
	let f = fixture(&server, "/student/dashboard");

	seed(&f.store, &[("access_token", "A1")]).await;

	let response = f.gateway.get("/static/app.js").await.expect("Asset call should succeed.");

	assert_eq!(response.status, StatusCode::OK);
	asset.assert_calls_async(1).await;
}
