//! Drives the gateway through an expired session with an in-process transport.
//!
//! 1. Implement [`HttpTransport`] for a scripted backend that accepts only the renewed token.
//! 2. Log in through [`Gateway::login`] so the store holds a credential pair.
//! 3. Expire the access token and call a protected route; the gateway renews it and retries.
//! 4. Reject the refresh token and watch the session end with a redirect to the login page.

// std
use std::{
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use zedly_gateway::{
	config::GatewayConfig,
	context::DetachedContext,
	gateway::Gateway,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	http_types::{Method, StatusCode},
	store::{MemoryStore, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = GatewayConfig::builder(Url::parse("https://zedly.example")?).build()?;
	let transport = Arc::new(ScriptedBackend::default());
	let store = Arc::new(MemoryStore::default());
	let context = Arc::new(DetachedContext::new("/student/dashboard"));
	let gateway: Gateway<ScriptedBackend> =
		Gateway::with_transport(config, transport.clone(), store.clone(), context.clone());
	let session = gateway.login("pupil", "pencil").await?;

	println!("Logged in at {} as {:?}.", session.logged_in_at, session.user);

	store.set("access_token", "expired").await?;

	let (response, outcome) = gateway
		.fetch_with_outcome(gateway.request(Method::GET, "/api/student/results")?)
		.await?;

	println!("Protected call finished with {} ({outcome}): {}.", response.status, response.text());
	println!(
		"Renewals attempted: {}, succeeded: {}.",
		gateway.renewal_metrics.attempts(),
		gateway.renewal_metrics.successes()
	);

	transport.revoke_refresh.store(true, Ordering::SeqCst);
	store.set("access_token", "expired").await?;

	let (response, outcome) = gateway
		.fetch_with_outcome(gateway.request(Method::GET, "/api/student/results")?)
		.await?;

	println!("After revocation the call returned {} ({outcome}).", response.status);
	println!("Browsing context navigations: {:?}.", context.navigations());
	println!("Still authenticated: {}.", gateway.is_authenticated().await?);

	Ok(())
}

#[derive(Debug)]
struct Offline;
impl Display for Offline {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str("Backend is offline.")
	}
}
impl std::error::Error for Offline {}

#[derive(Debug, Default)]
struct ScriptedBackend {
	revoke_refresh: AtomicBool,
}
impl HttpTransport for ScriptedBackend {
	type TransportError = Offline;

	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Offline> {
		let response = match request.url.path() {
			"/api/auth/login" => ApiResponse::new(StatusCode::OK).with_body(
				r#"{"access_token":"A1","refresh_token":"R1","user":{"id":5,"role":"student"}}"#,
			),
			"/api/auth/refresh" if self.revoke_refresh.load(Ordering::SeqCst) =>
				ApiResponse::new(StatusCode::UNAUTHORIZED),
			"/api/auth/refresh" =>
				ApiResponse::new(StatusCode::OK).with_body(r#"{"access_token":"A2"}"#),
			_ if request.bearer_token() == Some("A2") =>
				ApiResponse::new(StatusCode::OK).with_body(r#"[{"test":"fractions","score":88}]"#),
			_ => ApiResponse::new(StatusCode::UNAUTHORIZED),
		};

		Box::pin(async move { Ok(response) })
	}
}
