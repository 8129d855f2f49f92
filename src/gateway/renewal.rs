//! Credential renewal with a single shared in-flight exchange.
//!
//! [`Gateway::renew_credentials`] performs one refresh-endpoint exchange. The fetch path never
//! calls it directly; it goes through the gateway's [`RenewalSlot`], which holds at most one
//! pending renewal. The first caller to observe a 401 installs the renewal, later callers await
//! the same handle, and the slot is emptied once the renewal settles. Session teardown (erasing
//! the credentials and redirecting to the login page) runs inside the shared renewal, so it
//! happens once per failed renewal no matter how many callers were waiting.
//!
//! The slot holds only a weak handle. A renewal whose waiters were all dropped is dropped with
//! them, and the next 401 starts a fresh exchange against whatever is stored by then.

mod metrics;

pub use metrics::RenewalMetrics;

// crates.io
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::RenewalError,
	gateway::Gateway,
	http::{self, ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
};

type RenewalOutcome = Result<TokenSecret, RenewalError>;
type SharedRenewal = Shared<BoxFuture<'static, RenewalOutcome>>;
type WeakRenewal = WeakShared<BoxFuture<'static, RenewalOutcome>>;

#[derive(Serialize)]
struct RefreshRequest<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
	access_token: String,
}

/// Single-slot holder for the in-flight renewal shared by a gateway and its clones.
#[derive(Default)]
pub(crate) struct RenewalSlot(Mutex<SlotState>);
impl RenewalSlot {
	/// Returns a handle to the in-flight renewal, installing the one built by `start` when the
	/// slot is empty.
	fn join_or_start<F>(&self, start: F) -> RenewalTicket
	where
		F: FnOnce() -> BoxFuture<'static, RenewalOutcome>,
	{
		let mut state = self.0.lock();

		if let Some((id, renewal)) = state.live() {
			return RenewalTicket { id, renewal, started: false };
		}

		let id = state.next_id;
		let renewal = start().shared();

		state.next_id = state.next_id.wrapping_add(1);
		state.in_flight = renewal.downgrade().map(|weak| (id, weak));

		RenewalTicket { id, renewal, started: true }
	}

	/// Empties the slot if it still holds renewal `id`.
	fn settle(&self, id: u64) {
		let mut state = self.0.lock();

		if matches!(&state.in_flight, Some((current, _)) if *current == id) {
			state.in_flight = None;
		}
	}

	pub(crate) fn is_in_flight(&self) -> bool {
		self.0.lock().live().is_some()
	}
}

#[derive(Default)]
struct SlotState {
	next_id: u64,
	in_flight: Option<(u64, WeakRenewal)>,
}
impl SlotState {
	// Abandoned renewals fail to upgrade and are treated as an empty slot.
	fn live(&self) -> Option<(u64, SharedRenewal)> {
		let (id, weak) = self.in_flight.as_ref()?;

		weak.upgrade().map(|renewal| (*id, renewal))
	}
}

struct RenewalTicket {
	id: u64,
	renewal: SharedRenewal,
	started: bool,
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges the stored refresh credential for a new access credential.
	///
	/// The new access token is written to storage and returned; the refresh credential is kept
	/// as-is. A non-success answer from the refresh endpoint erases the access credential, the
	/// refresh credential, and the cached identity before failing. This is the raw exchange:
	/// it neither shares work with concurrent callers nor redirects the browsing context.
	pub async fn renew_credentials(&self) -> Result<TokenSecret, RenewalError> {
		self.renewal_metrics.record_attempt();

		let result = self.exchange_refresh_token().await;

		match &result {
			Ok(_) => self.renewal_metrics.record_success(),
			Err(_) => self.renewal_metrics.record_failure(),
		}

		result
	}

	/// Awaits the in-flight renewal, starting one if none is pending.
	pub(super) async fn await_renewal(&self) -> RenewalOutcome {
		let ticket = self.renewals.join_or_start(|| {
			let gateway = self.clone();

			async move { gateway.renew_session().await }.boxed()
		});

		if ticket.started {
			flow_event!(debug, "Starting credential renewal.");
		} else {
			self.renewal_metrics.record_joined();

			flow_event!(debug, "Awaiting in-flight credential renewal.");
		}

		let outcome = ticket.renewal.await;

		self.renewals.settle(ticket.id);

		outcome
	}

	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn renew_session(&self) -> RenewalOutcome {
		const KIND: FlowKind = FlowKind::Renewal;

		let span = FlowSpan::new(KIND, "renew_session");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				self.renew_credentials().await?;

				self.vault().access_token().await?.ok_or(RenewalError::MissingAccessToken)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				flow_event!(warn, error = %err, "Credential renewal failed; ending session.");

				self.end_session().await;
			},
		}

		result
	}

	/// Erases the session entries and sends the browsing context to the login page unless it
	/// is already there.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	pub(super) async fn end_session(&self) {
		if let Err(e) = self.vault().clear().await {
			flow_event!(warn, error = %e, "Failed to erase session credentials.");
		}
		if !self.config.is_login_page(&self.context.current_path()) {
			self.context.navigate(&self.config.routes.login_page);
		}
	}

	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn exchange_refresh_token(&self) -> RenewalOutcome {
		let vault = self.vault();
		let refresh = vault.refresh_token().await?.ok_or(RenewalError::MissingRefreshToken)?;
		let request = self.refresh_request(&refresh)?;
		let response = self
			.transport
			.send(request)
			.await
			.map_err(|e| RenewalError::Transport { message: e.to_string() })?;

		if !response.is_success() {
			let status = response.status.as_u16();

			if let Err(e) = vault.clear().await {
				flow_event!(warn, error = %e, "Failed to erase credentials after rejected renewal.");
			}

			return Err(RenewalError::Rejected { status });
		}

		let payload = response
			.json::<RefreshResponse>()
			.map_err(|e| RenewalError::MalformedResponse { message: e.to_string() })?;
		let token = TokenSecret::new(payload.access_token);

		if token.expose().is_empty() || !http::is_header_safe(&token) {
			return Err(RenewalError::MalformedResponse {
				message: "access_token is not a usable bearer credential".into(),
			});
		}

		vault.set_access_token(&token).await?;

		Ok(token)
	}

	fn refresh_request(&self, refresh: &TokenSecret) -> Result<ApiRequest, RenewalError> {
		let url = self
			.config
			.resolve(&self.config.routes.refresh)
			.map_err(|e| RenewalError::Request { message: e.to_string() })?;

		ApiRequest::post(url)
			.json(&RefreshRequest { refresh_token: refresh.expose() })
			.map_err(|e| RenewalError::Request { message: e.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use ::http::StatusCode;
	use tokio::sync::Notify;
	// self
	use super::*;
	use crate::{
		_preludet::test_config,
		context::DetachedContext,
		http::{ApiResponse, TransportFuture},
		store::{MemoryStore, SessionStore},
	};

	#[derive(Debug, ThisError)]
	#[error("Unreachable.")]
	struct Unreachable;

	/// Protected routes answer 401 unless signed with `Bearer A2`; the refresh endpoint answers
	/// only after the gate is opened.
	struct GatedTransport {
		gate: Arc<Notify>,
		refresh_status: StatusCode,
		refresh_calls: AtomicUsize,
		seen: Mutex<Vec<ApiRequest>>,
	}
	impl GatedTransport {
		fn new(refresh_status: StatusCode) -> Self {
			Self {
				gate: Default::default(),
				refresh_status,
				refresh_calls: AtomicUsize::new(0),
				seen: Default::default(),
			}
		}
	}
	impl HttpTransport for GatedTransport {
		type TransportError = Unreachable;

		fn send(&self, request: ApiRequest) -> TransportFuture<'_, Unreachable> {
			let is_refresh = request.url.path() == "/api/auth/refresh";
			let authorized = request.bearer_token() == Some("A2");

			self.seen.lock().push(request);

			if is_refresh {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);

				let gate = self.gate.clone();
				let status = self.refresh_status;

				return Box::pin(async move {
					gate.notified().await;

					Ok(ApiResponse::new(status).with_body(r#"{"access_token":"A2"}"#))
				});
			}

			let status = if authorized { StatusCode::OK } else { StatusCode::UNAUTHORIZED };

			Box::pin(async move { Ok(ApiResponse::new(status)) })
		}
	}

	fn gateway(
		transport: Arc<GatedTransport>,
	) -> (Gateway<GatedTransport>, Arc<MemoryStore>, Arc<DetachedContext>) {
		let config = test_config("https://zedly.example");
		let store = Arc::new(MemoryStore::default());
		let context = Arc::new(DetachedContext::new("/student/dashboard"));
		let gateway = Gateway::with_transport(config, transport, store.clone(), context.clone());

		(gateway, store, context)
	}

	async fn seed_expired_session(store: &MemoryStore) {
		store.set("access_token", "expired").await.expect("Seeding access token should succeed.");
		store.set("refresh_token", "R1").await.expect("Seeding refresh token should succeed.");
		store.set("user", "{\"id\":1}").await.expect("Seeding user should succeed.");
	}

	#[tokio::test]
	async fn concurrent_401s_share_one_renewal() {
		let transport = Arc::new(GatedTransport::new(StatusCode::OK));
		let (gateway, store, _context) = gateway(transport.clone());

		seed_expired_session(&store).await;

		let targets = (0..5).map(|idx| format!("/api/student/tests/{idx}")).collect::<Vec<_>>();
		let calls = futures::future::join_all(targets.iter().map(|target| gateway.get(target)));
		let release = async {
			while gateway.renewal_metrics.joined() < 4 {
				tokio::task::yield_now().await;
			}

			transport.gate.notify_one();
		};
		let (results, ()) = tokio::join!(calls, release);

		for result in results {
			let response = result.expect("Every call should resolve to a response.");

			assert_eq!(response.status, StatusCode::OK);
		}

		assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(gateway.renewal_metrics.attempts(), 1);
		assert_eq!(gateway.renewal_metrics.successes(), 1);
		assert!(!gateway.renewal_in_flight());

		let retries = transport
			.seen
			.lock()
			.iter()
			.filter(|request| request.bearer_token() == Some("A2"))
			.count();

		assert_eq!(retries, 5);
		assert_eq!(store.snapshot().get("refresh_token").map(String::as_str), Some("R1"));
	}

	#[tokio::test]
	async fn abandoned_renewal_is_not_joined_by_later_calls() {
		let transport = Arc::new(GatedTransport::new(StatusCode::OK));
		let (gateway, store, context) = gateway(transport.clone());

		seed_expired_session(&store).await;

		let abandoned =
			tokio::time::timeout(std::time::Duration::from_millis(50), gateway.get("/api/x")).await;

		assert!(abandoned.is_err());
		assert!(!gateway.renewal_in_flight());
		assert_eq!(Arc::strong_count(&transport), 2);

		// A new login lands while the first exchange is still unanswered.
		store.set("access_token", "expired2").await.expect("Re-login should succeed.");
		store.set("refresh_token", "R2").await.expect("Re-login should succeed.");
		transport.gate.notify_one();

		let response = gateway.get("/api/y").await.expect("Call should resolve to a response.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(store.snapshot().get("access_token").map(String::as_str), Some("A2"));
		assert_eq!(store.snapshot().get("refresh_token").map(String::as_str), Some("R2"));
		assert!(context.navigations().is_empty());

		let refresh_bodies = transport
			.seen
			.lock()
			.iter()
			.filter(|request| request.url.path() == "/api/auth/refresh")
			.map(|request| request.body.clone().unwrap_or_default())
			.collect::<Vec<_>>();

		assert_eq!(
			refresh_bodies,
			vec![br#"{"refresh_token":"R1"}"#.to_vec(), br#"{"refresh_token":"R2"}"#.to_vec()],
		);
	}

	#[tokio::test]
	async fn concurrent_failed_renewal_tears_down_once() {
		let transport = Arc::new(GatedTransport::new(StatusCode::UNAUTHORIZED));
		let (gateway, store, context) = gateway(transport.clone());

		seed_expired_session(&store).await;

		let targets = (0..3).map(|idx| format!("/api/teacher/classes/{idx}")).collect::<Vec<_>>();
		let calls = futures::future::join_all(targets.iter().map(|target| gateway.get(target)));
		let release = async {
			while gateway.renewal_metrics.joined() < 2 {
				tokio::task::yield_now().await;
			}

			transport.gate.notify_one();
		};
		let (results, ()) = tokio::join!(calls, release);

		for result in results {
			let response = result.expect("Renewal failures must not surface as errors.");

			assert_eq!(response.status, StatusCode::UNAUTHORIZED);
		}

		assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 1);
		assert_eq!(gateway.renewal_metrics.failures(), 1);
		assert!(store.is_empty());
		assert_eq!(context.navigations(), vec!["/login".to_owned()]);
		assert!(!gateway.renewal_in_flight());
	}

	#[tokio::test]
	async fn renew_credentials_posts_refresh_token_and_keeps_it() {
		let transport = Arc::new(GatedTransport::new(StatusCode::OK));
		let (gateway, store, context) = gateway(transport.clone());

		seed_expired_session(&store).await;
		transport.gate.notify_one();

		let token = gateway.renew_credentials().await.expect("Renewal should succeed.");

		assert_eq!(token.expose(), "A2");
		assert_eq!(store.snapshot().get("access_token").map(String::as_str), Some("A2"));
		assert_eq!(store.snapshot().get("refresh_token").map(String::as_str), Some("R1"));

		let seen = transport.seen.lock();
		let body: serde_json::Value = serde_json::from_slice(
			seen[0].body.as_deref().expect("Refresh request should carry a body."),
		)
		.expect("Refresh body should be JSON.");

		assert_eq!(body, serde_json::json!({ "refresh_token": "R1" }));
		assert!(!seen[0].has_authorization());
		assert!(context.navigations().is_empty());
	}

	#[tokio::test]
	async fn renew_credentials_without_refresh_token_fails_fast() {
		let transport = Arc::new(GatedTransport::new(StatusCode::OK));
		let (gateway, _store, _context) = gateway(transport.clone());
		let err = gateway
			.renew_credentials()
			.await
			.expect_err("Renewal cannot start without a refresh token.");

		assert_eq!(err, RenewalError::MissingRefreshToken);
		assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn rejected_renewal_clears_credentials() {
		let transport = Arc::new(GatedTransport::new(StatusCode::UNAUTHORIZED));
		let (gateway, store, _context) = gateway(transport.clone());

		seed_expired_session(&store).await;
		transport.gate.notify_one();

		let err = gateway.renew_credentials().await.expect_err("Rejected renewals should fail.");

		assert_eq!(err, RenewalError::Rejected { status: 401 });
		assert!(store.is_empty());
	}

	#[test]
	fn slot_settles_only_matching_renewal() {
		let slot = RenewalSlot::default();
		let first = slot.join_or_start(|| async { Err(RenewalError::MissingRefreshToken) }.boxed());
		let joined = slot.join_or_start(|| unreachable!("The slot already holds a renewal."));

		assert!(first.started);
		assert!(!joined.started);
		assert_eq!(first.id, joined.id);

		slot.settle(first.id + 1);

		assert!(slot.is_in_flight());

		slot.settle(first.id);

		assert!(!slot.is_in_flight());

		let second = slot.join_or_start(|| async { Err(RenewalError::MissingAccessToken) }.boxed());

		assert!(second.started);
		assert_ne!(second.id, first.id);

		drop(second);

		assert!(!slot.is_in_flight());
	}
}
