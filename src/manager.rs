//! Client-side token lifecycle for one protocol server.
//!
//! [`TokenManager`] owns the whole journey from "never talked to this server"
//! to "valid bearer token in hand": metadata discovery, dynamic client
//! registration, the redirect-based Authorization Code + PKCE exchange, token
//! refresh, and persistence. It is a passive state machine; nothing runs in
//! the background, and expiry and deadlines are enforced lazily at every
//! touch point, so the crate works on any async runtime.

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, ClientMetadata, ScopeSet, TokenResponse, TokenSecret, TokenSet},
	error::TransientError,
	http::{self, HttpRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	pkce::{self, PkcePair, STATE_NONCE_LEN},
	provider::{
		DefaultServerStrategy, GrantType, ServerMetadata, ServerStrategy, TokenErrorContext,
		TokenErrorKind,
	},
	registrar,
	store::{CredentialRecord, CredentialStore},
};

const DEFAULT_AUTHORIZATION_WINDOW: Duration = Duration::seconds(300);

/// Static configuration for one server's authorization relationship.
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Base URL of the protocol server being authorized against.
	pub server_url: Url,
	/// Redirect URI the local callback listener answers on.
	pub redirect_uri: Url,
	/// Scopes requested during authorization.
	pub scopes: ScopeSet,
	/// Registration document override; derived from `redirect_uri` when absent.
	pub client_metadata: Option<ClientMetadata>,
	/// Pre-provisioned credentials; skips dynamic registration when present.
	pub static_credentials: Option<ClientCredentials>,
	/// How long a pending authorization attempt stays valid.
	pub authorization_window: Duration,
}
impl AuthConfig {
	/// Creates a configuration with default scopes and a 300-second window.
	pub fn new(server_url: Url, redirect_uri: Url) -> Self {
		Self {
			server_url,
			redirect_uri,
			scopes: ScopeSet::default(),
			client_metadata: None,
			static_credentials: None,
			authorization_window: DEFAULT_AUTHORIZATION_WINDOW,
		}
	}

	/// Sets the scopes requested during authorization.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets pre-provisioned client credentials.
	pub fn with_static_credentials(mut self, credentials: ClientCredentials) -> Self {
		self.static_credentials = Some(credentials);

		self
	}

	/// Overrides the registration document submitted to the server.
	pub fn with_client_metadata(mut self, metadata: ClientMetadata) -> Self {
		self.client_metadata = Some(metadata);

		self
	}

	/// Overrides the authorization deadline window.
	pub fn with_authorization_window(mut self, window: Duration) -> Self {
		self.authorization_window = window;

		self
	}
}

/// Observable lifecycle states of a [`TokenManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
	/// No credentials or tokens are held.
	Unauthenticated,
	/// An authorization attempt is outstanding and awaiting its callback.
	AuthorizationPending,
	/// A live token set is held.
	Authenticated,
	/// The held token set has passed its expiry (derived, never stored).
	Expired,
	/// A refresh exchange is in flight.
	Refreshing,
	/// Terminal failure; no further automatic attempts happen.
	AuthFailed,
}

/// Result of [`TokenManager::acquire`].
#[derive(Clone, Debug)]
pub enum Acquired {
	/// A live access token ready to attach.
	Bearer(TokenSecret),
	/// Interactive authorization is required; direct the user to this URL.
	Interactive(Url),
}

/// Why a pending authorization attempt ended without a token.
#[derive(Clone, Debug)]
pub(crate) enum AuthFailure {
	CsrfSuspected,
	TimedOut,
	Rejected { reason: String },
	Cancelled,
}
impl AuthFailure {
	fn into_error(self) -> Error {
		match self {
			AuthFailure::CsrfSuspected => Error::CsrfSuspected,
			AuthFailure::TimedOut => Error::AuthorizationTimedOut,
			AuthFailure::Rejected { reason } => Error::AuthFailed { reason },
			AuthFailure::Cancelled =>
				Error::InvalidState { reason: "authorization attempt was cancelled".into() },
		}
	}
}

// One outstanding redirect-based attempt. The completion cell is shared with
// every waiter; resolving it exactly once is what wakes them.
struct AuthorizationState {
	state_nonce: String,
	pkce: PkcePair,
	authorize_url: Url,
	started_at: OffsetDateTime,
	done: Arc<OnceCell<Result<TokenSet, AuthFailure>>>,
}

#[derive(Default)]
struct Inner {
	state: StoredState,
	metadata: Option<ServerMetadata>,
	credentials: Option<ClientCredentials>,
	tokens: Option<TokenSet>,
	pending: Option<AuthorizationState>,
	failure: Option<String>,
	hydrated: bool,
}

// `Expired` is derived from token expiry on read and never stored, so the
// stored state is a strict subset of [`ManagerState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum StoredState {
	#[default]
	Unauthenticated,
	AuthorizationPending,
	Authenticated,
	Refreshing,
	AuthFailed,
}

struct TokenEndpointFailure {
	kind: TokenErrorKind,
	reason: String,
	status: Option<u16>,
	source: Option<Error>,
}

// Restores `Authenticated` if the refresh future is dropped mid-exchange, so
// `state()` never reports an exchange that no longer exists.
struct ExchangeStateReset<'a> {
	inner: &'a RwLock<Inner>,
	armed: bool,
}
impl<'a> ExchangeStateReset<'a> {
	fn new(inner: &'a RwLock<Inner>) -> Self {
		Self { inner, armed: true }
	}

	fn disarm(mut self) {
		self.armed = false;
	}
}
impl Drop for ExchangeStateReset<'_> {
	fn drop(&mut self) {
		if self.armed {
			let mut inner = self.inner.write();

			if inner.state == StoredState::Refreshing {
				inner.state = StoredState::Authenticated;
			}
		}
	}
}

/// Token Manager: the per-server authorization state machine.
///
/// All methods take `&self`; the manager is designed to sit behind an `Arc`
/// and be touched from many tasks at once. Short-lived data accesses go
/// through a synchronous [`RwLock`]; the token endpoint is protected by an
/// async mutex so concurrent refreshes collapse into one network exchange.
pub struct TokenManager {
	config: AuthConfig,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn CredentialStore>,
	strategy: Arc<dyn ServerStrategy>,
	inner: RwLock<Inner>,
	exchange_guard: AsyncMutex<()>,
}
impl TokenManager {
	/// Creates a manager with the default server strategy.
	pub fn new(
		config: AuthConfig,
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn CredentialStore>,
	) -> Self {
		Self {
			config,
			transport,
			store,
			strategy: Arc::new(DefaultServerStrategy),
			inner: RwLock::new(Inner::default()),
			exchange_guard: AsyncMutex::new(()),
		}
	}

	/// Replaces the server strategy used to classify token-endpoint failures.
	pub fn with_strategy(mut self, strategy: Arc<dyn ServerStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Configuration this manager was built with.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Current lifecycle state, with expiry and deadlines applied lazily.
	pub fn state(&self) -> ManagerState {
		self.settle(OffsetDateTime::now_utc());

		let inner = self.inner.read();

		match inner.state {
			StoredState::Unauthenticated => ManagerState::Unauthenticated,
			StoredState::AuthorizationPending => ManagerState::AuthorizationPending,
			StoredState::Authenticated => match &inner.tokens {
				Some(tokens) if tokens.is_expired() => ManagerState::Expired,
				_ => ManagerState::Authenticated,
			},
			StoredState::Refreshing => ManagerState::Refreshing,
			StoredState::AuthFailed => ManagerState::AuthFailed,
		}
	}

	/// Returns a bearer token, or the URL interactive authorization must visit.
	///
	/// An expired token is never handed out: when a refresh token exists the
	/// refresh flow runs first, and only an unrecoverable grant falls through
	/// to a fresh interactive attempt.
	pub async fn acquire(&self) -> Result<Acquired> {
		self.hydrate().await?;

		let now = OffsetDateTime::now_utc();

		self.settle(now);

		let has_refresh = {
			let inner = self.inner.read();

			if inner.state == StoredState::AuthFailed {
				return Err(self.terminal_failure(&inner));
			}
			if let Some(pending) = &inner.pending {
				return Ok(Acquired::Interactive(pending.authorize_url.clone()));
			}
			if let Some(tokens) = &inner.tokens
				&& !tokens.is_expired_at(now)
			{
				return Ok(Acquired::Bearer(tokens.access_token.clone()));
			}

			inner.tokens.as_ref().is_some_and(|t| t.refresh_token.is_some())
		};

		if has_refresh {
			match self.refresh().await {
				Ok(tokens) => return Ok(Acquired::Bearer(tokens.access_token)),
				// Dead grant; fall through and restart the interactive flow.
				Err(Error::TokenExpired | Error::TokenInvalid { .. }) => (),
				Err(e) => return Err(e),
			}
		}

		Ok(Acquired::Interactive(self.begin_authorization().await?))
	}

	/// Starts (or resumes) an interactive authorization attempt.
	///
	/// Ensures server metadata and client credentials exist first, registering
	/// dynamically when the store holds nothing and no static credentials were
	/// configured. At most one attempt is outstanding; calling again while one
	/// is pending returns the same authorize URL.
	pub async fn begin_authorization(&self) -> Result<Url> {
		self.hydrate().await?;

		let now = OffsetDateTime::now_utc();

		self.settle(now);

		{
			let inner = self.inner.read();

			if inner.state == StoredState::AuthFailed {
				return Err(self.terminal_failure(&inner));
			}
			if let Some(pending) = &inner.pending {
				return Ok(pending.authorize_url.clone());
			}
		}

		// Serializes discovery + registration with any in-flight exchange.
		let _guard = self.exchange_guard.lock().await;

		if let Some(pending) = &self.inner.read().pending {
			return Ok(pending.authorize_url.clone());
		}

		let metadata = self.ensure_metadata().await?;
		let credentials = self.ensure_credentials(&metadata).await?;
		let nonce = pkce::random_string(STATE_NONCE_LEN);
		let pair = PkcePair::create();
		let mut authorize_url = metadata.authorization_endpoint.clone();

		{
			let mut pairs = authorize_url.query_pairs_mut();

			pairs
				.append_pair("response_type", "code")
				.append_pair("client_id", &credentials.client_id)
				.append_pair("redirect_uri", self.config.redirect_uri.as_str());

			if !self.config.scopes.is_empty() {
				pairs.append_pair("scope", &self.config.scopes.normalized());
			}

			pairs
				.append_pair("state", &nonce)
				.append_pair("code_challenge", pair.challenge())
				.append_pair("code_challenge_method", pair.method().as_str());
		}

		let mut inner = self.inner.write();

		inner.pending = Some(AuthorizationState {
			state_nonce: nonce,
			pkce: pair,
			authorize_url: authorize_url.clone(),
			started_at: now,
			done: Arc::new(OnceCell::new()),
		});
		inner.state = StoredState::AuthorizationPending;

		Ok(authorize_url)
	}

	/// Finishes the pending attempt with the callback's `state` and `code`.
	///
	/// Fails closed: a missing attempt or an already-consumed verifier is
	/// [`Error::InvalidState`], an expired deadline is
	/// [`Error::AuthorizationTimedOut`], and a state-nonce mismatch is
	/// [`Error::CsrfSuspected`] with no token-endpoint call at all. The last
	/// two are terminal for this manager.
	pub async fn complete_authorization(
		&self,
		received_state: &str,
		code: &str,
	) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let now = OffsetDateTime::now_utc();
		let (verifier, done) = {
			let mut inner = self.inner.write();
			let Some(pending) = inner.pending.as_mut() else {
				return Err(Error::InvalidState {
					reason: "no authorization attempt is pending".into(),
				});
			};

			if now >= pending.started_at + self.config.authorization_window {
				let done = pending.done.clone();

				inner.pending = None;
				inner.state = StoredState::AuthFailed;
				inner.failure = Some("authorization attempt timed out".into());

				let _ = done.set_blocking(Err(AuthFailure::TimedOut));

				return Err(Error::AuthorizationTimedOut);
			}
			if pending.state_nonce != received_state {
				let done = pending.done.clone();

				inner.pending = None;
				inner.state = StoredState::AuthFailed;
				inner.failure =
					Some("authorization callback state did not match the pending attempt".into());

				let _ = done.set_blocking(Err(AuthFailure::CsrfSuspected));

				return Err(Error::CsrfSuspected);
			}

			(pending.pkce.consume_verifier()?, pending.done.clone())
		};
		let metadata = self.ensure_metadata().await?;
		let credentials = self.ensure_credentials(&metadata).await?;
		let mut form = BTreeMap::from_iter([
			("grant_type".to_string(), GrantType::AuthorizationCode.as_str().to_string()),
			("code".to_string(), code.to_string()),
			("redirect_uri".to_string(), self.config.redirect_uri.to_string()),
			("client_id".to_string(), credentials.client_id.clone()),
			("code_verifier".to_string(), verifier),
		]);

		if let Some(secret) = &credentials.client_secret {
			form.insert("client_secret".into(), secret.expose().into());
		}

		self.strategy.augment_token_request(GrantType::AuthorizationCode, &mut form);

		let request = http::form_post(&metadata.token_endpoint, &form)?;
		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span
			.instrument(self.call_token_endpoint(GrantType::AuthorizationCode, request))
			.await;

		match outcome {
			Ok(response) => {
				let tokens = response
					.into_token_set(&self.config.scopes, None, now)
					.map_err(ConfigError::from)?;

				{
					let mut inner = self.inner.write();

					inner.tokens = Some(tokens.clone());
					inner.pending = None;
					inner.state = StoredState::Authenticated;
					inner.failure = None;
				}

				// Wake waiters before the store write so a storage failure
				// cannot leave them suspended on an already-issued token.
				let _ = done.set_blocking(Ok(tokens.clone()));

				self.persist().await?;

				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(tokens)
			},
			Err(failure) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				let TokenEndpointFailure { kind, reason, status, source } = failure;
				let error = match kind {
					TokenErrorKind::InvalidGrant => Error::TokenInvalid { reason: reason.clone() },
					TokenErrorKind::InvalidClient => Error::AuthFailed { reason: reason.clone() },
					TokenErrorKind::InsufficientScope =>
						Error::InsufficientScope { reason: reason.clone() },
					TokenErrorKind::Transient => source.unwrap_or_else(|| {
						TransientError::EndpointResponse { message: reason.clone(), status }.into()
					}),
				};

				{
					let mut inner = self.inner.write();

					inner.pending = None;

					if kind == TokenErrorKind::InvalidClient {
						inner.state = StoredState::AuthFailed;
						inner.failure = Some(reason.clone());
					} else {
						inner.state = if inner.tokens.is_some() {
							StoredState::Authenticated
						} else {
							StoredState::Unauthenticated
						};
					}
				}

				let _ = done.set_blocking(Err(AuthFailure::Rejected { reason }));

				Err(error)
			},
		}
	}

	/// Suspends until the pending attempt resolves, returning its token set.
	///
	/// Resolution happens when [`Self::complete_authorization`] or
	/// [`Self::cancel_authorization`] runs; callers who want a hard bound
	/// should layer their runtime's timeout on top of this future.
	pub async fn wait_authorized(&self) -> Result<TokenSet> {
		let done = {
			let inner = self.inner.read();

			match &inner.pending {
				Some(pending) => pending.done.clone(),
				None =>
					return match inner.state {
						StoredState::Authenticated => inner.tokens.clone().ok_or_else(|| {
							Error::InvalidState {
								reason: "authenticated manager holds no token set".into(),
							}
						}),
						_ => Err(Error::InvalidState {
							reason: "no authorization attempt is pending".into(),
						}),
					},
			}
		};

		match done.wait().await.clone() {
			Ok(tokens) => Ok(tokens),
			Err(failure) => Err(failure.into_error()),
		}
	}

	/// Exchanges the held refresh token for a fresh token set.
	///
	/// Serialized per manager: concurrent callers queue on the exchange guard
	/// and all but the first observe the already-refreshed token without a
	/// second network call. `invalid_grant` clears persisted tokens so the
	/// next acquire restarts the interactive flow; `invalid_client` is
	/// terminal; transient failures leave the expired token in place for a
	/// later retry.
	pub async fn refresh(&self) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::Refresh;

		self.hydrate().await?;

		let _guard = self.exchange_guard.lock().await;
		let now = OffsetDateTime::now_utc();

		// Another caller may have refreshed while this one queued.
		{
			let inner = self.inner.read();

			if inner.state == StoredState::AuthFailed {
				return Err(self.terminal_failure(&inner));
			}
			if let Some(tokens) = &inner.tokens
				&& !tokens.is_expired_at(now)
			{
				return Ok(tokens.clone());
			}
		}

		let Some(refresh_token) =
			self.inner.read().tokens.as_ref().and_then(|t| t.refresh_token.clone())
		else {
			return Err(Error::TokenExpired);
		};
		let metadata = self.ensure_metadata().await?;

		if !metadata.supports_grant(GrantType::RefreshToken) {
			return Err(Error::TokenExpired);
		}

		let credentials = self.ensure_credentials(&metadata).await?;
		let mut form = BTreeMap::from_iter([
			("grant_type".to_string(), GrantType::RefreshToken.as_str().to_string()),
			("refresh_token".to_string(), refresh_token.expose().to_string()),
			("client_id".to_string(), credentials.client_id.clone()),
		]);

		if let Some(secret) = &credentials.client_secret {
			form.insert("client_secret".into(), secret.expose().into());
		}

		self.strategy.augment_token_request(GrantType::RefreshToken, &mut form);

		let request = http::form_post(&metadata.token_endpoint, &form)?;

		self.inner.write().state = StoredState::Refreshing;

		let reset = ExchangeStateReset::new(&self.inner);
		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome =
			span.instrument(self.call_token_endpoint(GrantType::RefreshToken, request)).await;

		reset.disarm();

		match outcome {
			Ok(response) => {
				let tokens = response
					.into_token_set(&self.config.scopes, Some(refresh_token), now)
					.map_err(ConfigError::from)?;

				{
					let mut inner = self.inner.write();

					inner.tokens = Some(tokens.clone());
					inner.state = StoredState::Authenticated;
				}

				self.persist().await?;

				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(tokens)
			},
			Err(failure) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				let TokenEndpointFailure { kind, reason, status, source } = failure;

				match kind {
					TokenErrorKind::InvalidGrant => {
						{
							let mut inner = self.inner.write();

							inner.tokens = None;
							inner.state = StoredState::Unauthenticated;
						}

						self.persist().await?;

						Err(Error::TokenExpired)
					},
					TokenErrorKind::InvalidClient => {
						{
							let mut inner = self.inner.write();

							inner.state = StoredState::AuthFailed;
							inner.failure = Some(reason.clone());
						}

						Err(Error::AuthFailed { reason })
					},
					TokenErrorKind::InsufficientScope => {
						self.inner.write().state = StoredState::Authenticated;

						Err(Error::InsufficientScope { reason })
					},
					TokenErrorKind::Transient => {
						// Token stays in place; readers observe `Expired`.
						self.inner.write().state = StoredState::Authenticated;

						Err(source.unwrap_or_else(|| {
							TransientError::EndpointResponse { message: reason, status }.into()
						}))
					},
				}
			},
		}
	}

	/// Force-expires the held token so the next acquire refreshes or restarts.
	///
	/// A token without a refresh token is dropped outright since nothing could
	/// revive it.
	pub async fn invalidate(&self) -> Result<()> {
		self.hydrate().await?;

		let now = OffsetDateTime::now_utc();

		{
			let mut inner = self.inner.write();

			match inner.tokens.take() {
				Some(tokens) if tokens.refresh_token.is_some() => {
					inner.tokens = Some(tokens.force_expired(now));
				},
				Some(_) =>
					if inner.state == StoredState::Authenticated {
						inner.state = StoredState::Unauthenticated;
					},
				None => return Ok(()),
			}
		}

		self.persist().await
	}

	/// Abandons the pending attempt, waking waiters with an error.
	///
	/// The PKCE pair is dropped unconsumed and the manager returns to
	/// `Unauthenticated`; no token state is touched. A manager with no pending
	/// attempt is left as-is.
	pub fn cancel_authorization(&self) {
		let mut inner = self.inner.write();

		if let Some(pending) = inner.pending.take() {
			let _ = pending.done.set_blocking(Err(AuthFailure::Cancelled));

			if inner.state == StoredState::AuthorizationPending {
				inner.state = StoredState::Unauthenticated;
			}
		}
	}

	// Applies the lazy authorization deadline. Called from every touch point
	// instead of scheduling a timer, keeping the crate runtime-agnostic.
	fn settle(&self, now: OffsetDateTime) {
		let mut inner = self.inner.write();

		if let Some(pending) =
			inner.pending.take_if(|p| now >= p.started_at + self.config.authorization_window)
		{
			inner.state = StoredState::AuthFailed;
			inner.failure = Some("authorization attempt timed out".into());

			let _ = pending.done.set_blocking(Err(AuthFailure::TimedOut));
		}
	}

	fn terminal_failure(&self, inner: &Inner) -> Error {
		Error::AuthFailed {
			reason: inner
				.failure
				.clone()
				.unwrap_or_else(|| "previous authorization attempt failed".into()),
		}
	}

	// Loads the persisted record exactly once per manager lifetime.
	async fn hydrate(&self) -> Result<()> {
		if self.inner.read().hydrated {
			return Ok(());
		}

		let record = self.store.load().await?;
		let mut inner = self.inner.write();

		if inner.hydrated {
			return Ok(());
		}

		inner.hydrated = true;

		if let Some(record) = record {
			if inner.credentials.is_none() {
				inner.credentials = record.credentials;
			}
			if inner.tokens.is_none()
				&& inner.state == StoredState::Unauthenticated
				&& let Some(tokens) = record.tokens
			{
				inner.tokens = Some(tokens);
				inner.state = StoredState::Authenticated;
			}
		}

		Ok(())
	}

	async fn ensure_metadata(&self) -> Result<ServerMetadata> {
		if let Some(metadata) = self.inner.read().metadata.clone() {
			return Ok(metadata);
		}

		let metadata =
			registrar::discover_metadata(self.transport.as_ref(), &self.config.server_url).await?;

		self.inner.write().metadata = Some(metadata.clone());

		Ok(metadata)
	}

	async fn ensure_credentials(&self, metadata: &ServerMetadata) -> Result<ClientCredentials> {
		if let Some(credentials) = self.inner.read().credentials.clone() {
			return Ok(credentials);
		}

		let client_metadata = self.config.client_metadata.clone().unwrap_or_else(|| {
			let document = ClientMetadata::for_redirect(self.config.redirect_uri.clone());

			if self.config.scopes.is_empty() {
				document
			} else {
				document.with_scope(self.config.scopes.normalized())
			}
		});
		let credentials = registrar::register_client(
			self.transport.as_ref(),
			metadata,
			&client_metadata,
			self.config.static_credentials.as_ref(),
		)
		.await?;

		self.inner.write().credentials = Some(credentials.clone());
		self.persist().await?;

		Ok(credentials)
	}

	async fn persist(&self) -> Result<()> {
		let record = {
			let inner = self.inner.read();

			CredentialRecord {
				credentials: inner.credentials.clone(),
				tokens: inner.tokens.clone(),
			}
		};

		Ok(self.store.save(record).await?)
	}

	async fn call_token_endpoint(
		&self,
		grant: GrantType,
		request: HttpRequest,
	) -> Result<TokenResponse, TokenEndpointFailure> {
		let response = match self.transport.send(request).await {
			Ok(response) => response,
			Err(e) => {
				let ctx = TokenErrorContext::network_failure(grant);

				return Err(TokenEndpointFailure {
					kind: self.strategy.classify_token_error(&ctx),
					reason: ctx.reason(),
					status: None,
					source: Some(e.into()),
				});
			},
		};
		let status = response.status();

		if !status.is_success() {
			let mut ctx = TokenErrorContext::new(grant).with_http_status(status.as_u16());

			match http::parse_json::<OAuthErrorBody>(&response) {
				Ok(body) => {
					if let Some(error) = body.error {
						ctx = ctx.with_oauth_error(error);
					}
					if let Some(description) = body.error_description {
						ctx = ctx.with_error_description(description);
					}
				},
				Err(_) => ctx = ctx.with_body_preview(http::body_preview(&response)),
			}

			return Err(TokenEndpointFailure {
				kind: self.strategy.classify_token_error(&ctx),
				reason: ctx.reason(),
				status: Some(status.as_u16()),
				source: None,
			});
		}

		http::parse_json::<TokenResponse>(&response).map_err(|e| {
			let reason = format!("malformed token response: {e}");

			TokenEndpointFailure {
				kind: TokenErrorKind::Transient,
				reason,
				status: Some(status.as_u16()),
				source: Some(e.into()),
			}
		})
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("server_url", &self.config.server_url.as_str())
			.field("state", &self.inner.read().state)
			.finish()
	}
}

// Error payload an OAuth token endpoint returns on failure (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}
