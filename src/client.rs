//! Outbound request authorization: attach a bearer token, retry once on 401/403.

// crates.io
use http::{
	HeaderValue,
	header::AUTHORIZATION,
	request::Parts,
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{HttpRequest, HttpResponse, HttpTransport},
	manager::{Acquired, TokenManager},
};

/// Callback seam for interactive authorization.
///
/// Implementations typically open the user's browser at the authorize URL or
/// print it for the user to visit; the callback listener feeding
/// [`TokenManager::complete_authorization`] lives outside this crate.
pub trait AuthorizationHandler
where
	Self: Send + Sync,
{
	/// Called when a request cannot proceed without interactive authorization.
	fn on_authorization_required(&self, authorize_url: &Url);
}

/// Wraps a transport so every request carries a live bearer token.
///
/// The authorizer drives the manager as far as needed before each dispatch:
/// discovery, registration, refresh, or a full interactive attempt (suspending
/// on [`TokenManager::wait_authorized`] until the callback resolves it). A
/// 401 or 403 answer invalidates the cached token and retries exactly once;
/// a second rejection is surfaced as [`Error::AuthorizationDenied`].
pub struct RequestAuthorizer {
	manager: Arc<TokenManager>,
	transport: Arc<dyn HttpTransport>,
	handler: Option<Arc<dyn AuthorizationHandler>>,
}
impl RequestAuthorizer {
	/// Creates an authorizer without an interactive handler.
	pub fn new(manager: Arc<TokenManager>, transport: Arc<dyn HttpTransport>) -> Self {
		Self { manager, transport, handler: None }
	}

	/// Attaches the handler notified when interactive authorization is needed.
	pub fn with_handler(mut self, handler: Arc<dyn AuthorizationHandler>) -> Self {
		self.handler = Some(handler);

		self
	}

	/// Manager this authorizer drives.
	pub fn manager(&self) -> &Arc<TokenManager> {
		&self.manager
	}

	/// Dispatches the request with a bearer token attached.
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		let (parts, body) = request.into_parts();
		let token = self.bearer().await?;
		let response = self.transport.send(with_bearer(&parts, &body, &token)?).await?;
		let status = response.status();

		if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
			return Ok(response);
		}

		// The server no longer accepts the token; refresh or re-authorize,
		// then retry exactly once.
		self.manager.invalidate().await?;

		let token = self.bearer().await?;
		let response = self.transport.send(with_bearer(&parts, &body, &token)?).await?;
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
			return Err(Error::AuthorizationDenied { status: status.as_u16() });
		}

		Ok(response)
	}

	async fn bearer(&self) -> Result<TokenSecret> {
		match self.manager.acquire().await? {
			Acquired::Bearer(token) => Ok(token),
			Acquired::Interactive(authorize_url) => {
				if let Some(handler) = &self.handler {
					handler.on_authorization_required(&authorize_url);
				}

				Ok(self.manager.wait_authorized().await?.access_token)
			},
		}
	}
}
impl Debug for RequestAuthorizer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestAuthorizer")
			.field("manager", &self.manager)
			.field("handler", &self.handler.as_ref().map(|_| ".."))
			.finish()
	}
}

// Rebuilds the request for one attempt; `http::Request` itself is not `Clone`.
fn with_bearer(parts: &Parts, body: &[u8], token: &TokenSecret) -> Result<HttpRequest> {
	let mut request = http::Request::builder()
		.method(parts.method.clone())
		.uri(parts.uri.clone())
		.version(parts.version)
		.body(body.to_vec())
		.map_err(ConfigError::from)?;

	*request.headers_mut() = parts.headers.clone();

	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
		.map_err(|e| ConfigError::from(http::Error::from(e)))?;

	value.set_sensitive(true);
	request.headers_mut().insert(AUTHORIZATION, value);

	Ok(request)
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::{ACCEPT, HeaderMap};
	// self
	use super::*;

	#[test]
	fn bearer_header_is_attached_and_marked_sensitive() {
		let request = http::Request::get("https://api.example.com/resource")
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.expect("Request fixture should build.");
		let (parts, body) = request.into_parts();
		let rebuilt = with_bearer(&parts, &body, &TokenSecret::new("tok-1"))
			.expect("Attaching the bearer header should succeed.");
		let header =
			rebuilt.headers().get(AUTHORIZATION).expect("Authorization header should be present.");

		assert_eq!(header.to_str().expect("Header should be ASCII."), "Bearer tok-1");
		assert!(header.is_sensitive());
		assert!(rebuilt.headers().contains_key(ACCEPT));
	}

	#[test]
	fn rebuilding_replaces_a_stale_bearer_header() {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

		let mut request = http::Request::post("https://api.example.com/resource")
			.body(b"payload".to_vec())
			.expect("Request fixture should build.");

		*request.headers_mut() = headers;

		let (parts, body) = request.into_parts();
		let rebuilt = with_bearer(&parts, &body, &TokenSecret::new("fresh"))
			.expect("Attaching the bearer header should succeed.");

		assert_eq!(
			rebuilt.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer fresh"),
		);
		assert_eq!(rebuilt.body().as_slice(), b"payload");
	}
}
