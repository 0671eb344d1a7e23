//! Transport seam consumed by every outbound gatekeeper request.
//!
//! The core never owns an HTTP stack. It builds [`HttpRequest`] values, hands
//! them to an [`HttpTransport`] implementation, and interprets the returned
//! status + headers + body. The default implementation wraps reqwest behind the
//! `reqwest` feature; anything that can execute a request can be plugged in,
//! including in-process fakes for tests.

// crates.io
use http::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TransientError};

/// Outbound request: method + URI + headers + body bytes.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Inbound response: status + headers + body bytes.
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Minimal "send request, receive status + headers + body" capability.
///
/// Implementations must be safe to share across concurrent flows; the
/// gatekeeper issues token, registration, and introspection calls from many
/// tasks at once. Connection pooling and retry policy belong to the
/// implementation, not to this crate.
pub trait HttpTransport
where
	Self: Send + Sync,
{
	/// Executes the request, returning the full buffered response.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds a form-encoded POST, the shape every OAuth token endpoint expects.
pub(crate) fn form_post(
	url: &Url,
	form: &BTreeMap<String, String>,
) -> Result<HttpRequest, ConfigError> {
	let mut serializer = url::form_urlencoded::Serializer::new(String::new());

	for (key, value) in form {
		serializer.append_pair(key, value);
	}

	let body = serializer.finish().into_bytes();

	Ok(http::Request::post(url.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(body)?)
}

/// Builds a JSON POST for registration documents.
pub(crate) fn json_post(url: &Url, payload: &impl Serialize) -> Result<HttpRequest, Error> {
	let body = serde_json::to_vec(payload).map_err(|e| TransientError::EndpointResponse {
		message: format!("Failed to serialize request body: {e}"),
		status: None,
	})?;

	Ok(http::Request::post(url.as_str())
		.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(body)
		.map_err(ConfigError::from)?)
}

/// Builds a bare GET for metadata discovery.
pub(crate) fn get(url: &Url) -> Result<HttpRequest, ConfigError> {
	Ok(http::Request::get(url.as_str()).header(ACCEPT, JSON_CONTENT_TYPE).body(Vec::new())?)
}

/// Parses a JSON response body, keeping the failing path in the error.
pub(crate) fn parse_json<T>(response: &HttpResponse) -> Result<T, TransientError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		TransientError::ResponseParse { source, status: Some(response.status().as_u16()) }
	})
}

/// UTF-8 preview of a response body for error reporting; never the whole payload.
pub(crate) fn body_preview(response: &HttpResponse) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(response.body());

	text.chars().take(LIMIT).collect()
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token requests should not follow redirects, matching OAuth 2.0 guidance that
/// token endpoints return results directly instead of delegating to another URI.
/// Configure any custom [`ReqwestClient`] accordingly before wrapping it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request =
				reqwest::Request::try_from(request).map_err(TransportError::network)?;
			let response = client.execute(request).await.map_err(TransportError::network)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::network)?.to_vec();
			let mut buffered = HttpResponse::new(body);

			*buffered.status_mut() = status;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}
