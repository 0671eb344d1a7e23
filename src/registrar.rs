//! Metadata discovery (RFC 8414) and one-shot dynamic client registration (RFC 7591).

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, ClientMetadata},
	error::TransientError,
	http::{self, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ServerMetadata,
};

/// Fetches the authorization server's metadata document.
///
/// A 404 on the well-known URL means the server publishes no metadata; the
/// protocol-default endpoints derived from the server URL apply instead. Any
/// other non-2xx response or a malformed body is surfaced to the caller.
pub async fn discover_metadata(
	transport: &dyn HttpTransport,
	server_url: &Url,
) -> Result<ServerMetadata> {
	const KIND: FlowKind = FlowKind::Discovery;

	let span = FlowSpan::new(KIND, "discover_metadata");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			let discovery_url = ServerMetadata::discovery_url(server_url)?;
			let response = transport.send(http::get(&discovery_url)?).await?;
			let status = response.status();

			if status == StatusCode::NOT_FOUND {
				return Ok(ServerMetadata::default_for(server_url)?);
			}
			if !status.is_success() {
				return Err(TransientError::EndpointResponse {
					message: format!("metadata discovery returned {}", status.as_u16()),
					status: Some(status.as_u16()),
				}
				.into());
			}

			Ok(http::parse_json::<ServerMetadata>(&response)?)
		})
		.await;

	match &result {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
	}

	result
}

/// Obtains client credentials, registering dynamically only when necessary.
///
/// Pre-provisioned credentials short-circuit the call. Otherwise a single
/// registration request is issued; failures are never retried here because
/// registration can have server-side side effects, so the operator must see
/// the failure instead.
pub async fn register_client(
	transport: &dyn HttpTransport,
	metadata: &ServerMetadata,
	client_metadata: &ClientMetadata,
	static_credentials: Option<&ClientCredentials>,
) -> Result<ClientCredentials> {
	if let Some(credentials) = static_credentials {
		return Ok(credentials.clone());
	}

	const KIND: FlowKind = FlowKind::Registration;

	let span = FlowSpan::new(KIND, "register_client");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			let endpoint =
				metadata.registration_endpoint.as_ref().ok_or_else(|| Error::RegistrationFailed {
					status: None,
					reason: "server metadata declares no registration endpoint".into(),
				})?;
			let response = transport.send(http::json_post(endpoint, client_metadata)?).await?;
			let status = response.status();

			if !status.is_success() {
				return Err(Error::RegistrationFailed {
					status: Some(status.as_u16()),
					reason: http::body_preview(&response),
				});
			}

			http::parse_json::<ClientCredentials>(&response).map_err(|e| {
				Error::RegistrationFailed {
					status: Some(status.as_u16()),
					reason: format!("malformed registration response: {e}"),
				}
			})
		})
		.await;

	match &result {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
	}

	result
}
