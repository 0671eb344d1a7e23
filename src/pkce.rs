//! PKCE verifier/challenge generation (RFC 7636) with single-use enforcement.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

pub(crate) const STATE_NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl ChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			ChallengeMethod::S256 => "S256",
		}
	}
}

/// A verifier/challenge pair created for exactly one authorization attempt.
///
/// The challenge travels with the authorization redirect; the verifier is held
/// back until code-exchange time and can be taken out exactly once. Dropping an
/// unconsumed pair abandons the attempt without side effects.
#[derive(Clone)]
pub struct PkcePair {
	verifier: Option<String>,
	challenge: String,
	method: ChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh pair: 64-char alphanumeric verifier, S256 challenge.
	pub fn create() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_challenge(&verifier);

		Self { verifier: Some(verifier), challenge, method: ChallengeMethod::S256 }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn method(&self) -> ChallengeMethod {
		self.method
	}

	/// Takes the verifier out for the code exchange.
	///
	/// Succeeds exactly once; a pair already consumed by an exchange attempt
	/// fails with [`Error::InvalidState`] so an authorization code can never be
	/// replayed with the same proof.
	pub fn consume_verifier(&mut self) -> Result<String> {
		self.verifier.take().ok_or_else(|| Error::InvalidState {
			reason: "PKCE verifier was already consumed by a code exchange".into(),
		})
	}

	/// Returns true once the verifier has been handed to a code exchange.
	pub fn is_consumed(&self) -> bool {
		self.verifier.is_none()
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &self.verifier.as_ref().map(|_| "<redacted>"))
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Generates a random alphanumeric string for verifiers and state nonces.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn challenge_matches_rfc_7636_appendix_b() {
		// Known-answer vector from RFC 7636 Appendix B.
		let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

		assert_eq!(compute_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
	}

	#[test]
	fn verifier_length_and_alphabet_satisfy_the_profile() {
		let pair = PkcePair::create();
		let verifier = pair.verifier.as_deref().expect("Fresh pair should hold a verifier.");

		assert!((43..=128).contains(&verifier.len()));
		assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn verifier_is_single_use() {
		let mut pair = PkcePair::create();
		let first = pair.consume_verifier().expect("First consumption should succeed.");

		assert!(!first.is_empty());
		assert!(pair.is_consumed());

		let err = pair.consume_verifier().expect_err("Second consumption must fail.");

		assert!(matches!(err, Error::InvalidState { .. }));
	}

	#[test]
	fn pairs_are_unique_per_attempt() {
		let lhs = PkcePair::create();
		let rhs = PkcePair::create();

		assert_ne!(lhs.challenge(), rhs.challenge());
	}
}
