//! Identity keys naming one external credential (provider + profile).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ProfileId, ProviderId},
};

/// Filesystem-safe identity of a shared credential.
///
/// The key is the unpadded URL-safe base64 encoding of
/// `SHA-256(provider + "-" + (profile or "default"))`. Two token records with the same key
/// refer to the same credential and are interchangeable cache entries; lock and cache files are
/// named after it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialKey(String);
impl CredentialKey {
	/// Derives the key for a provider and optional profile.
	pub fn new(provider: &ProviderId, profile: Option<&ProfileId>) -> Self {
		let profile = profile.map(AsRef::as_ref).unwrap_or(ProfileId::DEFAULT);
		let digest = Sha256::digest(format!("{provider}-{profile}").as_bytes());

		Self(URL_SAFE_NO_PAD.encode(digest))
	}

	/// Returns the encoded key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for CredentialKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CredentialKey({})", self.0)
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
