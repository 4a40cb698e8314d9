//! Token record model, validity checks, and builder.

// self
use crate::{
	_prelude::*,
	auth::{
		ProfileId, ProviderId,
		token::{key::CredentialKey, secret::TokenSecret},
	},
	clock,
};

/// Current lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// The access token is empty or whitespace; the record cannot authenticate anything.
	Unusable,
	/// The record carries no expiry metadata and is treated as valid until a call fails.
	NonExpiring,
	/// Token is valid outside the requested buffer.
	Active,
	/// Token expired or falls inside the requested buffer.
	Expired,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when a relative expiry lands outside the representable time range.
	#[error("Relative expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Most recently known state of one shared OAuth credential.
///
/// Serialized as `{access, refresh?, expires?, provider, profile?}` with `expires` in epoch
/// milliseconds. Records are replaced whole; nothing in this crate merges two cached records.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Access token secret; callers must avoid logging it.
	pub access: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh: Option<TokenSecret>,
	/// Absolute expiry instant, if the provider reported one.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "clock::unix_millis::option")]
	pub expires: Option<OffsetDateTime>,
	/// Provider that minted the credential.
	pub provider: ProviderId,
	/// Profile within the provider; `None` means the default profile.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<ProfileId>,
}
impl TokenRecord {
	/// Returns a builder for a record minted by `provider`.
	pub fn builder(provider: ProviderId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(provider)
	}

	/// Identity key shared by every record of this credential.
	pub fn key(&self) -> CredentialKey {
		CredentialKey::new(&self.provider, self.profile.as_ref())
	}

	/// Computes the lifecycle status at `instant`, treating the final `buffer` before expiry
	/// as already expired.
	pub fn status_at(&self, instant: OffsetDateTime, buffer: Duration) -> TokenStatus {
		if self.access.is_blank() {
			return TokenStatus::Unusable;
		}

		let Some(expires) = self.expires else {
			return TokenStatus::NonExpiring;
		};
		let buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		// A threshold below the representable range means every instant is past it.
		match expires.checked_sub(buffer) {
			Some(threshold) if instant < threshold => TokenStatus::Active,
			_ => TokenStatus::Expired,
		}
	}

	/// Returns `true` if the record can be used at `instant` without refreshing first.
	pub fn is_valid_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		matches!(self.status_at(instant, buffer), TokenStatus::Active | TokenStatus::NonExpiring)
	}

	/// Same as [`TokenRecord::is_valid_at`] against the current UTC clock.
	pub fn is_valid(&self, buffer: Duration) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc(), buffer)
	}

	/// Copies the credential fields of a freshly refreshed record into `self`.
	///
	/// `access` and `expires` are always replaced. `refresh` is replaced only when the fresh
	/// record carries one, since providers that do not rotate refresh tokens omit it.
	pub fn merge_refreshed(&mut self, fresh: &TokenRecord) {
		self.access = fresh.access.clone();
		self.expires = fresh.expires;

		if let Some(refresh) = &fresh.refresh {
			self.refresh = Some(refresh.clone());
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access", &"<redacted>")
			.field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
			.field("expires", &self.expires)
			.field("provider", &self.provider)
			.field("profile", &self.profile)
			.finish()
	}
}

/// Pure validity predicate: non-blank access token and, when an expiry is known, `now` earlier
/// than `expires - buffer`.
pub fn is_token_valid(token: &TokenRecord, buffer: Duration) -> bool {
	token.is_valid(buffer)
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	provider: ProviderId,
	profile: Option<ProfileId>,
	access: Option<TokenSecret>,
	refresh: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(provider: ProviderId) -> Self {
		Self {
			provider,
			profile: None,
			access: None,
			refresh: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Binds the record to a non-default profile.
	pub fn profile(mut self, profile: ProfileId) -> Self {
		self.profile = Some(profile);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry measured from the moment [`TokenRecordBuilder::build`] runs.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	///
	/// Expiry instants are truncated to millisecond precision, matching what the cache stores.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access = self.access.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let expires = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(
				OffsetDateTime::now_utc()
					.checked_add(delta)
					.ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			),
			(None, None) => None,
		};

		Ok(TokenRecord {
			access,
			refresh: self.refresh,
			expires: expires.map(clock::truncate_to_millis),
			provider: self.provider,
			profile: self.profile,
		})
	}
}
