//! Heuristic detection of downstream failures caused by an invalidated or expired credential.
//!
//! Downstream APIs rarely say "your token was just rotated by another process"; they answer
//! with a 401 or an OAuth-flavoured message. [`is_oauth_auth_error`] recognises those shapes so
//! the retry wrapper knows when a forced refresh is worth trying.

// std
use std::{borrow::Cow, io};
// self
use crate::_prelude::*;

const AUTH_STATUS: u16 = 401;
const AUTH_MARKERS: [&str; 6] = [
	"invalid_token",
	"token expired",
	"token invalid",
	"authentication failed",
	"oauth",
	"unauthorized",
];

/// Exposes the signals the classifier inspects: an optional HTTP status and a message.
pub trait AuthErrorSignal {
	/// HTTP status attached to the failure, if any.
	fn status_code(&self) -> Option<u16> {
		None
	}

	/// Message text searched for OAuth failure markers.
	fn message(&self) -> Cow<'_, str>;
}
impl<T> AuthErrorSignal for &T
where
	T: ?Sized + AuthErrorSignal,
{
	fn status_code(&self) -> Option<u16> {
		(**self).status_code()
	}

	fn message(&self) -> Cow<'_, str> {
		(**self).message()
	}
}
impl AuthErrorSignal for str {
	fn message(&self) -> Cow<'_, str> {
		Cow::Borrowed(self)
	}
}
impl AuthErrorSignal for String {
	fn message(&self) -> Cow<'_, str> {
		Cow::Borrowed(self)
	}
}
impl AuthErrorSignal for io::Error {
	fn message(&self) -> Cow<'_, str> {
		Cow::Owned(chain_message(self))
	}
}
impl AuthErrorSignal for Box<dyn StdError + Send + Sync> {
	fn message(&self) -> Cow<'_, str> {
		Cow::Owned(chain_message(self.as_ref()))
	}
}
impl AuthErrorSignal for Error {
	fn message(&self) -> Cow<'_, str> {
		Cow::Owned(chain_message(self))
	}
}
#[cfg(feature = "reqwest")]
impl AuthErrorSignal for reqwest::Error {
	fn status_code(&self) -> Option<u16> {
		self.status().map(|status| status.as_u16())
	}

	fn message(&self) -> Cow<'_, str> {
		Cow::Owned(chain_message(self))
	}
}

/// Plain downstream failure carrying an optional HTTP status.
///
/// Handy for callers whose API client reports status codes out of band.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct ApiError {
	/// HTTP status code, when known.
	pub status: Option<u16>,
	/// Human-readable failure message.
	pub message: String,
}
impl ApiError {
	/// Creates an error with an HTTP status.
	pub fn new(status: u16, message: impl Into<String>) -> Self {
		Self { status: Some(status), message: message.into() }
	}

	/// Creates an error that only carries a message.
	pub fn from_message(message: impl Into<String>) -> Self {
		Self { status: None, message: message.into() }
	}
}
impl AuthErrorSignal for ApiError {
	fn status_code(&self) -> Option<u16> {
		self.status
	}

	fn message(&self) -> Cow<'_, str> {
		Cow::Borrowed(&self.message)
	}
}

/// Returns `true` when `error` looks like an invalidated or expired OAuth credential.
///
/// Matches a 401 status or, case-insensitively, any of `invalid_token`, `token expired`,
/// `token invalid`, `authentication failed`, `oauth`, `unauthorized` in the message.
pub fn is_oauth_auth_error<E>(error: &E) -> bool
where
	E: ?Sized + AuthErrorSignal,
{
	if error.status_code() == Some(AUTH_STATUS) {
		return true;
	}

	let message = error.message().to_lowercase();

	AUTH_MARKERS.iter().any(|marker| message.contains(marker))
}

fn chain_message(error: &(dyn StdError + 'static)) -> String {
	let mut message = error.to_string();
	let mut source = error.source();

	while let Some(inner) = source {
		message.push_str(": ");
		message.push_str(&inner.to_string());

		source = inner.source();
	}

	message
}
