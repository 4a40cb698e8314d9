//! Epoch-millisecond helpers shared by token and lock records.
//!
//! Both record kinds persist instants as integer milliseconds since the Unix epoch so that
//! files written by other tooling (or older versions of this crate) stay readable.

// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Converts an instant into whole milliseconds since the Unix epoch.
pub fn to_unix_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Builds an instant from milliseconds since the Unix epoch.
pub fn from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Drops sub-millisecond precision so persisted instants compare equal after a round-trip.
pub fn truncate_to_millis(instant: OffsetDateTime) -> OffsetDateTime {
	from_unix_millis(to_unix_millis(instant)).unwrap_or(instant)
}

/// Current UTC instant truncated to millisecond precision.
pub fn now_millis() -> OffsetDateTime {
	truncate_to_millis(OffsetDateTime::now_utc())
}

/// Serde adapter for `OffsetDateTime` <-> epoch milliseconds.
pub mod unix_millis {
	use super::*;

	/// Serializes an instant as epoch milliseconds.
	pub fn serialize<S>(instant: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(to_unix_millis(*instant))
	}

	/// Deserializes epoch milliseconds into an instant.
	pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
	where
		D: Deserializer<'de>,
	{
		let millis = i64::deserialize(deserializer)?;

		from_unix_millis(millis)
			.ok_or_else(|| D::Error::custom(format!("timestamp {millis} is out of range")))
	}

	/// Same as the parent module but for optional instants.
	pub mod option {
		use super::*;

		/// Serializes an optional instant as epoch milliseconds (or `null`).
		pub fn serialize<S>(
			instant: &Option<OffsetDateTime>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match instant {
				Some(instant) => serializer.serialize_some(&to_unix_millis(*instant)),
				None => serializer.serialize_none(),
			}
		}

		/// Deserializes optional epoch milliseconds.
		pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
		where
			D: Deserializer<'de>,
		{
			match Option::<i64>::deserialize(deserializer)? {
				Some(millis) => from_unix_millis(millis)
					.map(Some)
					.ok_or_else(|| D::Error::custom(format!("timestamp {millis} is out of range"))),
				None => Ok(None),
			}
		}
	}
}
