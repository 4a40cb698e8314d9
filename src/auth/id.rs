//! Provider and profile names that together identify one shared credential.
//!
//! Names are free-form: any non-empty string is accepted so that records written by other
//! tooling never turn into cache misses because of stricter naming rules on this side.

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

macro_rules! credential_name {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a name, rejecting empty values.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				if value.is_empty() {
					return Err(IdentifierError::Empty { kind: $kind });
				}

				Ok(Self(value))
			}

			/// Returns the name as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", $kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Error returned when a provider or profile name is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The name was an empty string.
	#[error("{kind} name cannot be empty.")]
	Empty {
		/// Which name was rejected (`Provider` or `Profile`).
		kind: &'static str,
	},
}

credential_name! {
	/// OAuth provider that minted a credential, e.g. `anthropic`.
	ProviderId => "Provider"
}
credential_name! {
	/// Account or profile registered with a provider.
	ProfileId => "Profile"
}
impl ProfileId {
	/// Profile name used in identity keys when a record carries no explicit profile.
	pub const DEFAULT: &'static str = "default";
}
