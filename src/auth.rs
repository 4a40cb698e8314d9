//! Credential identifiers, identity keys, and the token record model.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{key::*, record::*, secret::*};
