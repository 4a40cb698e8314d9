//! Token record, secret wrapper, and identity-key derivation.

pub mod key;
pub mod record;
pub mod secret;
