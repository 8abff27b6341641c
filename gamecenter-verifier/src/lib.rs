//! Verification of Game Center identity signatures.
//!
//! A game client obtains `(publicKeyUrl, signature, salt, timestamp)` from
//! GameKit and forwards them with its player id; [`identity::Verifier`]
//! checks that Apple signed exactly that player id for this app's bundle id.

pub mod identity;
