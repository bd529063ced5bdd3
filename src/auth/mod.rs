//! Credentials and session tokens.
//!
//! Provides:
//! - Password hashing (HMAC-SHA256 keyed by the configured hashing secret)
//! - Random opaque ids for tokens and checks
//! - Token verification against the `tokens` collection
//!
//! ## Design Decisions
//! - Tokens are stored by their plaintext id. The id is the bearer
//!   credential and travels in the `token` request header.
//! - Expiry is an absolute millisecond timestamp; there is no refresh or
//!   rotation, only explicit extension while the token is still alive.

pub mod credentials;
pub mod verifier;

pub use credentials::{constant_time_eq, create_random_string, hash_password, ID_LEN};
pub use verifier::{now_ms, token_authorizes, verify_token};
