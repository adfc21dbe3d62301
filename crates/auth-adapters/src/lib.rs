//! # auth-adapters
//!
//! Possession-based authorization for comment authors: an edit token issued at
//! creation time, verified statelessly later.

pub mod guard;
pub mod keys;
pub mod secure_cookie;

pub use guard::{text_digest, CookieGuard};
pub use keys::{load_or_generate, CookieKeys, KeyError};
pub use secure_cookie::{CookieError, SecureCookie};
