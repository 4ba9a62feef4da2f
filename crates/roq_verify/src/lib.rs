//! Live credential verification for roq.
//!
//! A [`Verifier`] looks a service up in a [`roq_core::Catalog`] and runs the
//! strategy the entry names: a templated HTTP request, an AWS identity
//! lookup, or a fixed "manual" verdict.

/// AWS key pair verification.
pub mod aws;
mod error;
mod http;
mod verifier;

use std::pin::Pin;

pub use aws::{CallerIdentity, IdentityError, IdentityLookup, StsIdentityLookup};
pub use error::VerificationError;
pub use verifier::{REQUEST_TIMEOUT, Verifier};

/// A pinned, boxed, `Send` future used as the return type for async lookups.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default `User-Agent` header, used when a service's headers do not set one.
pub(crate) const USER_AGENT: &str = concat!("roq/", env!("CARGO_PKG_VERSION"));
