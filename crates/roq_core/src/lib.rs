//! Core data model for roq, a live API key verifier.
//!
//! This crate holds everything a verification strategy needs that does not
//! touch the network: the declarative service catalog, the template
//! renderer used for URLs, headers and detail lines, the JSON flattener, and
//! the verdict types returned to callers.
//!
//! # Main Types
//!
//! - [`Catalog`] - Read-only map of service id to [`ServiceConfig`]
//! - [`ServiceConfig`] - How one service's credentials are checked
//! - [`VerificationResult`] - The verdict handed back to callers
//!
//! # Error Handling
//!
//! Only catalog loading can fail ([`CatalogError`]), and that failure is
//! fatal. Template rendering falls back to the unrendered text instead of
//! returning an error.

/// Service catalog loading and lookup.
pub mod catalog;
/// JSON response flattening.
pub mod flatten;
/// Verdict types and credential masking.
pub mod result;
/// Declarative per-service verification rules.
pub mod service;
/// `{{.Name}}` template rendering.
pub mod template;
/// Rotating user agent strings.
pub mod user_agent;

pub use catalog::{BUNDLED_CATALOG, Catalog, CatalogError};
pub use flatten::flatten;
pub use result::{Verdict, VerificationResult, mask_key};
pub use service::{
    Auth, HttpMethod, HttpSpec, ManualSpec, ResponseKind, ResponseSpec, SdkKind, SdkSpec, SecretRequirement,
    ServiceConfig, Strategy,
};
pub use template::{KEY_VAR, TemplateError, USER_AGENT_VAR, render};
pub use user_agent::random_user_agent;
