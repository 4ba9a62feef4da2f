//! CLI command handlers.

/// Service catalog listing.
pub mod list;
/// Single credential verification.
pub mod verify;

/// Convenience alias for command return types.
pub type Result<T = ()> = anyhow::Result<T>;
