/// Errors that can occur while setting up verification.
///
/// Verifying a credential never errors; only building the verifier can.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The HTTP client could not be initialised.
    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(String),
}
