//! Verification verdicts and credential masking.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Credentials at or below this many characters are fully masked.
const FULL_MASK_THRESHOLD: usize = 8;

/// Characters kept visible at each end of a partially masked credential.
const BOOKEND_LEN: usize = 4;

/// Placeholder for fully masked credentials.
pub const FULL_MASK: &str = "****";

const MASK_CHAR: char = '*';

/// The outcome of one verification attempt, ready for display or JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Lower-cased service display name (or the requested id if unknown).
    pub service: String,
    /// Masked credential. Empty when the service was not recognised.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// Whether the credential was accepted by the service.
    pub valid: bool,
    /// Short outcome message (e.g. `"valid"`, `"invalid (http 401)"`).
    pub message: String,
    /// Optional human-readable summary extracted from the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// RFC 3339 timestamp of when the verdict was produced.
    pub timestamp: String,
}

impl VerificationResult {
    /// Starts a result for a known service, masking the credential.
    ///
    /// The result is invalid with an empty message until a verdict is applied.
    #[must_use]
    pub fn for_service(display_name: &str, credential: &str) -> Self {
        Self {
            service: display_name.to_lowercase(),
            key: mask_key(credential),
            valid: false,
            message: String::new(),
            details: None,
            timestamp: current_timestamp(),
        }
    }

    /// Creates the result for a service identifier missing from the catalog.
    ///
    /// The credential is not echoed back, masked or otherwise.
    #[must_use]
    pub fn unsupported(service_id: &str) -> Self {
        Self {
            service: service_id.to_lowercase(),
            key: String::new(),
            valid: false,
            message: format!("unsupported service: {service_id}"),
            details: None,
            timestamp: current_timestamp(),
        }
    }

    /// Applies a strategy's verdict.
    #[must_use]
    pub fn with_verdict(self, verdict: Verdict) -> Self {
        Self {
            valid: verdict.valid,
            message: verdict.message,
            details: verdict.details,
            ..self
        }
    }
}

/// What a verification strategy decided about a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the credential is valid.
    pub valid: bool,
    /// Short outcome message.
    pub message: String,
    /// Optional human-readable details.
    pub details: Option<String>,
}

impl Verdict {
    /// Message attached to every accepted credential.
    pub const VALID_MESSAGE: &'static str = "valid";

    /// A valid verdict with optional details. Empty details are dropped.
    #[must_use]
    pub fn valid(details: Option<String>) -> Self {
        Self {
            valid: true,
            message: Self::VALID_MESSAGE.to_string(),
            details: details.filter(|d| !d.is_empty()),
        }
    }

    /// An invalid verdict with the given message and no details.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches details to this verdict. Empty details are dropped.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.details = (!details.is_empty()).then_some(details);
        self
    }
}

/// Masks a credential for display.
///
/// Credentials of up to 8 characters become [`FULL_MASK`]. Longer ones keep
/// their first and last 4 characters with every character in between
/// replaced, so the masked value has the same length as the original.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let char_count = chars.len();

    if char_count <= FULL_MASK_THRESHOLD {
        return FULL_MASK.to_string();
    }

    let mut masked = String::with_capacity(key.len());
    masked.extend(&chars[..BOOKEND_LEN]);
    masked.extend(std::iter::repeat_n(MASK_CHAR, char_count - 2 * BOOKEND_LEN));
    masked.extend(&chars[char_count - BOOKEND_LEN..]);
    masked
}

/// Returns the current time as an RFC 3339 UTC timestamp.
#[must_use]
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
