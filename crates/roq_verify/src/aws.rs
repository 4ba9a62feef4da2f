//! AWS access key verification via the security token service.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_sts::config::{Credentials, Region};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use roq_core::Verdict;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::{BoxFuture, REQUEST_TIMEOUT};

/// Prefix shared by long-term AWS access key ids.
pub const ACCESS_KEY_PREFIX: &str = "AKIA";

/// Length of an AWS access key id.
pub const ACCESS_KEY_LEN: usize = 20;

const STS_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "roq";

const INVALID_CLIENT_TOKEN: &str = "InvalidClientTokenId";
const SIGNATURE_MISMATCH: &str = "SignatureDoesNotMatch";

const SECRET_REQUIRED_DETAILS: &str = "use: roq -s aws -k AKIA... --secret YOUR_SECRET_KEY";

/// The identity behind a credential pair, as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Account that owns the credentials.
    pub account: Option<String>,
    /// ARN of the calling principal.
    pub arn: Option<String>,
    /// Unique id of the calling principal.
    pub user_id: Option<String>,
}

/// Failures from an identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The client or its credentials could not be set up locally.
    #[error("failed to create aws config: {0}")]
    Config(String),

    /// The provider rejected the call or could not be reached.
    #[error("{message}")]
    Service {
        /// Provider error code, if one was returned (e.g. `"InvalidClientTokenId"`).
        code: Option<String>,
        /// Full error text including its causes.
        message: String,
    },
}

/// Looks up the identity owning an access key / secret key pair.
pub trait IdentityLookup: Send + Sync {
    /// Performs one "get caller identity" call with the given credentials.
    fn caller_identity<'a>(
        &'a self,
        access_key: &'a str,
        secret_key: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, IdentityError>>;
}

/// [`IdentityLookup`] backed by `sts:GetCallerIdentity`.
///
/// Each lookup is a single attempt bounded by the configured timeout; the
/// SDK's retry policy is disabled.
#[derive(Debug, Clone)]
pub struct StsIdentityLookup {
    timeout: Duration,
    endpoint_url: Option<String>,
}

impl StsIdentityLookup {
    /// Creates a lookup whose calls give up after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            endpoint_url: None,
        }
    }

    /// Sends requests to `url` instead of the regional STS endpoint.
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

impl Default for StsIdentityLookup {
    fn default() -> Self {
        Self::new(REQUEST_TIMEOUT)
    }
}

impl IdentityLookup for StsIdentityLookup {
    fn caller_identity<'a>(
        &'a self,
        access_key: &'a str,
        secret_key: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, IdentityError>> {
        Box::pin(async move {
            let credentials = Credentials::new(access_key, secret_key, None, None, CREDENTIALS_PROVIDER_NAME);
            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(Region::new(STS_REGION))
                .retry_config(RetryConfig::disabled())
                .timeout_config(TimeoutConfig::builder().operation_timeout(self.timeout).build());
            if let Some(url) = &self.endpoint_url {
                loader = loader.endpoint_url(url);
            }
            let config = loader.load().await;

            let output = aws_sdk_sts::Client::new(&config)
                .get_caller_identity()
                .send()
                .await
                .map_err(|err| match &err {
                    SdkError::ConstructionFailure(_) => IdentityError::Config(DisplayErrorContext(&err).to_string()),
                    _ => IdentityError::Service {
                        code: err.code().map(str::to_string),
                        message: describe_sdk_error(&err),
                    },
                })?;

            Ok(CallerIdentity {
                account: output.account().map(str::to_string),
                arn: output.arn().map(str::to_string),
                user_id: output.user_id().map(str::to_string),
            })
        })
    }
}

/// Summarises an SDK failure from its error metadata, falling back to the
/// full error context when the provider sent none.
fn describe_sdk_error<E>(err: &E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (None, Some(message)) => message.to_string(),
        (Some(code), None) => code.to_string(),
        (None, None) => DisplayErrorContext(err).to_string(),
    }
}

/// Returns `true` if `access_key` looks like a long-term AWS access key id.
#[must_use]
pub fn is_access_key_format(access_key: &str) -> bool {
    access_key.starts_with(ACCESS_KEY_PREFIX) && access_key.len() == ACCESS_KEY_LEN
}

/// Verifies an AWS key pair.
///
/// Without a secret only the access key format is checked, and the verdict is
/// always invalid. With a secret the pair is checked live through `lookup`.
pub(crate) async fn verify_aws(lookup: &dyn IdentityLookup, access_key: &str, secret_key: Option<&str>) -> Verdict {
    let Some(secret_key) = secret_key.filter(|s| !s.is_empty()) else {
        return check_format(access_key);
    };

    #[cfg(feature = "tracing")]
    debug!("looking up aws caller identity");

    match lookup.caller_identity(access_key, secret_key).await {
        Ok(identity) => {
            let details = match (identity.account, identity.arn) {
                (Some(account), Some(arn)) => Some(format!("account: {account}, arn: {arn}")),
                _ => None,
            };
            Verdict::valid(details)
        }
        Err(err) => Verdict::invalid(classify_error(&err)),
    }
}

fn check_format(access_key: &str) -> Verdict {
    if is_access_key_format(access_key) {
        Verdict::invalid("key format valid but secret key required").with_details(SECRET_REQUIRED_DETAILS)
    } else {
        Verdict::invalid("invalid aws access key format")
    }
}

/// Maps an identity lookup failure to a verdict message.
pub(crate) fn classify_error(err: &IdentityError) -> String {
    let (code, message) = match err {
        IdentityError::Config(_) => return err.to_string(),
        IdentityError::Service { code, message } => (code.as_deref(), message.as_str()),
    };

    let is = |needle: &str| code == Some(needle) || message.contains(needle);

    if is(INVALID_CLIENT_TOKEN) {
        "invalid credentials (access key not found)".to_string()
    } else if is(SIGNATURE_MISMATCH) {
        "invalid credentials (incorrect secret key)".to_string()
    } else {
        format!("verification failed: {message}")
    }
}
