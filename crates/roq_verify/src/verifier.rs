//! Dispatches a verification request to the strategy its service uses.

use std::sync::Arc;
use std::time::Duration;

use roq_core::{Catalog, SdkKind, SdkSpec, Strategy, Verdict, VerificationResult};
#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::aws::{IdentityLookup, StsIdentityLookup, verify_aws};
use crate::http::verify_http;
use crate::{USER_AGENT, VerificationError};

/// Timeout applied to every outbound verification request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const NOT_IMPLEMENTED: &str = "verification method not implemented";

/// Verifies credentials against the services in a catalog.
///
/// Holds only read-only state, so one instance can serve concurrent
/// verifications without locking.
pub struct Verifier {
    catalog: Arc<Catalog>,
    client: reqwest::Client,
    identity: Arc<dyn IdentityLookup>,
}

impl Verifier {
    /// Creates a verifier over `catalog` with a fresh HTTP client and the
    /// STS-backed AWS identity lookup, both bounded by [`REQUEST_TIMEOUT`].
    pub fn new(catalog: Arc<Catalog>) -> Result<Self, VerificationError> {
        Self::with_request_timeout(catalog, REQUEST_TIMEOUT)
    }

    /// Like [`Verifier::new`], but every outbound call gives up after
    /// `timeout` instead.
    pub fn with_request_timeout(catalog: Arc<Catalog>, timeout: Duration) -> Result<Self, VerificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VerificationError::ClientInit(e.to_string()))?;

        Ok(Self {
            catalog,
            client,
            identity: Arc::new(StsIdentityLookup::new(timeout)),
        })
    }

    /// Replaces the AWS identity lookup, e.g. with a test double.
    #[must_use]
    pub fn with_identity_lookup(mut self, lookup: Arc<dyn IdentityLookup>) -> Self {
        self.identity = lookup;
        self
    }

    /// Returns the catalog this verifier dispatches against.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Verifies `credential` (and `secret`, where the service needs one) for
    /// the service named `service_id`.
    ///
    /// Never fails: unknown services, network errors, and rejected keys all
    /// come back as an invalid [`VerificationResult`].
    pub async fn verify(&self, service_id: &str, credential: &str, secret: Option<&str>) -> VerificationResult {
        let Some(service) = self.catalog.lookup(service_id) else {
            #[cfg(feature = "tracing")]
            debug!(service_id, "service not in catalog");
            return VerificationResult::unsupported(service_id);
        };

        let result = VerificationResult::for_service(&service.name, credential);

        #[cfg(feature = "tracing")]
        info!(service = %service.id, strategy = strategy_name(&service.strategy), "verifying credential");

        let verdict = match &service.strategy {
            Strategy::Http(spec) => verify_http(&self.client, spec, credential).await,
            Strategy::Sdk(SdkSpec { kind: SdkKind::Aws, .. }) => {
                verify_aws(self.identity.as_ref(), credential, secret).await
            }
            Strategy::Manual(manual) => {
                let verdict = Verdict::invalid(manual.message.to_lowercase());
                match &manual.details {
                    Some(details) => verdict.with_details(details.to_lowercase()),
                    None => verdict,
                }
            }
            Strategy::Sdk(_) | Strategy::Unimplemented { .. } => Verdict::invalid(NOT_IMPLEMENTED),
        };

        result.with_verdict(verdict)
    }
}

#[cfg(feature = "tracing")]
const fn strategy_name(strategy: &Strategy) -> &'static str {
    match strategy {
        Strategy::Http(_) => "http",
        Strategy::Sdk(_) => "sdk",
        Strategy::Manual(_) => "manual",
        Strategy::Unimplemented { .. } => "unimplemented",
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("service_count", &self.catalog.len())
            .finish_non_exhaustive()
    }
}
