//! Declarative description of how to verify a credential for one service.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// HTTP status expected from a service when no `success_status` is configured.
pub const DEFAULT_SUCCESS_STATUS: u16 = 200;

/// Verification rules for a single service in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Lower-cased catalog identifier (e.g. `"github"`).
    pub id: Box<str>,
    /// Human-readable display name (e.g. `"GitHub"`).
    pub name: Box<str>,
    /// Secondary secret the service needs, if any.
    pub secret: Option<SecretRequirement>,
    /// How the credential is checked.
    pub strategy: Strategy,
}

impl ServiceConfig {
    /// Returns `true` if verifying this service needs a secondary secret.
    #[must_use]
    pub const fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }
}

/// A secondary secret that must accompany the primary credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequirement {
    /// What the secret is called by the vendor (e.g. `"secret access key"`).
    pub name: Box<str>,
}

/// The verification algorithm selected for a service.
///
/// Each variant carries only the fields its strategy reads, so an entry can
/// never be half HTTP and half SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Issue one templated HTTP request and interpret the response.
    Http(HttpSpec),
    /// Delegate to a vendor SDK call.
    Sdk(SdkSpec),
    /// No automatable check exists; report a fixed message.
    Manual(ManualSpec),
    /// The catalog names a method this build does not know how to run.
    Unimplemented {
        /// The method string as written in the catalog.
        method: Box<str>,
    },
}

/// HTTP method used by the templated request strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request construction and response interpretation for the HTTP strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSpec {
    /// Request method.
    pub method: HttpMethod,
    /// URL template, rendered with the credential.
    pub url: Box<str>,
    /// Header name to value template, rendered independently per header.
    pub headers: BTreeMap<Box<str>, Box<str>>,
    /// Credentials attached in addition to any explicit headers.
    pub auth: Auth,
    /// Status code that counts as success.
    pub success_status: u16,
    /// How the response body is inspected once the status matches.
    pub response: ResponseSpec,
}

/// Request authentication applied on top of configured headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    /// Headers only.
    #[default]
    None,
    /// HTTP Basic credentials rendered from templates.
    Basic {
        /// Username template.
        username: Box<str>,
        /// Password template.
        password: Box<str>,
    },
}

/// Whether the response body is inspected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// The status code alone decides validity.
    #[default]
    Raw,
    /// The body is parsed as a JSON object.
    Json,
}

/// Rules for deciding validity from a JSON response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSpec {
    /// Body format.
    pub kind: ResponseKind,
    /// Flattened field paths whose presence indicates a valid key.
    pub fields: Vec<Box<str>>,
    /// Template rendered against the flattened body for the details line.
    pub details_format: Option<Box<str>>,
    /// Top-level boolean field that must be `true` for success.
    pub success_field: Option<Box<str>>,
    /// Top-level string field whose non-empty value signals failure.
    pub error_field: Option<Box<str>>,
}

impl ResponseSpec {
    /// Returns `true` if the body must be parsed to reach a verdict.
    ///
    /// A JSON response with no declared fields is treated like a raw one.
    #[must_use]
    pub fn inspects_body(&self) -> bool {
        self.kind == ResponseKind::Json && !self.fields.is_empty()
    }
}

/// Vendor SDK verification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkSpec {
    /// Which SDK integration handles the entry.
    pub kind: SdkKind,
    /// Vendor service called by the SDK (e.g. `"sts"`).
    pub service: Option<Box<str>>,
    /// Vendor operation invoked (e.g. `"GetCallerIdentity"`).
    pub operation: Option<Box<str>>,
}

/// Supported SDK integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkKind {
    /// AWS security token service identity lookup.
    Aws,
    /// An SDK type this build has no integration for.
    Other(Box<str>),
}

impl SdkKind {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("aws") {
            Self::Aws
        } else {
            Self::Other(s.into())
        }
    }
}

/// Fixed verdict text for services without automatable verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualSpec {
    /// Short message returned as the verdict message.
    pub message: Box<str>,
    /// Longer explanation returned as the verdict details.
    pub details: Option<Box<str>>,
}

/// Flat on-disk shape of a catalog entry.
///
/// Converted into a [`ServiceConfig`] by [`ServiceRecord::into_config`], which
/// picks the strategy from `method` and drops fields that strategy ignores.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ServiceRecord {
    name: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    auth_type: AuthType,
    #[serde(default)]
    auth_user: Option<String>,
    #[serde(default)]
    auth_pass: Option<String>,
    #[serde(default)]
    success_status: Option<u16>,
    #[serde(default)]
    response_type: ResponseKind,
    #[serde(default)]
    response_fields: Vec<String>,
    #[serde(default)]
    details_format: Option<String>,
    #[serde(default)]
    success_field: Option<String>,
    #[serde(default)]
    error_field: Option<String>,
    #[serde(default)]
    requires_secret: bool,
    #[serde(default)]
    secret_name: Option<String>,
    #[serde(default)]
    sdk_type: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AuthType {
    #[default]
    None,
    Basic,
}

/// Why a catalog record could not become a [`ServiceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordError {
    MissingField(&'static str),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
        }
    }
}

impl ServiceRecord {
    pub(crate) fn into_config(mut self, id: &str) -> Result<ServiceConfig, RecordError> {
        let name = std::mem::take(&mut self.name);
        let secret = self.requires_secret.then(|| SecretRequirement {
            name: non_empty(self.secret_name.take()).unwrap_or_else(|| "secret".into()),
        });

        let strategy = match self.method.to_ascii_uppercase().as_str() {
            "GET" => Strategy::Http(self.into_http_spec(HttpMethod::Get)?),
            "POST" => Strategy::Http(self.into_http_spec(HttpMethod::Post)?),
            "SDK" => Strategy::Sdk(self.into_sdk_spec()?),
            "MANUAL" => Strategy::Manual(self.into_manual_spec()?),
            _ => Strategy::Unimplemented {
                method: self.method.into(),
            },
        };

        Ok(ServiceConfig {
            id: id.to_lowercase().into(),
            name: if name.is_empty() { id.into() } else { name.into() },
            secret,
            strategy,
        })
    }

    fn into_http_spec(self, method: HttpMethod) -> Result<HttpSpec, RecordError> {
        let url = non_empty(self.url).ok_or(RecordError::MissingField("url"))?;

        let auth = match self.auth_type {
            AuthType::None => Auth::None,
            AuthType::Basic => Auth::Basic {
                username: self.auth_user.unwrap_or_default().into(),
                password: self.auth_pass.unwrap_or_default().into(),
            },
        };

        Ok(HttpSpec {
            method,
            url,
            headers: self
                .headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
            auth,
            success_status: self.success_status.unwrap_or(DEFAULT_SUCCESS_STATUS),
            response: ResponseSpec {
                kind: self.response_type,
                fields: self
                    .response_fields
                    .into_iter()
                    .filter(|f| !f.is_empty())
                    .map(Into::into)
                    .collect(),
                details_format: non_empty(self.details_format),
                success_field: non_empty(self.success_field),
                error_field: non_empty(self.error_field),
            },
        })
    }

    fn into_sdk_spec(self) -> Result<SdkSpec, RecordError> {
        let sdk_type = non_empty(self.sdk_type).ok_or(RecordError::MissingField("sdk_type"))?;

        Ok(SdkSpec {
            kind: SdkKind::parse(&sdk_type),
            service: non_empty(self.service),
            operation: non_empty(self.operation),
        })
    }

    fn into_manual_spec(self) -> Result<ManualSpec, RecordError> {
        let message = non_empty(self.message).ok_or(RecordError::MissingField("message"))?;

        Ok(ManualSpec {
            message,
            details: non_empty(self.details),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<Box<str>> {
    value.filter(|s| !s.is_empty()).map(String::into_boxed_str)
}
