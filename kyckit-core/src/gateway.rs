//! The provider-transport boundary the orchestrator calls through.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KycKitError;
use crate::merkle::ProofNode;
use crate::types::{KycProfile, ProviderToken, ServiceMetadata};

/// Inclusion proofs served by the provider for a set of field slugs,
/// together with the (possibly refreshed) credential used to fetch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBundle {
    /// Proof path per requested slug.
    pub proof_list: HashMap<String, Vec<ProofNode>>,
    /// The provider token after any transparent refresh.
    pub provider_token: ProviderToken,
}

/// Operations the flows need from the attestation provider.
///
/// `Ok(None)` is the provider-rejected outcome (bad code, unknown token,
/// non-2xx response); the flows map it to the matching upstream error.
/// Transport failures surface as `Err`. Implementations must not retry;
/// retry and backoff policy belongs to the host.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Exchanges a one-time authorization code (and optional SSO session
    /// code) for a provider token pair.
    async fn handshake(
        &self,
        code: &str,
        session_code: Option<&str>,
    ) -> Result<Option<ProviderToken>, KycKitError>;

    /// Fetches the identity profile for the carried token.
    async fn fetch_profile(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<KycProfile>, KycKitError>;

    /// Reports SSO completion for `session_code`, attaching host-generated
    /// payload data. The flows treat this as best-effort.
    async fn notify_login_complete(
        &self,
        provider_token: &ProviderToken,
        session_code: &str,
        extra: Value,
    ) -> Result<Value, KycKitError>;

    /// Renews the token pair when its expiry horizon has passed; returns the
    /// input untouched while it is still live.
    async fn refresh_if_expired(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<ProviderToken>, KycKitError>;

    /// Fetches inclusion-proof paths for the given field slugs.
    async fn query_proof_path(
        &self,
        provider_token: &ProviderToken,
        slug_list: &[String],
    ) -> Result<Option<ProofBundle>, KycKitError>;

    /// Deactivates the user on the provider side.
    async fn deactivate(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<Value>, KycKitError>;

    /// Fetches the service's published field/certificate configuration.
    async fn fetch_service_metadata(
        &self,
    ) -> Result<Option<ServiceMetadata>, KycKitError>;
}
