//! Default [`ProviderGateway`] implementation over the provider's
//! third-service HTTP API.
//!
//! Response envelopes wrap their payload in a `data` field. A non-2xx status
//! is the provider saying no: logged and surfaced as `Ok(None)`, never an
//! error. Transport and decode failures are errors. There is no retry layer
//! here; hosts own retry policy.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KycKitError;
use crate::gateway::{ProofBundle, ProviderGateway};
use crate::merkle::ProofNode;
use crate::types::{KycProfile, ProviderToken, ServiceMetadata, SyncStatus};

mod endpoints {
    pub const HANDSHAKE: &str = "/api/3rdService/token/generate";
    pub const PROFILE: &str = "/api/3rdService/user";
    pub const REFRESH_TOKEN: &str = "/api/3rdService/token/renew";
    pub const SSO_COMPLETE: &str = "/api/3rdService/register/complete";
    pub const PROOF_OF_PATH: &str = "/api/3rdService/user/identityProof";
    pub const DEACTIVATE: &str = "/api/3rdService/user/deactivate";
    pub const SERVICE_METADATA: &str = "/api/3rdService/service/detail";
}

/// Reqwest-backed provider gateway.
pub struct HttpProviderGateway {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: SecretString,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct HandshakeBody<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RefreshBody<'a> {
    stoc: &'a str,
    stoc_refresh: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Serialize)]
struct NotifyBody {
    result: &'static str,
    custom_data: String,
}

#[derive(Debug, Serialize)]
struct ProofPathBody<'a> {
    slug_list: &'a [String],
}

// The provider's token wire shape carries a relative expiry horizon.
#[derive(Debug, Deserialize)]
struct WireToken {
    access_token: String,
    expires_in: u64,
    refresh_token: String,
}

impl WireToken {
    fn into_token(self) -> ProviderToken {
        ProviderToken {
            access_token: self.access_token,
            expires_at: unix_now().saturating_add(self.expires_in),
            refresh_token: self.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProfile {
    id: String,
    #[serde(rename = "smartContractId")]
    smart_contract_id: String,
    #[serde(rename = "rootHash")]
    root_hash: String,
    #[serde(rename = "isSynching")]
    is_synching: SyncStatus,
}

impl WireProfile {
    fn into_profile(self) -> KycProfile {
        KycProfile {
            id: self.id,
            smart_contract_id: self.smart_contract_id,
            root_hash: self.root_hash,
            sync_status: self.is_synching,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProofList {
    #[serde(rename = "proofList")]
    proof_list: HashMap<String, Vec<ProofNode>>,
}

impl HttpProviderGateway {
    /// Creates a gateway for the provider at `base_url`, authenticating as
    /// the relying-party service identified by `client_id`/`client_secret`.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            timeout: Duration::from_secs(5),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);

        #[cfg(not(test))]
        assert!(url.starts_with("https"));

        self.client
            .request(method, &url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("kyckit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Sends the request; a non-2xx response is `Ok(None)`, a 2xx body is
    /// decoded through the `data` envelope.
    async fn send_expect_data<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<Option<T>, KycKitError> {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let url = err
                    .url()
                    .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
                return Err(KycKitError::Network {
                    url,
                    status: None,
                    error: format!("[{operation}] {err}"),
                });
            }
        };

        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.map_err(|err| KycKitError::Network {
            url: url.clone(),
            status: Some(status.as_u16()),
            error: format!("[{operation}] failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            tracing::warn!(
                operation,
                status = status.as_u16(),
                "provider rejected the request"
            );
            return Ok(None);
        }

        match serde_json::from_str::<DataEnvelope<T>>(&body) {
            Ok(envelope) => Ok(Some(envelope.data)),
            // Only the first few characters: response bodies carry PII.
            Err(err) => Err(KycKitError::Serialization(format!(
                "[{operation}] failed to parse response from {url}: {err}, received: {}",
                body.chars().take(20).collect::<String>()
            ))),
        }
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn handshake(
        &self,
        code: &str,
        session_code: Option<&str>,
    ) -> Result<Option<ProviderToken>, KycKitError> {
        let body = HandshakeBody {
            client_id: &self.client_id,
            client_secret: self.client_secret.expose_secret(),
            code,
            grant_type: "authorization_code",
            session_code,
        };
        let builder = self
            .request(reqwest::Method::POST, endpoints::HANDSHAKE)
            .json(&body);
        let token: Option<WireToken> =
            self.send_expect_data(builder, "handshake").await?;
        Ok(token.map(WireToken::into_token))
    }

    async fn fetch_profile(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<KycProfile>, KycKitError> {
        let builder = self
            .request(reqwest::Method::GET, endpoints::PROFILE)
            .header("Authorization", &provider_token.access_token);
        let profile: Option<WireProfile> =
            self.send_expect_data(builder, "fetch_profile").await?;
        Ok(profile.map(WireProfile::into_profile))
    }

    async fn notify_login_complete(
        &self,
        provider_token: &ProviderToken,
        session_code: &str,
        extra: Value,
    ) -> Result<Value, KycKitError> {
        let custom_data = serde_json::to_string(&serde_json::json!({
            "sessionData": session_code,
            "extraData": extra,
        }))
        .map_err(|err| KycKitError::Serialization(err.to_string()))?;

        let builder = self
            .request(reqwest::Method::POST, endpoints::SSO_COMPLETE)
            .header("Authorization", &provider_token.access_token)
            .json(&NotifyBody {
                result: "success",
                custom_data,
            });
        let ack: Option<Value> =
            self.send_expect_data(builder, "notify_login_complete").await?;
        Ok(ack.unwrap_or(Value::Null))
    }

    async fn refresh_if_expired(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<ProviderToken>, KycKitError> {
        if !provider_token.is_expired(unix_now()) {
            return Ok(Some(provider_token.clone()));
        }

        let body = RefreshBody {
            stoc: &provider_token.access_token,
            stoc_refresh: &provider_token.refresh_token,
            client_secret: self.client_secret.expose_secret(),
        };
        let builder = self
            .request(reqwest::Method::POST, endpoints::REFRESH_TOKEN)
            .json(&body);
        let token: Option<WireToken> =
            self.send_expect_data(builder, "refresh_token").await?;
        Ok(token.map(WireToken::into_token))
    }

    async fn query_proof_path(
        &self,
        provider_token: &ProviderToken,
        slug_list: &[String],
    ) -> Result<Option<ProofBundle>, KycKitError> {
        let Some(live_token) = self.refresh_if_expired(provider_token).await? else {
            return Ok(None);
        };

        let builder = self
            .request(reqwest::Method::POST, endpoints::PROOF_OF_PATH)
            .header("Authorization", &live_token.access_token)
            .json(&ProofPathBody { slug_list });
        let proofs: Option<WireProofList> =
            self.send_expect_data(builder, "query_proof_path").await?;
        Ok(proofs.map(|wire| ProofBundle {
            proof_list: wire.proof_list,
            provider_token: live_token,
        }))
    }

    async fn deactivate(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<Value>, KycKitError> {
        let Some(live_token) = self.refresh_if_expired(provider_token).await? else {
            return Ok(None);
        };

        let builder = self
            .request(reqwest::Method::POST, endpoints::DEACTIVATE)
            .header("Authorization", &live_token.access_token);
        self.send_expect_data(builder, "deactivate").await
    }

    async fn fetch_service_metadata(
        &self,
    ) -> Result<Option<ServiceMetadata>, KycKitError> {
        let path = format!("{}/{}", endpoints::SERVICE_METADATA, self.client_id);
        let builder = self
            .request(reqwest::Method::GET, &path)
            .header("x-client-secret", self.client_secret.expose_secret());
        self.send_expect_data(builder, "fetch_service_metadata").await
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
