//! The flow orchestrator: login, registration, data upload, status query and
//! resubmission, threaded across stateless HTTP requests by signed session
//! tokens.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::KycKitError;
use crate::gateway::{ProofBundle, ProviderGateway};
use crate::hooks::{FlowHooks, HookContext};
use crate::merkle::{validate_field, ProofNode};
use crate::session::{SessionCodec, SignedSessionCodec};
use crate::store::{NewRecord, RecordStore, RecordUpdate};
use crate::types::{
    FlowResponse, KycRecordStatus, NextAction, ProviderToken, RawDataMap,
    RedirectForm, ResubmitInfo, ServiceMetadata, SessionClaims,
};

/// Relying-party service configuration consumed at construction.
#[derive(Clone, Default)]
pub struct ServiceConfig {
    /// Service client id, issued by the provider dashboard.
    pub client_id: String,
    /// Service secret; signs the default session tokens.
    pub client_secret: String,
    /// Identity fields the service requires at upload.
    pub required_fields: Vec<String>,
    /// Identity fields the service accepts but does not require.
    pub optional_fields: Vec<String>,
    /// Certificates the service accepts.
    pub certs: Vec<String>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("required_fields", &self.required_fields)
            .field("optional_fields", &self.optional_fields)
            .field("certs", &self.certs)
            .finish()
    }
}

/// The stateless flow orchestrator.
///
/// Each call re-derives its state from the provider handshake and the record
/// store; nothing is held between invocations beyond the immutable service
/// configuration resolved at construction. Instances are cheap to share
/// across concurrent requests.
pub struct KycConnect<G, S, H> {
    config: ServiceConfig,
    codec: Box<dyn SessionCodec>,
    gateway: G,
    store: S,
    hooks: H,
}

impl<G, S, H> std::fmt::Debug for KycConnect<G, S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KycConnect")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<G, S, H> KycConnect<G, S, H>
where
    G: ProviderGateway,
    S: RecordStore,
    H: FlowHooks<S::Record>,
{
    /// Builds an orchestrator from an explicit configuration, signing
    /// session tokens with the default HMAC codec under the service secret.
    ///
    /// # Errors
    /// Fails fast when `client_id` or `client_secret` is blank.
    pub fn new(
        config: ServiceConfig,
        gateway: G,
        store: S,
        hooks: H,
    ) -> Result<Self, KycKitError> {
        let codec = Box::new(SignedSessionCodec::new(config.client_secret.clone()));
        Self::with_codec(config, codec, gateway, store, hooks)
    }

    /// Builds an orchestrator with a caller-supplied session codec. This is
    /// also the secret-rotation path: swap the codec, not the scheme.
    ///
    /// # Errors
    /// Fails fast when `client_id` or `client_secret` is blank.
    pub fn with_codec(
        config: ServiceConfig,
        codec: Box<dyn SessionCodec>,
        gateway: G,
        store: S,
        hooks: H,
    ) -> Result<Self, KycKitError> {
        if config.client_id.trim().is_empty() || config.client_secret.trim().is_empty()
        {
            return Err(KycKitError::MissingArgument("clientId or secretId"));
        }
        Ok(Self {
            config,
            codec,
            gateway,
            store,
            hooks,
        })
    }

    /// Builds an orchestrator whose field/certificate configuration is
    /// fetched from the provider during construction. The returned instance
    /// is ready to use; there is no separate "metadata loaded" phase to
    /// wait for.
    ///
    /// # Errors
    /// Fails when credentials are blank or the metadata fetch comes back
    /// empty.
    pub async fn from_service_metadata(
        mut config: ServiceConfig,
        gateway: G,
        store: S,
        hooks: H,
    ) -> Result<Self, KycKitError> {
        let ServiceMetadata {
            required_fields,
            optional_fields,
            certs,
        } = gateway
            .fetch_service_metadata()
            .await?
            .ok_or(KycKitError::SyncInfoFailed)?;
        config.required_fields = required_fields;
        config.optional_fields = optional_fields;
        config.certs = certs;
        Self::new(config, gateway, store, hooks)
    }

    /// The service configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Registration: converts a sign-up authorization code into a fresh
    /// record and an upload instruction.
    ///
    /// # Errors
    /// `HandshakeFailed` / `SyncInfoFailed` when the provider rejects the
    /// exchange, `AlreadyRegistered` (terminal, no token) when a record
    /// already exists for the profile.
    pub async fn register_flow(
        &self,
        code: &str,
        ref_id: Option<&str>,
    ) -> Result<FlowResponse, KycKitError> {
        if code.trim().is_empty() {
            return Err(KycKitError::MissingArgument("code"));
        }
        self.enroll(code, None, ref_id, RedirectForm::Register).await
    }

    /// Login: like registration, but bound to an SSO session so the upload
    /// step can report completion back to the provider.
    ///
    /// # Errors
    /// As [`KycConnect::register_flow`], plus a fast failure when
    /// `session_code` is blank.
    pub async fn login_flow(
        &self,
        code: &str,
        session_code: &str,
        ref_id: Option<&str>,
    ) -> Result<FlowResponse, KycKitError> {
        if code.trim().is_empty() || session_code.trim().is_empty() {
            return Err(KycKitError::MissingArgument("code or sessionCode"));
        }
        self.enroll(code, Some(session_code), ref_id, RedirectForm::Login)
            .await
    }

    async fn enroll(
        &self,
        code: &str,
        session_code: Option<&str>,
        ref_id: Option<&str>,
        redirect_form: RedirectForm,
    ) -> Result<FlowResponse, KycKitError> {
        let provider_token = self
            .gateway
            .handshake(code, session_code)
            .await?
            .ok_or(KycKitError::HandshakeFailed)?;
        debug!(%redirect_form, "provider handshake complete");

        let profile = self
            .gateway
            .fetch_profile(&provider_token)
            .await?
            .ok_or(KycKitError::SyncInfoFailed)?;
        debug!(kyc_id = %profile.id, sync = %profile.sync_status, "profile synced");

        if self.store.find_by_id(&profile.id).await?.is_some() {
            return Err(KycKitError::AlreadyRegistered);
        }
        self.store
            .create(NewRecord {
                profile: &profile,
                provider_token: &provider_token,
                ref_id,
            })
            .await?;

        let claims = SessionClaims {
            kyc_id: profile.id,
            provider_token,
            session_code: session_code.map(ToString::to_string),
            redirect_form,
            resubmit_info: None,
        };
        let mut payload = FlowResponse::upload(
            self.config.required_fields.clone(),
            Some(self.config.optional_fields.clone()),
            self.config.certs.clone(),
        );
        payload.access_token = Some(self.codec.encode(&claims)?);
        Ok(payload)
    }

    /// Data upload: consumes a session token, enforces the required-field
    /// set, persists the raw map and finishes according to the token's
    /// redirect form.
    ///
    /// Required-field enforcement happens here, at upload time: every
    /// required slug must be listed and carry a value. For resubmission
    /// tokens the required set is the subset embedded in the token.
    ///
    /// # Errors
    /// `InvalidAccessToken` on decode failure, `MissingCriticalSlug` on an
    /// incomplete upload, `RecordNotFound` / `SyncInfoFailed` when the
    /// record or profile cannot be resolved.
    pub async fn update_data_flow(
        &self,
        access_token: &str,
        slug_list: &[String],
        raw_data: RawDataMap,
    ) -> Result<FlowResponse, KycKitError> {
        if slug_list.is_empty() {
            return Err(KycKitError::MissingArgument("slugList"));
        }

        let claims = self
            .codec
            .decode(access_token)
            .ok_or(KycKitError::InvalidAccessToken)?;

        let required: &[String] = claims
            .resubmit_info
            .as_ref()
            .map_or(&self.config.required_fields, |info| &info.field_list);
        let critical_ok = required
            .iter()
            .all(|slug| slug_list.contains(slug) && raw_data.contains_key(slug));
        if !critical_ok {
            return Err(KycKitError::MissingCriticalSlug);
        }

        let record = self
            .store
            .find_by_id(&claims.kyc_id)
            .await?
            .ok_or(KycKitError::RecordNotFound)?;

        let profile = self
            .gateway
            .fetch_profile(&claims.provider_token)
            .await?
            .ok_or(KycKitError::SyncInfoFailed)?;

        let record = self
            .store
            .update(RecordUpdate {
                record: &record,
                profile: &profile,
                provider_token: &claims.provider_token,
                raw_data: &raw_data,
            })
            .await?;
        debug!(kyc_id = %claims.kyc_id, fields = slug_list.len(), "record updated");

        let payload = FlowResponse::done("welcome back");
        let ctx = HookContext {
            profile: &profile,
            record: Some(&record),
            provider_token: &claims.provider_token,
            payload: &payload,
        };

        match claims.redirect_form {
            RedirectForm::Login => {
                let sso_payload = self.hooks.generate_sso_payload(ctx).await?;
                if let Some(session_code) = claims.session_code.as_deref() {
                    self.notify_sso_complete(
                        &claims.provider_token,
                        session_code,
                        sso_payload,
                    )
                    .await;
                }
                Ok(payload)
            }
            RedirectForm::Register | RedirectForm::Resubmit => {
                match self.hooks.redirect_after_completed_register(ctx).await? {
                    Some(params) => Ok(FlowResponse::redirect(params)),
                    None => Ok(payload),
                }
            }
        }
    }

    /// Status query: resolves the record's review state, synthesizing a
    /// "what would be required" view when no record exists.
    ///
    /// # Errors
    /// Provider errors as elsewhere; `SummaryMissingField` when the host's
    /// summary omits `status` or `identities`.
    pub async fn query_status_flow(
        &self,
        code: &str,
        session_code: Option<&str>,
    ) -> Result<KycRecordStatus, KycKitError> {
        if code.trim().is_empty() {
            return Err(KycKitError::MissingArgument("code"));
        }

        let provider_token = self
            .gateway
            .handshake(code, session_code)
            .await?
            .ok_or(KycKitError::HandshakeFailed)?;
        let profile = self
            .gateway
            .fetch_profile(&provider_token)
            .await?
            .ok_or(KycKitError::SyncInfoFailed)?;

        let Some(record) = self.store.find_by_id(&profile.id).await? else {
            return Ok(KycRecordStatus::not_found(
                &self.config.required_fields,
                &self.config.certs,
            ));
        };

        let summary = self.store.summarize(&record).await?;
        if summary.status.is_none() {
            return Err(KycKitError::SummaryMissingField("status"));
        }
        if summary.identities.is_none() {
            return Err(KycKitError::SummaryMissingField("identities"));
        }

        // SSO-bound status checks additionally report completion; the
        // summary itself is returned unchanged either way.
        if let Some(session_code) = session_code {
            let payload = FlowResponse::done("welcome back");
            let ctx = HookContext {
                profile: &profile,
                record: Some(&record),
                provider_token: &provider_token,
                payload: &payload,
            };
            let sso_payload = self.hooks.generate_sso_payload(ctx).await?;
            self.notify_sso_complete(&provider_token, session_code, sso_payload)
                .await;
        }

        Ok(summary)
    }

    /// Resubmission: scopes a new upload round to a subset of the
    /// configured fields and certificates.
    ///
    /// # Errors
    /// `InvalidResubmitSelection` before any network call when the request
    /// falls outside the service configuration; `RecordNotFound` when the
    /// profile was never registered.
    pub async fn resubmit_data_flow(
        &self,
        code: &str,
        field_list: Vec<String>,
        cert_list: Vec<String>,
    ) -> Result<FlowResponse, KycKitError> {
        if code.trim().is_empty() {
            return Err(KycKitError::MissingArgument("code"));
        }
        if field_list.is_empty() && cert_list.is_empty() {
            return Err(KycKitError::MissingArgument("fieldList or certList"));
        }
        let in_config = field_list
            .iter()
            .all(|slug| self.config.required_fields.contains(slug))
            && cert_list.iter().all(|slug| self.config.certs.contains(slug));
        if !in_config {
            return Err(KycKitError::InvalidResubmitSelection);
        }

        let provider_token = self
            .gateway
            .handshake(code, None)
            .await?
            .ok_or(KycKitError::HandshakeFailed)?;
        let profile = self
            .gateway
            .fetch_profile(&provider_token)
            .await?
            .ok_or(KycKitError::SyncInfoFailed)?;

        let record = self
            .store
            .find_by_id(&profile.id)
            .await?
            .ok_or(KycKitError::RecordNotFound)?;

        let mut payload =
            FlowResponse::upload(field_list.clone(), None, cert_list.clone());
        let ctx = HookContext {
            profile: &profile,
            record: Some(&record),
            provider_token: &provider_token,
            payload: &payload,
        };
        if let Some(overridden) = self.hooks.on_resubmit(ctx).await? {
            payload = overridden;
        }

        if payload.next_action == NextAction::Upload {
            let claims = SessionClaims {
                kyc_id: profile.id,
                provider_token,
                session_code: None,
                redirect_form: RedirectForm::Resubmit,
                resubmit_info: Some(ResubmitInfo {
                    field_list: payload
                        .required_fields
                        .clone()
                        .unwrap_or(field_list),
                    cert_list: payload.certs.clone().unwrap_or(cert_list),
                }),
            };
            payload.access_token = Some(self.codec.encode(&claims)?);
        }
        Ok(payload)
    }

    /// Fetches inclusion-proof paths for `slug_list` from the provider.
    ///
    /// # Errors
    /// Transport failures from the gateway.
    pub async fn query_proof_of_path(
        &self,
        provider_token: &ProviderToken,
        slug_list: &[String],
    ) -> Result<Option<ProofBundle>, KycKitError> {
        self.gateway.query_proof_path(provider_token, slug_list).await
    }

    /// Deactivates the user on the provider side.
    ///
    /// # Errors
    /// Transport failures from the gateway.
    pub async fn deactivate_user(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<Value>, KycKitError> {
        self.gateway.deactivate(provider_token).await
    }

    /// Checks one field's raw value against a root hash using a proof path
    /// previously fetched via [`KycConnect::query_proof_of_path`]. Pure and
    /// offline; see [`validate_field`].
    #[must_use]
    pub fn merkle_proof_check_single(
        &self,
        root_hash: &str,
        raw_field_data: impl AsRef<[u8]>,
        proof_path: &[ProofNode],
    ) -> bool {
        validate_field(root_hash, raw_field_data, proof_path)
    }

    async fn notify_sso_complete(
        &self,
        provider_token: &ProviderToken,
        session_code: &str,
        sso_payload: Value,
    ) {
        // The record side effects already happened; a failed notify must
        // not fail the parent flow.
        match self
            .gateway
            .notify_login_complete(provider_token, session_code, sso_payload)
            .await
        {
            Ok(ack) => debug!(?ack, "sso completion reported"),
            Err(err) => warn!(%err, "sso completion notify failed"),
        }
    }
}
