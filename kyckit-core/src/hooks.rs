//! Optional host extension points for the flows.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::KycKitError;
use crate::types::{FlowResponse, KycProfile, ProviderToken};

/// Everything a hook gets to look at: the fresh provider profile, the host's
/// record (when one exists), the provider credential in play and the payload
/// the flow is about to act on.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a, R> {
    /// Profile fetched for this step.
    pub profile: &'a KycProfile,
    /// The host record, if the flow has one in hand.
    pub record: Option<&'a R>,
    /// The provider credential for this step.
    pub provider_token: &'a ProviderToken,
    /// The payload the flow built so far.
    pub payload: &'a FlowResponse,
}

/// Host extension points, one method per hook. Every method has a default
/// (the "not configured" behavior), so implementations override only what
/// they need; [`NoHooks`] takes all defaults.
#[async_trait]
pub trait FlowHooks<R: Send + Sync>: Send + Sync {
    /// Lets the host reshape the resubmission payload (e.g. trim the field
    /// list to what actually needs re-upload, or divert to a redirect).
    /// Returning `None` keeps the flow's default payload. This hook is
    /// additive only: required-field enforcement stays in the upload step.
    async fn on_resubmit(
        &self,
        _ctx: HookContext<'_, R>,
    ) -> Result<Option<FlowResponse>, KycKitError> {
        Ok(None)
    }

    /// Produces the payload attached to the SSO-completion notify.
    async fn generate_sso_payload(
        &self,
        _ctx: HookContext<'_, R>,
    ) -> Result<Value, KycKitError> {
        Ok(Value::Object(Map::new()))
    }

    /// After a completed register or resubmit upload, `Some(params)` tells
    /// the client to open a redirect with the given query parameters instead
    /// of finishing with `none`.
    async fn redirect_after_completed_register(
        &self,
        _ctx: HookContext<'_, R>,
    ) -> Result<Option<Map<String, Value>>, KycKitError> {
        Ok(None)
    }
}

/// The no-op hook set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

#[async_trait]
impl<R: Send + Sync> FlowHooks<R> for NoHooks {}
