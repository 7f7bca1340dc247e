//! Wire-facing data model shared by the flows, the session codec and the
//! provider gateway.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// Session claims

/// Tag embedded in a session token identifying which flow issued it.
///
/// The orchestrator branches on this after an upload: a `login` token
/// triggers the SSO-completion notify, `register` and `resubmit` tokens go
/// through the redirect hook instead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RedirectForm {
    /// Issued by the login flow; carries a session code for SSO completion.
    Login,
    /// Issued by the registration flow.
    Register,
    /// Issued by the resubmission flow; carries the selected field subset.
    Resubmit,
}

/// The field/certificate subset a resubmission token is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubmitInfo {
    /// Identity field slugs selected for re-upload.
    pub field_list: Vec<String>,
    /// Certificate slugs selected for re-upload.
    pub cert_list: Vec<String>,
}

/// Payload carried inside an opaque session token between flow steps.
///
/// Claims are immutable once issued; each step consumes the presented token
/// and issues a fresh one for the next step. Nothing here is ever persisted
/// server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Profile id assigned by the attestation provider.
    pub kyc_id: String,
    /// The provider credential threaded across steps.
    pub provider_token: ProviderToken,
    /// SSO session code, present only on login-issued tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_code: Option<String>,
    /// Which flow issued this token.
    pub redirect_form: RedirectForm,
    /// Field subset for resubmission tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resubmit_info: Option<ResubmitInfo>,
}

// Provider-owned data

/// Access/refresh token pair returned by the provider handshake.
///
/// The orchestrator treats this as an opaque credential; only the gateway's
/// refresh path looks at the expiry horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderToken {
    /// Bearer token for provider API calls.
    pub access_token: String,
    /// Unix timestamp (seconds) after which the access token is stale.
    pub expires_at: u64,
    /// Token used to renew the pair.
    pub refresh_token: String,
}

impl ProviderToken {
    /// Whether the access token has passed its expiry horizon at `now`
    /// (unix seconds).
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Smart-contract synchronization state of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncStatus {
    /// The root hash is still being anchored.
    Syncing,
    /// The root hash is anchored and auditable.
    Complete,
}

/// Identity profile returned by the provider.
///
/// Re-fetched on every flow step, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycProfile {
    /// Provider-assigned profile id.
    pub id: String,
    /// On-chain user id used to cross-check the root hash.
    pub smart_contract_id: String,
    /// Merkle root committing to the full set of identity fields.
    pub root_hash: String,
    /// Anchoring state of `root_hash`.
    pub sync_status: SyncStatus,
}

// Record status summaries

/// Overall state of a KYC record as reported by the host's record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RecordStatus {
    /// No record exists for the profile.
    NotFound,
    /// Record created, data not yet complete.
    Waiting,
    /// Data complete, review pending.
    Inreview,
    /// Review passed.
    Approved,
}

/// Review state of an individual identity field or certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldReviewStatus {
    /// Uploaded and awaiting review.
    Received,
    /// Accepted by the reviewer.
    Approved,
    /// Rejected by the reviewer.
    Rejected,
    /// Expected but never uploaded.
    Missing,
}

/// Per-field entry of a status summary.
///
/// Synthesized placeholders (the "what would be required" view for unknown
/// users) have no review status yet; that serializes as an empty string on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatus {
    /// Field or certificate slug.
    pub slug: String,
    /// Review state, absent for placeholders.
    #[serde(default, with = "empty_as_none")]
    pub status: Option<FieldReviewStatus>,
    /// Reviewer comment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FieldStatus {
    /// Placeholder entry for a slug no data has been uploaded for.
    #[must_use]
    pub fn placeholder(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            status: None,
            comment: None,
        }
    }
}

/// Status summary of a KYC record.
///
/// Authored by the host's record store, so `status` and `identities` are
/// optional at the type level and validated by the orchestrator; anything
/// the host adds beyond the known fields (`allowResubmit`, `createdDate`,
/// ...) rides along in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KycRecordStatus {
    /// Overall record state. Mandatory; enforced by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    /// Summary text for the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Identity field states. Mandatory; enforced by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<FieldStatus>>,
    /// Certificate states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<FieldStatus>>,
    /// Additional host-defined summary fields, passed through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl KycRecordStatus {
    /// The synthesized view returned when no record exists: `notFound` plus
    /// one placeholder per configured required field and certificate.
    #[must_use]
    pub fn not_found(required_fields: &[String], certs: &[String]) -> Self {
        Self {
            status: Some(RecordStatus::NotFound),
            message: None,
            identities: Some(
                required_fields
                    .iter()
                    .map(|slug| FieldStatus::placeholder(slug.as_str()))
                    .collect(),
            ),
            certificates: Some(
                certs
                    .iter()
                    .map(|slug| FieldStatus::placeholder(slug.as_str()))
                    .collect(),
            ),
            extra: serde_json::Map::new(),
        }
    }
}

// Raw uploads

/// A single uploaded value: either an inline string or a binary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RawData {
    /// Inline string value, e.g. a phone number or a certificate document.
    #[serde(rename = "string")]
    Text {
        /// The value itself.
        value: String,
    },
    /// Binary upload, base64 on the wire.
    #[serde(rename = "file")]
    File {
        /// File contents.
        #[serde(with = "base64_bytes")]
        buffer: Vec<u8>,
        /// Client-side file name, if supplied.
        #[serde(
            rename = "originalName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        original_name: Option<String>,
    },
}

/// Map of field slug to uploaded value, as received from the mobile client.
pub type RawDataMap = std::collections::HashMap<String, RawData>;

// Flow responses

/// What the mobile client should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NextAction {
    /// Nothing further; the step is complete.
    None,
    /// Upload the listed fields and certificates.
    Upload,
    /// Open the redirect described by the extra payload fields.
    Redirect,
}

/// Response payload a flow hands back to the mobile client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    /// Next client action.
    pub next_action: NextAction,
    /// Optional display message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Fresh session token for the next step, when one is issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Identity fields the client must upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<Vec<String>>,
    /// Identity fields the client may upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_fields: Option<Vec<String>>,
    /// Certificates the client may upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certs: Option<Vec<String>>,
    /// Hook-contributed fields (e.g. redirect query parameters).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FlowResponse {
    /// A terminal `none` response with a display message.
    #[must_use]
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            next_action: NextAction::None,
            message: Some(message.into()),
            access_token: None,
            required_fields: None,
            optional_fields: None,
            certs: None,
            extra: serde_json::Map::new(),
        }
    }

    /// An `upload` instruction for the given field and certificate sets.
    #[must_use]
    pub fn upload(
        required_fields: Vec<String>,
        optional_fields: Option<Vec<String>>,
        certs: Vec<String>,
    ) -> Self {
        Self {
            next_action: NextAction::Upload,
            message: None,
            access_token: None,
            required_fields: Some(required_fields),
            optional_fields,
            certs: Some(certs),
            extra: serde_json::Map::new(),
        }
    }

    /// A `redirect` instruction whose parameters ride in the flattened extra
    /// fields.
    #[must_use]
    pub fn redirect(params: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            next_action: NextAction::Redirect,
            message: None,
            access_token: None,
            required_fields: None,
            optional_fields: None,
            certs: None,
            extra: params,
        }
    }
}

// Service metadata

/// The relying-party service configuration as published by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    /// Identity fields the service requires.
    pub required_fields: Vec<String>,
    /// Identity fields the service accepts but does not require.
    #[serde(default)]
    pub optional_fields: Vec<String>,
    /// Certificates the service accepts.
    #[serde(default)]
    pub certs: Vec<String>,
}

/// Serde adapter mapping `None` to the empty string the provider wire format
/// uses for not-yet-reviewed fields.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FieldReviewStatus;

    pub fn serialize<S: Serializer>(
        value: &Option<FieldReviewStatus>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(status) => status.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<FieldReviewStatus>, D::Error> {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None => Ok(None),
            Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Serde adapter for binary payloads, standard base64 on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_form_wire_names() {
        assert_eq!(
            serde_json::to_string(&RedirectForm::Login).unwrap(),
            "\"login\""
        );
        assert_eq!(
            serde_json::to_string(&RedirectForm::Resubmit).unwrap(),
            "\"resubmit\""
        );
        assert_eq!(RedirectForm::Register.to_string(), "register");
    }

    #[test]
    fn record_status_uses_camel_case() {
        assert_eq!(
            serde_json::to_string(&RecordStatus::NotFound).unwrap(),
            "\"notFound\""
        );
        assert_eq!(
            serde_json::to_string(&RecordStatus::Inreview).unwrap(),
            "\"inreview\""
        );
    }

    #[test]
    fn session_claims_round_trip() {
        let claims = SessionClaims {
            kyc_id: "5ad8".into(),
            provider_token: ProviderToken {
                access_token: "at".into(),
                expires_at: 1_700_000_000,
                refresh_token: "rt".into(),
            },
            session_code: Some("1xxx".into()),
            redirect_form: RedirectForm::Login,
            resubmit_info: None,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("\"kycId\""));
        assert!(json.contains("\"redirectForm\":\"login\""));
        assert!(!json.contains("resubmitInfo"));
        let back: SessionClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn raw_data_tagged_representation() {
        let text = RawData::Text {
            value: "+84987543212".into(),
        };
        assert_eq!(
            serde_json::to_string(&text).unwrap(),
            r#"{"type":"string","value":"+84987543212"}"#
        );

        let file = RawData::File {
            buffer: vec![1, 2, 3],
            original_name: Some("selfie.jpg".into()),
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["buffer"], "AQID");
        assert_eq!(json["originalName"], "selfie.jpg");
        let back: RawData = serde_json::from_value(json).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn placeholder_status_serializes_empty() {
        let entry = FieldStatus::placeholder("phone");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "");
    }

    #[test]
    fn not_found_view_lists_configured_slugs() {
        let view =
            KycRecordStatus::not_found(&["phone".into(), "email".into()], &["onfido".into()]);
        assert_eq!(view.status, Some(RecordStatus::NotFound));
        let identities = view.identities.unwrap();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].slug, "phone");
        assert_eq!(view.certificates.unwrap()[0].slug, "onfido");
    }

    #[test]
    fn summary_passes_host_fields_through() {
        let json = serde_json::json!({
            "status": "waiting",
            "identities": [{"slug": "phone", "status": "missing"}],
            "certificates": [],
            "allowResubmit": true,
        });
        let summary: KycRecordStatus = serde_json::from_value(json).unwrap();
        assert_eq!(summary.status, Some(RecordStatus::Waiting));
        assert_eq!(summary.extra["allowResubmit"], true);
        let back = serde_json::to_value(&summary).unwrap();
        assert_eq!(back["allowResubmit"], true);
    }

    #[test]
    fn provider_token_expiry() {
        let token = ProviderToken {
            access_token: "at".into(),
            expires_at: 100,
            refresh_token: "rt".into(),
        };
        assert!(!token.is_expired(99));
        assert!(token.is_expired(100));
    }
}
