use thiserror::Error;

/// Error outputs from `kyckit`.
#[derive(Debug, Error)]
pub enum KycKitError {
    /// A required call argument was not supplied. Raised before any network
    /// round trip.
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),
    /// The presented access token failed to decode or verify.
    #[error("invalid access token")]
    InvalidAccessToken,
    /// The session codec could not serialize the claims being issued.
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
    /// The provider rejected the authorization-code handshake.
    #[error("handshake failed")]
    HandshakeFailed,
    /// The provider could not return the profile for the carried token.
    #[error("sync info failed")]
    SyncInfoFailed,
    /// A registration flow was started for a profile that already has a
    /// record.
    #[error("user has already registered")]
    AlreadyRegistered,
    /// A flow that requires an existing record found none.
    #[error("kyc record not found")]
    RecordNotFound,
    /// An upload omitted a required field or supplied it without a value.
    #[error("missing critical slug")]
    MissingCriticalSlug,
    /// A resubmission asked for fields or certificates outside the service
    /// configuration.
    #[error("invalid fieldList or certList name")]
    InvalidResubmitSelection,
    /// The record store's status summary omitted a mandatory field.
    #[error("status summary missing field: {0}")]
    SummaryMissingField(&'static str),
    /// The host's record store implementation failed.
    #[error("record store error: {0}")]
    Store(String),
    /// A host-supplied hook failed.
    #[error("hook error: {0}")]
    Hook(String),
    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// Network connection error with details.
    #[error("network_error: {url}: {error}")]
    Network {
        /// URL the request was sent to.
        url: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Underlying error detail.
        error: String,
    },
    /// HTTP request failure.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
