//! The host-owned record-store boundary.

use async_trait::async_trait;

use crate::error::KycKitError;
use crate::types::{KycProfile, KycRecordStatus, ProviderToken, RawDataMap};

/// Inputs for creating a fresh KYC record.
#[derive(Debug, Clone, Copy)]
pub struct NewRecord<'a> {
    /// The provider profile the record is keyed by.
    pub profile: &'a KycProfile,
    /// The credential in effect when the record was created.
    pub provider_token: &'a ProviderToken,
    /// Host-side correlation id supplied by the caller, if any.
    pub ref_id: Option<&'a str>,
}

/// Inputs for updating an existing record with uploaded data.
#[derive(Debug, Clone, Copy)]
pub struct RecordUpdate<'a, R> {
    /// The record being updated.
    pub record: &'a R,
    /// The freshly re-fetched provider profile.
    pub profile: &'a KycProfile,
    /// The credential carried in the presented session token.
    pub provider_token: &'a ProviderToken,
    /// Raw field map uploaded by the client.
    pub raw_data: &'a RawDataMap,
}

/// Persistence operations the flows delegate to the host.
///
/// The associated `Record` stays opaque to the orchestrator: beyond identity
/// (`find_by_id` returning `Some` means the user exists, with no partial
/// matching) the only thing the SDK ever reads about a record is what
/// [`RecordStore::summarize`] reports.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The host's record type.
    type Record: Send + Sync;

    /// Looks up a record by the provider-assigned profile id.
    async fn find_by_id(
        &self,
        kyc_id: &str,
    ) -> Result<Option<Self::Record>, KycKitError>;

    /// Creates a record for a profile that has none.
    async fn create(&self, new: NewRecord<'_>) -> Result<Self::Record, KycKitError>;

    /// Applies an uploaded raw-data map to a record.
    ///
    /// Persisting the individual fields may fan out internally (the map is
    /// order-independent); the SDK awaits the whole operation.
    async fn update(
        &self,
        update: RecordUpdate<'_, Self::Record>,
    ) -> Result<Self::Record, KycKitError>;

    /// Summarizes a record for the status-query flow. The orchestrator
    /// rejects summaries missing `status` or `identities`.
    async fn summarize(
        &self,
        record: &Self::Record,
    ) -> Result<KycRecordStatus, KycKitError>;
}
