//! Shared collaborators for the flow tests: an in-memory record store and a
//! scripted provider gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use kyckit_core::gateway::{ProofBundle, ProviderGateway};
use kyckit_core::store::{NewRecord, RecordStore, RecordUpdate};
use kyckit_core::types::{
    FieldStatus, FieldReviewStatus, KycProfile, KycRecordStatus, ProviderToken,
    RawData, RecordStatus, ServiceMetadata, SyncStatus,
};
use kyckit_core::KycKitError;

pub const TEST_SECRET: &str = "unitTest";

/// The host-side record shape used by the tests.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub kyc_id: String,
    pub ref_id: Option<String>,
    pub root_hash: String,
    pub status: RecordStatus,
    pub fields: HashMap<String, String>,
}

/// Record store over a shared hash map. Clones share state, so tests can
/// keep a handle for assertions after moving one into the orchestrator.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, TestRecord>>>,
    /// When set, summaries come back with no fields at all, imitating a
    /// host summary that violates the schema.
    pub broken_summaries: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TestRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.kyc_id.clone(), record);
    }

    #[allow(dead_code, reason = "used by a subset of the test binaries")]
    pub fn get(&self, kyc_id: &str) -> Option<TestRecord> {
        self.records.lock().unwrap().get(kyc_id).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    type Record = TestRecord;

    async fn find_by_id(
        &self,
        kyc_id: &str,
    ) -> Result<Option<TestRecord>, KycKitError> {
        Ok(self.records.lock().unwrap().get(kyc_id).cloned())
    }

    async fn create(&self, new: NewRecord<'_>) -> Result<TestRecord, KycKitError> {
        let record = TestRecord {
            kyc_id: new.profile.id.clone(),
            ref_id: new.ref_id.map(ToString::to_string),
            root_hash: new.profile.root_hash.clone(),
            status: RecordStatus::Waiting,
            fields: HashMap::new(),
        };
        self.insert(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        update: RecordUpdate<'_, TestRecord>,
    ) -> Result<TestRecord, KycKitError> {
        let mut record = update.record.clone();
        for (slug, raw) in update.raw_data {
            let stored = match raw {
                RawData::Text { value } => value.clone(),
                RawData::File { original_name, .. } => {
                    original_name.clone().unwrap_or_else(|| "<file>".to_string())
                }
            };
            record.fields.insert(slug.clone(), stored);
        }
        record.root_hash = update.profile.root_hash.clone();
        self.insert(record.clone());
        Ok(record)
    }

    async fn summarize(
        &self,
        record: &TestRecord,
    ) -> Result<KycRecordStatus, KycKitError> {
        if self.broken_summaries.load(Ordering::SeqCst) {
            return Ok(KycRecordStatus::default());
        }

        let identities = record
            .fields
            .keys()
            .map(|slug| FieldStatus {
                slug: slug.clone(),
                status: Some(FieldReviewStatus::Received),
                comment: None,
            })
            .collect();
        let mut extra = serde_json::Map::new();
        extra.insert("allowResubmit".to_string(), Value::Bool(true));
        Ok(KycRecordStatus {
            status: Some(record.status),
            message: Some(String::new()),
            identities: Some(identities),
            certificates: Some(vec![]),
            extra,
        })
    }
}

/// Scripted provider gateway. Clones share the call logs and toggles.
#[derive(Clone)]
pub struct StubGateway {
    profile: KycProfile,
    pub handshake_ok: Arc<AtomicBool>,
    pub profile_ok: Arc<AtomicBool>,
    pub notify_fails: Arc<AtomicBool>,
    pub handshake_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
    pub notify_calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubGateway {
    pub fn for_profile(kyc_id: &str) -> Self {
        Self {
            profile: KycProfile {
                id: kyc_id.to_string(),
                smart_contract_id: "0x0000000000000000000000000000000000000001"
                    .to_string(),
                root_hash: "a3b9".repeat(16),
                sync_status: SyncStatus::Complete,
            },
            handshake_ok: Arc::new(AtomicBool::new(true)),
            profile_ok: Arc::new(AtomicBool::new(true)),
            notify_fails: Arc::new(AtomicBool::new(false)),
            handshake_calls: Arc::new(Mutex::new(Vec::new())),
            notify_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn token(&self, code: &str) -> ProviderToken {
        ProviderToken {
            access_token: format!("stoc-{code}"),
            expires_at: u64::MAX,
            refresh_token: format!("stoc-refresh-{code}"),
        }
    }
}

#[async_trait]
impl ProviderGateway for StubGateway {
    async fn handshake(
        &self,
        code: &str,
        session_code: Option<&str>,
    ) -> Result<Option<ProviderToken>, KycKitError> {
        self.handshake_calls
            .lock()
            .unwrap()
            .push((code.to_string(), session_code.map(ToString::to_string)));
        if self.handshake_ok.load(Ordering::SeqCst) {
            Ok(Some(self.token(code)))
        } else {
            Ok(None)
        }
    }

    async fn fetch_profile(
        &self,
        _provider_token: &ProviderToken,
    ) -> Result<Option<KycProfile>, KycKitError> {
        if self.profile_ok.load(Ordering::SeqCst) {
            Ok(Some(self.profile.clone()))
        } else {
            Ok(None)
        }
    }

    async fn notify_login_complete(
        &self,
        _provider_token: &ProviderToken,
        session_code: &str,
        extra: Value,
    ) -> Result<Value, KycKitError> {
        if self.notify_fails.load(Ordering::SeqCst) {
            return Err(KycKitError::Network {
                url: "stub://notify".to_string(),
                status: Some(500),
                error: "scripted failure".to_string(),
            });
        }
        self.notify_calls
            .lock()
            .unwrap()
            .push((session_code.to_string(), extra));
        Ok(Value::Null)
    }

    async fn refresh_if_expired(
        &self,
        provider_token: &ProviderToken,
    ) -> Result<Option<ProviderToken>, KycKitError> {
        Ok(Some(provider_token.clone()))
    }

    async fn query_proof_path(
        &self,
        provider_token: &ProviderToken,
        slug_list: &[String],
    ) -> Result<Option<ProofBundle>, KycKitError> {
        let proof_list = slug_list
            .iter()
            .map(|slug| (slug.clone(), vec![]))
            .collect();
        Ok(Some(ProofBundle {
            proof_list,
            provider_token: provider_token.clone(),
        }))
    }

    async fn deactivate(
        &self,
        _provider_token: &ProviderToken,
    ) -> Result<Option<Value>, KycKitError> {
        Ok(Some(Value::Null))
    }

    async fn fetch_service_metadata(
        &self,
    ) -> Result<Option<ServiceMetadata>, KycKitError> {
        Ok(Some(ServiceMetadata {
            required_fields: vec!["phone".to_string()],
            optional_fields: vec![],
            certs: vec!["onfido".to_string()],
        }))
    }
}

pub fn existing_record(kyc_id: &str) -> TestRecord {
    TestRecord {
        kyc_id: kyc_id.to_string(),
        ref_id: None,
        root_hash: "a3b9".repeat(16),
        status: RecordStatus::Waiting,
        fields: HashMap::new(),
    }
}

#[allow(dead_code, reason = "used by a subset of the test binaries")]
pub fn text(value: &str) -> RawData {
    RawData::Text {
        value: value.to_string(),
    }
}
