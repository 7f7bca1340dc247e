//! Relying-party SDK for provider-attested identity verification (KYC).
//!
//! The host service keeps full ownership of its user records while the
//! attestation provider performs the actual verification. Three pieces make
//! that work:
//!
//! - a tamper-evident session-token codec threading claims across the
//!   stateless onboarding steps ([`session`]),
//! - a flow orchestrator covering login, registration, data upload, status
//!   query and resubmission ([`connect`]),
//! - an offline Merkle inclusion-proof verifier for auditing individual
//!   identity fields against the provider's published root hash
//!   ([`merkle`]).
//!
//! Persistence and the provider transport are collaborator traits
//! ([`store::RecordStore`], [`gateway::ProviderGateway`]); a default
//! reqwest-backed gateway ships in [`http`].
//!
//! ```no_run
//! use kyckit_core::{
//!     connect::{KycConnect, ServiceConfig},
//!     hooks::NoHooks,
//!     http::HttpProviderGateway,
//! };
//! # async fn example(store: impl kyckit_core::store::RecordStore) -> Result<(), kyckit_core::KycKitError> {
//! let config = ServiceConfig {
//!     client_id: "my-service".into(),
//!     client_secret: std::env::var("KYC_SECRET").unwrap_or_default(),
//!     required_fields: vec!["phone".into()],
//!     optional_fields: vec![],
//!     certs: vec!["onfido".into()],
//! };
//! let gateway = HttpProviderGateway::new("https://provider.example", "my-service", "secret");
//! let sdk = KycConnect::new(config, gateway, store, NoHooks)?;
//! let step = sdk.register_flow("auth-code", None).await?;
//! # let _ = step; Ok(())
//! # }
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod connect;
pub mod gateway;
pub mod hooks;
pub mod http;
pub mod merkle;
pub mod session;
pub mod store;
pub mod types;

mod error;
pub use error::*;
