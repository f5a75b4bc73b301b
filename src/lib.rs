// Registry Sync - Core Library
// Exposes the signer, registry client, participant store and reconciliation
// engine for the scheduler binary, the API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod reconciliation;
pub mod registry;
pub mod signer;

// Re-export commonly used types
pub use config::{Config, RetryPolicy};
pub use db::{
    setup_database, CatalogStatus, CatalogSyncStatus, PageInfo, PendingSellersPage, Seller,
    SellerCatalogState, SellerInfo, SellerKey, SellerRepository, SqliteSellerStore,
};
pub use error::{Result, SyncError};
pub use reconciliation::{
    plan_reconciliation, seller_from_subscriber, DomainSyncSummary, ReconciliationEngine,
    ReconciliationPlan, SyncRegistryRequest, SyncRegistryResponse,
};
pub use registry::{LookupRequest, RegistryClient, RegistryLookup, Subscriber};
pub use signer::{
    generate_signing_keys, sign_request, signature_base, verify_header, verify_request,
    AuthorizationHeader, KeyPair, Signer,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
