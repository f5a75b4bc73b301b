// End-to-end reconciliation runs against an in-memory store and a scripted registry

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use registry_sync::{
    CatalogStatus, ReconciliationEngine, RegistryLookup, Seller, SellerCatalogState,
    SellerRepository, SqliteSellerStore, Subscriber, SyncError, SyncRegistryRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const DOMAIN: &str = "ONDC:RET10";
const ENV: &str = "preprod";

// ============================================================================
// FIXTURES
// ============================================================================

/// Registry stand-in: per-domain snapshot or failure message
#[derive(Clone, Default)]
struct ScriptedRegistry {
    snapshots: Arc<Mutex<HashMap<String, std::result::Result<Vec<Subscriber>, String>>>>,
}

impl ScriptedRegistry {
    fn set(&self, domain: &str, ids: &[&str]) {
        let subscribers = ids.iter().map(|id| subscriber(domain, id, "std:080")).collect();
        self.snapshots
            .lock()
            .unwrap()
            .insert(domain.to_string(), Ok(subscribers));
    }

    fn set_subscribers(&self, domain: &str, subscribers: Vec<Subscriber>) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(domain.to_string(), Ok(subscribers));
    }

    fn fail(&self, domain: &str, message: &str) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(domain.to_string(), Err(message.to_string()));
    }
}

#[async_trait]
impl RegistryLookup for ScriptedRegistry {
    async fn fetch_subscribers(&self, domain: &str) -> registry_sync::Result<Vec<Subscriber>> {
        match self.snapshots.lock().unwrap().get(domain) {
            Some(Ok(subscribers)) => Ok(subscribers.clone()),
            Some(Err(message)) => Err(SyncError::Upstream(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Store wrapper that can be told to fail inserts or updates
struct FlakyStore {
    inner: SqliteSellerStore,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        FlakyStore {
            inner: SqliteSellerStore::open_in_memory().unwrap(),
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }
}

impl SellerRepository for FlakyStore {
    fn insert_sellers(&self, sellers: &[Seller]) -> registry_sync::Result<usize> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("simulated insert failure".into()));
        }
        self.inner.insert_sellers(sellers)
    }

    fn update_sellers(&self, sellers: &[Seller]) -> registry_sync::Result<usize> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("simulated update failure".into()));
        }
        self.inner.update_sellers(sellers)
    }

    fn get_active_sellers(&self, domain: &str, registry_env: &str) -> registry_sync::Result<Vec<Seller>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("simulated read failure".into()));
        }
        self.inner.get_active_sellers(domain, registry_env)
    }

    fn deactivate_sellers(
        &self,
        seller_ids: &[String],
        domain: &str,
        registry_env: &str,
        now: DateTime<Utc>,
    ) -> registry_sync::Result<usize> {
        self.inner.deactivate_sellers(seller_ids, domain, registry_env, now)
    }

    fn upsert_catalog_state(&self, state: &SellerCatalogState) -> registry_sync::Result<bool> {
        self.inner.upsert_catalog_state(state)
    }
}

fn subscriber(domain: &str, id: &str, city: &str) -> Subscriber {
    Subscriber {
        subscriber_id: id.to_string(),
        uk_id: format!("uk-{id}"),
        domain: domain.to_string(),
        country: "IND".to_string(),
        city: city.to_string(),
        status: "SUBSCRIBED".to_string(),
        valid_from: "2024-01-01T00:00:00.000Z".to_string(),
        valid_until: "2030-01-01T00:00:00.000Z".to_string(),
        ..Default::default()
    }
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 6, 0, 0).unwrap()
}

fn request(domains: &[&str]) -> SyncRegistryRequest {
    SyncRegistryRequest::new(ENV, domains.iter().map(|d| d.to_string()).collect())
}

fn engine() -> (
    ReconciliationEngine<SqliteSellerStore, ScriptedRegistry>,
    Arc<SqliteSellerStore>,
    ScriptedRegistry,
) {
    let store = Arc::new(SqliteSellerStore::open_in_memory().unwrap());
    let registry = ScriptedRegistry::default();
    let engine = ReconciliationEngine::new(store.clone(), registry.clone());
    (engine, store, registry)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_insert_update_deactivate_scenario() {
    let (engine, store, registry) = engine();

    // Local store already has S2 and S3 active, without catalog state
    for id in ["S2", "S3"] {
        let seller = registry_sync::seller_from_subscriber(&subscriber(DOMAIN, id, "std:080"), DOMAIN, ENV, at(1));
        store.insert_sellers(&[seller]).unwrap();
    }

    registry.set(DOMAIN, &["S1", "S2"]);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(2)).await;

    assert_eq!(response.registry_env, ENV);
    assert_eq!(response.run_at, "2025-01-02T06:00:00Z");
    assert_eq!(response.domains.len(), 1);

    let summary = &response.domains[0];
    assert_eq!(summary.domain, DOMAIN);
    assert_eq!(summary.new_sellers, 1);
    assert_eq!(summary.updated_sellers, 1);
    assert_eq!(summary.deactivated_sellers, 1);
    assert_eq!(summary.total_sellers_in_registry, 2);

    // NOT_SYNCED state for S1 only
    assert_eq!(store.count_catalog_states(DOMAIN, ENV).unwrap(), 1);
    let state = store.get_catalog_state("S1", DOMAIN, ENV).unwrap().unwrap();
    assert_eq!(state.status, CatalogStatus::NotSynced);
    assert_eq!(state.last_pull_at, None);
    assert_eq!(state.last_success_at, None);
    assert_eq!(state.sync_version, 0);

    let s2 = store.get_seller("S2", DOMAIN, ENV).unwrap().unwrap();
    assert_eq!(s2.last_seen_in_registry, at(2));
    assert_eq!(s2.created_at, at(1));

    let s3 = store.get_seller("S3", DOMAIN, ENV).unwrap().unwrap();
    assert!(!s3.active);

    println!("✅ {}", response.summary());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let (engine, store, registry) = engine();
    registry.set(DOMAIN, &["a", "b", "c"]);

    let first = engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;
    assert_eq!(first.domains[0].new_sellers, 3);

    let rows_after_first = store.get_all_sellers().unwrap();
    let states_after_first: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| store.get_catalog_state(id, DOMAIN, ENV).unwrap())
        .collect();

    let second = engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;
    let summary = &second.domains[0];
    assert_eq!(summary.new_sellers, 0);
    assert_eq!(summary.deactivated_sellers, 0);
    // "updated" means present in both snapshots
    assert_eq!(summary.updated_sellers, 3);

    assert_eq!(store.get_all_sellers().unwrap(), rows_after_first);
    let states_after_second: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| store.get_catalog_state(id, DOMAIN, ENV).unwrap())
        .collect();
    assert_eq!(states_after_second, states_after_first);
}

#[tokio::test]
async fn test_failed_domain_does_not_block_others() {
    let (engine, store, registry) = engine();
    registry.fail("A", "simulated network error");
    registry.set("B", &["b1", "b2"]);

    let response = engine.sync_registry_at(&request(&["A", "B"]), at(1)).await;

    let domains: Vec<&str> = response.domains.iter().map(|d| d.domain.as_str()).collect();
    assert_eq!(domains, vec!["A", "B"]);

    let a = &response.domains[0];
    assert_eq!(
        (a.new_sellers, a.updated_sellers, a.deactivated_sellers, a.total_sellers_in_registry),
        (0, 0, 0, 0)
    );

    let b = &response.domains[1];
    assert_eq!(b.new_sellers, 2);
    assert_eq!(b.total_sellers_in_registry, 2);
    assert_eq!(store.get_active_sellers("B", ENV).unwrap().len(), 2);
}

#[tokio::test]
async fn test_sellers_are_never_hard_deleted() {
    let (engine, store, registry) = engine();

    registry.set(DOMAIN, &["a", "b"]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;

    registry.set(DOMAIN, &[]);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(2)).await;
    assert_eq!(response.domains[0].deactivated_sellers, 2);
    assert_eq!(store.get_all_sellers().unwrap().len(), 2);
    assert!(store.get_active_sellers(DOMAIN, ENV).unwrap().is_empty());

    // "a" comes back: reactivated in place, no new catalog state
    registry.set(DOMAIN, &["a"]);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(3)).await;
    assert_eq!(response.domains[0].new_sellers, 1);

    let all = store.get_all_sellers().unwrap();
    assert_eq!(all.len(), 2);
    let a = store.get_seller("a", DOMAIN, ENV).unwrap().unwrap();
    assert!(a.active);
    assert_eq!(a.created_at, at(1));
    assert_eq!(a.last_seen_in_registry, at(3));
    assert_eq!(store.count_catalog_states(DOMAIN, ENV).unwrap(), 2);
}

#[tokio::test]
async fn test_returning_seller_keeps_catalog_progress() {
    let (engine, store, registry) = engine();

    registry.set(DOMAIN, &["a"]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;

    store
        .lock()
        .unwrap()
        .execute(
            "UPDATE seller_catalog_state SET status = 'SYNCED', sync_version = 7 WHERE seller_id = 'a'",
            [],
        )
        .unwrap();

    registry.set(DOMAIN, &[]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(2)).await;
    registry.set(DOMAIN, &["a"]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(3)).await;

    let state = store.get_catalog_state("a", DOMAIN, ENV).unwrap().unwrap();
    assert_eq!(state.status, CatalogStatus::Synced);
    assert_eq!(state.sync_version, 7);
}

#[tokio::test]
async fn test_insert_failure_skips_state_init() {
    let store = Arc::new(FlakyStore::new());
    let registry = ScriptedRegistry::default();
    let engine = ReconciliationEngine::new(store.clone(), registry.clone());

    registry.set(DOMAIN, &["a", "b"]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;

    // Next snapshot: a stays, b leaves, c is new - but inserts fail
    store.fail_inserts.store(true, Ordering::SeqCst);
    registry.set(DOMAIN, &["a", "c"]);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(2)).await;

    let summary = &response.domains[0];
    assert_eq!(summary.new_sellers, 0);
    assert_eq!(summary.updated_sellers, 1);
    assert_eq!(summary.deactivated_sellers, 1);
    assert_eq!(summary.total_sellers_in_registry, 2);

    assert!(store.inner.get_seller("c", DOMAIN, ENV).unwrap().is_none());
    assert!(store.inner.get_catalog_state("c", DOMAIN, ENV).unwrap().is_none());
    assert!(!store.inner.get_seller("b", DOMAIN, ENV).unwrap().unwrap().active);

    // Recovery run picks c up
    store.fail_inserts.store(false, Ordering::SeqCst);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(3)).await;
    assert_eq!(response.domains[0].new_sellers, 1);
    assert!(store.inner.get_catalog_state("c", DOMAIN, ENV).unwrap().is_some());
}

#[tokio::test]
async fn test_update_failure_applies_nothing_from_update_batch() {
    let store = Arc::new(FlakyStore::new());
    let registry = ScriptedRegistry::default();
    let engine = ReconciliationEngine::new(store.clone(), registry.clone());

    registry.set(DOMAIN, &["a", "b"]);
    engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;

    store.fail_updates.store(true, Ordering::SeqCst);
    registry.set_subscribers(
        DOMAIN,
        vec![subscriber(DOMAIN, "a", "std:022"), subscriber(DOMAIN, "b", "std:022")],
    );
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(2)).await;
    assert_eq!(response.domains[0].updated_sellers, 0);

    for id in ["a", "b"] {
        let seller = store.inner.get_seller(id, DOMAIN, ENV).unwrap().unwrap();
        assert_eq!(seller.city, "std:080");
        assert_eq!(seller.last_seen_in_registry, at(1));
    }
}

#[tokio::test]
async fn test_local_read_failure_skips_domain() {
    let store = Arc::new(FlakyStore::new());
    let registry = ScriptedRegistry::default();
    let engine = ReconciliationEngine::new(store.clone(), registry.clone());

    store.fail_reads.store(true, Ordering::SeqCst);
    registry.set(DOMAIN, &["a"]);
    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;

    let summary = &response.domains[0];
    assert_eq!(summary.total_sellers_in_registry, 1);
    assert_eq!(summary.new_sellers, 0);
    assert!(store.inner.get_all_sellers().unwrap().is_empty());
}

#[tokio::test]
async fn test_domains_and_environments_are_isolated() {
    let (engine, store, registry) = engine();
    registry.set("A", &["shared"]);
    registry.set("B", &["shared"]);

    engine.sync_registry_at(&request(&["A", "B"]), at(1)).await;

    // Dropping it from A leaves B's row alone
    registry.set("A", &[]);
    engine.sync_registry_at(&request(&["A"]), at(2)).await;
    assert!(!store.get_seller("shared", "A", ENV).unwrap().unwrap().active);
    assert!(store.get_seller("shared", "B", ENV).unwrap().unwrap().active);

    // A different environment starts from scratch
    let prod = SyncRegistryRequest::new("prod", vec!["B".to_string()]);
    let response = engine.sync_registry_at(&prod, at(3)).await;
    assert_eq!(response.domains[0].new_sellers, 1);
    assert_eq!(store.get_all_sellers().unwrap().len(), 3);
}

#[tokio::test]
async fn test_entries_without_id_are_skipped() {
    let (engine, store, registry) = engine();
    registry.set_subscribers(
        DOMAIN,
        vec![subscriber(DOMAIN, "a", "std:080"), subscriber(DOMAIN, "  ", "std:080")],
    );

    let response = engine.sync_registry_at(&request(&[DOMAIN]), at(1)).await;
    assert_eq!(response.domains[0].total_sellers_in_registry, 2);
    assert_eq!(response.domains[0].new_sellers, 1);
    assert_eq!(store.get_all_sellers().unwrap().len(), 1);
}
