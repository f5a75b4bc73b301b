// ⚖️ Reconciliation Engine - align local sellers with the registry
//
// Per domain, keyed by seller id:
//   in registry, not local  -> insert (+ NOT_SYNCED catalog state)
//   in registry and local   -> update
//   local, not in registry  -> deactivate (never delete)
//
// Domains are processed one after another. A failure in one domain is
// logged and leaves a summary with whatever was actually applied; the run
// itself never fails.

use crate::db::{Seller, SellerCatalogState, SellerRepository};
use crate::registry::{RegistryLookup, Subscriber, SELLER_PLATFORM_TYPE};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

// ============================================================================
// REQUEST / REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRegistryRequest {
    pub registry_env: String,
    pub domains: Vec<String>,
}

impl SyncRegistryRequest {
    pub fn new(registry_env: impl Into<String>, domains: Vec<String>) -> Self {
        SyncRegistryRequest {
            registry_env: registry_env.into(),
            domains,
        }
    }

    /// Both fields must be non-empty for a run to make sense
    pub fn is_valid(&self) -> bool {
        !self.registry_env.trim().is_empty() && !self.domains.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSyncSummary {
    pub domain: String,
    pub new_sellers: usize,
    pub updated_sellers: usize,
    pub deactivated_sellers: usize,
    pub total_sellers_in_registry: usize,
}

impl DomainSyncSummary {
    fn empty(domain: &str) -> Self {
        DomainSyncSummary {
            domain: domain.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRegistryResponse {
    pub registry_env: String,

    /// RFC3339 wall-clock time the run started
    pub run_at: String,

    /// Same order as the requested domains
    pub domains: Vec<DomainSyncSummary>,
}

impl SyncRegistryResponse {
    pub fn summary(&self) -> String {
        let (new, updated, deactivated) = self.domains.iter().fold((0, 0, 0), |acc, d| {
            (
                acc.0 + d.new_sellers,
                acc.1 + d.updated_sellers,
                acc.2 + d.deactivated_sellers,
            )
        });
        format!(
            "Registry sync {} at {}: {} domains, {} new, {} updated, {} deactivated",
            self.registry_env,
            self.run_at,
            self.domains.len(),
            new,
            updated,
            deactivated
        )
    }
}

// ============================================================================
// PARTITION
// ============================================================================

/// Three-way split of one domain's registry and local snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_insert: Vec<Seller>,
    pub to_update: Vec<Seller>,
    pub removed_ids: Vec<String>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.removed_ids.is_empty()
    }
}

/// Partition by seller id. Pure; output vectors are sorted by id.
pub fn plan_reconciliation(
    registry: HashMap<String, Seller>,
    local: &HashMap<String, Seller>,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan {
        removed_ids: local
            .keys()
            .filter(|id| !registry.contains_key(*id))
            .cloned()
            .collect(),
        ..Default::default()
    };

    for (id, mut seller) in registry {
        match local.get(&id) {
            Some(existing) => {
                seller.created_at = existing.created_at;
                plan.to_update.push(seller);
            }
            None => plan.to_insert.push(seller),
        }
    }

    plan.to_insert.sort_by(|a, b| a.seller_id.cmp(&b.seller_id));
    plan.to_update.sort_by(|a, b| a.seller_id.cmp(&b.seller_id));
    plan.removed_ids.sort();
    plan
}

/// Map a registry entry into an active seller record scoped to `domain`.
pub fn seller_from_subscriber(
    subscriber: &Subscriber,
    domain: &str,
    registry_env: &str,
    now: DateTime<Utc>,
) -> Seller {
    Seller {
        seller_id: subscriber.subscriber_id.clone(),
        domain: domain.to_string(),
        registry_env: registry_env.to_string(),
        status: subscriber.status.clone(),
        seller_type: SELLER_PLATFORM_TYPE.to_string(),
        subscriber_url: subscriber.subscriber_id.clone(),
        country: subscriber.country.clone(),
        city: subscriber.city.clone(),
        valid_from: parse_registry_time(&subscriber.valid_from),
        valid_until: parse_registry_time(&subscriber.valid_until),
        active: true,
        // Only String fields, so serializing cannot fail
        registry_raw: serde_json::to_string(subscriber).unwrap_or_default(),
        last_seen_in_registry: now,
        created_at: now,
        updated_at: now,
    }
}

fn parse_registry_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine<S, R> {
    store: Arc<S>,
    registry: R,
}

impl<S, R> ReconciliationEngine<S, R>
where
    S: SellerRepository,
    R: RegistryLookup,
{
    pub fn new(store: Arc<S>, registry: R) -> Self {
        ReconciliationEngine { store, registry }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn sync_registry(&self, request: &SyncRegistryRequest) -> SyncRegistryResponse {
        self.sync_registry_at(request, Utc::now()).await
    }

    /// Run with an explicit clock; every timestamp written uses `now`.
    ///
    /// Dropping the future only interrupts a registry fetch: each domain's
    /// writes happen without an await point once its fetches succeeded.
    pub async fn sync_registry_at(
        &self,
        request: &SyncRegistryRequest,
        now: DateTime<Utc>,
    ) -> SyncRegistryResponse {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "registry_sync",
            %run_id,
            registry_env = %request.registry_env
        );

        async {
            tracing::info!(domains = request.domains.len(), "starting registry sync");

            let mut domains = Vec::with_capacity(request.domains.len());
            for domain in &request.domains {
                let summary = self.sync_domain(domain, &request.registry_env, now).await;
                tracing::info!(
                    domain = %summary.domain,
                    total = summary.total_sellers_in_registry,
                    new = summary.new_sellers,
                    updated = summary.updated_sellers,
                    deactivated = summary.deactivated_sellers,
                    "domain reconciled"
                );
                domains.push(summary);
            }

            let response = SyncRegistryResponse {
                registry_env: request.registry_env.clone(),
                run_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
                domains,
            };
            tracing::info!("{}", response.summary());
            response
        }
        .instrument(span)
        .await
    }

    async fn sync_domain(&self, domain: &str, registry_env: &str, now: DateTime<Utc>) -> DomainSyncSummary {
        let mut summary = DomainSyncSummary::empty(domain);

        let subscribers = match self.registry.fetch_subscribers(domain).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!(domain, operation = "fetch_registry", kind = e.kind(), error = %e,
                    "Failed to fetch sellers from registry");
                return summary;
            }
        };
        summary.total_sellers_in_registry = subscribers.len();

        let local = match self.store.get_active_sellers(domain, registry_env) {
            Ok(sellers) => sellers,
            Err(e) => {
                tracing::error!(domain, operation = "fetch_local", kind = e.kind(), error = %e,
                    "Failed to fetch sellers from store");
                return summary;
            }
        };

        let mut registry_map = HashMap::with_capacity(subscribers.len());
        for subscriber in &subscribers {
            if subscriber.subscriber_id.trim().is_empty() {
                tracing::warn!(domain, "skipping registry entry without subscriber_id");
                continue;
            }
            let seller = seller_from_subscriber(subscriber, domain, registry_env, now);
            registry_map.insert(seller.seller_id.clone(), seller);
        }

        let local_map: HashMap<String, Seller> = local
            .into_iter()
            .map(|seller| (seller.seller_id.clone(), seller))
            .collect();

        let plan = plan_reconciliation(registry_map, &local_map);
        tracing::debug!(
            domain,
            to_insert = plan.to_insert.len(),
            to_update = plan.to_update.len(),
            to_deactivate = plan.removed_ids.len(),
            "reconciliation plan"
        );

        self.apply(domain, registry_env, &plan, now, &mut summary);
        summary
    }

    /// Writes for one domain. Synchronous on purpose: no await in here.
    fn apply(
        &self,
        domain: &str,
        registry_env: &str,
        plan: &ReconciliationPlan,
        now: DateTime<Utc>,
        summary: &mut DomainSyncSummary,
    ) {
        let mut inserted = false;
        if !plan.to_insert.is_empty() {
            match self.store.insert_sellers(&plan.to_insert) {
                Ok(count) => {
                    summary.new_sellers = count;
                    inserted = true;
                }
                Err(e) => {
                    tracing::error!(domain, operation = "insert_sellers", kind = e.kind(), error = %e,
                        "Failed to insert new sellers");
                }
            }
        }

        if !plan.to_update.is_empty() {
            match self.store.update_sellers(&plan.to_update) {
                Ok(count) => summary.updated_sellers = count,
                Err(e) => {
                    tracing::error!(domain, operation = "update_sellers", kind = e.kind(), error = %e,
                        "Failed to update existing sellers");
                }
            }
        }

        // State rows reference seller rows, so only after a successful insert
        if inserted {
            let mut created = 0;
            for seller in &plan.to_insert {
                match self
                    .store
                    .upsert_catalog_state(&SellerCatalogState::not_synced(seller, now))
                {
                    Ok(true) => created += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(domain, operation = "init_catalog_state", seller_id = %seller.seller_id,
                            kind = e.kind(), error = %e, "Failed to insert catalog state");
                    }
                }
            }
            tracing::debug!(domain, created, "catalog states initialized");
        }

        if !plan.removed_ids.is_empty() {
            match self
                .store
                .deactivate_sellers(&plan.removed_ids, domain, registry_env, now)
            {
                Ok(count) => summary.deactivated_sellers = count,
                Err(e) => {
                    tracing::error!(domain, operation = "deactivate_sellers", kind = e.kind(), error = %e,
                        "Failed to deactivate sellers");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn create_test_subscriber(id: &str) -> Subscriber {
        Subscriber {
            subscriber_id: id.to_string(),
            domain: "ONDC:RET10".to_string(),
            country: "IND".to_string(),
            city: "std:080".to_string(),
            status: "SUBSCRIBED".to_string(),
            valid_from: "2024-01-01T00:00:00.000Z".to_string(),
            valid_until: "not a date".to_string(),
            ..Default::default()
        }
    }

    fn sellers(ids: &[&str]) -> HashMap<String, Seller> {
        ids.iter()
            .map(|id| {
                let seller =
                    seller_from_subscriber(&create_test_subscriber(id), "ONDC:RET10", "preprod", now());
                (id.to_string(), seller)
            })
            .collect()
    }

    #[test]
    fn test_concrete_partition() {
        // Registry [S1, S2], local [S2, S3]
        let mut local = sellers(&["S2", "S3"]);
        let original_created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        local.get_mut("S2").unwrap().created_at = original_created;

        let plan = plan_reconciliation(sellers(&["S1", "S2"]), &local);

        assert_eq!(plan.to_insert.len(), 1);
        assert_eq!(plan.to_insert[0].seller_id, "S1");
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].seller_id, "S2");
        assert_eq!(plan.to_update[0].created_at, original_created);
        assert_eq!(plan.removed_ids, vec!["S3".to_string()]);
    }

    #[test]
    fn test_empty_registry_deactivates_everything() {
        let plan = plan_reconciliation(HashMap::new(), &sellers(&["a", "b"]));
        assert!(plan.to_insert.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.removed_ids, vec!["a".to_string(), "b".to_string()]);

        assert!(plan_reconciliation(HashMap::new(), &HashMap::new()).is_noop());
    }

    #[test]
    fn test_seller_from_subscriber() {
        let subscriber = create_test_subscriber("seller.example.com");
        let seller = seller_from_subscriber(&subscriber, "ONDC:RET10", "preprod", now());

        assert_eq!(seller.seller_type, "BPP");
        assert_eq!(seller.subscriber_url, "seller.example.com");
        assert!(seller.active);
        assert_eq!(seller.last_seen_in_registry, now());
        assert_eq!(
            seller.valid_from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(seller.valid_until, None);

        let raw: Subscriber = serde_json::from_str(&seller.registry_raw).unwrap();
        assert_eq!(raw, subscriber);
    }

    #[test]
    fn test_request_validation() {
        assert!(SyncRegistryRequest::new("preprod", vec!["ONDC:RET10".into()]).is_valid());
        assert!(!SyncRegistryRequest::new(" ", vec!["ONDC:RET10".into()]).is_valid());
        assert!(!SyncRegistryRequest::new("preprod", vec![]).is_valid());
    }

    #[test]
    fn test_response_json_shape() {
        let response = SyncRegistryResponse {
            registry_env: "preprod".into(),
            run_at: "2025-03-01T12:00:00Z".into(),
            domains: vec![DomainSyncSummary {
                domain: "ONDC:RET10".into(),
                new_sellers: 1,
                updated_sellers: 1,
                deactivated_sellers: 1,
                total_sellers_in_registry: 2,
            }],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["domains"][0]["total_sellers_in_registry"], 2);
        assert_eq!(json["run_at"], "2025-03-01T12:00:00Z");
        assert!(response.summary().contains("1 new, 1 updated, 1 deactivated"));
    }

    proptest! {
        #[test]
        fn prop_partition_is_complete_and_disjoint(
            registry_ids in proptest::collection::hash_set("[a-h]{1,2}", 0..12),
            local_ids in proptest::collection::hash_set("[a-h]{1,2}", 0..12),
        ) {
            let registry_ids: Vec<&str> = registry_ids.iter().map(String::as_str).collect();
            let local_ids: Vec<&str> = local_ids.iter().map(String::as_str).collect();
            let registry = sellers(&registry_ids);
            let local = sellers(&local_ids);
            let (registry_len, local_len) = (registry.len(), local.len());

            let plan = plan_reconciliation(registry, &local);

            prop_assert_eq!(plan.to_insert.len() + plan.to_update.len(), registry_len);
            prop_assert_eq!(plan.to_update.len() + plan.removed_ids.len(), local_len);

            let inserted: HashSet<&str> = plan.to_insert.iter().map(|s| s.seller_id.as_str()).collect();
            let updated: HashSet<&str> = plan.to_update.iter().map(|s| s.seller_id.as_str()).collect();
            let removed: HashSet<&str> = plan.removed_ids.iter().map(String::as_str).collect();

            prop_assert!(inserted.is_disjoint(&updated));
            prop_assert!(inserted.is_disjoint(&removed));
            prop_assert!(updated.is_disjoint(&removed));
        }
    }
}
