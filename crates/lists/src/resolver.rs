//! Membership resolution - cache-first list lookups
//!
//! Resolution order: cache (keyed by organization + attribute hash), then
//! store, then cache populate with a bounded TTL. A transaction evaluation
//! may request memberships for several entity types in one call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use arbiter_cache::CacheCoordinator;
use arbiter_core::{EntityType, ListKind, Transaction};
use arbiter_store::Store;

use crate::error::ListResult;

/// Resolver cache TTLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// TTL for membership facts, in seconds
    #[serde(default = "default_fact_ttl_secs")]
    pub fact_ttl_secs: u64,
}

fn default_fact_ttl_secs() -> u64 {
    30
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fact_ttl_secs: default_fact_ttl_secs(),
        }
    }
}

impl ResolverConfig {
    /// Fact TTL as a duration
    pub fn fact_ttl(&self) -> Duration {
        Duration::from_secs(self.fact_ttl_secs)
    }
}

/// A resolved membership fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipFact {
    /// Matching list code, if any
    pub list_code: Option<String>,

    /// Whether an active entry matched
    pub matched: bool,

    /// Metadata of the matching entry
    pub entry_metadata: HashMap<String, String>,
}

impl MembershipFact {
    fn miss() -> Self {
        Self {
            list_code: None,
            matched: false,
            entry_metadata: HashMap::new(),
        }
    }
}

/// One membership question: list kind + entity type.
///
/// The attribute value comes from the transaction
/// (country / account id / counterparty id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MembershipRequest {
    pub kind: ListKind,
    pub entity_type: EntityType,
}

impl MembershipRequest {
    pub fn new(kind: ListKind, entity_type: EntityType) -> Self {
        Self { kind, entity_type }
    }

    /// Fact name this request resolves into (`list.<kind>.<entity>`)
    pub fn fact_name(&self) -> String {
        format!("list.{}.{}", self.kind, self.entity_type)
    }

    /// The transaction attribute this request matches against
    pub fn attribute_value<'t>(&self, tx: &'t Transaction) -> Option<&'t str> {
        match self.entity_type {
            EntityType::Country => tx.country.as_deref(),
            EntityType::Account => Some(tx.account_id.as_str()),
            EntityType::Counterparty => tx.counterparty_id.as_deref(),
        }
    }
}

/// Cache-first list membership resolver.
#[derive(Clone)]
pub struct ListMembershipResolver {
    store: Arc<dyn Store>,
    cache: CacheCoordinator,
    config: ResolverConfig,
}

impl ListMembershipResolver {
    /// Create a resolver over a store and cache
    pub fn new(store: Arc<dyn Store>, cache: CacheCoordinator, config: ResolverConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Resolve a single membership fact.
    ///
    /// `value = None` (the transaction lacks the attribute) is a definite
    /// non-match and is not cached.
    pub async fn resolve(
        &self,
        org_id: &str,
        request: MembershipRequest,
        value: Option<&str>,
    ) -> ListResult<MembershipFact> {
        let value = match value {
            Some(v) => v,
            None => return Ok(MembershipFact::miss()),
        };

        let hash = CacheCoordinator::attr_hash(&[
            &request.kind.to_string(),
            &request.entity_type.to_string(),
            value,
        ]);
        let key = CacheCoordinator::list_key(org_id, &hash);

        if let Some(fact) = self.cache.get_json::<MembershipFact>(&key).await {
            return Ok(fact);
        }

        let fact = match self
            .store
            .find_membership(org_id, request.kind, request.entity_type, value)
            .await?
        {
            Some(hit) => MembershipFact {
                list_code: Some(hit.list_code),
                matched: true,
                entry_metadata: hit.entry.metadata,
            },
            None => MembershipFact::miss(),
        };

        self.cache
            .put_json(&key, &fact, self.config.fact_ttl())
            .await;
        Ok(fact)
    }

    /// Resolve several membership facts for one transaction, returning a
    /// fact-name keyed map.
    pub async fn resolve_for_transaction(
        &self,
        tx: &Transaction,
        requests: &[MembershipRequest],
    ) -> ListResult<HashMap<String, MembershipFact>> {
        let mut facts = HashMap::with_capacity(requests.len());
        for request in requests {
            let fact = self
                .resolve(&tx.org_id, *request, request.attribute_value(tx))
                .await?;
            facts.insert(request.fact_name(), fact);
        }
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_cache::{NoopCache, TtlCache};
    use arbiter_core::{ComplianceList, ListEntry};
    use arbiter_store::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let list = ComplianceList::new(
            "ORG-1",
            "SANCTIONS",
            "Sanctioned countries",
            ListKind::Blacklist,
            EntityType::Country,
        );
        store.upsert_list(&list).await.unwrap();
        store
            .add_list_entry(
                "ORG-1",
                "SANCTIONS",
                &ListEntry::new("IR").with_metadata("source", "OFAC"),
            )
            .await
            .unwrap();
        store
    }

    fn resolver(store: Arc<MemoryStore>) -> ListMembershipResolver {
        ListMembershipResolver::new(
            store,
            CacheCoordinator::new(Arc::new(TtlCache::new())),
            ResolverConfig::default(),
        )
    }

    fn tx_with_country(country: Option<&str>) -> Transaction {
        let mut tx = Transaction::new(
            "TX-1",
            "ORG-1",
            "ACC-1",
            "TRANSFER",
            Decimal::new(100, 0),
            "EUR",
            Utc::now(),
        );
        tx.country = country.map(String::from);
        tx
    }

    #[tokio::test]
    async fn test_blacklist_match() {
        let store = seeded_store().await;
        let resolver = resolver(store);

        let fact = resolver
            .resolve(
                "ORG-1",
                MembershipRequest::new(ListKind::Blacklist, EntityType::Country),
                Some("IR"),
            )
            .await
            .unwrap();

        assert!(fact.matched);
        assert_eq!(fact.list_code.as_deref(), Some("SANCTIONS"));
        assert_eq!(fact.entry_metadata.get("source").map(String::as_str), Some("OFAC"));
    }

    #[tokio::test]
    async fn test_miss_and_absent_value() {
        let store = seeded_store().await;
        let resolver = resolver(store);
        let request = MembershipRequest::new(ListKind::Blacklist, EntityType::Country);

        let fact = resolver.resolve("ORG-1", request, Some("DE")).await.unwrap();
        assert!(!fact.matched);

        let fact = resolver.resolve("ORG-1", request, None).await.unwrap();
        assert!(!fact.matched);
        assert!(fact.list_code.is_none());
    }

    #[tokio::test]
    async fn test_cached_fact_survives_store_change_until_ttl() {
        let store = seeded_store().await;
        let resolver = resolver(store.clone());
        let request = MembershipRequest::new(ListKind::Blacklist, EntityType::Country);

        let first = resolver.resolve("ORG-1", request, Some("IR")).await.unwrap();
        assert!(first.matched);

        // soft-delete behind the cache's back: the cached fact still answers
        store.soft_delete_list_entry("ORG-1", "SANCTIONS", "IR").await.unwrap();
        let second = resolver.resolve("ORG-1", request, Some("IR")).await.unwrap();
        assert!(second.matched);
    }

    #[tokio::test]
    async fn test_degraded_cache_still_resolves() {
        let store = seeded_store().await;
        let resolver = ListMembershipResolver::new(
            store,
            CacheCoordinator::new(Arc::new(NoopCache)),
            ResolverConfig::default(),
        );

        let fact = resolver
            .resolve(
                "ORG-1",
                MembershipRequest::new(ListKind::Blacklist, EntityType::Country),
                Some("IR"),
            )
            .await
            .unwrap();
        assert!(fact.matched);
    }

    #[tokio::test]
    async fn test_resolve_for_transaction_fact_names() {
        let store = seeded_store().await;
        let resolver = resolver(store);
        let tx = tx_with_country(Some("IR"));

        let facts = resolver
            .resolve_for_transaction(
                &tx,
                &[
                    MembershipRequest::new(ListKind::Blacklist, EntityType::Country),
                    MembershipRequest::new(ListKind::Whitelist, EntityType::Account),
                ],
            )
            .await
            .unwrap();

        assert!(facts["list.blacklist.country"].matched);
        assert!(!facts["list.whitelist.account"].matched);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let store = seeded_store().await;
        let resolver = resolver(store);

        let fact = resolver
            .resolve(
                "ORG-2",
                MembershipRequest::new(ListKind::Blacklist, EntityType::Country),
                Some("IR"),
            )
            .await
            .unwrap();
        assert!(!fact.matched);
    }
}
