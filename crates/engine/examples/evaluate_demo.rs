//! End-to-end demo: wire a store, cache, lists and the orchestrator, then
//! evaluate a couple of transactions.
//!
//! ```bash
//! cargo run -p arbiter-engine --example evaluate_demo
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;

use arbiter_cache::{CacheCoordinator, TtlCache};
use arbiter_core::{
    ComplianceList, EntityType, FactValue, ListEntry, ListKind, Severity, Transaction, TxDecision,
};
use arbiter_engine::{
    EngineConfig, FactResolver, NoopNotifier, Orchestrator, WindowAggregator,
};
use arbiter_lists::{ListMembershipResolver, ListService, ResolverConfig};
use arbiter_rules::{ConditionNode, Operator, RuleAction, RuleVersion};
use arbiter_store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let store = Arc::new(MemoryStore::new());
    let cache = CacheCoordinator::new(Arc::new(TtlCache::new()));
    let facts = FactResolver::new(
        WindowAggregator::new(store.clone()),
        ListMembershipResolver::new(store.clone(), cache.clone(), ResolverConfig::default()),
    );
    let orchestrator = Orchestrator::new(
        store.clone(),
        cache.clone(),
        facts,
        Arc::new(NoopNotifier),
        EngineConfig::default(),
    );
    let lists = ListService::new(store, cache);

    // a sanctions blacklist and two rules
    lists
        .upsert_list(&ComplianceList::new(
            "ORG-DEMO",
            "SANCTIONED_COUNTRIES",
            "Sanctioned countries",
            ListKind::Blacklist,
            EntityType::Country,
        ))
        .await?;
    lists
        .add_entry(
            "ORG-DEMO",
            "SANCTIONED_COUNTRIES",
            ListEntry::new("IR").with_label("Iran"),
        )
        .await?;

    let sanctions = RuleVersion::builder("ORG-DEMO", "SANCTIONS")
        .name("Sanctioned country block")
        .when(ConditionNode::leaf(
            "list.blacklist.country",
            Operator::Eq,
            FactValue::Bool(true),
        ))
        .then(RuleAction::create_alert(
            Severity::Critical,
            "sanctions",
            "Counterpart country is sanctioned",
        ))
        .then(RuleAction::set_decision_halting(TxDecision::Block))
        .priority(90)
        .build()?;
    let large_tx = RuleVersion::builder("ORG-DEMO", "LARGE_TX")
        .name("Large transaction review")
        .when(ConditionNode::leaf(
            "amount",
            Operator::GreaterThan,
            FactValue::Number(dec!(10000)),
        ))
        .then(RuleAction::create_alert(
            Severity::Medium,
            "aml",
            "Large transaction",
        ))
        .then(RuleAction::set_decision(TxDecision::Review))
        .priority(50)
        .build()?;

    orchestrator.publish_rule_version(&sanctions).await?;
    orchestrator.publish_rule_version(&large_tx).await?;

    for (id, amount, country) in [
        ("TX-1", dec!(500), "DE"),
        ("TX-2", dec!(25000), "FR"),
        ("TX-3", dec!(100), "IR"),
    ] {
        let tx = Transaction::new(id, "ORG-DEMO", "ACC-1", "TRANSFER", amount, "EUR", Utc::now())
            .with_country(country);
        let outcome = orchestrator.evaluate_transaction("ORG-DEMO", &tx).await?;
        println!(
            "{}: decision={} triggered={:?} alerts={} ({}ms)",
            id,
            outcome.decision,
            outcome.triggered_rule_ids,
            outcome.alert_ids.len(),
            outcome.duration_ms
        );
    }

    Ok(())
}
