//! Integration tests for the full evaluation pipeline:
//! store + cache + lists + facts + orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal_macros::dec;

use arbiter_cache::{CacheCoordinator, NoopCache, TtlCache};
use arbiter_core::{
    ComplianceList, EntityType, FactValue, ListEntry, ListKind, Severity, Transaction, TxDecision,
};
use arbiter_engine::{
    ChannelNotifier, EngineConfig, FactResolver, NoopNotifier, Notifier, Orchestrator,
    WindowAggregator,
};
use arbiter_lists::{ListMembershipResolver, ListService, ResolverConfig};
use arbiter_rules::{ConditionNode, Operator, RuleAction, RuleVersion, WindowSpec, WindowUnit};
use arbiter_store::{MemoryStore, Store};

struct Pipeline {
    store: Arc<MemoryStore>,
    orchestrator: Orchestrator,
    lists: ListService,
}

fn pipeline_with_notifier(notifier: Arc<dyn Notifier>) -> Pipeline {
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
        notifier,
        EngineConfig::default(),
    );
    let lists = ListService::new(store.clone(), cache);
    Pipeline {
        store,
        orchestrator,
        lists,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with_notifier(Arc::new(NoopNotifier))
}

fn tx(id: &str, amount: rust_decimal::Decimal) -> Transaction {
    Transaction::new(id, "ORG-1", "ACC-1", "TRANSFER", amount, "EUR", Utc::now())
}

fn large_tx_rule() -> RuleVersion {
    RuleVersion::builder("ORG-1", "LARGE_TX")
        .name("Large Transaction")
        .when(ConditionNode::leaf(
            "amount",
            Operator::GreaterThan,
            FactValue::Number(dec!(10000)),
        ))
        .then(RuleAction::create_alert(Severity::Medium, "aml", "Large transaction"))
        .then(RuleAction::set_decision(TxDecision::Review))
        .priority(50)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_strict_greater_than_boundary() {
    let p = pipeline();
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Review);
    assert_eq!(outcome.triggered_rule_ids.len(), 1);
    assert_eq!(outcome.alert_ids.len(), 1);

    // exactly at the threshold: strict greater-than does not trigger
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-2", dec!(10000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Allow);
    assert!(outcome.triggered_rule_ids.is_empty());
    assert!(outcome.alert_ids.is_empty());
}

#[tokio::test]
async fn test_decision_is_lattice_max_not_last() {
    let p = pipeline();

    // high priority rule says Review, low priority rule says Block: the
    // final decision must be Block even though Review evaluates last
    let block_rule = RuleVersion::builder("ORG-1", "HARD_LIMIT")
        .when(ConditionNode::leaf(
            "amount",
            Operator::GreaterThan,
            FactValue::Number(dec!(50000)),
        ))
        .then(RuleAction::set_decision(TxDecision::Block))
        .priority(10)
        .build()
        .unwrap();
    let review_rule = RuleVersion::builder("ORG-1", "SOFT_LIMIT")
        .when(ConditionNode::leaf(
            "amount",
            Operator::GreaterThan,
            FactValue::Number(dec!(10000)),
        ))
        .then(RuleAction::set_decision(TxDecision::Review))
        .priority(90)
        .build()
        .unwrap();

    p.orchestrator.publish_rule_version(&block_rule).await.unwrap();
    p.orchestrator.publish_rule_version(&review_rule).await.unwrap();

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(60000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Block);
    assert_eq!(outcome.triggered_rule_ids.len(), 2);
}

#[tokio::test]
async fn test_halting_action_stops_remaining_rules() {
    let p = pipeline();

    let halting = RuleVersion::builder("ORG-1", "SANCTIONS_HALT")
        .when(ConditionNode::leaf(
            "country",
            Operator::Eq,
            FactValue::Text("IR".into()),
        ))
        .then(RuleAction::set_decision_halting(TxDecision::Block))
        .priority(90)
        .build()
        .unwrap();
    let later = RuleVersion::builder("ORG-1", "LARGE_TX")
        .when(ConditionNode::leaf(
            "amount",
            Operator::GreaterThan,
            FactValue::Number(dec!(1)),
        ))
        .then(RuleAction::create_alert(Severity::Low, "aml", "would alert"))
        .priority(10)
        .build()
        .unwrap();

    p.orchestrator.publish_rule_version(&halting).await.unwrap();
    p.orchestrator.publish_rule_version(&later).await.unwrap();

    let mut transaction = tx("TX-1", dec!(5000));
    transaction.country = Some("IR".into());

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Block);
    // the later rule never ran: no alert was persisted
    assert_eq!(outcome.triggered_rule_ids.len(), 1);
    assert!(outcome.alert_ids.is_empty());
    assert_eq!(p.store.alert_count(), 0);
}

#[tokio::test]
async fn test_without_halt_all_rules_run_for_alert_completeness() {
    let p = pipeline();

    let blocking = RuleVersion::builder("ORG-1", "SANCTIONS")
        .when(ConditionNode::leaf(
            "country",
            Operator::Eq,
            FactValue::Text("IR".into()),
        ))
        .then(RuleAction::set_decision(TxDecision::Block))
        .priority(90)
        .build()
        .unwrap();

    p.orchestrator.publish_rule_version(&blocking).await.unwrap();
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();

    let mut transaction = tx("TX-1", dec!(20000));
    transaction.country = Some("IR".into());

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Block);
    assert_eq!(outcome.triggered_rule_ids.len(), 2);
    assert_eq!(outcome.alert_ids.len(), 1);
}

#[tokio::test]
async fn test_blacklist_membership_end_to_end() {
    let p = pipeline();

    let list = ComplianceList::new(
        "ORG-1",
        "SANCTIONED_COUNTRIES",
        "Sanctioned countries",
        ListKind::Blacklist,
        EntityType::Country,
    );
    p.lists.upsert_list(&list).await.unwrap();
    p.lists
        .add_entry("ORG-1", "SANCTIONED_COUNTRIES", ListEntry::new("IR"))
        .await
        .unwrap();

    let rule = RuleVersion::builder("ORG-1", "SANCTIONS")
        .when(ConditionNode::leaf(
            "list.blacklist.country",
            Operator::Eq,
            FactValue::Bool(true),
        ))
        .then(RuleAction::set_decision(TxDecision::Block))
        .priority(90)
        .build()
        .unwrap();
    p.orchestrator.publish_rule_version(&rule).await.unwrap();

    let mut transaction = tx("TX-1", dec!(100));
    transaction.country = Some("IR".into());
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Block);

    // soft-delete the entry: writes invalidate, the next evaluation allows
    p.lists
        .remove_entry("ORG-1", "SANCTIONED_COUNTRIES", "IR")
        .await
        .unwrap();
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Allow);
}

#[tokio::test]
async fn test_window_rule_excludes_triggering_transaction() {
    let p = pipeline();
    let as_of = Utc::now();

    // 2 prior transactions of 4000 within the hour
    for (id, minutes) in [("H1", 30i64), ("H2", 10)] {
        p.store
            .insert_transaction(&Transaction::new(
                id,
                "ORG-1",
                "ACC-1",
                "TRANSFER",
                dec!(4000),
                "EUR",
                as_of - chrono::Duration::minutes(minutes),
            ))
            .await
            .unwrap();
    }

    let rule = RuleVersion::builder("ORG-1", "VELOCITY_VOLUME")
        .when(ConditionNode::leaf(
            "window.sum.amount",
            Operator::GreaterThanOrEqual,
            FactValue::Number(dec!(12000)),
        ))
        .then(RuleAction::set_decision(TxDecision::Review))
        .window(WindowSpec::new(1, WindowUnit::Hours))
        // active well before the evaluated transaction's timestamp
        .activated_at(as_of - chrono::Duration::hours(1))
        .build()
        .unwrap();
    p.orchestrator.publish_rule_version(&rule).await.unwrap();

    // history sums to 8000; the triggering 5000 is outside its own window,
    // so the threshold of 12000 is not reached
    let mut transaction = tx("TX-1", dec!(5000));
    transaction.timestamp = as_of;
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Allow);

    // a third persisted row pushes the history itself past the threshold
    p.store
        .insert_transaction(&Transaction::new(
            "H3",
            "ORG-1",
            "ACC-1",
            "TRANSFER",
            dec!(4000),
            "EUR",
            as_of - chrono::Duration::minutes(5),
        ))
        .await
        .unwrap();
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &transaction)
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Review);
}

#[tokio::test]
async fn test_rule_write_invalidates_cached_rule_set() {
    let p = pipeline();

    // prime the rules cache with an empty active set
    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Allow);

    // an accepted write invalidates before acknowledgment: the next
    // evaluation must observe the new rule without waiting for the TTL
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-2", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Review);
}

#[tokio::test]
async fn test_retire_rule_version_takes_effect_immediately() {
    let p = pipeline();
    let rule = large_tx_rule();
    p.orchestrator.publish_rule_version(&rule).await.unwrap();

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Review);

    p.orchestrator
        .retire_rule_version("ORG-1", &rule.id, Utc::now())
        .await
        .unwrap();

    let outcome = p
        .orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-2", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Allow);
}

#[tokio::test]
async fn test_degraded_cache_mode_still_evaluates() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheCoordinator::new(Arc::new(NoopCache));
    let facts = FactResolver::new(
        WindowAggregator::new(store.clone()),
        ListMembershipResolver::new(store.clone(), cache.clone(), ResolverConfig::default()),
    );
    let orchestrator = Orchestrator::new(
        store,
        cache,
        facts,
        Arc::new(NoopNotifier),
        EngineConfig::default(),
    );

    orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();
    let outcome = orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(15000)))
        .await
        .unwrap();
    assert_eq!(outcome.decision, TxDecision::Review);
}

#[tokio::test]
async fn test_expired_deadline_returns_partial_outcome() {
    let p = pipeline();
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();

    let deadline = Instant::now() - Duration::from_millis(1);
    let outcome = p
        .orchestrator
        .evaluate_with_deadline("ORG-1", &tx("TX-1", dec!(15000)), Some(deadline))
        .await
        .unwrap();

    assert!(outcome.partial);
    assert_eq!(outcome.decision, TxDecision::Allow);
    assert!(outcome.triggered_rule_ids.is_empty());
}

#[tokio::test]
async fn test_tenant_mismatch_rejected() {
    let p = pipeline();
    let err = p
        .orchestrator
        .evaluate_transaction("ORG-2", &tx("TX-1", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        arbiter_engine::EngineError::TenantIsolation { .. }
    ));
}

#[tokio::test]
async fn test_notifier_receives_event() {
    let (notifier, mut receiver) = ChannelNotifier::new();
    let p = pipeline_with_notifier(Arc::new(notifier));
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();

    p.orchestrator
        .evaluate_transaction("ORG-1", &tx("TX-1", dec!(15000)))
        .await
        .unwrap();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.transaction_id, "TX-1");
    assert_eq!(event.decision, TxDecision::Review);
    assert_eq!(event.triggered_rule_ids.len(), 1);
    assert!(!event.partial);
}

#[tokio::test]
async fn test_concurrent_evaluations_share_nothing_but_cache() {
    let p = pipeline();
    p.orchestrator.publish_rule_version(&large_tx_rule()).await.unwrap();
    let orchestrator = Arc::new(p.orchestrator);

    let mut handles = Vec::new();
    for i in 0..16 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let amount = if i % 2 == 0 { dec!(15000) } else { dec!(100) };
            let transaction = Transaction::new(
                format!("TX-{}", i),
                "ORG-1",
                format!("ACC-{}", i),
                "TRANSFER",
                amount,
                "EUR",
                Utc::now(),
            );
            orchestrator
                .evaluate_transaction("ORG-1", &transaction)
                .await
                .unwrap()
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap();
        let expected = if i % 2 == 0 {
            TxDecision::Review
        } else {
            TxDecision::Allow
        };
        assert_eq!(outcome.decision, expected);
    }
}
