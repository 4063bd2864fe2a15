//! Fact resolution
//!
//! Turns a transaction plus its rule into the fact snapshot the evaluator
//! consumes: raw transaction fields, `window.` aggregates and `list.`
//! memberships. Independent facts resolve concurrently; only the cheap
//! tree pass afterwards is serial.

use std::str::FromStr;

use futures::future::try_join_all;

use arbiter_core::{EntityType, FactMap, FactValue, ListKind, Transaction};
use arbiter_lists::{ListMembershipResolver, MembershipRequest};
use arbiter_rules::{RuleError, RuleVersion, WindowFact};

use crate::error::{EngineError, EngineResult};
use crate::window::{WindowAggregator, WindowQuery};

/// Resolves fact snapshots for rule evaluation.
#[derive(Clone)]
pub struct FactResolver {
    window: WindowAggregator,
    lists: ListMembershipResolver,
}

impl FactResolver {
    /// Create a resolver from its two fact sources
    pub fn new(window: WindowAggregator, lists: ListMembershipResolver) -> Self {
        Self { window, lists }
    }

    /// Resolve every fact the rule references against the transaction.
    ///
    /// Facts the transaction does not carry resolve to the `Absent`
    /// sentinel rather than being dropped.
    pub async fn resolve(&self, tx: &Transaction, rule: &RuleVersion) -> EngineResult<FactMap> {
        let mut facts = base_facts(tx);

        let mut window_queries: Vec<(String, WindowQuery)> = Vec::new();
        let mut list_requests: Vec<(String, MembershipRequest)> = Vec::new();

        for fact in rule.conditions.referenced_facts() {
            if fact.starts_with("window.") {
                let parsed = WindowFact::parse(&fact)?;
                let spec = rule.window.ok_or_else(|| {
                    EngineError::Validation(RuleError::InvalidShape(format!(
                        "rule {} references {} but has no window spec",
                        rule.id, fact
                    )))
                })?;
                window_queries.push((
                    fact.clone(),
                    WindowQuery {
                        org_id: tx.org_id.clone(),
                        account_id: tx.account_id.clone(),
                        spec,
                        kind: parsed.kind,
                        attribute: parsed.attribute,
                        as_of: tx.timestamp,
                    },
                ));
            } else if let Some(rest) = fact.strip_prefix("list.") {
                let request = parse_list_fact(&fact, rest)?;
                list_requests.push((fact.clone(), request));
            }
        }

        let window_futures = try_join_all(
            window_queries
                .iter()
                .map(|(_, query)| self.window.aggregate(query)),
        );
        let list_futures = try_join_all(list_requests.iter().map(|(_, request)| {
            self.lists
                .resolve(&tx.org_id, *request, request.attribute_value(tx))
        }));

        let (window_values, list_values) = tokio::join!(window_futures, list_futures);

        for ((name, _), value) in window_queries.iter().zip(window_values?) {
            facts.insert(name.clone(), FactValue::Number(value));
        }
        for ((name, _), membership) in list_requests.iter().zip(list_values?) {
            facts.insert(name.clone(), FactValue::Bool(membership.matched));
        }

        Ok(facts)
    }
}

/// `list.<kind>.<entity>` - validated at rule creation, parsed again here
/// into the typed request.
fn parse_list_fact(fact: &str, rest: &str) -> EngineResult<MembershipRequest> {
    let (kind, entity) = rest
        .split_once('.')
        .ok_or_else(|| EngineError::Validation(RuleError::UnknownFact(fact.to_string())))?;

    let kind = ListKind::from_str(kind)
        .map_err(|_| EngineError::Validation(RuleError::UnknownFact(fact.to_string())))?;
    let entity = EntityType::from_str(entity)
        .map_err(|_| EngineError::Validation(RuleError::UnknownFact(fact.to_string())))?;

    Ok(MembershipRequest::new(kind, entity))
}

fn base_facts(tx: &Transaction) -> FactMap {
    let mut facts = FactMap::new();

    facts.insert("amount".into(), FactValue::Number(tx.amount));
    facts.insert("currency".into(), FactValue::Text(tx.currency.clone()));
    facts.insert(
        "normalized_amount".into(),
        FactValue::Number(tx.normalized_amount),
    );
    facts.insert(
        "normalized_currency".into(),
        FactValue::Text(tx.normalized_currency.clone()),
    );
    facts.insert("tx_type".into(), FactValue::Text(tx.tx_type.clone()));
    facts.insert("account_id".into(), FactValue::Text(tx.account_id.clone()));
    facts.insert("sub_type".into(), text_or_absent(&tx.sub_type));
    facts.insert("country".into(), text_or_absent(&tx.country));
    facts.insert("counterparty_id".into(), text_or_absent(&tx.counterparty_id));
    facts.insert("channel".into(), text_or_absent(&tx.channel));
    facts.insert("asset".into(), text_or_absent(&tx.asset));
    facts.insert("quantity".into(), number_or_absent(tx.quantity));
    facts.insert("price".into(), number_or_absent(tx.price));

    for (key, value) in &tx.metadata {
        facts.insert(format!("metadata.{}", key), FactValue::Text(value.clone()));
    }

    facts
}

fn text_or_absent(value: &Option<String>) -> FactValue {
    value
        .as_ref()
        .map(|v| FactValue::Text(v.clone()))
        .unwrap_or(FactValue::Absent)
}

fn number_or_absent(value: Option<rust_decimal::Decimal>) -> FactValue {
    value.map(FactValue::Number).unwrap_or(FactValue::Absent)
}
