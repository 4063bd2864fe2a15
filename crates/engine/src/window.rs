//! Window aggregation
//!
//! Computes aggregate facts over the half-open interval
//! `[as_of - duration, as_of)` of an account's history. The upper bound is
//! exclusive, so the triggering transaction (whose timestamp is `as_of`)
//! never contributes to its own window. Voided, blocked and deleted rows
//! are excluded. The aggregator holds no cache: a window aggregate must
//! always reflect the latest persisted history.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use arbiter_core::Transaction;
use arbiter_rules::{AggregateKind, WindowSpec};
use arbiter_store::Store;

use crate::error::EngineResult;

/// One aggregation request.
#[derive(Debug, Clone)]
pub struct WindowQuery {
    pub org_id: String,
    pub account_id: String,
    pub spec: WindowSpec,
    pub kind: AggregateKind,
    /// Aggregated attribute; `None` only for `count`
    pub attribute: Option<String>,
    /// Exclusive upper bound of the window
    pub as_of: DateTime<Utc>,
}

/// Store-backed window aggregator.
#[derive(Clone)]
pub struct WindowAggregator {
    store: Arc<dyn Store>,
}

impl WindowAggregator {
    /// Create an aggregator over a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run one aggregation. Deterministic for identical inputs: the result
    /// is a pure function of the persisted set as of `as_of`.
    pub async fn aggregate(&self, query: &WindowQuery) -> EngineResult<Decimal> {
        let from = query.as_of - query.spec.length();
        let rows = self
            .store
            .transactions_in_range(&query.org_id, &query.account_id, from, query.as_of)
            .await?;

        Ok(aggregate_rows(&rows, query.kind, query.attribute.as_deref()))
    }
}

/// Aggregate already-fetched rows. Shared by [`WindowAggregator::aggregate`];
/// rows outside the caller's interval must already be filtered out.
pub(crate) fn aggregate_rows(
    rows: &[Transaction],
    kind: AggregateKind,
    attribute: Option<&str>,
) -> Decimal {
    let effective = rows.iter().filter(|t| t.is_effective());

    match kind {
        AggregateKind::Count => Decimal::from(effective.count()),
        AggregateKind::Sum => effective
            .filter_map(|t| attribute.and_then(|a| numeric_attribute(t, a)))
            .sum(),
        AggregateKind::Avg => {
            let values: Vec<Decimal> = effective
                .filter_map(|t| attribute.and_then(|a| numeric_attribute(t, a)))
                .collect();
            if values.is_empty() {
                Decimal::ZERO
            } else {
                values.iter().sum::<Decimal>() / Decimal::from(values.len())
            }
        }
        AggregateKind::DistinctCount => {
            let distinct: HashSet<String> = effective
                .filter_map(|t| attribute.and_then(|a| text_attribute(t, a)))
                .collect();
            Decimal::from(distinct.len())
        }
    }
}

/// Numeric view of a transaction attribute, for sum/avg.
pub(crate) fn numeric_attribute(tx: &Transaction, attribute: &str) -> Option<Decimal> {
    match attribute {
        "amount" => Some(tx.amount),
        "normalized_amount" => Some(tx.normalized_amount),
        "quantity" => tx.quantity,
        "price" => tx.price,
        _ => None,
    }
}

/// Text view of a transaction attribute, for distinct counting.
pub(crate) fn text_attribute(tx: &Transaction, attribute: &str) -> Option<String> {
    match attribute {
        "counterparty_id" => tx.counterparty_id.clone(),
        "country" => tx.country.clone(),
        "currency" => Some(tx.currency.clone()),
        "tx_type" => Some(tx.tx_type.clone()),
        "sub_type" => tx.sub_type.clone(),
        "channel" => tx.channel.clone(),
        "asset" => tx.asset.clone(),
        "amount" => Some(tx.amount.to_string()),
        "normalized_amount" => Some(tx.normalized_amount.to_string()),
        other => other
            .strip_prefix("metadata.")
            .and_then(|key| tx.metadata.get(key).cloned()),
    }
}
