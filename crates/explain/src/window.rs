//! Window narration
//!
//! Re-derives the aggregation semantics over a caller-supplied transaction
//! snapshot: half-open interval `[as_of - duration, as_of)`, voided/
//! blocked/deleted rows excluded, sum/count/avg/distinct-count over a named
//! attribute. The snapshot is taken as given; nothing is fetched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use arbiter_core::Transaction;
use arbiter_rules::{AggregateKind, WindowSpec};

/// Explanation of one window aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct WindowExplanation {
    /// Inclusive lower bound of the window
    pub window_start: DateTime<Utc>,
    /// Exclusive upper bound of the window
    pub window_end: DateTime<Utc>,
    /// Rows in the snapshot that fell outside the interval
    pub excluded_outside: usize,
    /// Rows inside the interval excluded for voided/blocked/deleted flags
    pub excluded_flagged: usize,
    /// Rows that contributed to the aggregate
    pub contributing: usize,
    /// The aggregate value
    pub value: Decimal,
    /// One-line narration
    pub summary: String,
}

/// Explain an aggregation over an explicit transaction snapshot.
pub fn explain_aggregation(
    spec: &WindowSpec,
    kind: AggregateKind,
    attribute: Option<&str>,
    as_of: DateTime<Utc>,
    snapshot: &[Transaction],
) -> WindowExplanation {
    let window_start = as_of - spec.length();
    let window_end = as_of;

    let mut excluded_outside = 0usize;
    let mut excluded_flagged = 0usize;
    let mut contributing = 0usize;

    let mut sum = Decimal::ZERO;
    let mut summed_rows = 0usize;
    let mut distinct: HashSet<String> = HashSet::new();

    for tx in snapshot {
        if tx.timestamp < window_start || tx.timestamp >= window_end {
            excluded_outside += 1;
            continue;
        }
        if tx.voided || tx.blocked || tx.deleted {
            excluded_flagged += 1;
            continue;
        }
        contributing += 1;

        match kind {
            AggregateKind::Count => {}
            AggregateKind::Sum | AggregateKind::Avg => {
                if let Some(n) = attribute.and_then(|a| numeric_field(tx, a)) {
                    sum += n;
                    summed_rows += 1;
                }
            }
            AggregateKind::DistinctCount => {
                if let Some(t) = attribute.and_then(|a| text_field(tx, a)) {
                    distinct.insert(t);
                }
            }
        }
    }

    let value = match kind {
        AggregateKind::Count => Decimal::from(contributing),
        AggregateKind::Sum => sum,
        AggregateKind::Avg => {
            if summed_rows == 0 {
                Decimal::ZERO
            } else {
                sum / Decimal::from(summed_rows)
            }
        }
        AggregateKind::DistinctCount => Decimal::from(distinct.len()),
    };

    let described = match (kind, attribute) {
        (AggregateKind::Count, _) => "count".to_string(),
        (_, Some(attr)) => format!("{} of {}", kind, attr),
        (_, None) => kind.to_string(),
    };
    let summary = format!(
        "{} over [{}, {}) = {} ({} contributing, {} outside interval, {} flagged)",
        described,
        window_start.to_rfc3339(),
        window_end.to_rfc3339(),
        value,
        contributing,
        excluded_outside,
        excluded_flagged
    );

    WindowExplanation {
        window_start,
        window_end,
        excluded_outside,
        excluded_flagged,
        contributing,
        value,
        summary,
    }
}

fn numeric_field(tx: &Transaction, attribute: &str) -> Option<Decimal> {
    match attribute {
        "amount" => Some(tx.amount),
        "normalized_amount" => Some(tx.normalized_amount),
        "quantity" => tx.quantity,
        "price" => tx.price,
        _ => None,
    }
}

fn text_field(tx: &Transaction, attribute: &str) -> Option<String> {
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
