//! Transaction - Immutable transaction fact record
//!
//! A transaction is never mutated after creation. Evaluation always reads a
//! fixed snapshot of these fields; the void/block/delete flags are part of
//! the record, not a mutation channel.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An immutable transaction record scoped to one organization.
///
/// # Invariant
/// Instances are append-only: once constructed they are never edited.
/// The `voided`/`blocked`/`deleted` flags describe the row as persisted and
/// determine whether it participates in window aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Account the transaction belongs to
    pub account_id: String,

    /// Transaction type (e.g., "TRANSFER", "WITHDRAWAL")
    pub tx_type: String,

    /// Optional sub-type (e.g., "SEPA", "WIRE")
    pub sub_type: Option<String>,

    /// Amount in the original currency
    pub amount: Decimal,

    /// Original currency code
    pub currency: String,

    /// Amount normalized to the organization's reporting currency
    pub normalized_amount: Decimal,

    /// Reporting currency code
    pub normalized_currency: String,

    /// Transaction timestamp
    pub timestamp: DateTime<Utc>,

    /// Country code of the transaction (ISO 3166-1 alpha-2)
    pub country: Option<String>,

    /// Counterparty identifier
    pub counterparty_id: Option<String>,

    /// Channel the transaction arrived through (e.g., "API", "BRANCH")
    pub channel: Option<String>,

    /// Traded asset code, if any
    pub asset: Option<String>,

    /// Asset quantity, if any
    pub quantity: Option<Decimal>,

    /// Asset unit price, if any
    pub price: Option<Decimal>,

    /// Row was voided
    pub voided: bool,

    /// Row was administratively blocked
    pub blocked: bool,

    /// Row was soft-deleted
    pub deleted: bool,

    /// Free-form metadata
    pub metadata: HashMap<String, String>,
}

impl Transaction {
    /// Create a new transaction with the required fields.
    ///
    /// The normalized amount/currency default to the original ones; use
    /// [`Transaction::with_normalized`] when a conversion applies.
    pub fn new(
        id: impl Into<String>,
        org_id: impl Into<String>,
        account_id: impl Into<String>,
        tx_type: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let currency = currency.into();
        Self {
            id: id.into(),
            org_id: org_id.into(),
            account_id: account_id.into(),
            tx_type: tx_type.into(),
            sub_type: None,
            amount,
            normalized_amount: amount,
            normalized_currency: currency.clone(),
            currency,
            timestamp,
            country: None,
            counterparty_id: None,
            channel: None,
            asset: None,
            quantity: None,
            price: None,
            voided: false,
            blocked: false,
            deleted: false,
            metadata: HashMap::new(),
        }
    }

    /// Set the normalized amount and currency
    pub fn with_normalized(mut self, amount: Decimal, currency: impl Into<String>) -> Self {
        self.normalized_amount = amount;
        self.normalized_currency = currency.into();
        self
    }

    /// Set the sub-type
    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    /// Set the country code
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Set the counterparty
    pub fn with_counterparty(mut self, counterparty_id: impl Into<String>) -> Self {
        self.counterparty_id = Some(counterparty_id.into());
        self
    }

    /// Set the channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Set asset, quantity and price
    pub fn with_asset(mut self, asset: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        self.asset = Some(asset.into());
        self.quantity = Some(quantity);
        self.price = Some(price);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark the row as voided
    pub fn voided(mut self) -> Self {
        self.voided = true;
        self
    }

    /// Whether the row participates in window aggregation.
    ///
    /// Voided, blocked and deleted rows are excluded.
    pub fn is_effective(&self) -> bool {
        !self.voided && !self.blocked && !self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_tx() -> Transaction {
        Transaction::new(
            "TX-001",
            "ORG-001",
            "ACC-001",
            "TRANSFER",
            dec!(1500),
            "EUR",
            Utc::now(),
        )
    }

    #[test]
    fn test_new_defaults_normalized_to_original() {
        let tx = base_tx();
        assert_eq!(tx.normalized_amount, dec!(1500));
        assert_eq!(tx.normalized_currency, "EUR");
    }

    #[test]
    fn test_builder_setters() {
        let tx = base_tx()
            .with_normalized(dec!(1620), "USD")
            .with_country("DE")
            .with_counterparty("CP-77")
            .with_channel("API")
            .with_metadata("reference", "INV-42");

        assert_eq!(tx.normalized_amount, dec!(1620));
        assert_eq!(tx.normalized_currency, "USD");
        assert_eq!(tx.country.as_deref(), Some("DE"));
        assert_eq!(tx.counterparty_id.as_deref(), Some("CP-77"));
        assert_eq!(tx.channel.as_deref(), Some("API"));
        assert_eq!(tx.metadata.get("reference").map(String::as_str), Some("INV-42"));
    }

    #[test]
    fn test_is_effective() {
        let tx = base_tx();
        assert!(tx.is_effective());

        let voided = base_tx().voided();
        assert!(!voided.is_effective());

        let mut blocked = base_tx();
        blocked.blocked = true;
        assert!(!blocked.is_effective());
    }

    #[test]
    fn test_serialization_round_trip() {
        let tx = base_tx().with_country("FR");
        let json = serde_json::to_string(&tx).unwrap();
        let parsed: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, tx.id);
        assert_eq!(parsed.amount, tx.amount);
        assert_eq!(parsed.country, tx.country);
    }
}
