//! Rule evaluation orchestration
//!
//! Loads the organization's active rules (cache-first), evaluates them in
//! priority order and executes triggered actions. Each rule's action
//! execution is an independent commit: alerts persisted for one rule stand
//! even if a later rule is abandoned by the caller's deadline.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use arbiter_cache::CacheCoordinator;
use arbiter_core::{Alert, Severity, Transaction, TxDecision};
use arbiter_rules::{RuleAction, RuleVersion};
use arbiter_store::Store;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::eval::evaluate_tree;
use crate::facts::FactResolver;
use crate::notifier::{EvaluationEvent, Notifier};

/// Result of evaluating one transaction.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// Aggregated decision (lattice max across triggered rules)
    pub decision: TxDecision,
    /// Ids of the rules that triggered
    pub triggered_rule_ids: Vec<String>,
    /// Ids of the alerts persisted by triggered actions
    pub alert_ids: Vec<String>,
    /// Wall-clock evaluation time
    pub duration_ms: u64,
    /// True when a caller deadline abandoned rules that were still pending;
    /// the decision then covers committed rules only
    pub partial: bool,
}

/// The rule evaluation pipeline.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    cache: CacheCoordinator,
    facts: FactResolver,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators
    pub fn new(
        store: Arc<dyn Store>,
        cache: CacheCoordinator,
        facts: FactResolver,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            facts,
            notifier,
            config,
        }
    }

    /// Evaluate a transaction against the organization's active rules.
    pub async fn evaluate_transaction(
        &self,
        org_id: &str,
        tx: &Transaction,
    ) -> EngineResult<EvaluationOutcome> {
        self.evaluate_with_deadline(org_id, tx, None).await
    }

    /// Evaluate with a caller-imposed deadline. When the deadline passes,
    /// rules not yet evaluated are abandoned; committed rules keep their
    /// alerts and the outcome is flagged partial.
    pub async fn evaluate_with_deadline(
        &self,
        org_id: &str,
        tx: &Transaction,
        deadline: Option<Instant>,
    ) -> EngineResult<EvaluationOutcome> {
        if tx.org_id != org_id {
            return Err(EngineError::TenantIsolation {
                requested: org_id.to_string(),
                actual: tx.org_id.clone(),
            });
        }

        let started = Instant::now();
        let rules = self.load_active_rules(org_id, tx).await?;

        let mut triggered_rule_ids = Vec::new();
        let mut alert_ids = Vec::new();
        let mut decisions = Vec::new();
        let mut partial = false;
        let mut halted = false;

        for rule in &rules {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(
                        org_id,
                        transaction_id = %tx.id,
                        rule_version_id = %rule.id,
                        "deadline exceeded, abandoning remaining rules"
                    );
                    partial = true;
                    break;
                }
            }

            let facts = match self.facts.resolve(tx, rule).await {
                Ok(facts) => facts,
                Err(EngineError::Validation(cause)) => {
                    // A malformed tree past creation-time validation is a
                    // configuration defect of this one rule; evaluation of
                    // the remaining rules continues.
                    error!(
                        org_id,
                        rule_version_id = %rule.id,
                        %cause,
                        "skipping malformed rule"
                    );
                    let alert_id = self.diagnostic_alert(tx, rule, &cause.to_string()).await;
                    alert_ids.extend(alert_id);
                    continue;
                }
                Err(other) => return Err(other),
            };

            let trace = evaluate_tree(&rule.conditions, &facts);
            if !trace.result {
                continue;
            }

            triggered_rule_ids.push(rule.id.clone());
            for action in &rule.actions {
                match action {
                    RuleAction::CreateAlert {
                        severity,
                        category,
                        message,
                    } => {
                        let alert = Alert::new(
                            org_id,
                            &rule.id,
                            &tx.id,
                            *severity,
                            category,
                            message,
                        );
                        let id = self.store.insert_alert(&alert).await?;
                        alert_ids.push(id);
                    }
                    RuleAction::SetDecision { decision, halt } => {
                        decisions.push(*decision);
                        if *halt {
                            halted = true;
                        }
                    }
                }
            }

            if halted {
                info!(
                    org_id,
                    rule_version_id = %rule.id,
                    "terminal action halted further rule evaluation"
                );
                break;
            }
        }

        let outcome = EvaluationOutcome {
            decision: TxDecision::aggregate(decisions),
            triggered_rule_ids,
            alert_ids,
            duration_ms: started.elapsed().as_millis() as u64,
            partial,
        };

        self.publish(org_id, tx, &outcome);
        Ok(outcome)
    }

    /// Cache-first load of the active rule set, priority descending.
    async fn load_active_rules(
        &self,
        org_id: &str,
        tx: &Transaction,
    ) -> EngineResult<Vec<RuleVersion>> {
        let key = CacheCoordinator::rules_key(org_id);
        if let Some(rules) = self.cache.get_json::<Vec<RuleVersion>>(&key).await {
            return Ok(rules);
        }

        let rules = self
            .store
            .active_rule_versions(org_id, tx.timestamp)
            .await?;
        self.cache
            .put_json(&key, &rules, self.config.rules_cache_ttl())
            .await;
        Ok(rules)
    }

    /// Persist the internal diagnostic alert for a malformed rule. A store
    /// failure here is logged and swallowed so the remaining rules still run.
    async fn diagnostic_alert(
        &self,
        tx: &Transaction,
        rule: &RuleVersion,
        cause: &str,
    ) -> Option<String> {
        let alert = Alert::new(
            &tx.org_id,
            &rule.id,
            &tx.id,
            Severity::High,
            &self.config.diagnostic_category,
            format!("rule {} is malformed: {}", rule.id, cause),
        );
        match self.store.insert_alert(&alert).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(rule_version_id = %rule.id, error = %e, "failed to persist diagnostic alert");
                None
            }
        }
    }

    /// Fire-and-forget result publication; never awaited on this path.
    fn publish(&self, org_id: &str, tx: &Transaction, outcome: &EvaluationOutcome) {
        let event = EvaluationEvent {
            org_id: org_id.to_string(),
            transaction_id: tx.id.clone(),
            decision: outcome.decision,
            triggered_rule_ids: outcome.triggered_rule_ids.clone(),
            alert_ids: outcome.alert_ids.clone(),
            partial: outcome.partial,
        };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.publish(event).await;
        });
    }

    /// Invalidate the cached rule set for an organization, then persist the
    /// new version. Callers acknowledging a rule write go through here so a
    /// reader starting after the acknowledgment never sees the old set.
    pub async fn publish_rule_version(&self, rule: &RuleVersion) -> EngineResult<()> {
        self.store.insert_rule_version(rule).await?;
        self.cache.invalidate_rules(&rule.org_id).await;
        info!(org_id = %rule.org_id, rule_version_id = %rule.id, "rule version published");
        Ok(())
    }

    /// Deactivate a rule version and invalidate the cached set.
    pub async fn retire_rule_version(
        &self,
        org_id: &str,
        rule_version_id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> EngineResult<()> {
        self.store
            .deactivate_rule_version(org_id, rule_version_id, at)
            .await?;
        self.cache.invalidate_rules(org_id).await;
        info!(org_id, rule_version_id, "rule version retired");
        Ok(())
    }
}
