//! Rule versions, actions and window specs
//!
//! A rule version is immutable once created. Updating a rule means creating
//! a new version and deactivating the old one; at most one version per
//! template is active at any instant.

use arbiter_core::{Severity, TxDecision};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::ConditionNode;
use crate::error::{RuleError, RuleResult};

/// Unit of a sliding-window duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
    Minutes,
    Hours,
    Days,
}

/// Sliding-window bounds attached to a rule version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub duration: i64,
    pub unit: WindowUnit,
}

impl WindowSpec {
    pub fn new(duration: i64, unit: WindowUnit) -> Self {
        Self { duration, unit }
    }

    /// Window length as a chrono duration
    pub fn length(&self) -> Duration {
        match self.unit {
            WindowUnit::Minutes => Duration::minutes(self.duration),
            WindowUnit::Hours => Duration::hours(self.duration),
            WindowUnit::Days => Duration::days(self.duration),
        }
    }
}

/// Action executed when a rule triggers.
///
/// Actions run in authored order; `SetDecision { halt: true }` stops the
/// evaluation of any remaining rules (terminal short-circuit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Persist an alert referencing the rule version and transaction
    CreateAlert {
        severity: Severity,
        category: String,
        message: String,
    },
    /// Contribute a decision to the transaction outcome
    SetDecision {
        decision: TxDecision,
        #[serde(default)]
        halt: bool,
    },
}

impl RuleAction {
    /// Alert-creating action
    pub fn create_alert(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RuleAction::CreateAlert {
            severity,
            category: category.into(),
            message: message.into(),
        }
    }

    /// Decision-contributing action
    pub fn set_decision(decision: TxDecision) -> Self {
        RuleAction::SetDecision {
            decision,
            halt: false,
        }
    }

    /// Decision-contributing action that halts further rule evaluation
    pub fn set_decision_halting(decision: TxDecision) -> Self {
        RuleAction::SetDecision {
            decision,
            halt: true,
        }
    }

    /// Whether this action requests a terminal short-circuit
    pub fn halts(&self) -> bool {
        matches!(self, RuleAction::SetDecision { halt: true, .. })
    }
}

/// An immutable, versioned rule scoped to one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleVersion {
    /// Unique rule version ID
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Rule template this version belongs to
    pub template_id: String,

    /// Version sequence number within the template
    pub version: u32,

    /// Human-readable name
    pub name: String,

    /// Description
    pub description: String,

    /// Validated condition tree
    pub conditions: ConditionNode,

    /// Ordered actions executed on trigger
    pub actions: Vec<RuleAction>,

    /// Optional sliding-window bounds for `window.` facts
    pub window: Option<WindowSpec>,

    /// Evaluation priority (higher runs first)
    pub priority: u32,

    /// Whether the version is enabled
    pub enabled: bool,

    /// Start of the effective interval
    pub activated_at: DateTime<Utc>,

    /// End of the effective interval, if deactivated
    pub deactivated_at: Option<DateTime<Utc>>,

    /// Creation timestamp (audit)
    pub created_at: DateTime<Utc>,
}

impl RuleVersion {
    /// Create a new builder
    pub fn builder(org_id: impl Into<String>, template_id: impl Into<String>) -> RuleVersionBuilder {
        RuleVersionBuilder::new(org_id, template_id)
    }

    /// Whether this version is active at the given instant:
    /// enabled, activated at or before `at`, and not yet deactivated.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if !self.enabled || self.activated_at > at {
            return false;
        }
        match self.deactivated_at {
            Some(end) => end > at,
            None => true,
        }
    }
}

/// Builder for [`RuleVersion`]
pub struct RuleVersionBuilder {
    org_id: String,
    template_id: String,
    version: u32,
    name: Option<String>,
    description: String,
    conditions: Option<ConditionNode>,
    actions: Vec<RuleAction>,
    window: Option<WindowSpec>,
    priority: u32,
    enabled: bool,
    activated_at: Option<DateTime<Utc>>,
}

impl RuleVersionBuilder {
    /// Create a new builder
    pub fn new(org_id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            template_id: template_id.into(),
            version: 1,
            name: None,
            description: String::new(),
            conditions: None,
            actions: Vec::new(),
            window: None,
            priority: 100,
            enabled: true,
            activated_at: None,
        }
    }

    /// Set the version sequence number
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Set the rule name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the validated condition tree
    pub fn when(mut self, conditions: ConditionNode) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Append an action
    pub fn then(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Attach a window spec
    pub fn window(mut self, window: WindowSpec) -> Self {
        self.window = Some(window);
        self
    }

    /// Set priority (higher runs first)
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set enabled state
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the effective-interval start
    pub fn activated_at(mut self, at: DateTime<Utc>) -> Self {
        self.activated_at = Some(at);
        self
    }

    /// Build the rule version.
    ///
    /// Fails if the condition tree is missing or no actions were supplied;
    /// this is the tail end of creation-time validation.
    pub fn build(self) -> RuleResult<RuleVersion> {
        let conditions = self
            .conditions
            .ok_or_else(|| RuleError::InvalidShape("rule requires a condition tree".into()))?;
        if self.actions.is_empty() {
            return Err(RuleError::NoActions);
        }

        let now = Utc::now();
        let id = format!("RV-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
        Ok(RuleVersion {
            id,
            org_id: self.org_id,
            template_id: self.template_id.clone(),
            version: self.version,
            name: self.name.unwrap_or(self.template_id),
            description: self.description,
            conditions,
            actions: self.actions,
            window: self.window,
            priority: self.priority,
            enabled: self.enabled,
            activated_at: self.activated_at.unwrap_or(now),
            deactivated_at: None,
            created_at: now,
        })
    }
}
