//! Condition tree - closed tagged shape with creation-time validation
//!
//! The authored wire format uses camelCase operator names
//! (`greaterThan`, `notIn`, ...); internally every node is a closed tagged
//! variant so evaluation never re-validates.

use arbiter_core::FactValue;
use serde::{Deserialize, Serialize};

use crate::error::{RuleError, RuleResult};

/// Maximum nesting depth accepted at rule creation
const MAX_TREE_DEPTH: usize = 32;

/// Transaction facts every organization can reference directly
const BUILT_IN_FACTS: &[&str] = &[
    "amount",
    "currency",
    "normalized_amount",
    "normalized_currency",
    "tx_type",
    "sub_type",
    "account_id",
    "country",
    "counterparty_id",
    "channel",
    "asset",
    "quantity",
    "price",
];

/// Comparison operators available in condition leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    NotEq,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    In,
    NotIn,
    Between,
    Exists,
    NotExists,
}

impl Operator {
    /// Parse an authored operator name
    pub fn parse(name: &str) -> RuleResult<Operator> {
        match name {
            "eq" => Ok(Operator::Eq),
            "notEq" => Ok(Operator::NotEq),
            "greaterThan" => Ok(Operator::GreaterThan),
            "lessThan" => Ok(Operator::LessThan),
            "greaterThanOrEqual" => Ok(Operator::GreaterThanOrEqual),
            "lessThanOrEqual" => Ok(Operator::LessThanOrEqual),
            "in" => Ok(Operator::In),
            "notIn" => Ok(Operator::NotIn),
            "between" => Ok(Operator::Between),
            "exists" => Ok(Operator::Exists),
            "notExists" => Ok(Operator::NotExists),
            other => Err(RuleError::UnknownOperator(other.to_string())),
        }
    }

    /// Authored name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::NotEq => "notEq",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::Between => "between",
            Operator::Exists => "exists",
            Operator::NotExists => "notExists",
        }
    }

    /// Whether the operator interprets fact absence itself instead of
    /// defaulting to false
    pub fn is_existence(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated condition tree node.
///
/// `all([])` is vacuously true and `any([])` is false; both are legal trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    /// Every child must hold (AND)
    All { all: Vec<ConditionNode> },
    /// At least one child must hold (OR)
    Any { any: Vec<ConditionNode> },
    /// A single comparison against a named fact
    Leaf {
        fact: String,
        operator: Operator,
        value: FactValue,
    },
}

impl ConditionNode {
    /// All-of combinator
    pub fn all(children: Vec<ConditionNode>) -> Self {
        ConditionNode::All { all: children }
    }

    /// Any-of combinator
    pub fn any(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Any { any: children }
    }

    /// Comparison leaf
    pub fn leaf(fact: impl Into<String>, operator: Operator, value: FactValue) -> Self {
        ConditionNode::Leaf {
            fact: fact.into(),
            operator,
            value,
        }
    }

    /// Validate a loosely-typed authored tree into the closed shape.
    ///
    /// This is the only place condition input is validated; evaluators trust
    /// the result. Unknown operators, unknown facts, bad operand arity and
    /// over-deep trees are all rejected here.
    pub fn from_loose(value: &serde_json::Value) -> RuleResult<ConditionNode> {
        Self::parse_node(value, 0)
    }

    fn parse_node(value: &serde_json::Value, depth: usize) -> RuleResult<ConditionNode> {
        if depth > MAX_TREE_DEPTH {
            return Err(RuleError::TooDeep(MAX_TREE_DEPTH));
        }

        let obj = value
            .as_object()
            .ok_or_else(|| RuleError::InvalidShape("condition node must be an object".into()))?;

        if let Some(children) = obj.get("all") {
            return Ok(ConditionNode::All {
                all: Self::parse_children(children, depth)?,
            });
        }
        if let Some(children) = obj.get("any") {
            return Ok(ConditionNode::Any {
                any: Self::parse_children(children, depth)?,
            });
        }

        let fact = obj
            .get("fact")
            .and_then(|f| f.as_str())
            .ok_or_else(|| RuleError::InvalidShape("leaf requires a string `fact`".into()))?;
        let operator = obj
            .get("operator")
            .and_then(|o| o.as_str())
            .ok_or_else(|| RuleError::InvalidShape("leaf requires a string `operator`".into()))?;

        let operator = Operator::parse(operator)?;
        validate_fact_name(fact)?;

        let value = obj
            .get("value")
            .map(FactValue::from_json)
            .unwrap_or(FactValue::Absent);
        validate_operand(operator, &value)?;

        Ok(ConditionNode::Leaf {
            fact: fact.to_string(),
            operator,
            value,
        })
    }

    fn parse_children(value: &serde_json::Value, depth: usize) -> RuleResult<Vec<ConditionNode>> {
        let items = value
            .as_array()
            .ok_or_else(|| RuleError::InvalidShape("combinator children must be an array".into()))?;
        items
            .iter()
            .map(|item| Self::parse_node(item, depth + 1))
            .collect()
    }

    /// Collect the distinct fact names referenced by this tree
    pub fn referenced_facts(&self) -> Vec<String> {
        let mut facts = Vec::new();
        self.collect_facts(&mut facts);
        facts.dedup();
        facts
    }

    fn collect_facts(&self, out: &mut Vec<String>) {
        match self {
            ConditionNode::All { all } => all.iter().for_each(|c| c.collect_facts(out)),
            ConditionNode::Any { any } => any.iter().for_each(|c| c.collect_facts(out)),
            ConditionNode::Leaf { fact, .. } => {
                if !out.contains(fact) {
                    out.push(fact.clone());
                }
            }
        }
    }
}

/// Validate a fact name against the built-in vocabulary and the dynamic
/// `metadata.` / `window.` / `list.` namespaces.
pub fn validate_fact_name(fact: &str) -> RuleResult<()> {
    if BUILT_IN_FACTS.contains(&fact) {
        return Ok(());
    }
    if let Some(key) = fact.strip_prefix("metadata.") {
        if key.is_empty() {
            return Err(RuleError::UnknownFact(fact.to_string()));
        }
        return Ok(());
    }
    if fact.starts_with("window.") {
        WindowFact::parse(fact)?;
        return Ok(());
    }
    if fact.starts_with("list.") {
        validate_list_fact(fact)?;
        return Ok(());
    }
    Err(RuleError::UnknownFact(fact.to_string()))
}

fn validate_list_fact(fact: &str) -> RuleResult<()> {
    // list.<blacklist|whitelist>.<country|account|counterparty>
    let mut parts = fact.splitn(3, '.');
    let _ = parts.next();
    let kind = parts.next().unwrap_or("");
    let entity = parts.next().unwrap_or("");

    let kind_ok = matches!(kind, "blacklist" | "whitelist");
    let entity_ok = matches!(entity, "country" | "account" | "counterparty");
    if kind_ok && entity_ok {
        Ok(())
    } else {
        Err(RuleError::UnknownFact(fact.to_string()))
    }
}

fn validate_operand(operator: Operator, value: &FactValue) -> RuleResult<()> {
    match operator {
        Operator::Exists | Operator::NotExists => {
            if value.is_absent() {
                Ok(())
            } else {
                Err(RuleError::BadOperand {
                    operator: operator.as_str().to_string(),
                    expected: "no value".to_string(),
                })
            }
        }
        Operator::In | Operator::NotIn => match value {
            FactValue::List(items) if !items.is_empty() => Ok(()),
            _ => Err(RuleError::BadOperand {
                operator: operator.as_str().to_string(),
                expected: "a non-empty list".to_string(),
            }),
        },
        Operator::Between => match value {
            FactValue::List(items)
                if items.len() == 2 && items.iter().all(|i| i.as_number().is_some()) =>
            {
                Ok(())
            }
            _ => Err(RuleError::BadOperand {
                operator: operator.as_str().to_string(),
                expected: "a list of exactly two numbers".to_string(),
            }),
        },
        _ => {
            if value.is_absent() {
                Err(RuleError::BadOperand {
                    operator: operator.as_str().to_string(),
                    expected: "a scalar value".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }
}

/// Aggregation kinds a window fact can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Sum,
    Count,
    Avg,
    DistinctCount,
}

impl AggregateKind {
    /// Name used inside `window.` fact names
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Sum => "sum",
            AggregateKind::Count => "count",
            AggregateKind::Avg => "avg",
            AggregateKind::DistinctCount => "distinct_count",
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `window.` fact name.
///
/// Grammar: `window.count` | `window.<sum|avg|distinct_count>.<attribute>`.
/// The window bounds themselves come from the rule's [`crate::WindowSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFact {
    pub kind: AggregateKind,
    pub attribute: Option<String>,
}

impl WindowFact {
    /// Parse a `window.` fact name
    pub fn parse(fact: &str) -> RuleResult<WindowFact> {
        let rest = fact
            .strip_prefix("window.")
            .ok_or_else(|| RuleError::UnknownFact(fact.to_string()))?;

        let (kind, attribute) = match rest.split_once('.') {
            None => (rest, None),
            Some((kind, attr)) => (kind, Some(attr)),
        };

        let kind = match kind {
            "sum" => AggregateKind::Sum,
            "count" => AggregateKind::Count,
            "avg" => AggregateKind::Avg,
            "distinct_count" => AggregateKind::DistinctCount,
            _ => return Err(RuleError::UnknownFact(fact.to_string())),
        };

        match (kind, attribute) {
            (AggregateKind::Count, None) => Ok(WindowFact {
                kind,
                attribute: None,
            }),
            (AggregateKind::Count, Some(_)) | (_, None) => {
                Err(RuleError::UnknownFact(fact.to_string()))
            }
            (_, Some(attr)) if attr.is_empty() => Err(RuleError::UnknownFact(fact.to_string())),
            (_, Some(attr)) => Ok(WindowFact {
                kind,
                attribute: Some(attr.to_string()),
            }),
        }
    }
}
