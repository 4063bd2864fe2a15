//! Condition narration
//!
//! Re-derives the tree semantics instead of calling the production
//! evaluator: an absent fact fails every comparison, only
//! existence operators read absence directly, `between` is inclusive at
//! both bounds, text comparisons are case-sensitive, numbers compare as
//! decimals.

use arbiter_core::{FactMap, FactValue};
use arbiter_rules::{ConditionNode, Operator, RuleVersion};
use serde::Serialize;

/// Human-readable explanation of one node.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// What this node is ("all", "any", or the leaf fact name)
    pub node: String,
    /// Whether the node holds against the snapshot
    pub outcome: bool,
    /// One-line narration of why
    pub detail: String,
    /// Child explanations (combinators only)
    pub children: Vec<Explanation>,
}

/// Explain a full rule evaluation against a caller-supplied fact snapshot.
pub fn explain_rule_evaluation(rule: &RuleVersion, facts: &FactMap) -> Explanation {
    let root = explain_condition(&rule.conditions, facts);
    Explanation {
        node: format!("rule {}", rule.name),
        outcome: root.outcome,
        detail: if root.outcome {
            format!("rule '{}' would fire", rule.name)
        } else {
            format!("rule '{}' would not fire", rule.name)
        },
        children: vec![root],
    }
}

/// Explain a single condition node against a fact snapshot.
pub fn explain_condition(node: &ConditionNode, facts: &FactMap) -> Explanation {
    match node {
        ConditionNode::All { all } => {
            let children: Vec<Explanation> =
                all.iter().map(|child| explain_condition(child, facts)).collect();
            let failed = children.iter().filter(|c| !c.outcome).count();
            let outcome = failed == 0;
            let detail = if all.is_empty() {
                "all of [] holds vacuously".to_string()
            } else if outcome {
                format!("all {} branches hold", children.len())
            } else {
                format!("{} of {} branches fail", failed, children.len())
            };
            Explanation {
                node: "all".to_string(),
                outcome,
                detail,
                children,
            }
        }
        ConditionNode::Any { any } => {
            let children: Vec<Explanation> =
                any.iter().map(|child| explain_condition(child, facts)).collect();
            let held = children.iter().filter(|c| c.outcome).count();
            let outcome = held > 0;
            let detail = if any.is_empty() {
                "any of [] never holds".to_string()
            } else if outcome {
                format!("{} of {} branches hold", held, children.len())
            } else {
                format!("none of {} branches hold", children.len())
            };
            Explanation {
                node: "any".to_string(),
                outcome,
                detail,
                children,
            }
        }
        ConditionNode::Leaf {
            fact,
            operator,
            value,
        } => {
            let actual = facts.get(fact).cloned().unwrap_or(FactValue::Absent);
            let outcome = leaf_holds(*operator, &actual, value);
            Explanation {
                node: fact.clone(),
                outcome,
                detail: narrate_leaf(fact, *operator, &actual, value, outcome),
                children: Vec::new(),
            }
        }
    }
}

fn leaf_holds(operator: Operator, actual: &FactValue, operand: &FactValue) -> bool {
    match operator {
        Operator::Exists => return !actual.is_absent(),
        Operator::NotExists => return actual.is_absent(),
        _ if actual.is_absent() => return false,
        _ => {}
    }

    match operator {
        Operator::Eq => same_value(actual, operand),
        Operator::NotEq => !same_value(actual, operand),
        Operator::GreaterThan => decimal_pair(actual, operand).map(|(a, b)| a > b).unwrap_or(false),
        Operator::LessThan => decimal_pair(actual, operand).map(|(a, b)| a < b).unwrap_or(false),
        Operator::GreaterThanOrEqual => {
            decimal_pair(actual, operand).map(|(a, b)| a >= b).unwrap_or(false)
        }
        Operator::LessThanOrEqual => {
            decimal_pair(actual, operand).map(|(a, b)| a <= b).unwrap_or(false)
        }
        Operator::In => member_of(actual, operand),
        Operator::NotIn => !member_of(actual, operand),
        Operator::Between => bounds_of(operand)
            .and_then(|(lo, hi)| {
                let a = actual.as_number()?;
                let lo = lo.as_number()?;
                let hi = hi.as_number()?;
                Some(a >= lo && a <= hi)
            })
            .unwrap_or(false),
        Operator::Exists | Operator::NotExists => unreachable!("handled above"),
    }
}

fn same_value(a: &FactValue, b: &FactValue) -> bool {
    match (a, b) {
        (FactValue::Number(x), FactValue::Number(y)) => x == y,
        (FactValue::Text(x), FactValue::Text(y)) => x == y,
        (FactValue::Bool(x), FactValue::Bool(y)) => x == y,
        _ => false,
    }
}

fn decimal_pair(
    a: &FactValue,
    b: &FactValue,
) -> Option<(rust_decimal::Decimal, rust_decimal::Decimal)> {
    Some((a.as_number()?, b.as_number()?))
}

fn member_of(actual: &FactValue, operand: &FactValue) -> bool {
    match operand {
        FactValue::List(items) => items.iter().any(|item| same_value(actual, item)),
        _ => false,
    }
}

fn bounds_of(operand: &FactValue) -> Option<(&FactValue, &FactValue)> {
    match operand {
        FactValue::List(items) if items.len() == 2 => Some((&items[0], &items[1])),
        _ => None,
    }
}

fn narrate_leaf(
    fact: &str,
    operator: Operator,
    actual: &FactValue,
    operand: &FactValue,
    outcome: bool,
) -> String {
    if actual.is_absent() && !operator.is_existence() {
        return format!("{} is absent, so `{}` cannot hold", fact, operator);
    }
    let verdict = if outcome { "holds" } else { "does not hold" };
    match operator {
        Operator::Exists => format!("{} = {} ({} present check {})", fact, actual, fact, verdict),
        Operator::NotExists => format!("{} absent check {}", fact, verdict),
        _ => format!("{} = {} `{}` {} {}", fact, actual, operator, operand, verdict),
    }
}
