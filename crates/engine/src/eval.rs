//! Production condition-tree evaluation
//!
//! Pure and side-effect free: a node plus a fact snapshot in, a boolean plus
//! a per-node trace out. An absent fact makes every comparison operator
//! false; only `exists`/`notExists` interpret absence themselves. `between`
//! is inclusive at both bounds. Children of a combinator are always all
//! evaluated so the trace is complete.

use arbiter_core::{FactMap, FactValue};
use arbiter_rules::{ConditionNode, Operator};

/// Evaluation trace of one node.
#[derive(Debug, Clone)]
pub struct NodeTrace {
    /// Leaf fact name; `None` on combinators
    pub fact: Option<String>,
    /// Leaf operator; `None` on combinators
    pub operator: Option<Operator>,
    /// Authored operand the fact was compared against
    pub operand: Option<FactValue>,
    /// Resolved fact value at evaluation time
    pub actual: Option<FactValue>,
    /// Node result
    pub result: bool,
    /// Child traces (combinators only)
    pub children: Vec<NodeTrace>,
}

/// Evaluate a validated condition tree against a fact snapshot.
pub fn evaluate_tree(node: &ConditionNode, facts: &FactMap) -> NodeTrace {
    match node {
        ConditionNode::All { all } => {
            let children: Vec<NodeTrace> =
                all.iter().map(|c| evaluate_tree(c, facts)).collect();
            // all([]) is vacuously true
            let result = children.iter().all(|c| c.result);
            NodeTrace {
                fact: None,
                operator: None,
                operand: None,
                actual: None,
                result,
                children,
            }
        }
        ConditionNode::Any { any } => {
            let children: Vec<NodeTrace> =
                any.iter().map(|c| evaluate_tree(c, facts)).collect();
            // any([]) is false
            let result = children.iter().any(|c| c.result);
            NodeTrace {
                fact: None,
                operator: None,
                operand: None,
                actual: None,
                result,
                children,
            }
        }
        ConditionNode::Leaf {
            fact,
            operator,
            value,
        } => {
            let actual = facts.get(fact).cloned().unwrap_or(FactValue::Absent);
            let result = evaluate_leaf(*operator, &actual, value);
            NodeTrace {
                fact: Some(fact.clone()),
                operator: Some(*operator),
                operand: Some(value.clone()),
                actual: Some(actual),
                result,
                children: Vec::new(),
            }
        }
    }
}

fn evaluate_leaf(operator: Operator, actual: &FactValue, operand: &FactValue) -> bool {
    if actual.is_absent() && !operator.is_existence() {
        return false;
    }

    match operator {
        Operator::Eq => values_equal(actual, operand),
        Operator::NotEq => !values_equal(actual, operand),
        Operator::GreaterThan => compare_numbers(actual, operand, |a, b| a > b),
        Operator::LessThan => compare_numbers(actual, operand, |a, b| a < b),
        Operator::GreaterThanOrEqual => compare_numbers(actual, operand, |a, b| a >= b),
        Operator::LessThanOrEqual => compare_numbers(actual, operand, |a, b| a <= b),
        Operator::In => list_contains(operand, actual),
        Operator::NotIn => !list_contains(operand, actual),
        Operator::Between => match operand {
            FactValue::List(bounds) if bounds.len() == 2 => {
                compare_numbers(actual, &bounds[0], |a, lo| a >= lo)
                    && compare_numbers(actual, &bounds[1], |a, hi| a <= hi)
            }
            _ => false,
        },
        Operator::Exists => !actual.is_absent(),
        Operator::NotExists => actual.is_absent(),
    }
}

/// Typed equality: decimal for numbers, case-sensitive for text. Values of
/// different types are never equal.
fn values_equal(a: &FactValue, b: &FactValue) -> bool {
    match (a, b) {
        (FactValue::Number(x), FactValue::Number(y)) => x == y,
        (FactValue::Text(x), FactValue::Text(y)) => x == y,
        (FactValue::Bool(x), FactValue::Bool(y)) => x == y,
        _ => false,
    }
}

fn compare_numbers(
    a: &FactValue,
    b: &FactValue,
    cmp: fn(rust_decimal::Decimal, rust_decimal::Decimal) -> bool,
) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => cmp(x, y),
        _ => false,
    }
}

fn list_contains(operand: &FactValue, actual: &FactValue) -> bool {
    match operand {
        FactValue::List(items) => items.iter().any(|item| values_equal(actual, item)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn facts(pairs: &[(&str, FactValue)]) -> FactMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn num(n: rust_decimal::Decimal) -> FactValue {
        FactValue::Number(n)
    }

    #[test]
    fn test_strict_greater_than() {
        let leaf = ConditionNode::leaf("amount", Operator::GreaterThan, num(dec!(10000)));

        let trace = evaluate_tree(&leaf, &facts(&[("amount", num(dec!(15000)))]));
        assert!(trace.result);

        // exactly at the threshold does not trigger
        let trace = evaluate_tree(&leaf, &facts(&[("amount", num(dec!(10000)))]));
        assert!(!trace.result);
    }

    #[test]
    fn test_absent_fact_is_false_for_comparisons() {
        let empty = HashMap::new();
        for operator in [
            Operator::Eq,
            Operator::NotEq,
            Operator::GreaterThan,
            Operator::LessThan,
            Operator::GreaterThanOrEqual,
            Operator::LessThanOrEqual,
            Operator::In,
            Operator::NotIn,
            Operator::Between,
        ] {
            let operand = match operator {
                Operator::In | Operator::NotIn => FactValue::List(vec![num(dec!(1))]),
                Operator::Between => FactValue::List(vec![num(dec!(1)), num(dec!(2))]),
                _ => num(dec!(1)),
            };
            let leaf = ConditionNode::leaf("missing", operator, operand);
            let trace = evaluate_tree(&leaf, &empty);
            assert!(!trace.result, "operator {} on absent fact", operator);
        }
    }

    #[test]
    fn test_existence_operators_interpret_absence() {
        let empty = HashMap::new();
        let present = facts(&[("country", FactValue::Text("DE".into()))]);

        let exists = ConditionNode::leaf("country", Operator::Exists, FactValue::Absent);
        assert!(!evaluate_tree(&exists, &empty).result);
        assert!(evaluate_tree(&exists, &present).result);

        let not_exists = ConditionNode::leaf("country", Operator::NotExists, FactValue::Absent);
        assert!(evaluate_tree(&not_exists, &empty).result);
        assert!(!evaluate_tree(&not_exists, &present).result);
    }

    #[test]
    fn test_vacuous_combinators() {
        let empty = HashMap::new();
        assert!(evaluate_tree(&ConditionNode::all(vec![]), &empty).result);
        assert!(!evaluate_tree(&ConditionNode::any(vec![]), &empty).result);
    }

    #[test]
    fn test_in_and_not_in() {
        let operand = FactValue::List(vec![
            FactValue::Text("IR".into()),
            FactValue::Text("KP".into()),
        ]);
        let leaf_in = ConditionNode::leaf("country", Operator::In, operand.clone());
        let leaf_not_in = ConditionNode::leaf("country", Operator::NotIn, operand);

        let ir = facts(&[("country", FactValue::Text("IR".into()))]);
        let de = facts(&[("country", FactValue::Text("DE".into()))]);

        assert!(evaluate_tree(&leaf_in, &ir).result);
        assert!(!evaluate_tree(&leaf_in, &de).result);
        assert!(!evaluate_tree(&leaf_not_in, &ir).result);
        assert!(evaluate_tree(&leaf_not_in, &de).result);
    }

    #[test]
    fn test_between_inclusive() {
        let leaf = ConditionNode::leaf(
            "amount",
            Operator::Between,
            FactValue::List(vec![num(dec!(1000)), num(dec!(5000))]),
        );

        assert!(evaluate_tree(&leaf, &facts(&[("amount", num(dec!(1000)))])).result);
        assert!(evaluate_tree(&leaf, &facts(&[("amount", num(dec!(3000)))])).result);
        assert!(evaluate_tree(&leaf, &facts(&[("amount", num(dec!(5000)))])).result);
        assert!(!evaluate_tree(&leaf, &facts(&[("amount", num(dec!(5000.01)))])).result);
        assert!(!evaluate_tree(&leaf, &facts(&[("amount", num(dec!(999.99)))])).result);
    }

    #[test]
    fn test_string_comparison_case_sensitive() {
        let leaf = ConditionNode::leaf("country", Operator::Eq, FactValue::Text("DE".into()));
        assert!(evaluate_tree(&leaf, &facts(&[("country", FactValue::Text("DE".into()))])).result);
        assert!(!evaluate_tree(&leaf, &facts(&[("country", FactValue::Text("de".into()))])).result);
    }

    #[test]
    fn test_type_mismatch_is_not_equal() {
        let leaf = ConditionNode::leaf("amount", Operator::Eq, FactValue::Text("100".into()));
        assert!(!evaluate_tree(&leaf, &facts(&[("amount", num(dec!(100)))])).result);
    }

    #[test]
    fn test_decimal_precision() {
        let leaf = ConditionNode::leaf("amount", Operator::Eq, num(dec!(0.1)));
        // 0.1 compares exactly under decimal arithmetic
        assert!(evaluate_tree(&leaf, &facts(&[("amount", num(dec!(0.10)))])).result);
    }

    #[test]
    fn test_nested_tree_and_trace() {
        let tree = ConditionNode::all(vec![
            ConditionNode::leaf("amount", Operator::GreaterThan, num(dec!(5000))),
            ConditionNode::any(vec![
                ConditionNode::leaf("country", Operator::Eq, FactValue::Text("IR".into())),
                ConditionNode::leaf("channel", Operator::Eq, FactValue::Text("API".into())),
            ]),
        ]);

        let snapshot = facts(&[
            ("amount", num(dec!(9000))),
            ("country", FactValue::Text("DE".into())),
            ("channel", FactValue::Text("API".into())),
        ]);

        let trace = evaluate_tree(&tree, &snapshot);
        assert!(trace.result);
        assert_eq!(trace.children.len(), 2);

        let any = &trace.children[1];
        assert!(any.result);
        // both children evaluated even though the second alone decides
        assert_eq!(any.children.len(), 2);
        assert!(!any.children[0].result);
        assert!(any.children[1].result);

        let leaf = &trace.children[0];
        assert_eq!(leaf.fact.as_deref(), Some("amount"));
        assert_eq!(leaf.actual, Some(num(dec!(9000))));
        assert_eq!(leaf.operand, Some(num(dec!(5000))));
    }
}
