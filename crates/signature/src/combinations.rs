//! Minimal combination enumeration
//!
//! Bottom-up: a leaf yields `{group: min}`; `any` unions its children's
//! combination sets; `all` cross-multiplies one combination per child and
//! merges per group. When sibling branches reference the same group the
//! merged requirement is the per-group **maximum**, mirroring the
//! satisfaction check, which counts each group's signers once across the
//! whole tree. Dominated combinations are pruned so only minimal sets
//! remain.

use std::collections::BTreeMap;

use crate::rule::SignatureNode;

/// One satisfying assignment: group -> required distinct signer count.
///
/// A `BTreeMap` keeps enumeration output deterministic.
pub type Combination = BTreeMap<String, u32>;

/// Enumerate the minimal combinations satisfying the rule definition.
///
/// Trees are validated at creation, so the recursion is bounded and every
/// combinator has at least one child.
pub fn possible_combinations(node: &SignatureNode) -> Vec<Combination> {
    let combos = enumerate(node);
    prune(combos)
}

fn enumerate(node: &SignatureNode) -> Vec<Combination> {
    match node {
        SignatureNode::Group { group, min } => {
            let mut combo = Combination::new();
            combo.insert(group.clone(), *min);
            vec![combo]
        }
        SignatureNode::Any { any } => any.iter().flat_map(enumerate).collect(),
        SignatureNode::All { all } => {
            let mut acc: Vec<Combination> = vec![Combination::new()];
            for child in all {
                let child_combos = enumerate(child);
                let mut next = Vec::with_capacity(acc.len() * child_combos.len());
                for base in &acc {
                    for combo in &child_combos {
                        next.push(merge_max(base, combo));
                    }
                }
                acc = next;
            }
            acc
        }
    }
}

/// Per-group maximum of two combinations.
fn merge_max(a: &Combination, b: &Combination) -> Combination {
    let mut merged = a.clone();
    for (group, min) in b {
        merged
            .entry(group.clone())
            .and_modify(|existing| *existing = (*existing).max(*min))
            .or_insert(*min);
    }
    merged
}

/// Whether satisfying `candidate` necessarily satisfies `other`.
fn covers(candidate: &Combination, other: &Combination) -> bool {
    other
        .iter()
        .all(|(group, min)| candidate.get(group).copied().unwrap_or(0) >= *min)
}

/// Drop duplicates and every combination dominated by a smaller one.
fn prune(combos: Vec<Combination>) -> Vec<Combination> {
    let mut unique: Vec<Combination> = Vec::with_capacity(combos.len());
    for combo in combos {
        if !unique.contains(&combo) {
            unique.push(combo);
        }
    }

    let minimal: Vec<Combination> = unique
        .iter()
        .filter(|candidate| {
            !unique
                .iter()
                .any(|other| *candidate != other && covers(candidate, other))
        })
        .cloned()
        .collect();
    minimal
}
