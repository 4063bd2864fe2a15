//! Satisfaction check
//!
//! Evaluates a rule definition against the distinct SIGNED signers per
//! group. Counts are computed once per group: two leaves referencing the
//! same group share the same signer pool, while leaves of different groups
//! count independently even when one signer belongs to both groups.

use std::collections::{HashMap, HashSet};

use crate::rule::SignatureNode;

/// Distinct SIGNED signer count per group.
///
/// `memberships` maps signer id -> groups the signer belongs to; signers
/// without a membership entry count toward no group.
pub fn signed_counts(
    signed_signer_ids: &[&str],
    memberships: &HashMap<String, Vec<String>>,
) -> HashMap<String, u32> {
    let mut signers_per_group: HashMap<&str, HashSet<&str>> = HashMap::new();
    for signer in signed_signer_ids {
        if let Some(groups) = memberships.get(*signer) {
            for group in groups {
                signers_per_group.entry(group.as_str()).or_default().insert(signer);
            }
        }
    }
    signers_per_group
        .into_iter()
        .map(|(group, signers)| (group.to_string(), signers.len() as u32))
        .collect()
}

/// Whether the collected signatures satisfy the rule definition.
pub fn is_satisfied(node: &SignatureNode, counts: &HashMap<String, u32>) -> bool {
    match node {
        SignatureNode::All { all } => all.iter().all(|child| is_satisfied(child, counts)),
        SignatureNode::Any { any } => any.iter().any(|child| is_satisfied(child, counts)),
        SignatureNode::Group { group, min } => {
            counts.get(group).copied().unwrap_or(0) >= *min
        }
    }
}
