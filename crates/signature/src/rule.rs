//! Signature rule trees
//!
//! A rule definition is `all`/`any` combinators over `{group, min}` leaves.
//! Trees are validated once at creation: empty combinators, empty group
//! names and zero thresholds are rejected there, so the satisfaction and
//! enumeration engines never re-validate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SignatureError, SignatureResult};

/// Maximum nesting depth accepted at rule creation
const MAX_TREE_DEPTH: usize = 16;

/// A node of a signature rule definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureNode {
    /// Every child must be satisfied
    All { all: Vec<SignatureNode> },
    /// At least one child must be satisfied
    Any { any: Vec<SignatureNode> },
    /// At least `min` distinct signers of `group`
    Group { group: String, min: u32 },
}

impl SignatureNode {
    /// All-of combinator
    pub fn all(children: Vec<SignatureNode>) -> Self {
        SignatureNode::All { all: children }
    }

    /// Any-of combinator
    pub fn any(children: Vec<SignatureNode>) -> Self {
        SignatureNode::Any { any: children }
    }

    /// Group-threshold leaf
    pub fn group(group: impl Into<String>, min: u32) -> Self {
        SignatureNode::Group {
            group: group.into(),
            min,
        }
    }

    /// Validate the tree shape. Called once at rule creation.
    pub fn validate(&self) -> SignatureResult<()> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> SignatureResult<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(SignatureError::Validation(format!(
                "tree exceeds maximum depth of {}",
                MAX_TREE_DEPTH
            )));
        }
        match self {
            SignatureNode::All { all: children } | SignatureNode::Any { any: children } => {
                if children.is_empty() {
                    return Err(SignatureError::Validation(
                        "combinator requires at least one child".to_string(),
                    ));
                }
                for child in children {
                    child.validate_at(depth + 1)?;
                }
                Ok(())
            }
            SignatureNode::Group { group, min } => {
                if group.is_empty() {
                    return Err(SignatureError::Validation("empty group name".to_string()));
                }
                if *min == 0 {
                    return Err(SignatureError::Validation(format!(
                        "group {} requires min >= 1",
                        group
                    )));
                }
                Ok(())
            }
        }
    }
}

/// A signature rule scoped to organization + schema + faculty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRule {
    /// Unique rule ID
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Schema the rule applies to (e.g., "payments")
    pub schema: String,

    /// Faculty within the schema (e.g., "release")
    pub faculty: String,

    /// Validated rule definition tree
    pub definition: SignatureNode,

    /// Selection priority when several rules match (higher wins)
    pub priority: u32,

    /// Whether the rule is selectable
    pub active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl SignatureRule {
    /// Create a new builder
    pub fn builder(org_id: impl Into<String>) -> SignatureRuleBuilder {
        SignatureRuleBuilder::new(org_id)
    }
}

/// Builder for [`SignatureRule`]
pub struct SignatureRuleBuilder {
    org_id: String,
    schema: String,
    faculty: String,
    definition: Option<SignatureNode>,
    priority: u32,
    active: bool,
}

impl SignatureRuleBuilder {
    /// Create a new builder
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            schema: "default".to_string(),
            faculty: "default".to_string(),
            definition: None,
            priority: 100,
            active: true,
        }
    }

    /// Set the schema
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Set the faculty
    pub fn faculty(mut self, faculty: impl Into<String>) -> Self {
        self.faculty = faculty.into();
        self
    }

    /// Set the rule definition tree
    pub fn definition(mut self, node: SignatureNode) -> Self {
        self.definition = Some(node);
        self
    }

    /// Set the priority
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the active flag
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Validate and build the rule
    pub fn build(self) -> SignatureResult<SignatureRule> {
        let definition = self
            .definition
            .ok_or_else(|| SignatureError::Validation("rule requires a definition".to_string()))?;
        definition.validate()?;

        Ok(SignatureRule {
            id: format!("SRULE-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase()),
            org_id: self.org_id,
            schema: self.schema,
            faculty: self.faculty,
            definition,
            priority: self.priority,
            active: self.active,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validates() {
        let rule = SignatureRule::builder("ORG-1")
            .schema("payments")
            .faculty("release")
            .definition(SignatureNode::any(vec![
                SignatureNode::group("directors", 1),
                SignatureNode::group("officers", 2),
            ]))
            .priority(10)
            .build()
            .unwrap();

        assert!(rule.id.starts_with("SRULE-"));
        assert_eq!(rule.schema, "payments");
        assert!(rule.active);
    }

    #[test]
    fn test_zero_min_rejected() {
        let err = SignatureRule::builder("ORG-1")
            .definition(SignatureNode::group("directors", 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, SignatureError::Validation(_)));
    }

    #[test]
    fn test_empty_combinator_rejected() {
        let err = SignatureRule::builder("ORG-1")
            .definition(SignatureNode::all(vec![]))
            .build()
            .unwrap_err();
        assert!(matches!(err, SignatureError::Validation(_)));

        let err = SignatureNode::any(vec![]).validate().unwrap_err();
        assert!(matches!(err, SignatureError::Validation(_)));
    }

    #[test]
    fn test_empty_group_name_rejected() {
        let err = SignatureNode::group("", 1).validate().unwrap_err();
        assert!(matches!(err, SignatureError::Validation(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut node = SignatureNode::group("g", 1);
        for _ in 0..20 {
            node = SignatureNode::all(vec![node]);
        }
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_serialization_round_trip() {
        let node = SignatureNode::all(vec![
            SignatureNode::group("directors", 1),
            SignatureNode::any(vec![
                SignatureNode::group("officers", 2),
                SignatureNode::group("auditors", 1),
            ]),
        ]);

        let json = serde_json::to_string(&node).unwrap();
        let parsed: SignatureNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{"any":[{"group":"A","min":1},{"group":"B","min":2}]}"#;
        let node: SignatureNode = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            SignatureNode::any(vec![
                SignatureNode::group("A", 1),
                SignatureNode::group("B", 2),
            ])
        );
    }
}
