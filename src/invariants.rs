use std::collections::HashSet;

use anyhow::anyhow;
use serde::Serialize;

use crate::error::{LibError, Result};
use crate::models::{NodeId, TreeNode};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeOrderViolation {
    DuplicateNodeId { node_id: NodeId },
    SelfParent { node_id: NodeId },
    ParentAfterChild { node_id: NodeId, parent_id: NodeId },
    UnknownParent { node_id: NodeId, parent_id: NodeId },
}

impl TreeOrderViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            TreeOrderViolation::DuplicateNodeId { .. } => "tree_duplicate_node",
            TreeOrderViolation::SelfParent { .. } => "tree_self_parent",
            TreeOrderViolation::ParentAfterChild { .. } => "tree_parent_after_child",
            TreeOrderViolation::UnknownParent { .. } => "tree_unknown_parent",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            TreeOrderViolation::DuplicateNodeId { .. } => "Tree node ids must be unique",
            TreeOrderViolation::SelfParent { .. } => "Tree nodes cannot be their own parent",
            TreeOrderViolation::ParentAfterChild { .. } => {
                "Tree nodes must follow the node they name as parent"
            }
            TreeOrderViolation::UnknownParent { .. } => "Tree node references an unknown parent",
        }
    }
}

/// Checks that a node sequence can be fed to a lazy tree widget in order.
///
/// `rendered` holds ids already present in the widget; children may reference
/// those without the parent appearing in `nodes`.
pub fn tree_order_violations(
    nodes: &[TreeNode],
    rendered: &HashSet<NodeId>,
) -> Vec<TreeOrderViolation> {
    let all_ids: HashSet<&NodeId> = nodes.iter().map(|node| &node.id).collect();
    let mut seen: HashSet<&NodeId> = HashSet::with_capacity(nodes.len());
    let mut violations = Vec::new();

    for node in nodes {
        if let Some(parent_id) = &node.parent_id {
            if parent_id == &node.id {
                violations.push(TreeOrderViolation::SelfParent {
                    node_id: node.id.clone(),
                });
            } else if !seen.contains(parent_id) && !rendered.contains(parent_id) {
                if all_ids.contains(parent_id) {
                    violations.push(TreeOrderViolation::ParentAfterChild {
                        node_id: node.id.clone(),
                        parent_id: parent_id.clone(),
                    });
                } else {
                    violations.push(TreeOrderViolation::UnknownParent {
                        node_id: node.id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
            }
        }

        if !seen.insert(&node.id) {
            violations.push(TreeOrderViolation::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    violations
}

pub fn ensure_tree_order(nodes: &[TreeNode], rendered: &HashSet<NodeId>) -> Result<()> {
    let violations = tree_order_violations(nodes, rendered);
    if let Some(first) = violations.first() {
        return Err(LibError::invalid_with_code(
            first.error_code(),
            first.public_message(),
            anyhow!("tree order validation failed: {:?}", violations),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeKind, SubCategoryId};

    fn node(id: &str, parent: Option<&str>) -> TreeNode {
        TreeNode {
            id: NodeId::from(id),
            parent_id: parent.map(NodeId::from),
            kind: NodeKind::Category {
                sub_category_id: Some(SubCategoryId(1)),
                anchor_id: NodeId::from("0"),
            },
            name: id.to_string(),
            description: None,
            tooltip: None,
            is_folder: true,
            locked: false,
        }
    }

    #[test]
    fn ordered_sequence_passes() {
        let nodes = [node("1", None), node("2", Some("1")), node("3", Some("2"))];
        assert!(tree_order_violations(&nodes, &HashSet::new()).is_empty());
        assert!(ensure_tree_order(&nodes, &HashSet::new()).is_ok());
    }

    #[test]
    fn parent_after_child_is_reported() {
        let nodes = [node("2", Some("1")), node("1", None)];
        let violations = tree_order_violations(&nodes, &HashSet::new());
        assert_eq!(
            violations,
            vec![TreeOrderViolation::ParentAfterChild {
                node_id: NodeId::from("2"),
                parent_id: NodeId::from("1"),
            }]
        );
    }

    #[test]
    fn rendered_parents_satisfy_children() {
        let nodes = [node("2", Some("1"))];
        let rendered = HashSet::from([NodeId::from("1")]);
        assert!(tree_order_violations(&nodes, &rendered).is_empty());

        let err = ensure_tree_order(&nodes, &HashSet::new()).expect_err("parent is unknown");
        assert_eq!(err.code, "tree_unknown_parent");
    }

    #[test]
    fn duplicates_and_self_parents_are_reported() {
        let nodes = [node("1", None), node("1", None), node("4", Some("4"))];
        let violations = tree_order_violations(&nodes, &HashSet::new());
        assert!(violations.contains(&TreeOrderViolation::DuplicateNodeId {
            node_id: NodeId::from("1")
        }));
        assert!(violations.contains(&TreeOrderViolation::SelfParent {
            node_id: NodeId::from("4")
        }));
    }
}
