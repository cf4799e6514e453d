//! Navigation tree for a compatible group and its auto-clusters.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    ClusterFlyweight, ClusterKey, NodeClass, NodeId, NodeKind, ResourceGroup, ResourceType,
    ResourceTypeId, SubCategory, SubCategoryId, TreeNode, TypeCatalog,
};
use crate::tree::{escape_html, pluralize};

/// Name the server gives a cluster whose members disagree on a name.
const UNNAMED_CLUSTER: &str = "...";

pub struct ClusterTreeBuilder<'a> {
    catalog: &'a TypeCatalog,
}

struct Pending {
    node: TreeNode,
    children: Vec<Pending>,
}

struct CategoryFolder {
    sub_category_id: SubCategoryId,
    node: TreeNode,
    nested: Vec<CategoryFolder>,
    members: Vec<Pending>,
}

impl<'a> ClusterTreeBuilder<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Emits the group node followed by its cluster hierarchy, parents first.
    pub fn build(&self, group: &ResourceGroup, clusters: &[ClusterFlyweight]) -> Vec<TreeNode> {
        let root_key = ClusterKey::root(group.id);
        let root_id = NodeId(root_key.key());
        let group_type = group
            .type_id
            .and_then(|type_id| self.catalog.resource_type(type_id));

        let root = Pending {
            node: TreeNode {
                id: root_id.clone(),
                parent_id: None,
                kind: NodeKind::Group {
                    group_id: group.id,
                    group_category: group.category,
                    type_id: group.type_id,
                    category: group_type.map(|resource_type| resource_type.category),
                },
                name: escape_html(&group.name),
                description: group.description.as_deref().map(escape_html),
                tooltip: None,
                is_folder: !clusters.is_empty(),
                locked: false,
            },
            children: self.children_of(&root_id, &root_key, clusters),
        };

        let mut out = Vec::new();
        flatten(root, &mut out);
        out
    }

    fn children_of(
        &self,
        parent_id: &NodeId,
        parent_key: &ClusterKey,
        flyweights: &[ClusterFlyweight],
    ) -> Vec<Pending> {
        let mut by_type: Vec<(ResourceTypeId, Vec<&ClusterFlyweight>)> = Vec::new();
        for flyweight in flyweights {
            match by_type.iter_mut().find(|(type_id, _)| *type_id == flyweight.type_id) {
                Some((_, members)) => members.push(flyweight),
                None => by_type.push((flyweight.type_id, vec![flyweight])),
            }
        }

        let mut direct = Vec::new();
        let mut categories: Vec<CategoryFolder> = Vec::new();
        for (type_id, members) in by_type {
            let resource_type = self.catalog.resource_type(type_id);
            if resource_type.is_none() {
                tracing::warn!(%type_id, "cluster references unknown resource type");
            }

            let mut typed: Vec<Pending> = members
                .into_iter()
                .map(|flyweight| self.cluster_node(parent_id, parent_key, resource_type, flyweight))
                .collect();

            if let Some(resource_type) = resource_type.filter(|resource_type| !resource_type.singleton) {
                typed = vec![auto_type_group(parent_id, resource_type, typed)];
            }

            let chain = resource_type
                .and_then(|resource_type| {
                    resource_type
                        .sub_category_id
                        .map(|id| self.sub_category_path(resource_type.id, id))
                })
                .unwrap_or_default();
            if chain.is_empty() {
                direct.extend(typed);
            } else {
                file_under_categories(&mut categories, &chain, parent_id, typed);
            }
        }

        direct.extend(categories.into_iter().map(CategoryFolder::into_pending));
        sort_siblings(&mut direct);
        direct
    }

    fn cluster_node(
        &self,
        parent_id: &NodeId,
        parent_key: &ClusterKey,
        resource_type: Option<&ResourceType>,
        flyweight: &ClusterFlyweight,
    ) -> Pending {
        let type_name = resource_type
            .map(|resource_type| resource_type.name.clone())
            .unwrap_or_else(|| format!("type {}", flyweight.type_id));
        let name = if flyweight.name == UNNAMED_CLUSTER {
            format!("Group of {type_name}")
        } else {
            flyweight.name.clone()
        };

        let key = parent_key.child(flyweight.type_id, &flyweight.resource_key);
        let id = NodeId(key.key());
        let tooltip = (flyweight.members < flyweight.cluster_size)
            .then(|| partial_cluster_tooltip(flyweight.members, flyweight.cluster_size, &name));
        let children = self.children_of(&id, &key, &flyweight.children);

        Pending {
            node: TreeNode {
                id,
                parent_id: Some(parent_id.clone()),
                kind: NodeKind::Cluster {
                    key,
                    type_id: flyweight.type_id,
                    category: resource_type.map(|resource_type| resource_type.category),
                },
                name: escape_html(&name),
                description: None,
                tooltip,
                is_folder: !flyweight.children.is_empty(),
                locked: false,
            },
            children,
        }
    }

    /// Outermost-first sub-category names for a type; truncated at unknown or looping entries.
    fn sub_category_path(&self, type_id: ResourceTypeId, id: SubCategoryId) -> Vec<&'a SubCategory> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(id) = current {
            if !visited.insert(id) {
                tracing::warn!(%type_id, sub_category_id = %id, "sub-category chain loops, truncating");
                break;
            }
            let Some(sub_category) = self.catalog.sub_category(id) else {
                tracing::warn!(%type_id, sub_category_id = %id, "unknown sub-category, truncating chain");
                break;
            };
            chain.push(sub_category);
            current = sub_category.parent_id;
        }
        chain.reverse();
        chain
    }
}

fn auto_type_group(parent_id: &NodeId, resource_type: &ResourceType, members: Vec<Pending>) -> Pending {
    let id = NodeId(format!("{parent_id}:rt{}", resource_type.id));
    let mut children = members;
    for child in &mut children {
        child.node.parent_id = Some(id.clone());
    }
    sort_siblings(&mut children);

    Pending {
        node: TreeNode {
            id,
            parent_id: Some(parent_id.clone()),
            kind: NodeKind::AutoGroup {
                type_id: resource_type.id,
                anchor_id: parent_id.clone(),
                category: Some(resource_type.category),
                backing_group_name: None,
            },
            name: pluralize(&resource_type.name),
            description: resource_type.description.clone(),
            tooltip: None,
            is_folder: true,
            locked: false,
        },
        children,
    }
}

fn file_under_categories(
    folders: &mut Vec<CategoryFolder>,
    chain: &[&SubCategory],
    parent_id: &NodeId,
    mut members: Vec<Pending>,
) {
    let Some((outer, rest)) = chain.split_first() else {
        return;
    };

    let idx = match folders
        .iter()
        .position(|folder| folder.sub_category_id == outer.id)
    {
        Some(idx) => idx,
        None => {
            folders.push(CategoryFolder::new(outer, parent_id));
            folders.len() - 1
        }
    };

    let folder = &mut folders[idx];
    if rest.is_empty() {
        for member in &mut members {
            member.node.parent_id = Some(folder.node.id.clone());
        }
        folder.members.extend(members);
    } else {
        let folder_id = folder.node.id.clone();
        file_under_categories(&mut folder.nested, rest, &folder_id, members);
    }
}

impl CategoryFolder {
    fn new(sub_category: &SubCategory, parent_id: &NodeId) -> Self {
        Self {
            sub_category_id: sub_category.id,
            node: TreeNode {
                id: NodeId(format!("{parent_id}:cat{}", sub_category.name)),
                parent_id: Some(parent_id.clone()),
                kind: NodeKind::Category {
                    sub_category_id: Some(sub_category.id),
                    anchor_id: parent_id.clone(),
                },
                name: sub_category.name.clone(),
                description: None,
                tooltip: None,
                is_folder: true,
                locked: false,
            },
            nested: Vec::new(),
            members: Vec::new(),
        }
    }

    fn into_pending(self) -> Pending {
        let mut children: Vec<Pending> = self
            .nested
            .into_iter()
            .map(CategoryFolder::into_pending)
            .collect();
        children.extend(self.members);
        sort_siblings(&mut children);
        Pending {
            node: self.node,
            children,
        }
    }
}

fn sibling_rank(node: &TreeNode) -> u8 {
    match (node.is_folder, node.kind.class()) {
        (true, NodeClass::Entity) => 1,
        (true, _) => 0,
        (false, _) => 2,
    }
}

fn compare_siblings(a: &Pending, b: &Pending) -> Ordering {
    sibling_rank(&a.node)
        .cmp(&sibling_rank(&b.node))
        .then_with(|| a.node.name.to_lowercase().cmp(&b.node.name.to_lowercase()))
}

fn sort_siblings(siblings: &mut [Pending]) {
    siblings.sort_by(compare_siblings);
}

fn flatten(pending: Pending, out: &mut Vec<TreeNode>) {
    out.push(pending.node);
    for child in pending.children {
        flatten(child, out);
    }
}

fn partial_cluster_tooltip(members: u32, cluster_size: u32, name: &str) -> String {
    let percent = (f64::from(members) / f64::from(cluster_size) * 100.0).round();
    format!(
        "{members} out of {cluster_size} group members have \"{}\" child resources ({percent}%)",
        escape_html(name)
    )
}
