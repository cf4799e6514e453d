//! Resource tree synthesis.
//!
//! Turns a flat batch of resources into the node sequence consumed by a lazy
//! tree widget: every node is emitted after the node it names as parent, and
//! synthetic sub-category and auto-group folders are introduced on the way.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::algorithms::parent_first_order;
use crate::models::{
    NodeId, NodeKind, Resource, ResourceId, ResourceType, ResourceTypeId, SubCategory,
    SubCategoryId, TreeNode, TypeCatalog,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildDiagnostic {
    DuplicateEntity {
        resource_id: ResourceId,
    },
    ParentCycle {
        resource_id: ResourceId,
    },
    OrphanReanchored {
        resource_id: ResourceId,
        missing_parent_id: ResourceId,
    },
    UnknownResourceType {
        resource_id: ResourceId,
        type_id: ResourceTypeId,
    },
    UnknownSubCategory {
        type_id: ResourceTypeId,
        sub_category_id: SubCategoryId,
    },
    SubCategoryCycle {
        type_id: ResourceTypeId,
        sub_category_id: SubCategoryId,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeBuild {
    pub nodes: Vec<TreeNode>,
    pub diagnostics: Vec<BuildDiagnostic>,
}

impl TreeBuild {
    pub fn node(&self, id: &NodeId) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| &node.id == id)
    }
}

pub struct TreeBuilder<'a> {
    catalog: &'a TypeCatalog,
    locked: HashSet<ResourceId>,
    rendered: HashSet<NodeId>,
    anchors: HashMap<ResourceId, String>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self {
            catalog,
            locked: HashSet::new(),
            rendered: HashSet::new(),
            anchors: HashMap::new(),
        }
    }

    /// Resources the viewer may see but not act on.
    pub fn with_locked(mut self, locked: impl IntoIterator<Item = ResourceId>) -> Self {
        self.locked.extend(locked);
        self
    }

    /// Node ids already present in the widget, e.g. the parent being expanded.
    pub fn with_rendered(mut self, rendered: impl IntoIterator<Item = NodeId>) -> Self {
        self.rendered.extend(rendered);
        self
    }

    /// A rendered resource whose children are in the batch. Its name feeds
    /// the backing group name of auto-groups created beneath it.
    pub fn with_anchor(mut self, anchor: &Resource) -> Self {
        self.rendered.insert(NodeId::resource(anchor.id));
        self.anchors.insert(anchor.id, anchor.name.clone());
        self
    }

    pub fn build(&self, resources: &[Resource]) -> TreeBuild {
        let mut pass = BuildPass {
            catalog: self.catalog,
            rendered: &self.rendered,
            anchors: &self.anchors,
            nodes: Vec::with_capacity(resources.len()),
            emitted: HashSet::with_capacity(resources.len() * 2),
            diagnostics: Vec::new(),
            auto_groups: Vec::new(),
        };

        let mut unique = Vec::with_capacity(resources.len());
        let mut seen = HashSet::with_capacity(resources.len());
        for resource in resources {
            if !seen.insert(resource.id) {
                tracing::debug!(resource_id = %resource.id, "duplicate resource tree node, skipping");
                pass.diagnostics.push(BuildDiagnostic::DuplicateEntity {
                    resource_id: resource.id,
                });
                continue;
            }
            unique.push(resource);
        }

        let links: Vec<(ResourceId, Option<ResourceId>)> = unique
            .iter()
            .map(|resource| (resource.id, resource.parent_id))
            .collect();
        let order = parent_first_order(&links);
        for idx in &order.cyclic {
            let resource_id = unique[*idx].id;
            tracing::warn!(%resource_id, "resource sits on a parent cycle, skipping");
            pass.diagnostics.push(BuildDiagnostic::ParentCycle { resource_id });
        }

        let by_id: HashMap<ResourceId, &Resource> = unique
            .iter()
            .map(|resource| (resource.id, *resource))
            .collect();

        for idx in order.ordered {
            let resource = unique[idx];
            let parent = resource
                .parent_id
                .and_then(|parent_id| by_id.get(&parent_id).copied());
            let logical_parent = pass.logical_parent(resource, parent);
            let resource_type = self.catalog.resource_type(resource.type_id);

            pass.push(TreeNode {
                id: NodeId::resource(resource.id),
                parent_id: logical_parent,
                kind: NodeKind::Resource {
                    resource_id: resource.id,
                    type_id: resource.type_id,
                    category: resource_type.map(|resource_type| resource_type.category),
                    availability: resource.availability,
                },
                name: escape_html(&resource.name),
                description: resource.description.as_deref().map(escape_html),
                tooltip: None,
                is_folder: resource_type.is_some_and(ResourceType::has_child_types),
                locked: self.locked.contains(&resource.id),
            });
        }

        pass.disambiguate_auto_groups();

        TreeBuild {
            nodes: pass.nodes,
            diagnostics: pass.diagnostics,
        }
    }
}

struct BuildPass<'b> {
    catalog: &'b TypeCatalog,
    rendered: &'b HashSet<NodeId>,
    anchors: &'b HashMap<ResourceId, String>,
    nodes: Vec<TreeNode>,
    emitted: HashSet<NodeId>,
    diagnostics: Vec<BuildDiagnostic>,
    /// Output index and member type of every auto-group created in this pass.
    auto_groups: Vec<(usize, ResourceTypeId)>,
}

impl<'b> BuildPass<'b> {
    fn push(&mut self, node: TreeNode) {
        self.emitted.insert(node.id.clone());
        self.nodes.push(node);
    }

    fn present(&self, id: &NodeId) -> bool {
        self.emitted.contains(id) || self.rendered.contains(id)
    }

    fn diagnose(&mut self, diagnostic: BuildDiagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    /// Resolves the node a resource hangs under, creating synthetic ancestors as needed.
    ///
    /// `parent` is the parent resource when it is part of this batch; otherwise
    /// its name comes from the builder's anchors.
    fn logical_parent(&mut self, resource: &Resource, parent: Option<&Resource>) -> Option<NodeId> {
        let parent_id = resource.parent_id?;
        let parent_node_id = NodeId::resource(parent_id);
        if !self.present(&parent_node_id) {
            tracing::warn!(
                resource_id = %resource.id,
                missing_parent_id = %parent_id,
                "parent resource not in tree, rendering as root"
            );
            self.diagnose(BuildDiagnostic::OrphanReanchored {
                resource_id: resource.id,
                missing_parent_id: parent_id,
            });
            return None;
        }

        let catalog = self.catalog;
        let Some(resource_type) = catalog.resource_type(resource.type_id) else {
            self.diagnose(BuildDiagnostic::UnknownResourceType {
                resource_id: resource.id,
                type_id: resource.type_id,
            });
            return Some(parent_node_id);
        };

        if !resource_type.singleton {
            let auto_group_id = NodeId::auto_group(resource_type.id, parent_id);
            if !self.present(&auto_group_id) {
                let backing_group_name = parent
                    .filter(|parent| parent.id == parent_id)
                    .map(|parent| parent.name.as_str())
                    .or_else(|| self.anchors.get(&parent_id).map(String::as_str))
                    .map(|parent_name| format!("{parent_name} ( {} )", resource_type.name));
                self.auto_groups.push((self.nodes.len(), resource_type.id));
                self.push(TreeNode {
                    id: auto_group_id.clone(),
                    parent_id: Some(parent_node_id.clone()),
                    kind: NodeKind::AutoGroup {
                        type_id: resource_type.id,
                        anchor_id: parent_node_id,
                        category: Some(resource_type.category),
                        backing_group_name,
                    },
                    name: pluralize(&resource_type.name),
                    description: resource_type.description.clone(),
                    tooltip: None,
                    is_folder: true,
                    locked: false,
                });
            }
            return Some(auto_group_id);
        }

        if let Some(sub_category_id) = resource_type.sub_category_id {
            let chain = self.sub_category_chain(resource_type.id, sub_category_id);
            if !chain.is_empty() {
                return Some(self.ensure_category_nodes(&chain, parent_id));
            }
        }

        Some(parent_node_id)
    }

    /// Sub-categories from the type's own entry up to the outermost ancestor.
    fn sub_category_chain(
        &mut self,
        type_id: ResourceTypeId,
        sub_category_id: SubCategoryId,
    ) -> Vec<&'b SubCategory> {
        let catalog = self.catalog;
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(sub_category_id);
        while let Some(id) = current {
            if !visited.insert(id) {
                tracing::warn!(%type_id, sub_category_id = %id, "sub-category chain loops, truncating");
                self.diagnose(BuildDiagnostic::SubCategoryCycle {
                    type_id,
                    sub_category_id: id,
                });
                break;
            }
            match catalog.sub_category(id) {
                Some(sub_category) => {
                    chain.push(sub_category);
                    current = sub_category.parent_id;
                }
                None => {
                    tracing::warn!(%type_id, sub_category_id = %id, "unknown sub-category, truncating chain");
                    self.diagnose(BuildDiagnostic::UnknownSubCategory {
                        type_id,
                        sub_category_id: id,
                    });
                    break;
                }
            }
        }
        chain
    }

    /// Emits missing category folders outermost-first and returns the innermost one.
    fn ensure_category_nodes(&mut self, chain: &[&SubCategory], anchor: ResourceId) -> NodeId {
        let anchor_id = NodeId::resource(anchor);
        let mut parent_id = anchor_id.clone();
        for sub_category in chain.iter().rev() {
            let id = NodeId::sub_category(sub_category.id, anchor);
            if !self.present(&id) {
                self.push(TreeNode {
                    id: id.clone(),
                    parent_id: Some(parent_id),
                    kind: NodeKind::Category {
                        sub_category_id: Some(sub_category.id),
                        anchor_id: anchor_id.clone(),
                    },
                    name: sub_category.name.clone(),
                    description: Some(sub_category.name.clone()),
                    tooltip: None,
                    is_folder: true,
                    locked: false,
                });
            }
            parent_id = id;
        }
        parent_id
    }

    /// Auto-groups sharing a display name under one parent get the plugin appended.
    fn disambiguate_auto_groups(&mut self) {
        let mut by_name: HashMap<(Option<NodeId>, String), Vec<usize>> = HashMap::new();
        for (idx, _) in &self.auto_groups {
            let node = &self.nodes[*idx];
            by_name
                .entry((node.parent_id.clone(), node.name.clone()))
                .or_default()
                .push(*idx);
        }

        for indexes in by_name.into_values().filter(|indexes| indexes.len() > 1) {
            for idx in indexes {
                let Some((_, type_id)) = self.auto_groups.iter().find(|(i, _)| *i == idx) else {
                    continue;
                };
                if let Some(resource_type) = self.catalog.resource_type(*type_id) {
                    self.nodes[idx].name = format!(
                        "{} ({} plugin)",
                        pluralize(&resource_type.name),
                        resource_type.plugin
                    );
                }
            }
        }
    }
}

/// English plural for resource type names ("Datasource" -> "Datasources").
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &name[..name.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{name}es")
    } else {
        format!("{name}s")
    }
}

/// Escapes user-editable names before they reach the widget.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
