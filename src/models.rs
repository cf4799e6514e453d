use std::collections::HashMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub i32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceTypeId(pub i32);

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceTypeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i32> for ResourceTypeId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubCategoryId(pub i32);

impl fmt::Display for SubCategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SubCategoryId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i32> for GroupId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceCategory {
    Platform,
    Server,
    Service,
}

impl ResourceCategory {
    pub const fn display_name(self) -> &'static str {
        match self {
            ResourceCategory::Platform => "Platform",
            ResourceCategory::Server => "Server",
            ResourceCategory::Service => "Service",
        }
    }

    pub const fn as_db_value(self) -> &'static str {
        match self {
            ResourceCategory::Platform => "PLATFORM",
            ResourceCategory::Server => "SERVER",
            ResourceCategory::Service => "SERVICE",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "PLATFORM" => Some(ResourceCategory::Platform),
            "SERVER" => Some(ResourceCategory::Server),
            "SERVICE" => Some(ResourceCategory::Service),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Availability {
    Up,
    Down,
    Disabled,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupCategory {
    Compatible,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    pub id: SubCategoryId,
    pub name: String,
    pub parent_id: Option<SubCategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub id: ResourceTypeId,
    pub name: String,
    pub plugin: String,
    pub category: ResourceCategory,
    pub description: Option<String>,
    pub singleton: bool,
    pub sub_category_id: Option<SubCategoryId>,
    #[serde(default)]
    pub child_type_ids: Vec<ResourceTypeId>,
}

impl ResourceType {
    pub fn has_child_types(&self) -> bool {
        !self.child_type_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<ResourceId>,
    pub type_id: ResourceTypeId,
    #[serde(default)]
    pub availability: Availability,
    pub ancestry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub category: GroupCategory,
    pub type_id: Option<ResourceTypeId>,
    /// Set for groups backing an auto-group tree node.
    pub auto_group_parent_id: Option<ResourceId>,
    /// Set for groups backing an auto-cluster tree node.
    pub cluster_key: Option<String>,
}

/// Resource-type metadata resolved ahead of tree construction.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: HashMap<ResourceTypeId, ResourceType>,
    sub_categories: HashMap<SubCategoryId, SubCategory>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(
        types: impl IntoIterator<Item = ResourceType>,
        sub_categories: impl IntoIterator<Item = SubCategory>,
    ) -> Self {
        let mut catalog = Self::new();
        for resource_type in types {
            catalog.insert_type(resource_type);
        }
        for sub_category in sub_categories {
            catalog.insert_sub_category(sub_category);
        }
        catalog
    }

    pub fn insert_type(&mut self, resource_type: ResourceType) {
        self.types.insert(resource_type.id, resource_type);
    }

    pub fn insert_sub_category(&mut self, sub_category: SubCategory) {
        self.sub_categories.insert(sub_category.id, sub_category);
    }

    pub fn resource_type(&self, id: ResourceTypeId) -> Option<&ResourceType> {
        self.types.get(&id)
    }

    pub fn sub_category(&self, id: SubCategoryId) -> Option<&SubCategory> {
        self.sub_categories.get(&id)
    }

    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Identifies one cluster of like-keyed resources beneath a compatible group.
///
/// Rendered as `<groupId>:<typeId>:<resourceKey>[:<typeId>:<resourceKey>...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterKey {
    pub group_id: GroupId,
    pub path: Vec<(ResourceTypeId, String)>,
}

impl ClusterKey {
    pub fn root(group_id: GroupId) -> Self {
        Self {
            group_id,
            path: Vec::new(),
        }
    }

    pub fn child(&self, type_id: ResourceTypeId, resource_key: &str) -> Self {
        let mut path = self.path.clone();
        path.push((type_id, resource_key.to_string()));
        Self {
            group_id: self.group_id,
            path,
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn key(&self) -> String {
        let mut key = self.group_id.to_string();
        for (type_id, resource_key) in &self.path {
            key.push(':');
            key.push_str(&type_id.to_string());
            key.push(':');
            key.push_str(resource_key);
        }
        key
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Server-computed summary of one cluster level below a compatible group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFlyweight {
    pub type_id: ResourceTypeId,
    pub resource_key: String,
    pub name: String,
    pub members: u32,
    pub cluster_size: u32,
    #[serde(default)]
    pub children: Vec<ClusterFlyweight>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(id: ResourceId) -> Self {
        Self(id.to_string())
    }

    pub fn sub_category(sub_category_id: SubCategoryId, anchor: ResourceId) -> Self {
        Self(format!("subcat_{sub_category_id}_{anchor}"))
    }

    pub fn auto_group(type_id: ResourceTypeId, anchor: ResourceId) -> Self {
        Self(format!("autogroup_{type_id}_{anchor}"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Coarse node classification used for rendering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    Entity,
    Category,
    AutoGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Resource {
        resource_id: ResourceId,
        type_id: ResourceTypeId,
        category: Option<ResourceCategory>,
        availability: Availability,
    },
    Group {
        group_id: GroupId,
        group_category: GroupCategory,
        type_id: Option<ResourceTypeId>,
        category: Option<ResourceCategory>,
    },
    Cluster {
        key: ClusterKey,
        type_id: ResourceTypeId,
        category: Option<ResourceCategory>,
    },
    Category {
        sub_category_id: Option<SubCategoryId>,
        anchor_id: NodeId,
    },
    AutoGroup {
        type_id: ResourceTypeId,
        anchor_id: NodeId,
        category: Option<ResourceCategory>,
        backing_group_name: Option<String>,
    },
}

impl NodeKind {
    pub const fn class(&self) -> NodeClass {
        match self {
            NodeKind::Resource { .. } | NodeKind::Group { .. } | NodeKind::Cluster { .. } => {
                NodeClass::Entity
            }
            NodeKind::Category { .. } => NodeClass::Category,
            NodeKind::AutoGroup { .. } => NodeClass::AutoGroup,
        }
    }

    pub const fn is_synthetic(&self) -> bool {
        !matches!(self.class(), NodeClass::Entity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    pub is_folder: bool,
    pub locked: bool,
}
