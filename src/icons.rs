use crate::models::{Availability, GroupCategory, NodeKind, ResourceCategory};

pub const CATEGORY_FOLDER_ICON: &str = "[SKIN]/folder_closed.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconSize {
    #[default]
    Small,
    Large,
}

impl IconSize {
    const fn pixels(self) -> &'static str {
        match self {
            IconSize::Small => "16",
            IconSize::Large => "24",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IconState {
    /// Overrides the availability recorded on the node, e.g. after a live poll.
    pub availability: Option<Availability>,
    pub size: IconSize,
}

/// Image path, relative to the console image root, for a tree node.
pub fn icon_for(kind: &NodeKind, state: IconState) -> String {
    let size = state.size.pixels();
    match kind {
        NodeKind::Resource {
            category,
            availability,
            ..
        } => {
            let category = category.unwrap_or(ResourceCategory::Service);
            let availability = state.availability.unwrap_or(*availability);
            resource_icon(category, availability, size)
        }
        NodeKind::Group { group_category, .. } => {
            let prefix = match group_category {
                GroupCategory::Compatible => "Cluster",
                GroupCategory::Mixed => "Group",
            };
            let avail = match state.availability.unwrap_or(Availability::Up) {
                Availability::Up | Availability::Unknown => "up",
                Availability::Down => "down",
                Availability::Disabled => "disabled",
            };
            format!("types/{prefix}_{avail}_{size}.png")
        }
        NodeKind::Cluster { category, .. } | NodeKind::AutoGroup { category, .. } => {
            clustered_icon(category.unwrap_or(ResourceCategory::Service))
        }
        NodeKind::Category { .. } => CATEGORY_FOLDER_ICON.to_string(),
    }
}

fn resource_icon(category: ResourceCategory, availability: Availability, size: &str) -> String {
    let avail = match (category, availability) {
        (ResourceCategory::Platform, Availability::Up) => "up",
        (ResourceCategory::Platform, _) => "down",
        (_, Availability::Up) => "up",
        (_, Availability::Down) => "down",
        (_, Availability::Disabled) => "disabled",
        (_, Availability::Unknown) => "unknown",
    };
    format!("types/{}_{avail}_{size}.png", category.display_name())
}

fn clustered_icon(category: ResourceCategory) -> String {
    format!("resources/{}_Group_16.png", category.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusterKey, GroupId, NodeId, ResourceId, ResourceTypeId, SubCategoryId};

    fn resource(category: ResourceCategory, availability: Availability) -> NodeKind {
        NodeKind::Resource {
            resource_id: ResourceId(1),
            type_id: ResourceTypeId(1),
            category: Some(category),
            availability,
        }
    }

    #[test]
    fn resources_follow_category_and_availability() {
        let state = IconState::default();
        assert_eq!(
            icon_for(&resource(ResourceCategory::Server, Availability::Disabled), state),
            "types/Server_disabled_16.png"
        );
        assert_eq!(
            icon_for(&resource(ResourceCategory::Platform, Availability::Unknown), state),
            "types/Platform_down_16.png"
        );

        let large_up = IconState {
            availability: Some(Availability::Up),
            size: IconSize::Large,
        };
        assert_eq!(
            icon_for(&resource(ResourceCategory::Service, Availability::Down), large_up),
            "types/Service_up_24.png"
        );
    }

    #[test]
    fn groups_and_clusters() {
        let group = NodeKind::Group {
            group_id: GroupId(1),
            group_category: GroupCategory::Compatible,
            type_id: None,
            category: None,
        };
        assert_eq!(icon_for(&group, IconState::default()), "types/Cluster_up_16.png");

        let cluster = NodeKind::Cluster {
            key: ClusterKey::root(GroupId(1)).child(ResourceTypeId(2), "k"),
            type_id: ResourceTypeId(2),
            category: Some(ResourceCategory::Server),
        };
        assert_eq!(
            icon_for(&cluster, IconState::default()),
            "resources/Server_Group_16.png"
        );
    }

    #[test]
    fn synthetic_folders() {
        let category = NodeKind::Category {
            sub_category_id: Some(SubCategoryId(1)),
            anchor_id: NodeId::from("1"),
        };
        assert_eq!(icon_for(&category, IconState::default()), CATEGORY_FOLDER_ICON);

        let auto_group = NodeKind::AutoGroup {
            type_id: ResourceTypeId(3),
            anchor_id: NodeId::from("1"),
            category: None,
            backing_group_name: None,
        };
        assert_eq!(
            icon_for(&auto_group, IconState::default()),
            "resources/Service_Group_16.png"
        );
    }
}
