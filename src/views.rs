//! Top-level routing of history tokens and detail-view tab bookkeeping.

use std::collections::HashSet;
use std::fmt;

use anyhow::anyhow;
use serde::Serialize;

use crate::error::{LibError, Result};
use crate::models::{GroupId, ResourceId};
use crate::navigation::ViewPath;
use crate::permissions::{Permission, ensure_any_permission};

pub const DEFAULT_VIEW: &str = "Dashboards";
pub const INVENTORY_VIEW: &str = "Inventory";

const AUTO_GROUP_SEGMENT: &str = "AutoGroup";
const AUTO_CLUSTER_SEGMENT: &str = "AutoCluster";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdminPage {
    Users,
    Roles,
    Servers,
    Agents,
    StorageNodes,
    AffinityGroups,
    SystemSettings,
    Templates,
    AgentPlugins,
    ServerPlugins,
}

pub const ALL_ADMIN_PAGES: &[AdminPage] = &[
    AdminPage::Users,
    AdminPage::Roles,
    AdminPage::Servers,
    AdminPage::Agents,
    AdminPage::StorageNodes,
    AdminPage::AffinityGroups,
    AdminPage::SystemSettings,
    AdminPage::Templates,
    AdminPage::AgentPlugins,
    AdminPage::ServerPlugins,
];

impl AdminPage {
    pub const fn section(self) -> &'static str {
        match self {
            AdminPage::Users | AdminPage::Roles => "Security",
            AdminPage::Servers
            | AdminPage::Agents
            | AdminPage::StorageNodes
            | AdminPage::AffinityGroups => "Topology",
            AdminPage::SystemSettings
            | AdminPage::Templates
            | AdminPage::AgentPlugins
            | AdminPage::ServerPlugins => "Configuration",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AdminPage::Users => "Users",
            AdminPage::Roles => "Roles",
            AdminPage::Servers => "Servers",
            AdminPage::Agents => "Agents",
            AdminPage::StorageNodes => "StorageNodes",
            AdminPage::AffinityGroups => "AffinityGroups",
            AdminPage::SystemSettings => "SystemSettings",
            AdminPage::Templates => "Templates",
            AdminPage::AgentPlugins => "AgentPlugins",
            AdminPage::ServerPlugins => "ServerPlugins",
        }
    }

    /// Any one of these grants access.
    pub const fn required_permissions(self) -> &'static [Permission] {
        match self {
            AdminPage::Users => &[Permission::ManageSecurity, Permission::ViewUsers],
            AdminPage::Roles => &[Permission::ManageSecurity],
            _ => &[Permission::ManageSettings],
        }
    }

    pub fn from_segments(section: &str, page: &str) -> Option<Self> {
        ALL_ADMIN_PAGES
            .iter()
            .copied()
            .find(|candidate| candidate.section() == section && candidate.name() == page)
    }

    pub fn path(self) -> String {
        format!("Administration/{}/{}", self.section(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "detail")]
pub enum Route {
    /// Empty token; the console redirects to [`DEFAULT_VIEW`].
    Default,
    Dashboards,
    Inventory,
    Reports,
    Administration(Option<AdminPage>),
    Resource,
    ResourceGroup,
    Unknown(String),
}

impl Route {
    /// Consumes the top-level segment (and the admin section/page) from `path`.
    pub fn parse(path: &mut ViewPath) -> Route {
        let Some(top) = path.current().map(|id| id.as_str().to_string()) else {
            return Route::Default;
        };
        path.advance();

        match top.as_str() {
            "Dashboards" => Route::Dashboards,
            "Inventory" => Route::Inventory,
            "Reports" => Route::Reports,
            "Resource" => Route::Resource,
            "ResourceGroup" => Route::ResourceGroup,
            "Administration" => {
                let Some(section) = path.current().map(|id| id.as_str().to_string()) else {
                    return Route::Administration(None);
                };
                let Some(page) = path.advance().map(|id| id.as_str().to_string()) else {
                    return Route::Unknown(format!("Administration/{section}"));
                };
                path.advance();
                match AdminPage::from_segments(&section, &page) {
                    Some(page) => Route::Administration(Some(page)),
                    None => Route::Unknown(format!("Administration/{section}/{page}")),
                }
            }
            _ => Route::Unknown(top),
        }
    }

    pub fn detail_family(&self) -> Option<DetailFamily> {
        match self {
            Route::Resource => Some(DetailFamily::Resource),
            Route::ResourceGroup => Some(DetailFamily::ResourceGroup),
            _ => None,
        }
    }

    pub fn authorize(&self, granted: &HashSet<Permission>) -> Result<()> {
        match self {
            Route::Administration(Some(page)) => {
                ensure_any_permission(granted, page.required_permissions())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetailFamily {
    Resource,
    ResourceGroup,
}

/// The entity a detail view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DetailEntity {
    Resource(ResourceId),
    Group(GroupId),
    /// Hidden group backing an auto-group node (`Resource/AutoGroup/<id>`).
    AutoGroup(GroupId),
    /// Hidden group backing an auto-cluster node (`ResourceGroup/AutoCluster/<id>`).
    AutoCluster(GroupId),
}

impl DetailEntity {
    pub const fn raw_id(self) -> i32 {
        match self {
            DetailEntity::Resource(id) => id.0,
            DetailEntity::Group(id) | DetailEntity::AutoGroup(id) | DetailEntity::AutoCluster(id) => {
                id.0
            }
        }
    }

    pub const fn base_path(self) -> &'static str {
        match self {
            DetailEntity::Resource(_) => "Resource",
            DetailEntity::Group(_) => "ResourceGroup",
            DetailEntity::AutoGroup(_) => "Resource/AutoGroup",
            DetailEntity::AutoCluster(_) => "ResourceGroup/AutoCluster",
        }
    }

    /// Hidden backing groups are kept out of the recently-viewed list.
    pub const fn records_recent_view(self) -> bool {
        matches!(self, DetailEntity::Resource(_) | DetailEntity::Group(_))
    }
}

impl fmt::Display for DetailEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_path(), self.raw_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailTarget {
    pub entity: DetailEntity,
    pub tab: Option<String>,
    pub subtab: Option<String>,
}

impl DetailTarget {
    pub fn view_path(&self) -> String {
        let mut path = self.entity.to_string();
        for segment in [&self.tab, &self.subtab].into_iter().flatten() {
            path.push('/');
            path.push_str(segment);
        }
        path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum DetailAction {
    /// Fetch the entity and rebuild tab content.
    Reload(DetailTarget),
    /// The entity is already loaded; only switch tabs.
    SelectTab(DetailTarget),
}

impl DetailAction {
    pub fn target(&self) -> &DetailTarget {
        match self {
            DetailAction::Reload(target) | DetailAction::SelectTab(target) => target,
        }
    }
}

/// Tracks which entity a detail view has loaded.
#[derive(Debug, Clone)]
pub struct DetailNavigator {
    family: DetailFamily,
    loaded: Option<DetailEntity>,
}

impl DetailNavigator {
    pub fn new(family: DetailFamily) -> Self {
        Self {
            family,
            loaded: None,
        }
    }

    pub fn family(&self) -> DetailFamily {
        self.family
    }

    pub fn loaded(&self) -> Option<DetailEntity> {
        self.loaded
    }

    pub fn mark_loaded(&mut self, entity: DetailEntity) {
        self.loaded = Some(entity);
    }

    pub fn clear(&mut self) {
        self.loaded = None;
    }

    /// Reads `[AutoGroup|AutoCluster/]<id>[/<tab>[/<subtab>]]` from the cursor.
    ///
    /// Returns `Ok(None)` when the path ends before an id (the family's landing view).
    pub fn parse_target(&self, path: &mut ViewPath) -> Result<Option<DetailTarget>> {
        let Some(first) = path.current().cloned() else {
            return Ok(None);
        };

        let prefix = match (self.family, first.as_str()) {
            (DetailFamily::Resource, AUTO_GROUP_SEGMENT) => Some(AUTO_GROUP_SEGMENT),
            (DetailFamily::ResourceGroup, AUTO_CLUSTER_SEGMENT) => Some(AUTO_CLUSTER_SEGMENT),
            _ => None,
        };
        let id_segment = match prefix {
            Some(_) => path.advance().cloned(),
            None => Some(first),
        };
        let Some(id_segment) = id_segment else {
            return Ok(None);
        };

        let raw_id: i32 = id_segment.parse().ok_or_else(|| {
            LibError::invalid(
                "Invalid entity id in view path",
                anyhow!("expected numeric id, got {id_segment}"),
            )
        })?;

        let entity = match (self.family, prefix) {
            (DetailFamily::Resource, None) => DetailEntity::Resource(ResourceId(raw_id)),
            (DetailFamily::Resource, Some(_)) => DetailEntity::AutoGroup(GroupId(raw_id)),
            (DetailFamily::ResourceGroup, None) => DetailEntity::Group(GroupId(raw_id)),
            (DetailFamily::ResourceGroup, Some(_)) => DetailEntity::AutoCluster(GroupId(raw_id)),
        };

        let tab = path.advance().map(|id| id.as_str().to_string());
        let subtab = tab
            .as_ref()
            .and_then(|_| path.advance().map(|id| id.as_str().to_string()));
        if subtab.is_some() {
            path.advance();
        }

        Ok(Some(DetailTarget {
            entity,
            tab,
            subtab,
        }))
    }

    /// Same entity and no refresh only switches tabs; anything else reloads.
    pub fn plan(&self, target: DetailTarget, refresh: bool) -> DetailAction {
        if !refresh && self.loaded == Some(target.entity) {
            DetailAction::SelectTab(target)
        } else {
            DetailAction::Reload(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn navigate(token: &str, navigator: &DetailNavigator) -> Option<DetailTarget> {
        let mut path = ViewPath::parse(token);
        Route::parse(&mut path);
        navigator.parse_target(&mut path).expect("valid path")
    }

    #[test]
    fn top_level_routes() {
        assert_eq!(Route::parse(&mut ViewPath::parse("")), Route::Default);
        assert_eq!(Route::parse(&mut ViewPath::parse("Inventory/Resources")), Route::Inventory);
        assert_eq!(Route::parse(&mut ViewPath::parse("Resource/1")), Route::Resource);
        assert_eq!(
            Route::parse(&mut ViewPath::parse("Bogus/1")),
            Route::Unknown("Bogus".to_string())
        );
    }

    #[test]
    fn admin_pages_route_and_require_permissions() {
        let route = Route::parse(&mut ViewPath::parse("Administration/Configuration/SystemSettings"));
        assert_eq!(route, Route::Administration(Some(AdminPage::SystemSettings)));

        let err = route.authorize(&HashSet::new()).expect_err("needs MANAGE_SETTINGS");
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert!(route.authorize(&HashSet::from([Permission::ManageSettings])).is_ok());

        let users = Route::parse(&mut ViewPath::parse("Administration/Security/Users"));
        assert!(users.authorize(&HashSet::from([Permission::ViewUsers])).is_ok());

        assert_eq!(
            Route::parse(&mut ViewPath::parse("Administration")),
            Route::Administration(None)
        );
        assert_eq!(
            Route::parse(&mut ViewPath::parse("Administration/Security/Bogus")),
            Route::Unknown("Administration/Security/Bogus".to_string())
        );
        for page in ALL_ADMIN_PAGES {
            let mut path = ViewPath::parse(&page.path());
            assert_eq!(Route::parse(&mut path), Route::Administration(Some(*page)));
        }
    }

    #[test]
    fn detail_targets_parse_prefix_id_and_tabs() {
        let resources = DetailNavigator::new(DetailFamily::Resource);
        let target = navigate("Resource/10001/Monitoring/Graphs", &resources).expect("target");
        assert_eq!(target.entity, DetailEntity::Resource(ResourceId(10001)));
        assert_eq!(target.tab.as_deref(), Some("Monitoring"));
        assert_eq!(target.subtab.as_deref(), Some("Graphs"));
        assert_eq!(target.view_path(), "Resource/10001/Monitoring/Graphs");

        let auto_group = navigate("Resource/AutoGroup/20/Inventory", &resources).expect("target");
        assert_eq!(auto_group.entity, DetailEntity::AutoGroup(GroupId(20)));
        assert_eq!(auto_group.subtab, None);
        assert!(!auto_group.entity.records_recent_view());

        let groups = DetailNavigator::new(DetailFamily::ResourceGroup);
        let cluster = navigate("ResourceGroup/AutoCluster/30", &groups).expect("target");
        assert_eq!(cluster.entity, DetailEntity::AutoCluster(GroupId(30)));
        assert_eq!(cluster.tab, None);

        assert_eq!(navigate("Resource", &resources), None);
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let navigator = DetailNavigator::new(DetailFamily::Resource);
        let mut path = ViewPath::parse("Resource/Monitoring");
        Route::parse(&mut path);
        let err = navigator.parse_target(&mut path).expect_err("bad id");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn plan_reloads_on_new_id_or_refresh() {
        let mut navigator = DetailNavigator::new(DetailFamily::Resource);
        let target = DetailTarget {
            entity: DetailEntity::Resource(ResourceId(5)),
            tab: Some("Summary".to_string()),
            subtab: None,
        };

        assert!(matches!(navigator.plan(target.clone(), false), DetailAction::Reload(_)));
        navigator.mark_loaded(target.entity);
        assert!(matches!(navigator.plan(target.clone(), false), DetailAction::SelectTab(_)));
        assert!(matches!(navigator.plan(target.clone(), true), DetailAction::Reload(_)));

        let other = DetailTarget {
            entity: DetailEntity::Resource(ResourceId(6)),
            ..target
        };
        assert!(matches!(navigator.plan(other, false), DetailAction::Reload(_)));
    }
}
