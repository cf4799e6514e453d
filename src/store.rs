//! In-memory inventory backing the console when no database is configured.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::cluster::ClusterTreeBuilder;
use crate::controller::{EntityLoader, GroupVisibility, PreferencesStore};
use crate::error::{LibError, Result};
use crate::invariants::ensure_tree_order;
use crate::models::{
    Availability, ClusterFlyweight, GroupCategory, GroupId, NodeId, Resource, ResourceCategory,
    ResourceGroup, ResourceId, ResourceType, ResourceTypeId, SubCategory, SubCategoryId, TreeNode,
    TypeCatalog,
};
use crate::reports::alerts::{AlertCondition, AlertPriority, AvailabilityChange};
use crate::reports::definitions::{
    AlertDefinitionContext, AlertDefinitionParent, AlertDefinitionRow, AlertRow,
    ConfigurationUpdateRow, ConfigurationUpdateStatus, DriftCategory, DriftComplianceRow, DriftRow,
    InventoryDetailRow, OperationRequestStatus, OperationRow, ResourceRef, SuspectMetricRow,
    TypeCountRow,
};
use crate::reports::{
    AlertDefinitionCriteria, ConfigurationHistoryCriteria, CriteriaExecutor, DriftComplianceCriteria,
    InventoryDetailsCriteria, InventorySummaryCriteria, PageControl, PageList, RecentAlertCriteria,
    RecentDriftCriteria, RecentOperationCriteria, SuspectMetricCriteria,
};
use crate::tree::{TreeBuild, TreeBuilder};

/// Entries kept per recently-viewed list.
pub const MAX_RECENTLY_VIEWED: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct InventoryData {
    pub catalog: TypeCatalog,
    pub resources: Vec<Resource>,
    /// Includes the hidden groups backing auto-groups and auto-clusters.
    pub groups: Vec<ResourceGroup>,
    pub clusters: HashMap<GroupId, Vec<ClusterFlyweight>>,
    pub locked: HashSet<ResourceId>,
    pub versions: HashMap<ResourceId, String>,
    /// Resources with drift definitions, and whether they are in compliance.
    pub drift_compliance: HashMap<ResourceId, bool>,
    pub alert_definitions: Vec<AlertDefinitionRow>,
    pub configuration_updates: Vec<ConfigurationUpdateRow>,
    pub suspect_metrics: Vec<SuspectMetricRow>,
    pub alerts: Vec<AlertRow>,
    pub operations: Vec<OperationRow>,
    pub drift: Vec<DriftRow>,
}

#[derive(Debug, Default)]
struct RecentlyViewed {
    resources: VecDeque<ResourceId>,
    groups: VecDeque<GroupId>,
}

fn remember<T: PartialEq>(list: &mut VecDeque<T>, id: T) {
    list.retain(|existing| existing != &id);
    list.push_front(id);
    list.truncate(MAX_RECENTLY_VIEWED);
}

#[derive(Debug, Clone)]
pub struct InventoryStore {
    data: Arc<InventoryData>,
    recent: Arc<Mutex<RecentlyViewed>>,
}

impl InventoryStore {
    pub fn new(data: InventoryData) -> Self {
        Self {
            data: Arc::new(data),
            recent: Arc::new(Mutex::new(RecentlyViewed::default())),
        }
    }

    pub fn data(&self) -> &InventoryData {
        &self.data
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.data.catalog
    }

    fn find_resource(&self, id: ResourceId) -> Option<&Resource> {
        self.data.resources.iter().find(|resource| resource.id == id)
    }

    /// One lazy-load step of the inventory tree.
    ///
    /// Without a parent this returns the platforms and their direct children.
    /// With a parent it returns that resource's children, hung under nodes the
    /// widget already shows.
    pub fn resource_tree(
        &self,
        parent_id: Option<ResourceId>,
        rendered: impl IntoIterator<Item = NodeId>,
    ) -> Result<TreeBuild> {
        let mut anchor: Option<&Resource> = None;
        let batch: Vec<Resource> = match parent_id {
            None => {
                let roots: HashSet<ResourceId> = self
                    .data
                    .resources
                    .iter()
                    .filter(|resource| resource.parent_id.is_none())
                    .map(|resource| resource.id)
                    .collect();
                self.data
                    .resources
                    .iter()
                    .filter(|resource| {
                        resource
                            .parent_id
                            .is_none_or(|parent_id| roots.contains(&parent_id))
                    })
                    .cloned()
                    .collect()
            }
            Some(parent_id) => {
                let parent = self.find_resource(parent_id).ok_or_else(|| {
                    LibError::not_found("Resource not found", anyhow!("resource {parent_id} not found"))
                })?;
                anchor = Some(parent);
                self.data
                    .resources
                    .iter()
                    .filter(|resource| resource.parent_id == Some(parent_id))
                    .cloned()
                    .collect()
            }
        };

        let mut rendered: HashSet<NodeId> = rendered.into_iter().collect();
        let mut builder = TreeBuilder::new(&self.data.catalog)
            .with_locked(self.data.locked.iter().copied())
            .with_rendered(rendered.iter().cloned());
        if let Some(anchor) = anchor {
            rendered.insert(NodeId::resource(anchor.id));
            builder = builder.with_anchor(anchor);
        }
        let build = builder.build(&batch);
        ensure_tree_order(&build.nodes, &rendered)?;
        tracing::debug!(
            parent_id = ?parent_id,
            nodes = build.nodes.len(),
            diagnostics = build.diagnostics.len(),
            "built resource tree batch"
        );
        Ok(build)
    }

    pub fn group_tree(&self, group_id: GroupId) -> Result<Vec<TreeNode>> {
        let group = self
            .data
            .groups
            .iter()
            .find(|group| group.id == group_id && group_visible(group, GroupVisibility::Visible))
            .ok_or_else(|| {
                LibError::not_found("Group not found", anyhow!("group {group_id} not found"))
            })?;
        let clusters = self
            .data
            .clusters
            .get(&group_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let nodes = ClusterTreeBuilder::new(&self.data.catalog).build(group, clusters);
        ensure_tree_order(&nodes, &HashSet::new())?;
        Ok(nodes)
    }

    pub fn recent_resources(&self) -> Vec<ResourceId> {
        self.with_recent(|recent| recent.resources.iter().copied().collect())
    }

    pub fn recent_groups(&self) -> Vec<GroupId> {
        self.with_recent(|recent| recent.groups.iter().copied().collect())
    }

    fn with_recent<T>(&self, f: impl FnOnce(&mut RecentlyViewed) -> T) -> T {
        match self.recent.lock() {
            Ok(mut recent) => f(&mut recent),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn type_facts(&self, resource: &Resource) -> Option<(&ResourceType, Option<String>)> {
        let resource_type = self.data.catalog.resource_type(resource.type_id)?;
        Some((resource_type, self.data.versions.get(&resource.id).cloned()))
    }
}

/// Tree batches served to the inventory and group navigation widgets.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn resource_tree(&self, parent_id: Option<ResourceId>, rendered: Vec<NodeId>) -> Result<TreeBuild>;

    async fn group_tree(&self, group_id: GroupId) -> Result<Vec<TreeNode>>;
}

#[async_trait]
impl TreeSource for InventoryStore {
    async fn resource_tree(&self, parent_id: Option<ResourceId>, rendered: Vec<NodeId>) -> Result<TreeBuild> {
        InventoryStore::resource_tree(self, parent_id, rendered)
    }

    async fn group_tree(&self, group_id: GroupId) -> Result<Vec<TreeNode>> {
        InventoryStore::group_tree(self, group_id)
    }
}

pub(crate) fn group_visible(group: &ResourceGroup, visibility: GroupVisibility) -> bool {
    match visibility {
        GroupVisibility::Visible => group.auto_group_parent_id.is_none() && group.cluster_key.is_none(),
        GroupVisibility::AutoGroup => group.auto_group_parent_id.is_some(),
        GroupVisibility::AutoCluster => group.cluster_key.is_some(),
    }
}

#[async_trait]
impl EntityLoader for InventoryStore {
    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        Ok(self.find_resource(id).cloned())
    }

    async fn group(&self, id: GroupId, visibility: GroupVisibility) -> Result<Option<ResourceGroup>> {
        Ok(self
            .data
            .groups
            .iter()
            .find(|group| group.id == id && group_visible(group, visibility))
            .cloned())
    }

    async fn resource_type(&self, id: ResourceTypeId) -> Result<Option<ResourceType>> {
        Ok(self.data.catalog.resource_type(id).cloned())
    }
}

#[async_trait]
impl PreferencesStore for InventoryStore {
    async fn add_recent_resource(&self, id: ResourceId) -> Result<()> {
        self.with_recent(|recent| remember(&mut recent.resources, id));
        Ok(())
    }

    async fn add_recent_group(&self, id: GroupId) -> Result<()> {
        self.with_recent(|recent| remember(&mut recent.groups, id));
        Ok(())
    }
}

#[async_trait]
impl CriteriaExecutor<InventorySummaryCriteria> for InventoryStore {
    async fn execute(
        &self,
        _criteria: &InventorySummaryCriteria,
        page: PageControl,
    ) -> Result<PageList<TypeCountRow>> {
        let mut counts: BTreeMap<(String, Option<String>), TypeCountRow> = BTreeMap::new();
        for resource in &self.data.resources {
            let Some((resource_type, version)) = self.type_facts(resource) else {
                continue;
            };
            counts
                .entry((resource_type.name.to_lowercase(), version.clone()))
                .or_insert_with(|| TypeCountRow {
                    type_id: resource_type.id,
                    type_name: resource_type.name.clone(),
                    plugin: resource_type.plugin.clone(),
                    category: resource_type.category,
                    version,
                    count: 0,
                })
                .count += 1;
        }
        Ok(PageList::from_rows(counts.into_values().collect(), page))
    }
}

#[async_trait]
impl CriteriaExecutor<InventoryDetailsCriteria> for InventoryStore {
    async fn execute(
        &self,
        criteria: &InventoryDetailsCriteria,
        page: PageControl,
    ) -> Result<PageList<InventoryDetailRow>> {
        let mut rows: Vec<InventoryDetailRow> = self
            .data
            .resources
            .iter()
            .filter_map(|resource| {
                let (resource_type, version) = self.type_facts(resource)?;
                Some(InventoryDetailRow {
                    type_id: resource_type.id,
                    type_name: resource_type.name.clone(),
                    plugin: resource_type.plugin.clone(),
                    category: resource_type.category,
                    version,
                    resource: ResourceRef::from(resource),
                    description: resource.description.clone(),
                    availability: resource.availability,
                })
            })
            .filter(|row| criteria.matches(row))
            .collect();
        rows.sort_by(|a, b| {
            a.type_name
                .cmp(&b.type_name)
                .then_with(|| a.resource.name.cmp(&b.resource.name))
        });
        Ok(PageList::from_rows(rows, page))
    }
}

#[async_trait]
impl CriteriaExecutor<AlertDefinitionCriteria> for InventoryStore {
    async fn execute(
        &self,
        _criteria: &AlertDefinitionCriteria,
        page: PageControl,
    ) -> Result<PageList<AlertDefinitionRow>> {
        Ok(PageList::from_rows(self.data.alert_definitions.clone(), page))
    }
}

#[async_trait]
impl CriteriaExecutor<ConfigurationHistoryCriteria> for InventoryStore {
    async fn execute(
        &self,
        _criteria: &ConfigurationHistoryCriteria,
        page: PageControl,
    ) -> Result<PageList<ConfigurationUpdateRow>> {
        let mut rows = self.data.configuration_updates.clone();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(PageList::from_rows(rows, page))
    }
}

#[async_trait]
impl CriteriaExecutor<DriftComplianceCriteria> for InventoryStore {
    async fn execute(
        &self,
        criteria: &DriftComplianceCriteria,
        page: PageControl,
    ) -> Result<PageList<DriftComplianceRow>> {
        let rows: Vec<DriftComplianceRow> = self
            .data
            .resources
            .iter()
            .filter_map(|resource| {
                let in_compliance = *self.data.drift_compliance.get(&resource.id)?;
                let (resource_type, version) = self.type_facts(resource)?;
                Some(DriftComplianceRow {
                    type_id: resource_type.id,
                    type_name: resource_type.name.clone(),
                    plugin: resource_type.plugin.clone(),
                    category: resource_type.category,
                    version,
                    resource: ResourceRef::from(resource),
                    in_compliance,
                })
            })
            .filter(|row| criteria.matches(row))
            .collect();
        Ok(PageList::from_rows(rows, page))
    }
}

#[async_trait]
impl CriteriaExecutor<SuspectMetricCriteria> for InventoryStore {
    async fn execute(
        &self,
        _criteria: &SuspectMetricCriteria,
        page: PageControl,
    ) -> Result<PageList<SuspectMetricRow>> {
        Ok(PageList::from_rows(self.data.suspect_metrics.clone(), page))
    }
}

#[async_trait]
impl CriteriaExecutor<RecentAlertCriteria> for InventoryStore {
    async fn execute(&self, criteria: &RecentAlertCriteria, page: PageControl) -> Result<PageList<AlertRow>> {
        let mut rows: Vec<AlertRow> = self
            .data
            .alerts
            .iter()
            .filter(|row| criteria.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(PageList::from_rows(rows, page))
    }
}

#[async_trait]
impl CriteriaExecutor<RecentOperationCriteria> for InventoryStore {
    async fn execute(
        &self,
        criteria: &RecentOperationCriteria,
        page: PageControl,
    ) -> Result<PageList<OperationRow>> {
        let mut rows: Vec<OperationRow> = self
            .data
            .operations
            .iter()
            .filter(|row| criteria.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(PageList::from_rows(rows, page))
    }
}

#[async_trait]
impl CriteriaExecutor<RecentDriftCriteria> for InventoryStore {
    async fn execute(&self, criteria: &RecentDriftCriteria, page: PageControl) -> Result<PageList<DriftRow>> {
        let mut rows: Vec<DriftRow> = self
            .data
            .drift
            .iter()
            .filter(|row| criteria.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(PageList::from_rows(rows, page))
    }
}

fn resource_type(
    id: i32,
    name: &str,
    plugin: &str,
    category: ResourceCategory,
    singleton: bool,
    sub_category_id: Option<i32>,
    child_type_ids: &[i32],
) -> ResourceType {
    ResourceType {
        id: ResourceTypeId(id),
        name: name.to_string(),
        plugin: plugin.to_string(),
        category,
        description: None,
        singleton,
        sub_category_id: sub_category_id.map(SubCategoryId),
        child_type_ids: child_type_ids.iter().copied().map(ResourceTypeId).collect(),
    }
}

fn resource(id: i32, name: &str, parent: Option<&Resource>, type_id: i32, availability: Availability) -> Resource {
    let ancestry = parent.map(|parent| {
        let entry = format!("{}_:_{}_:_{}", parent.type_id, parent.id, parent.name);
        match &parent.ancestry {
            Some(above) => format!("{entry}_::_{above}"),
            None => entry,
        }
    });
    Resource {
        id: ResourceId(id),
        name: name.to_string(),
        description: None,
        parent_id: parent.map(|parent| parent.id),
        type_id: ResourceTypeId(type_id),
        availability,
        ancestry,
    }
}

impl InventoryData {
    /// A small Linux host running two application servers.
    pub fn demo(now: DateTime<Utc>) -> Self {
        let catalog = TypeCatalog::with_types(
            [
                resource_type(1, "Linux", "Platforms", ResourceCategory::Platform, false, None, &[2, 3, 4]),
                resource_type(2, "JBossAS7 Standalone Server", "JBossAS7", ResourceCategory::Server, false, None, &[5, 6]),
                resource_type(3, "CPU", "Platforms", ResourceCategory::Service, false, Some(1), &[]),
                resource_type(4, "File System", "Platforms", ResourceCategory::Service, true, Some(1), &[]),
                resource_type(5, "Datasource", "JBossAS7", ResourceCategory::Service, false, Some(3), &[]),
                resource_type(6, "Web Runtime", "JBossAS7", ResourceCategory::Service, true, Some(2), &[]),
            ],
            [
                SubCategory {
                    id: SubCategoryId(1),
                    name: "Hardware".to_string(),
                    parent_id: None,
                },
                SubCategory {
                    id: SubCategoryId(2),
                    name: "Subsystems".to_string(),
                    parent_id: None,
                },
                SubCategory {
                    id: SubCategoryId(3),
                    name: "Datasources".to_string(),
                    parent_id: Some(SubCategoryId(2)),
                },
            ],
        );

        let host = resource(10001, "host.example.com", None, 1, Availability::Up);
        let cpu0 = resource(10002, "CPU 0", Some(&host), 3, Availability::Up);
        let cpu1 = resource(10003, "CPU 1", Some(&host), 3, Availability::Up);
        let root_fs = resource(10004, "/", Some(&host), 4, Availability::Up);
        let as1 = resource(10010, "AS7 (node1)", Some(&host), 2, Availability::Up);
        let as2 = resource(10020, "AS7 (node2)", Some(&host), 2, Availability::Down);
        let ds1 = resource(10011, "ExampleDS", Some(&as1), 5, Availability::Up);
        let ds2 = resource(10012, "ReportingDS", Some(&as1), 5, Availability::Disabled);
        let web1 = resource(10013, "Web Runtime", Some(&as1), 6, Availability::Up);
        let ds3 = resource(10021, "ExampleDS", Some(&as2), 5, Availability::Down);

        let mut versions = HashMap::new();
        versions.insert(host.id, "3.10.0".to_string());
        versions.insert(as1.id, "7.1.1.Final".to_string());
        versions.insert(as2.id, "7.1.1.Final".to_string());

        let groups = vec![
            ResourceGroup {
                id: GroupId(20001),
                name: "App Servers".to_string(),
                description: Some("Both standalone servers".to_string()),
                category: GroupCategory::Compatible,
                type_id: Some(ResourceTypeId(2)),
                auto_group_parent_id: None,
                cluster_key: None,
            },
            ResourceGroup {
                id: GroupId(20002),
                name: "host.example.com ( CPU )".to_string(),
                description: None,
                category: GroupCategory::Compatible,
                type_id: Some(ResourceTypeId(3)),
                auto_group_parent_id: Some(host.id),
                cluster_key: None,
            },
        ];

        let mut clusters = HashMap::new();
        clusters.insert(
            GroupId(20001),
            vec![
                ClusterFlyweight {
                    type_id: ResourceTypeId(5),
                    resource_key: "ExampleDS".to_string(),
                    name: "ExampleDS".to_string(),
                    members: 2,
                    cluster_size: 2,
                    children: Vec::new(),
                },
                ClusterFlyweight {
                    type_id: ResourceTypeId(5),
                    resource_key: "ReportingDS".to_string(),
                    name: "ReportingDS".to_string(),
                    members: 1,
                    cluster_size: 2,
                    children: Vec::new(),
                },
                ClusterFlyweight {
                    type_id: ResourceTypeId(6),
                    resource_key: "web".to_string(),
                    name: "Web Runtime".to_string(),
                    members: 1,
                    cluster_size: 2,
                    children: Vec::new(),
                },
            ],
        );

        let mut drift_compliance = HashMap::new();
        drift_compliance.insert(as1.id, true);
        drift_compliance.insert(as2.id, false);

        let alert_definitions = vec![
            AlertDefinitionRow {
                id: 501,
                name: "Server down".to_string(),
                description: Some("Availability goes down".to_string()),
                enabled: true,
                priority: AlertPriority::High,
                parent: AlertDefinitionParent::Template(11),
                resource: ResourceRef::from(&as2),
            },
            AlertDefinitionRow {
                id: 502,
                name: "Datasource disabled".to_string(),
                description: None,
                enabled: false,
                priority: AlertPriority::Low,
                parent: AlertDefinitionParent::None,
                resource: ResourceRef::from(&ds2),
            },
        ];

        let configuration_updates = vec![ConfigurationUpdateRow {
            version: 2,
            resource: ResourceRef::from(&as1),
            submitted_at: now - Duration::hours(5),
            completed_at: Some(now - Duration::hours(5) + Duration::seconds(4)),
            status: ConfigurationUpdateStatus::Success,
            user: Some("rhqadmin".to_string()),
        }];

        let suspect_metrics = vec![SuspectMetricRow {
            schedule_id: 9001,
            resource: ResourceRef::from(&host),
            metric: "Free Memory".to_string(),
            min: 120.0,
            max: 2048.5,
            average: 812.25,
        }];

        let alerts = vec![
            AlertRow {
                id: 7001,
                created_at: now - Duration::minutes(30),
                definition_name: "Server down".to_string(),
                conditions: vec![AlertCondition::Availability {
                    change: AvailabilityChange::GoesDown,
                }],
                priority: AlertPriority::High,
                acknowledged_by: None,
                resource: ResourceRef::from(&as2),
                context: AlertDefinitionContext::Resource,
            },
            AlertRow {
                id: 7002,
                created_at: now - Duration::hours(3),
                definition_name: "CPU busy".to_string(),
                conditions: vec![AlertCondition::Threshold {
                    metric: "User Load".to_string(),
                    comparator: ">".to_string(),
                    threshold: "90%".to_string(),
                }],
                priority: AlertPriority::Medium,
                acknowledged_by: Some("rhqadmin".to_string()),
                resource: ResourceRef::from(&cpu0),
                context: AlertDefinitionContext::Group {
                    group_id: GroupId(20002),
                    auto_group: true,
                },
            },
        ];

        let operations = vec![OperationRow {
            history_id: 3001,
            created_at: now - Duration::hours(1),
            operation: "Restart".to_string(),
            requester: "rhqadmin".to_string(),
            status: OperationRequestStatus::Failure,
            resource: ResourceRef::from(&as2),
        }];

        let drift = vec![DriftRow {
            id: "0-10010-1".to_string(),
            created_at: now - Duration::hours(2),
            definition: "standalone-config".to_string(),
            snapshot: 1,
            category: DriftCategory::FileChanged,
            path: "standalone/configuration/standalone.xml".to_string(),
            resource: ResourceRef::from(&as1),
        }];

        Self {
            catalog,
            resources: vec![host, cpu0, cpu1, root_fs, as1, as2, ds1, ds2, web1, ds3],
            groups,
            clusters,
            locked: HashSet::new(),
            versions,
            drift_compliance,
            alert_definitions,
            configuration_updates,
            suspect_metrics,
            alerts,
            operations,
            drift,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ErrorKind;
    use crate::models::NodeKind;
    use crate::reports::stream::collect_report;
    use crate::reports::{ReportContext, ReportFormat, ReportKind, StreamOptions, start_report};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time")
    }

    fn store() -> InventoryStore {
        InventoryStore::new(InventoryData::demo(now()))
    }

    #[test]
    fn root_tree_holds_platforms_and_their_children() {
        let build = store().resource_tree(None, []).expect("tree");
        let ids: Vec<&str> = build.nodes.iter().map(|node| node.id.as_str()).collect();

        assert_eq!(ids[0], "10001");
        assert!(build.node(&NodeId::from("subcat_1_10001")).is_some());
        assert!(build.node(&NodeId::auto_group(ResourceTypeId(2), ResourceId(10001))).is_some());
        assert!(build.node(&NodeId::resource(ResourceId(10011))).is_none());
        assert!(build.diagnostics.is_empty());
    }

    #[test]
    fn expanding_a_server_hangs_children_under_the_rendered_parent() {
        let build = store()
            .resource_tree(Some(ResourceId(10010)), [])
            .expect("tree");

        let datasources = build
            .node(&NodeId::auto_group(ResourceTypeId(5), ResourceId(10010)))
            .expect("auto-group");
        assert_eq!(datasources.parent_id, Some(NodeId::resource(ResourceId(10010))));
        let NodeKind::AutoGroup {
            backing_group_name, ..
        } = &datasources.kind
        else {
            panic!("expected auto-group node");
        };
        assert_eq!(backing_group_name.as_deref(), Some("AS7 (node1) ( Datasource )"));

        let web = build.node(&NodeId::resource(ResourceId(10013))).expect("web runtime");
        let subsystems = NodeId::sub_category(SubCategoryId(2), ResourceId(10010));
        assert_eq!(web.parent_id, Some(subsystems));

        let err = store()
            .resource_tree(Some(ResourceId(1)), [])
            .expect_err("missing parent");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn group_tree_only_serves_visible_groups() {
        let nodes = store().group_tree(GroupId(20001)).expect("group tree");
        assert_eq!(nodes[0].id.as_str(), "20001");
        assert!(nodes.len() > 3);

        assert!(store().group_tree(GroupId(20002)).is_err());
    }

    #[tokio::test]
    async fn hidden_groups_need_matching_visibility() {
        let store = store();
        assert!(store
            .group(GroupId(20002), GroupVisibility::Visible)
            .await
            .expect("lookup")
            .is_none());
        assert!(store
            .group(GroupId(20002), GroupVisibility::AutoGroup)
            .await
            .expect("lookup")
            .is_some());
    }

    #[tokio::test]
    async fn recently_viewed_is_most_recent_first_and_bounded() {
        let store = store();
        for id in 0..12 {
            store.add_recent_resource(ResourceId(id)).await.expect("recorded");
        }
        store.add_recent_resource(ResourceId(5)).await.expect("recorded");

        let recent = store.recent_resources();
        assert_eq!(recent.len(), MAX_RECENTLY_VIEWED);
        assert_eq!(recent[0], ResourceId(5));
        assert_eq!(recent.iter().filter(|id| **id == ResourceId(5)).count(), 1);
    }

    #[tokio::test]
    async fn inventory_summary_counts_per_type_and_version() {
        let stream = start_report(
            ReportKind::InventorySummary,
            ReportFormat::Csv,
            InventorySummaryCriteria,
            Arc::new(store()),
            ReportContext::new("http://localhost:7080"),
            StreamOptions::default(),
        )
        .await
        .expect("report");
        let body = collect_report(stream).await.expect("body");

        assert!(body.contains("CPU,Platforms,Service,,2\n"));
        assert!(body.contains("Datasource,JBossAS7,Service,,3\n"));
        assert!(body.contains("JBossAS7 Standalone Server,JBossAS7,Server,7.1.1.Final,2\n"));
    }

    #[tokio::test]
    async fn recent_alerts_are_newest_first_and_filtered() {
        let criteria = RecentAlertCriteria::from_params(Some("high,medium"), None, None, now())
            .expect("criteria");
        let stream = start_report(
            ReportKind::RecentAlerts,
            ReportFormat::Csv,
            criteria,
            Arc::new(store()),
            ReportContext::new("http://localhost:7080"),
            StreamOptions::default(),
        )
        .await
        .expect("report");
        let body = collect_report(stream).await.expect("body");
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(
            lines[0],
            "Creation Time,Name,Condition Text,Priority,Status,Resource,Ancestry,Details URL"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Server down,Availability [Goes down],High,No Ack,AS7 (node2)"));
        assert!(lines[2].ends_with("#Resource/AutoGroup/20002/Alerts/History/7002"));

        let low_only = RecentAlertCriteria::from_params(Some("LOW"), None, None, now()).expect("criteria");
        let page = CriteriaExecutor::<RecentAlertCriteria>::execute(
            &store(),
            &low_only,
            PageControl::first(10),
        )
        .await
        .expect("page");
        assert!(page.items.is_empty());
    }
}
