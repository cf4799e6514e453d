use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::cluster::ClusterTreeBuilder;
use crate::controller::{EntityLoader, GroupVisibility, PreferencesStore};
use crate::error::{LibError, Result};
use crate::invariants::ensure_tree_order;
use crate::models::{
    Availability, ClusterFlyweight, GroupCategory, GroupId, NodeId, Resource, ResourceCategory,
    ResourceGroup, ResourceId, ResourceType, ResourceTypeId, SubCategory, SubCategoryId, TreeNode,
    TypeCatalog,
};
use crate::reports::alerts::{AlertCondition, AlertPriority};
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
use crate::store::{MAX_RECENTLY_VIEWED, TreeSource, group_visible};
use crate::tree::{TreeBuild, TreeBuilder};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_inventory_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

fn bad_value(column: &'static str, value: &str) -> LibError {
    LibError::database(
        "Stored inventory data is invalid",
        anyhow!("unexpected {column} value '{value}'"),
    )
}

fn limit_offset(page: PageControl) -> (i64, i64) {
    (
        i64::from(page.page_size),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn availability(value: &str) -> Result<Availability> {
    match value {
        "UP" => Ok(Availability::Up),
        "DOWN" => Ok(Availability::Down),
        "DISABLED" => Ok(Availability::Disabled),
        "UNKNOWN" => Ok(Availability::Unknown),
        other => Err(bad_value("availability", other)),
    }
}

fn category(value: &str) -> Result<ResourceCategory> {
    ResourceCategory::from_db_value(value).ok_or_else(|| bad_value("category", value))
}

#[derive(Debug, Clone, FromRow)]
struct ResourceRow {
    id: i32,
    name: String,
    description: Option<String>,
    parent_id: Option<i32>,
    type_id: i32,
    availability: String,
    ancestry: Option<String>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = LibError;

    fn try_from(row: ResourceRow) -> Result<Self> {
        Ok(Resource {
            id: ResourceId(row.id),
            name: row.name,
            description: row.description,
            parent_id: row.parent_id.map(ResourceId),
            type_id: ResourceTypeId(row.type_id),
            availability: availability(&row.availability)?,
            ancestry: row.ancestry,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct GroupRow {
    id: i32,
    name: String,
    description: Option<String>,
    category: String,
    type_id: Option<i32>,
    auto_group_parent_id: Option<i32>,
    cluster_key: Option<String>,
}

impl TryFrom<GroupRow> for ResourceGroup {
    type Error = LibError;

    fn try_from(row: GroupRow) -> Result<Self> {
        let category = match row.category.as_str() {
            "COMPATIBLE" => GroupCategory::Compatible,
            "MIXED" => GroupCategory::Mixed,
            other => return Err(bad_value("group category", other)),
        };
        Ok(ResourceGroup {
            id: GroupId(row.id),
            name: row.name,
            description: row.description,
            category,
            type_id: row.type_id.map(ResourceTypeId),
            auto_group_parent_id: row.auto_group_parent_id.map(ResourceId),
            cluster_key: row.cluster_key,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ResourceTypeRow {
    id: i32,
    name: String,
    plugin: String,
    category: String,
    description: Option<String>,
    singleton: bool,
    sub_category_id: Option<i32>,
    child_type_ids: Vec<i32>,
}

impl TryFrom<ResourceTypeRow> for ResourceType {
    type Error = LibError;

    fn try_from(row: ResourceTypeRow) -> Result<Self> {
        Ok(ResourceType {
            id: ResourceTypeId(row.id),
            name: row.name,
            plugin: row.plugin,
            category: category(&row.category)?,
            description: row.description,
            singleton: row.singleton,
            sub_category_id: row.sub_category_id.map(SubCategoryId),
            child_type_ids: row.child_type_ids.into_iter().map(ResourceTypeId).collect(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct SubCategoryRow {
    id: i32,
    name: String,
    parent_id: Option<i32>,
}

const RESOURCE_TYPE_SELECT: &str = r#"
    SELECT
        t.id,
        t.name,
        t.plugin,
        t.category,
        t.description,
        t.singleton,
        t.sub_category_id,
        COALESCE(
            array_agg(c.child_type_id ORDER BY c.child_type_id)
                FILTER (WHERE c.child_type_id IS NOT NULL),
            '{}'
        ) AS child_type_ids
    FROM inventory.resource_types t
    LEFT JOIN inventory.resource_type_children c ON c.parent_type_id = t.id
"#;

const RESOURCE_SELECT: &str = r#"
    SELECT id, name, description, parent_id, type_id, availability, ancestry
    FROM inventory.resources
"#;

const GROUP_SELECT: &str = r#"
    SELECT id, name, description, category, type_id, auto_group_parent_id, cluster_key
    FROM inventory.groups
"#;

pub async fn load_catalog(pool: &PgPool) -> Result<TypeCatalog> {
    let types = sqlx::query_as::<_, ResourceTypeRow>(&format!("{RESOURCE_TYPE_SELECT} GROUP BY t.id"))
        .fetch_all(pool)
        .await
        .map_err(|err| db_err("Failed to load resource types", err))?;
    let sub_categories = sqlx::query_as::<_, SubCategoryRow>(
        r#"
        SELECT id, name, parent_id
        FROM inventory.sub_categories
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to load sub-categories", err))?;

    let types = types
        .into_iter()
        .map(ResourceType::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(TypeCatalog::with_types(
        types,
        sub_categories.into_iter().map(|row| SubCategory {
            id: SubCategoryId(row.id),
            name: row.name,
            parent_id: row.parent_id.map(SubCategoryId),
        }),
    ))
}

/// Builds one tree batch and checks it can be rendered in order.
fn assemble_tree(
    catalog: &TypeCatalog,
    batch: &[Resource],
    locked: Vec<ResourceId>,
    rendered: Vec<NodeId>,
    anchor: Option<&Resource>,
) -> Result<TreeBuild> {
    let mut rendered: HashSet<NodeId> = rendered.into_iter().collect();
    let mut builder = TreeBuilder::new(catalog)
        .with_locked(locked)
        .with_rendered(rendered.iter().cloned());
    if let Some(anchor) = anchor {
        rendered.insert(NodeId::resource(anchor.id));
        builder = builder.with_anchor(anchor);
    }
    let build = builder.build(batch);
    ensure_tree_order(&build.nodes, &rendered)?;
    Ok(build)
}

/// Postgres-backed inventory.
#[derive(Debug, Clone)]
pub struct PgInventory {
    pool: Arc<PgPool>,
}

impl PgInventory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn resources_where(&self, clause: &str, parent_id: Option<i32>) -> Result<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(&format!("{RESOURCE_SELECT} {clause} ORDER BY id"))
            .bind(parent_id)
            .fetch_all(self.pool())
            .await
            .map_err(|err| db_err("Failed to query resources", err))?;
        rows.into_iter().map(Resource::try_from).collect()
    }

    async fn locked_ids(&self) -> Result<Vec<ResourceId>> {
        let rows: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM inventory.resources
            WHERE locked
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query locked resources", err))?;
        Ok(rows.into_iter().map(|(id,)| ResourceId(id)).collect())
    }

    async fn record_view(&self, kind: &'static str, entity_id: i32) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|err| db_err("Failed to start transaction", err))?;

        sqlx::query(
            r#"
            INSERT INTO inventory.recently_viewed (kind, entity_id, viewed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (kind, entity_id) DO UPDATE SET viewed_at = EXCLUDED.viewed_at
            "#,
        )
        .bind(kind)
        .bind(entity_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to record recently viewed entity", err))?;

        sqlx::query(
            r#"
            DELETE FROM inventory.recently_viewed
            WHERE kind = $1
              AND entity_id NOT IN (
                  SELECT entity_id
                  FROM inventory.recently_viewed
                  WHERE kind = $1
                  ORDER BY viewed_at DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(kind)
        .bind(MAX_RECENTLY_VIEWED as i64)
        .execute(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to trim recently viewed entities", err))?;

        tx.commit()
            .await
            .map_err(|err| db_err("Failed to commit transaction", err))?;
        Ok(())
    }
}

#[async_trait]
impl EntityLoader for PgInventory {
    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!("{RESOURCE_SELECT} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(self.pool())
            .await
            .map_err(|err| db_err("Failed to query resource", err))?;
        row.map(Resource::try_from).transpose()
    }

    async fn group(&self, id: GroupId, visibility: GroupVisibility) -> Result<Option<ResourceGroup>> {
        let row = sqlx::query_as::<_, GroupRow>(&format!("{GROUP_SELECT} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(self.pool())
            .await
            .map_err(|err| db_err("Failed to query group", err))?;
        let group = row.map(ResourceGroup::try_from).transpose()?;
        Ok(group.filter(|group| group_visible(group, visibility)))
    }

    async fn resource_type(&self, id: ResourceTypeId) -> Result<Option<ResourceType>> {
        let row = sqlx::query_as::<_, ResourceTypeRow>(&format!(
            "{RESOURCE_TYPE_SELECT} WHERE t.id = $1 GROUP BY t.id"
        ))
        .bind(id.0)
        .fetch_optional(self.pool())
        .await
        .map_err(|err| db_err("Failed to query resource type", err))?;
        row.map(ResourceType::try_from).transpose()
    }
}

#[async_trait]
impl PreferencesStore for PgInventory {
    async fn add_recent_resource(&self, id: ResourceId) -> Result<()> {
        self.record_view("resource", id.0).await
    }

    async fn add_recent_group(&self, id: GroupId) -> Result<()> {
        self.record_view("group", id.0).await
    }
}

#[async_trait]
impl TreeSource for PgInventory {
    async fn resource_tree(&self, parent_id: Option<ResourceId>, rendered: Vec<NodeId>) -> Result<TreeBuild> {
        let catalog = load_catalog(self.pool()).await?;
        let (batch, anchor) = match parent_id {
            None => {
                let roots = self
                    .resources_where(
                        r#"
                        WHERE ($1::int IS NULL)
                          AND (parent_id IS NULL
                               OR parent_id IN (SELECT id FROM inventory.resources WHERE parent_id IS NULL))
                        "#,
                        None,
                    )
                    .await?;
                (roots, None)
            }
            Some(parent_id) => {
                let parent = self.resource(parent_id).await?.ok_or_else(|| {
                    LibError::not_found("Resource not found", anyhow!("resource {parent_id} not found"))
                })?;
                let children = self
                    .resources_where("WHERE parent_id = $1", Some(parent_id.0))
                    .await?;
                (children, Some(parent))
            }
        };

        let locked = self.locked_ids().await?;
        assemble_tree(&catalog, &batch, locked, rendered, anchor.as_ref())
    }

    async fn group_tree(&self, group_id: GroupId) -> Result<Vec<TreeNode>> {
        let group = self
            .group(group_id, GroupVisibility::Visible)
            .await?
            .ok_or_else(|| LibError::not_found("Group not found", anyhow!("group {group_id} not found")))?;
        let (Json(clusters),): (Json<Vec<ClusterFlyweight>>,) = sqlx::query_as(
            r#"
            SELECT clusters
            FROM inventory.groups
            WHERE id = $1
            "#,
        )
        .bind(group_id.0)
        .fetch_one(self.pool())
        .await
        .map_err(|err| db_err("Failed to query group clusters", err))?;

        let catalog = load_catalog(self.pool()).await?;
        let nodes = ClusterTreeBuilder::new(&catalog).build(&group, &clusters);
        ensure_tree_order(&nodes, &HashSet::new())?;
        Ok(nodes)
    }
}

#[derive(Debug, Clone, FromRow)]
struct TypeCountDbRow {
    type_id: i32,
    type_name: String,
    plugin: String,
    category: String,
    version: Option<String>,
    count: i64,
}

#[async_trait]
impl CriteriaExecutor<InventorySummaryCriteria> for PgInventory {
    async fn execute(
        &self,
        _criteria: &InventorySummaryCriteria,
        page: PageControl,
    ) -> Result<PageList<TypeCountRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, TypeCountDbRow>(
            r#"
            SELECT
                t.id AS type_id,
                t.name AS type_name,
                t.plugin,
                t.category,
                r.version,
                COUNT(*) AS count
            FROM inventory.resources r
            JOIN inventory.resource_types t ON t.id = r.type_id
            GROUP BY t.id, t.name, t.plugin, t.category, r.version
            ORDER BY lower(t.name), r.version NULLS FIRST
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query inventory summary", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(TypeCountRow {
                    type_id: ResourceTypeId(row.type_id),
                    type_name: row.type_name,
                    plugin: row.plugin,
                    category: category(&row.category)?,
                    version: row.version,
                    count: u64::try_from(row.count).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct InventoryDetailDbRow {
    type_id: i32,
    type_name: String,
    plugin: String,
    category: String,
    version: Option<String>,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
    description: Option<String>,
    availability: String,
}

#[async_trait]
impl CriteriaExecutor<InventoryDetailsCriteria> for PgInventory {
    async fn execute(
        &self,
        criteria: &InventoryDetailsCriteria,
        page: PageControl,
    ) -> Result<PageList<InventoryDetailRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, InventoryDetailDbRow>(
            r#"
            SELECT
                t.id AS type_id,
                t.name AS type_name,
                t.plugin,
                t.category,
                r.version,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry,
                r.description,
                r.availability
            FROM inventory.resources r
            JOIN inventory.resource_types t ON t.id = r.type_id
            WHERE ($1::int IS NULL OR t.id = $1)
              AND ($2::text IS NULL OR r.version = $2)
            ORDER BY t.name, r.name, r.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(criteria.resource_type_id.map(|id| id.0))
        .bind(criteria.version.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query inventory details", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(InventoryDetailRow {
                    type_id: ResourceTypeId(row.type_id),
                    type_name: row.type_name,
                    plugin: row.plugin,
                    category: category(&row.category)?,
                    version: row.version,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                    description: row.description,
                    availability: availability(&row.availability)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct AlertDefinitionDbRow {
    id: i32,
    name: String,
    description: Option<String>,
    enabled: bool,
    priority: String,
    template_id: Option<i32>,
    group_id: Option<i32>,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

fn priority(value: &str) -> Result<AlertPriority> {
    AlertPriority::from_name(value).ok_or_else(|| bad_value("priority", value))
}

#[async_trait]
impl CriteriaExecutor<AlertDefinitionCriteria> for PgInventory {
    async fn execute(
        &self,
        _criteria: &AlertDefinitionCriteria,
        page: PageControl,
    ) -> Result<PageList<AlertDefinitionRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, AlertDefinitionDbRow>(
            r#"
            SELECT
                d.id,
                d.name,
                d.description,
                d.enabled,
                d.priority,
                d.template_id,
                d.group_id,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.alert_definitions d
            JOIN inventory.resources r ON r.id = d.resource_id
            ORDER BY d.name, d.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query alert definitions", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                let parent = match (row.group_id, row.template_id) {
                    (Some(group_id), _) => AlertDefinitionParent::Group(GroupId(group_id)),
                    (None, Some(template_id)) => AlertDefinitionParent::Template(template_id),
                    (None, None) => AlertDefinitionParent::None,
                };
                Ok(AlertDefinitionRow {
                    id: row.id,
                    name: row.name,
                    description: row.description,
                    enabled: row.enabled,
                    priority: priority(&row.priority)?,
                    parent,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct ConfigurationUpdateDbRow {
    version: i32,
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    username: Option<String>,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

#[async_trait]
impl CriteriaExecutor<ConfigurationHistoryCriteria> for PgInventory {
    async fn execute(
        &self,
        _criteria: &ConfigurationHistoryCriteria,
        page: PageControl,
    ) -> Result<PageList<ConfigurationUpdateRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, ConfigurationUpdateDbRow>(
            r#"
            SELECT
                u.version,
                u.submitted_at,
                u.completed_at,
                u.status,
                u.username,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.configuration_updates u
            JOIN inventory.resources r ON r.id = u.resource_id
            ORDER BY u.submitted_at DESC, r.id, u.version
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query configuration history", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(ConfigurationUpdateRow {
                    version: row.version,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                    submitted_at: row.submitted_at,
                    completed_at: row.completed_at,
                    status: ConfigurationUpdateStatus::from_db_value(&row.status)
                        .ok_or_else(|| bad_value("configuration status", &row.status))?,
                    user: row.username,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct DriftComplianceDbRow {
    type_id: i32,
    type_name: String,
    plugin: String,
    category: String,
    version: Option<String>,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
    drift_compliant: bool,
}

#[async_trait]
impl CriteriaExecutor<DriftComplianceCriteria> for PgInventory {
    async fn execute(
        &self,
        criteria: &DriftComplianceCriteria,
        page: PageControl,
    ) -> Result<PageList<DriftComplianceRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, DriftComplianceDbRow>(
            r#"
            SELECT
                t.id AS type_id,
                t.name AS type_name,
                t.plugin,
                t.category,
                r.version,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry,
                r.drift_compliant
            FROM inventory.resources r
            JOIN inventory.resource_types t ON t.id = r.type_id
            WHERE r.drift_compliant IS NOT NULL
              AND ($1::int IS NULL OR t.id = $1)
              AND ($2::text IS NULL OR r.version = $2)
            ORDER BY t.name, r.name, r.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(criteria.resource_type_id.map(|id| id.0))
        .bind(criteria.version.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query drift compliance", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(DriftComplianceRow {
                    type_id: ResourceTypeId(row.type_id),
                    type_name: row.type_name,
                    plugin: row.plugin,
                    category: category(&row.category)?,
                    version: row.version,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                    in_compliance: row.drift_compliant,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct SuspectMetricDbRow {
    schedule_id: i32,
    metric: String,
    min_value: f64,
    max_value: f64,
    avg_value: f64,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

#[async_trait]
impl CriteriaExecutor<SuspectMetricCriteria> for PgInventory {
    async fn execute(
        &self,
        _criteria: &SuspectMetricCriteria,
        page: PageControl,
    ) -> Result<PageList<SuspectMetricRow>> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query_as::<_, SuspectMetricDbRow>(
            r#"
            SELECT
                m.schedule_id,
                m.metric,
                m.min_value,
                m.max_value,
                m.avg_value,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.suspect_metrics m
            JOIN inventory.resources r ON r.id = m.resource_id
            ORDER BY r.name, m.metric, m.schedule_id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query suspect metrics", err))?;

        let items = rows
            .into_iter()
            .map(|row| SuspectMetricRow {
                schedule_id: row.schedule_id,
                resource: ResourceRef {
                    id: ResourceId(row.resource_id),
                    name: row.resource_name,
                    ancestry: row.resource_ancestry,
                },
                metric: row.metric,
                min: row.min_value,
                max: row.max_value,
                average: row.avg_value,
            })
            .collect();
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct AlertDbRow {
    id: i32,
    created_at: DateTime<Utc>,
    definition_name: String,
    conditions: Json<Vec<AlertCondition>>,
    priority: String,
    acknowledged_by: Option<String>,
    group_id: Option<i32>,
    auto_group: Option<bool>,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

#[async_trait]
impl CriteriaExecutor<RecentAlertCriteria> for PgInventory {
    async fn execute(&self, criteria: &RecentAlertCriteria, page: PageControl) -> Result<PageList<AlertRow>> {
        let (limit, offset) = limit_offset(page);
        let priorities: Vec<&str> = criteria
            .priorities
            .iter()
            .map(|priority| priority.as_db_value())
            .collect();
        let rows = sqlx::query_as::<_, AlertDbRow>(
            r#"
            SELECT
                a.id,
                a.created_at,
                d.name AS definition_name,
                a.conditions,
                d.priority,
                a.acknowledged_by,
                d.group_id,
                (g.auto_group_parent_id IS NOT NULL) AS auto_group,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.alerts a
            JOIN inventory.alert_definitions d ON d.id = a.definition_id
            JOIN inventory.resources r ON r.id = d.resource_id
            LEFT JOIN inventory.groups g ON g.id = d.group_id
            WHERE (cardinality($1::text[]) = 0 OR d.priority = ANY($1))
              AND ($2::timestamptz IS NULL OR a.created_at >= $2)
              AND ($3::timestamptz IS NULL OR a.created_at <= $3)
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&priorities)
        .bind(criteria.window.start)
        .bind(criteria.window.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query recent alerts", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                let context = match row.group_id {
                    Some(group_id) => AlertDefinitionContext::Group {
                        group_id: GroupId(group_id),
                        auto_group: row.auto_group.unwrap_or(false),
                    },
                    None => AlertDefinitionContext::Resource,
                };
                Ok(AlertRow {
                    id: row.id,
                    created_at: row.created_at,
                    definition_name: row.definition_name,
                    conditions: row.conditions.0,
                    priority: priority(&row.priority)?,
                    acknowledged_by: row.acknowledged_by,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                    context,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct OperationDbRow {
    history_id: i32,
    created_at: DateTime<Utc>,
    operation: String,
    requester: String,
    status: String,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

#[async_trait]
impl CriteriaExecutor<RecentOperationCriteria> for PgInventory {
    async fn execute(
        &self,
        criteria: &RecentOperationCriteria,
        page: PageControl,
    ) -> Result<PageList<OperationRow>> {
        let (limit, offset) = limit_offset(page);
        let statuses: Vec<&str> = criteria
            .statuses
            .iter()
            .map(|status| status.as_db_value())
            .collect();
        let rows = sqlx::query_as::<_, OperationDbRow>(
            r#"
            SELECT
                o.history_id,
                o.created_at,
                o.operation,
                o.requester,
                o.status,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.operations o
            JOIN inventory.resources r ON r.id = o.resource_id
            WHERE (cardinality($1::text[]) = 0 OR o.status = ANY($1))
              AND ($2::timestamptz IS NULL OR o.created_at >= $2)
              AND ($3::timestamptz IS NULL OR o.created_at <= $3)
            ORDER BY o.created_at DESC, o.history_id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&statuses)
        .bind(criteria.window.start)
        .bind(criteria.window.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query recent operations", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(OperationRow {
                    history_id: row.history_id,
                    created_at: row.created_at,
                    operation: row.operation,
                    requester: row.requester,
                    status: OperationRequestStatus::from_name(&row.status)
                        .ok_or_else(|| bad_value("operation status", &row.status))?,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[derive(Debug, Clone, FromRow)]
struct DriftDbRow {
    id: String,
    created_at: DateTime<Utc>,
    definition: String,
    snapshot: i32,
    category: String,
    path: String,
    resource_id: i32,
    resource_name: String,
    resource_ancestry: Option<String>,
}

#[async_trait]
impl CriteriaExecutor<RecentDriftCriteria> for PgInventory {
    async fn execute(&self, criteria: &RecentDriftCriteria, page: PageControl) -> Result<PageList<DriftRow>> {
        let (limit, offset) = limit_offset(page);
        let categories: Vec<&str> = criteria
            .categories
            .iter()
            .map(|category| category.as_db_value())
            .collect();
        let rows = sqlx::query_as::<_, DriftDbRow>(
            r#"
            SELECT
                d.id,
                d.created_at,
                d.definition,
                d.snapshot,
                d.category,
                d.path,
                r.id AS resource_id,
                r.name AS resource_name,
                r.ancestry AS resource_ancestry
            FROM inventory.drift d
            JOIN inventory.resources r ON r.id = d.resource_id
            WHERE (cardinality($1::text[]) = 0 OR d.category = ANY($1))
              AND ($2::text IS NULL OR d.definition ILIKE '%' || $2 || '%')
              AND ($3::int IS NULL OR d.snapshot = $3)
              AND ($4::text IS NULL OR d.path ILIKE '%' || $4 || '%')
              AND ($5::timestamptz IS NULL OR d.created_at >= $5)
              AND ($6::timestamptz IS NULL OR d.created_at <= $6)
            ORDER BY d.created_at DESC, d.id
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(&categories)
        .bind(criteria.definition.as_deref())
        .bind(criteria.snapshot)
        .bind(criteria.path.as_deref())
        .bind(criteria.window.start)
        .bind(criteria.window.end)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|err| db_err("Failed to query recent drift", err))?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(DriftRow {
                    id: row.id,
                    created_at: row.created_at,
                    definition: row.definition,
                    snapshot: row.snapshot,
                    category: DriftCategory::from_name(&row.category)
                        .ok_or_else(|| bad_value("drift category", &row.category))?,
                    path: row.path,
                    resource: ResourceRef {
                        id: ResourceId(row.resource_id),
                        name: row.resource_name,
                        ancestry: row.resource_ancestry,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PageList::new(items, page, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;

    #[test]
    fn stored_enums_decode_or_fail_as_database_errors() {
        assert_eq!(availability("DISABLED").expect("known"), Availability::Disabled);
        assert_eq!(category("SERVICE").expect("known"), ResourceCategory::Service);

        let err = availability("MAYBE").expect_err("unknown");
        assert_eq!(err.kind, crate::error::ErrorKind::Database);
        assert!(priority("urgent").is_err());
    }

    #[test]
    fn lazy_batches_are_anchored_and_order_checked() {
        let data = crate::store::InventoryData::demo(chrono::Utc::now());
        let server = data
            .resources
            .iter()
            .find(|resource| resource.id == ResourceId(10010))
            .expect("server")
            .clone();
        let children: Vec<Resource> = data
            .resources
            .iter()
            .filter(|resource| resource.parent_id == Some(server.id))
            .cloned()
            .collect();

        let build = assemble_tree(&data.catalog, &children, Vec::new(), Vec::new(), Some(&server))
            .expect("tree");
        let datasources = build
            .node(&NodeId::auto_group(ResourceTypeId(5), server.id))
            .expect("auto-group");
        let NodeKind::AutoGroup {
            backing_group_name, ..
        } = &datasources.kind
        else {
            panic!("expected auto-group node");
        };
        assert_eq!(backing_group_name.as_deref(), Some("AS7 (node1) ( Datasource )"));

        let nodes = vec![TreeNode {
            parent_id: Some(NodeId::from("elsewhere")),
            ..build.nodes[0].clone()
        }];
        let err = ensure_tree_order(&nodes, &HashSet::new()).expect_err("unknown parent");
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn pages_map_to_limit_and_offset() {
        let page = PageControl::first(50).next().next();
        assert_eq!(limit_offset(page), (50, 100));
    }
}
