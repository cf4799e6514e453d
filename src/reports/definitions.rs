//! Row types, filters and column layouts of the individual reports.

use std::fmt;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alerts::{AlertCondition, AlertPriority, condition_text};
use super::query::Criteria;
use super::{Column, ReportContext, ReportRow, column};
use crate::error::{LibError, Result};
use crate::models::{Availability, GroupId, Resource, ResourceCategory, ResourceId, ResourceTypeId};

const ANCESTRY_DELIMITER: &str = "_::_";
const ANCESTRY_ENTRY_DELIMITER: &str = "_:_";

/// Renders `typeId_:_resourceId_:_name_::_...` as `name1 < name2 < ...`.
pub fn parse_ancestry(ancestry: Option<&str>) -> String {
    let Some(ancestry) = ancestry.filter(|value| !value.is_empty()) else {
        return String::new();
    };
    ancestry
        .split(ANCESTRY_DELIMITER)
        .filter_map(|entry| entry.split(ANCESTRY_ENTRY_DELIMITER).nth(2))
        .collect::<Vec<_>>()
        .join(" < ")
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn format_optional_time(time: Option<DateTime<Utc>>) -> String {
    time.map(format_time).unwrap_or_default()
}

/// The resource a report row is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub id: ResourceId,
    pub name: String,
    pub ancestry: Option<String>,
}

impl ResourceRef {
    pub fn ancestry_text(&self) -> String {
        parse_ancestry(self.ancestry.as_deref())
    }
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        Self {
            id: resource.id,
            name: resource.name.clone(),
            ancestry: resource.ancestry.clone(),
        }
    }
}

/// Inclusive creation-time window of the "recent" reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Epoch-millisecond bounds; a start without an end runs up to `now`.
    pub fn from_millis(start: Option<i64>, end: Option<i64>, now: DateTime<Utc>) -> Result<Self> {
        let start = start.map(|millis| millis_to_time(millis, "startTime")).transpose()?;
        let mut end = end.map(|millis| millis_to_time(millis, "endTime")).transpose()?;
        if start.is_some() && end.is_none() {
            end = Some(now);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| time >= start) && self.end.is_none_or(|end| time <= end)
    }
}

fn millis_to_time(millis: i64, name: &'static str) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        LibError::invalid(
            "Report time filters must be epoch milliseconds",
            anyhow!("{name} {millis} is out of range"),
        )
    })
}

/// Comma-separated filter values. Blank input means "no filter".
fn parse_list<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    public: &'static str,
) -> Result<Vec<T>> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            parse(value).ok_or_else(|| LibError::invalid(public, anyhow!("unrecognized filter value {value}")))
        })
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// inventorySummary

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventorySummaryCriteria;

impl Criteria for InventorySummaryCriteria {
    type Row = TypeCountRow;
    const NAME: &'static str = "inventory_summary";
}

/// Number of resources per type and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCountRow {
    pub type_id: ResourceTypeId,
    pub type_name: String,
    pub plugin: String,
    pub category: ResourceCategory,
    pub version: Option<String>,
    pub count: u64,
}

impl ReportRow for TypeCountRow {
    const COLUMNS: &'static [Column] = &[
        column("Resource Type", "resourceType"),
        column("Plugin", "plugin"),
        column("Category", "category"),
        column("Version", "version"),
        column("Count", "count"),
    ];
    const XML_ELEMENT: &'static str = "resourceTypeCount";

    fn fields(&self, _context: &ReportContext) -> Vec<String> {
        vec![
            self.type_name.clone(),
            self.plugin.clone(),
            self.category.display_name().to_string(),
            self.version.clone().unwrap_or_default(),
            self.count.to_string(),
        ]
    }
}

/// The `details=true` variant: one line per resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryDetailsCriteria {
    pub resource_type_id: Option<ResourceTypeId>,
    pub version: Option<String>,
}

impl Criteria for InventoryDetailsCriteria {
    type Row = InventoryDetailRow;
    const NAME: &'static str = "inventory_details";
}

impl InventoryDetailsCriteria {
    pub fn matches(&self, row: &InventoryDetailRow) -> bool {
        self.resource_type_id.is_none_or(|id| id == row.type_id)
            && self
                .version
                .as_deref()
                .is_none_or(|version| row.version.as_deref() == Some(version))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDetailRow {
    pub type_id: ResourceTypeId,
    pub type_name: String,
    pub plugin: String,
    pub category: ResourceCategory,
    pub version: Option<String>,
    pub resource: ResourceRef,
    pub description: Option<String>,
    pub availability: Availability,
}

impl ReportRow for InventoryDetailRow {
    const COLUMNS: &'static [Column] = &[
        column("Resource Type", "resourceType"),
        column("Plugin", "plugin"),
        column("Category", "category"),
        column("Version", "version"),
        column("Name", "name"),
        column("Ancestry", "ancestry"),
        column("Description", "description"),
        column("Availability", "availability"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "resource";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            self.type_name.clone(),
            self.plugin.clone(),
            self.category.display_name().to_string(),
            self.version.clone().unwrap_or_default(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            self.description.clone().unwrap_or_default(),
            availability_text(self.availability).to_string(),
            context.resource_url(self.resource.id, ""),
        ]
    }
}

const fn availability_text(availability: Availability) -> &'static str {
    match availability {
        Availability::Up => "UP",
        Availability::Down => "DOWN",
        Availability::Disabled => "DISABLED",
        Availability::Unknown => "UNKNOWN",
    }
}

// alertDefinitions

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertDefinitionCriteria;

impl Criteria for AlertDefinitionCriteria {
    type Row = AlertDefinitionRow;
    const NAME: &'static str = "alert_definitions";
}

/// Where a resource-level alert definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlertDefinitionParent {
    None,
    Template(i32),
    Group(GroupId),
}

impl AlertDefinitionParent {
    pub const fn text(self) -> &'static str {
        match self {
            AlertDefinitionParent::None => "Self",
            AlertDefinitionParent::Template(_) => "Template",
            AlertDefinitionParent::Group(_) => "Group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDefinitionRow {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub priority: AlertPriority,
    pub parent: AlertDefinitionParent,
    pub resource: ResourceRef,
}

impl ReportRow for AlertDefinitionRow {
    const COLUMNS: &'static [Column] = &[
        column("Name", "name"),
        column("Description", "description"),
        column("Enabled", "enabled"),
        column("Priority", "priority"),
        column("Parent", "parent"),
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "alertDefinition";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone().unwrap_or_default(),
            if self.enabled { "Yes" } else { "No" }.to_string(),
            self.priority.to_string(),
            self.parent.text().to_string(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            context.resource_url(self.resource.id, &format!("Alerts/Definitions/{}", self.id)),
        ]
    }
}

// configurationHistory

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationHistoryCriteria;

impl Criteria for ConfigurationHistoryCriteria {
    type Row = ConfigurationUpdateRow;
    const NAME: &'static str = "configuration_history";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationUpdateStatus {
    InProgress,
    Success,
    Failure,
    NoChange,
}

impl ConfigurationUpdateStatus {
    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "INPROGRESS" | "IN_PROGRESS" => Some(ConfigurationUpdateStatus::InProgress),
            "SUCCESS" => Some(ConfigurationUpdateStatus::Success),
            "FAILURE" => Some(ConfigurationUpdateStatus::Failure),
            "NOCHANGE" | "NO_CHANGE" => Some(ConfigurationUpdateStatus::NoChange),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigurationUpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigurationUpdateStatus::InProgress => "In Progress",
            ConfigurationUpdateStatus::Success => "Success",
            ConfigurationUpdateStatus::Failure => "Failure",
            ConfigurationUpdateStatus::NoChange => "No Change",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdateRow {
    pub version: i32,
    pub resource: ResourceRef,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ConfigurationUpdateStatus,
    pub user: Option<String>,
}

impl ReportRow for ConfigurationUpdateRow {
    const COLUMNS: &'static [Column] = &[
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Version", "version"),
        column("Date Submitted", "dateSubmitted"),
        column("Date Completed", "dateCompleted"),
        column("Status", "status"),
        column("User", "user"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "configurationUpdate";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            self.version.to_string(),
            format_time(self.submitted_at),
            format_optional_time(self.completed_at),
            self.status.to_string(),
            self.user.clone().unwrap_or_default(),
            context.resource_url(
                self.resource.id,
                &format!("Configuration/History/{}", self.version),
            ),
        ]
    }
}

// driftCompliance

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriftComplianceCriteria {
    pub resource_type_id: Option<ResourceTypeId>,
    pub version: Option<String>,
}

impl Criteria for DriftComplianceCriteria {
    type Row = DriftComplianceRow;
    const NAME: &'static str = "drift_compliance";
}

impl DriftComplianceCriteria {
    pub fn matches(&self, row: &DriftComplianceRow) -> bool {
        self.resource_type_id.is_none_or(|id| id == row.type_id)
            && self
                .version
                .as_deref()
                .is_none_or(|version| row.version.as_deref() == Some(version))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftComplianceRow {
    pub type_id: ResourceTypeId,
    pub type_name: String,
    pub plugin: String,
    pub category: ResourceCategory,
    pub version: Option<String>,
    pub resource: ResourceRef,
    pub in_compliance: bool,
}

impl ReportRow for DriftComplianceRow {
    const COLUMNS: &'static [Column] = &[
        column("Resource Type", "resourceType"),
        column("Plugin", "plugin"),
        column("Category", "category"),
        column("Version", "version"),
        column("Name", "name"),
        column("Ancestry", "ancestry"),
        column("In Compliance", "inCompliance"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "resource";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            self.type_name.clone(),
            self.plugin.clone(),
            self.category.display_name().to_string(),
            self.version.clone().unwrap_or_default(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            if self.in_compliance { "Yes" } else { "No" }.to_string(),
            context.resource_url(self.resource.id, "Drift/Definitions"),
        ]
    }
}

// suspectMetrics

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuspectMetricCriteria;

impl Criteria for SuspectMetricCriteria {
    type Row = SuspectMetricRow;
    const NAME: &'static str = "suspect_metrics";
}

/// A metric whose latest value fell outside its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectMetricRow {
    pub schedule_id: i32,
    pub resource: ResourceRef,
    pub metric: String,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl ReportRow for SuspectMetricRow {
    const COLUMNS: &'static [Column] = &[
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Metric", "metric"),
        column("Min", "min"),
        column("Max", "max"),
        column("Average", "average"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "suspectMetric";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            self.metric.clone(),
            self.min.to_string(),
            self.max.to_string(),
            self.average.to_string(),
            context.resource_url(self.resource.id, "Monitoring/Metrics"),
        ]
    }
}

// recentAlerts

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecentAlertCriteria {
    /// Empty means every priority.
    pub priorities: Vec<AlertPriority>,
    pub window: TimeWindow,
}

impl Criteria for RecentAlertCriteria {
    type Row = AlertRow;
    const NAME: &'static str = "recent_alerts";
}

impl RecentAlertCriteria {
    pub fn from_params(
        priorities: Option<&str>,
        start: Option<i64>,
        end: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            priorities: parse_list(priorities, AlertPriority::from_name, "Unknown alert priority")?,
            window: TimeWindow::from_millis(start, end, now)?,
        })
    }

    pub fn matches(&self, row: &AlertRow) -> bool {
        (self.priorities.is_empty() || self.priorities.contains(&row.priority))
            && self.window.contains(row.created_at)
    }
}

/// Where the definition that fired an alert lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDefinitionContext {
    Resource,
    Group { group_id: GroupId, auto_group: bool },
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRow {
    pub id: i32,
    pub created_at: DateTime<Utc>,
    pub definition_name: String,
    pub conditions: Vec<AlertCondition>,
    pub priority: AlertPriority,
    pub acknowledged_by: Option<String>,
    pub resource: ResourceRef,
    pub context: AlertDefinitionContext,
}

impl AlertRow {
    pub fn status(&self) -> String {
        match &self.acknowledged_by {
            Some(user) => format!("Ack ({user})"),
            None => "No Ack".to_string(),
        }
    }

    pub fn details_url(&self, context: &ReportContext) -> String {
        let history = format!("Alerts/History/{}", self.id);
        match self.context {
            AlertDefinitionContext::Resource => context.resource_url(self.resource.id, &history),
            AlertDefinitionContext::Group {
                group_id,
                auto_group: true,
            } => context.detail_url(&format!("Resource/AutoGroup/{group_id}/{history}")),
            AlertDefinitionContext::Group { group_id, .. } => {
                context.detail_url(&format!("ResourceGroup/{group_id}/{history}"))
            }
            AlertDefinitionContext::Template => context.console_url(),
        }
    }
}

impl ReportRow for AlertRow {
    const COLUMNS: &'static [Column] = &[
        column("Creation Time", "creationTime"),
        column("Name", "name"),
        column("Condition Text", "conditionText"),
        column("Priority", "priority"),
        column("Status", "status"),
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "alert";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            format_time(self.created_at),
            self.definition_name.clone(),
            condition_text(&self.conditions),
            self.priority.to_string(),
            self.status(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            self.details_url(context),
        ]
    }
}

// recentOperations

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationRequestStatus {
    InProgress,
    Success,
    Failure,
    Canceled,
}

impl OperationRequestStatus {
    pub const fn as_db_value(self) -> &'static str {
        match self {
            OperationRequestStatus::InProgress => "IN_PROGRESS",
            OperationRequestStatus::Success => "SUCCESS",
            OperationRequestStatus::Failure => "FAILURE",
            OperationRequestStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INPROGRESS" | "IN_PROGRESS" => Some(OperationRequestStatus::InProgress),
            "SUCCESS" => Some(OperationRequestStatus::Success),
            "FAILURE" => Some(OperationRequestStatus::Failure),
            "CANCELED" => Some(OperationRequestStatus::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for OperationRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationRequestStatus::InProgress => "In Progress",
            OperationRequestStatus::Success => "Success",
            OperationRequestStatus::Failure => "Failure",
            OperationRequestStatus::Canceled => "Canceled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecentOperationCriteria {
    pub statuses: Vec<OperationRequestStatus>,
    pub window: TimeWindow,
}

impl Criteria for RecentOperationCriteria {
    type Row = OperationRow;
    const NAME: &'static str = "recent_operations";
}

impl RecentOperationCriteria {
    pub fn from_params(
        statuses: Option<&str>,
        start: Option<i64>,
        end: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            statuses: parse_list(
                statuses,
                OperationRequestStatus::from_name,
                "Unknown operation request status",
            )?,
            window: TimeWindow::from_millis(start, end, now)?,
        })
    }

    pub fn matches(&self, row: &OperationRow) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&row.status))
            && self.window.contains(row.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRow {
    pub history_id: i32,
    pub created_at: DateTime<Utc>,
    pub operation: String,
    pub requester: String,
    pub status: OperationRequestStatus,
    pub resource: ResourceRef,
}

impl ReportRow for OperationRow {
    const COLUMNS: &'static [Column] = &[
        column("Date Submitted", "dateSubmitted"),
        column("Operation", "operation"),
        column("Requester", "requester"),
        column("Status", "status"),
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "operation";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            format_time(self.created_at),
            self.operation.clone(),
            self.requester.clone(),
            self.status.to_string(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            context.resource_url(
                self.resource.id,
                &format!("Operations/History/{}", self.history_id),
            ),
        ]
    }
}

// recentDrift

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftCategory {
    FileAdded,
    FileChanged,
    FileRemoved,
}

impl DriftCategory {
    pub const fn as_db_value(self) -> &'static str {
        match self {
            DriftCategory::FileAdded => "FILE_ADDED",
            DriftCategory::FileChanged => "FILE_CHANGED",
            DriftCategory::FileRemoved => "FILE_REMOVED",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FILE_ADDED" => Some(DriftCategory::FileAdded),
            "FILE_CHANGED" => Some(DriftCategory::FileChanged),
            "FILE_REMOVED" => Some(DriftCategory::FileRemoved),
            _ => None,
        }
    }
}

impl fmt::Display for DriftCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriftCategory::FileAdded => "Added",
            DriftCategory::FileChanged => "Changed",
            DriftCategory::FileRemoved => "Removed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecentDriftCriteria {
    pub categories: Vec<DriftCategory>,
    /// Case-insensitive substring of the drift definition name.
    pub definition: Option<String>,
    pub snapshot: Option<i32>,
    /// Case-insensitive substring of the file path.
    pub path: Option<String>,
    pub window: TimeWindow,
}

impl Criteria for RecentDriftCriteria {
    type Row = DriftRow;
    const NAME: &'static str = "recent_drift";
}

impl RecentDriftCriteria {
    pub fn from_params(params: RecentDriftParams<'_>, now: DateTime<Utc>) -> Result<Self> {
        let snapshot = params
            .snapshot
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                value.trim().parse::<i32>().map_err(|err| {
                    LibError::invalid("Snapshot must be a number", anyhow!("snapshot {value}: {err}"))
                })
            })
            .transpose()?;

        Ok(Self {
            categories: parse_list(params.category_id, DriftCategory::from_name, "Unknown drift category")?,
            definition: params.definition.filter(|value| !value.is_empty()).map(str::to_string),
            snapshot,
            path: params.path.filter(|value| !value.is_empty()).map(str::to_string),
            window: TimeWindow::from_millis(params.start_time, params.end_time, now)?,
        })
    }

    pub fn matches(&self, row: &DriftRow) -> bool {
        (self.categories.is_empty() || self.categories.contains(&row.category))
            && self
                .definition
                .as_deref()
                .is_none_or(|definition| contains_ignore_case(&row.definition, definition))
            && self.snapshot.is_none_or(|snapshot| snapshot == row.snapshot)
            && self.path.as_deref().is_none_or(|path| contains_ignore_case(&row.path, path))
            && self.window.contains(row.created_at)
    }
}

/// Raw query parameters of the drift report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecentDriftParams<'a> {
    pub category_id: Option<&'a str>,
    pub definition: Option<&'a str>,
    pub snapshot: Option<&'a str>,
    pub path: Option<&'a str>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub definition: String,
    pub snapshot: i32,
    pub category: DriftCategory,
    pub path: String,
    pub resource: ResourceRef,
}

impl ReportRow for DriftRow {
    const COLUMNS: &'static [Column] = &[
        column("Creation Time", "creationTime"),
        column("Definition", "definition"),
        column("Snapshot", "snapshot"),
        column("Category", "category"),
        column("Path", "path"),
        column("Resource", "resource"),
        column("Ancestry", "ancestry"),
        column("Details URL", "detailsUrl"),
    ];
    const XML_ELEMENT: &'static str = "drift";

    fn fields(&self, context: &ReportContext) -> Vec<String> {
        vec![
            format_time(self.created_at),
            self.definition.clone(),
            self.snapshot.to_string(),
            self.category.to_string(),
            self.path.clone(),
            self.resource.name.clone(),
            self.resource.ancestry_text(),
            context.resource_url(self.resource.id, &format!("Drift/History/{}", self.id)),
        ]
    }
}
