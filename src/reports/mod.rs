//! Streaming CSV/XML reports over paged criteria queries.

pub mod alerts;
pub mod csv;
pub mod definitions;
pub mod query;
pub mod stream;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::Serialize;

use crate::error::{LibError, Result};
use crate::models::ResourceId;

pub use self::csv::{CsvStyle, CsvWriter};
pub use self::definitions::{
    AlertDefinitionCriteria, ConfigurationHistoryCriteria, DriftComplianceCriteria,
    InventoryDetailsCriteria, InventorySummaryCriteria, RecentAlertCriteria, RecentDriftCriteria,
    RecentOperationCriteria, SuspectMetricCriteria,
};
pub use self::query::{Criteria, CriteriaExecutor, CriteriaQuery, PageControl, PageList};
pub use self::stream::{ReportStream, StreamOptions, start_report};

/// Every report the console can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    InventorySummary,
    AlertDefinitions,
    ConfigurationHistory,
    DriftCompliance,
    SuspectMetrics,
    RecentAlerts,
    RecentOperations,
    RecentDrift,
}

pub const ALL_REPORTS: [ReportKind; 8] = [
    ReportKind::InventorySummary,
    ReportKind::AlertDefinitions,
    ReportKind::ConfigurationHistory,
    ReportKind::DriftCompliance,
    ReportKind::SuspectMetrics,
    ReportKind::RecentAlerts,
    ReportKind::RecentOperations,
    ReportKind::RecentDrift,
];

impl ReportKind {
    pub const fn path(self) -> &'static str {
        match self {
            ReportKind::InventorySummary => "inventorySummary",
            ReportKind::AlertDefinitions => "alertDefinitions",
            ReportKind::ConfigurationHistory => "configurationHistory",
            ReportKind::DriftCompliance => "driftCompliance",
            ReportKind::SuspectMetrics => "suspectMetrics",
            ReportKind::RecentAlerts => "recentAlerts",
            ReportKind::RecentOperations => "recentOperations",
            ReportKind::RecentDrift => "recentDrift",
        }
    }

    pub const fn supports_xml(self) -> bool {
        matches!(
            self,
            ReportKind::InventorySummary | ReportKind::AlertDefinitions | ReportKind::SuspectMetrics
        )
    }

    pub const fn csv_style(self) -> CsvStyle {
        match self {
            ReportKind::ConfigurationHistory => CsvStyle::Quote,
            _ => CsvStyle::Sanitize,
        }
    }

    /// Root element of the XML document.
    pub const fn xml_root(self) -> &'static str {
        match self {
            ReportKind::InventorySummary => "inventorySummary",
            ReportKind::AlertDefinitions => "alertDefinitions",
            ReportKind::SuspectMetrics => "suspectMetrics",
            ReportKind::ConfigurationHistory => "configurationHistory",
            ReportKind::DriftCompliance => "driftCompliance",
            ReportKind::RecentAlerts => "recentAlerts",
            ReportKind::RecentOperations => "recentOperations",
            ReportKind::RecentDrift => "recentDrift",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for ReportKind {
    type Err = LibError;

    fn from_str(value: &str) -> Result<Self> {
        ALL_REPORTS
            .into_iter()
            .find(|kind| kind.path() == value)
            .ok_or_else(|| LibError::not_found("Report not found", anyhow!("no report named {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Xml,
}

impl ReportFormat {
    pub const fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv",
            ReportFormat::Xml => "application/xml",
        }
    }

    /// Picks the representation for an `Accept` header, honouring q-values.
    ///
    /// A missing header means CSV. Asking only for XML from a CSV-only report,
    /// or for nothing we produce, is `NotAcceptable`.
    pub fn negotiate(accept: Option<&str>, kind: ReportKind) -> Result<Self> {
        let Some(accept) = accept.filter(|value| !value.trim().is_empty()) else {
            return Ok(ReportFormat::Csv);
        };

        let mut ranges: Vec<(f32, usize, &str)> = accept
            .split(',')
            .enumerate()
            .filter_map(|(index, range)| {
                let mut parts = range.split(';');
                let media = parts.next()?.trim();
                let quality = parts
                    .filter_map(|param| param.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((quality, index, media))
            })
            .collect();
        ranges.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        for (_, _, media) in ranges {
            match media.to_ascii_lowercase().as_str() {
                "text/csv" | "text/*" | "*/*" => return Ok(ReportFormat::Csv),
                "application/xml" | "text/xml" | "application/*" if kind.supports_xml() => {
                    return Ok(ReportFormat::Xml);
                }
                _ => {}
            }
        }

        Err(LibError::not_acceptable(
            "Requested representation is not available for this report",
            anyhow!("report {kind} cannot satisfy Accept: {accept}"),
        ))
    }
}

/// Where detail links in a report point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    base_url: String,
}

impl ReportContext {
    /// `base_url` is `<scheme>://<host>[:port]`; a trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_request(secure: bool, host: &str) -> Self {
        let scheme = if secure { "https" } else { "http" };
        Self::new(format!("{scheme}://{host}"))
    }

    pub fn console_url(&self) -> String {
        format!("{}/coregui", self.base_url)
    }

    pub fn detail_url(&self, fragment: &str) -> String {
        format!("{}/#{fragment}", self.console_url())
    }

    pub fn resource_url(&self, id: ResourceId, suffix: &str) -> String {
        if suffix.is_empty() {
            self.detail_url(&format!("Resource/{id}"))
        } else {
            self.detail_url(&format!("Resource/{id}/{suffix}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub tag: &'static str,
}

pub const fn column(header: &'static str, tag: &'static str) -> Column {
    Column { header, tag }
}

/// A row type that can be written as one report line.
pub trait ReportRow: Send + 'static {
    const COLUMNS: &'static [Column];
    /// Element name of one row in the XML representation.
    const XML_ELEMENT: &'static str;

    fn fields(&self, context: &ReportContext) -> Vec<String>;
}

pub fn headers<R: ReportRow>() -> Vec<&'static str> {
    R::COLUMNS.iter().map(|column| column.header).collect()
}

pub fn xml_tags<R: ReportRow>() -> Vec<&'static str> {
    R::COLUMNS.iter().map(|column| column.tag).collect()
}

/// Storage able to answer every report query.
pub trait ReportSource:
    CriteriaExecutor<InventorySummaryCriteria>
    + CriteriaExecutor<InventoryDetailsCriteria>
    + CriteriaExecutor<AlertDefinitionCriteria>
    + CriteriaExecutor<ConfigurationHistoryCriteria>
    + CriteriaExecutor<DriftComplianceCriteria>
    + CriteriaExecutor<SuspectMetricCriteria>
    + CriteriaExecutor<RecentAlertCriteria>
    + CriteriaExecutor<RecentOperationCriteria>
    + CriteriaExecutor<RecentDriftCriteria>
{
}

impl<T> ReportSource for T where
    T: CriteriaExecutor<InventorySummaryCriteria>
        + CriteriaExecutor<InventoryDetailsCriteria>
        + CriteriaExecutor<AlertDefinitionCriteria>
        + CriteriaExecutor<ConfigurationHistoryCriteria>
        + CriteriaExecutor<DriftComplianceCriteria>
        + CriteriaExecutor<SuspectMetricCriteria>
        + CriteriaExecutor<RecentAlertCriteria>
        + CriteriaExecutor<RecentOperationCriteria>
        + CriteriaExecutor<RecentDriftCriteria>
        + ?Sized
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn report_names_round_trip_and_unknown_is_not_found() {
        for kind in ALL_REPORTS {
            assert_eq!(kind.path().parse::<ReportKind>().expect("known"), kind);
        }
        let err = "bogus".parse::<ReportKind>().expect_err("unknown");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn negotiation_prefers_quality_then_order() {
        let inventory = ReportKind::InventorySummary;
        assert_eq!(ReportFormat::negotiate(None, inventory).expect("csv"), ReportFormat::Csv);
        assert_eq!(
            ReportFormat::negotiate(Some("application/xml"), inventory).expect("xml"),
            ReportFormat::Xml
        );
        assert_eq!(
            ReportFormat::negotiate(Some("text/csv;q=0.5, application/xml"), inventory).expect("xml"),
            ReportFormat::Xml
        );
        assert_eq!(
            ReportFormat::negotiate(Some("application/xml;q=0.2, */*"), inventory).expect("csv"),
            ReportFormat::Csv
        );
    }

    #[test]
    fn xml_only_request_on_csv_report_is_not_acceptable() {
        let err = ReportFormat::negotiate(Some("application/xml"), ReportKind::RecentAlerts)
            .expect_err("csv only");
        assert_eq!(err.kind, ErrorKind::NotAcceptable);

        assert_eq!(
            ReportFormat::negotiate(Some("application/xml, text/csv;q=0.1"), ReportKind::RecentAlerts)
                .expect("falls back"),
            ReportFormat::Csv
        );
        assert!(ReportFormat::negotiate(Some("application/json"), ReportKind::InventorySummary).is_err());
    }

    #[test]
    fn detail_urls_point_into_the_console() {
        let context = ReportContext::from_request(true, "rhq.example.com:7443");
        assert_eq!(
            context.resource_url(ResourceId(10001), "Alerts/History/7"),
            "https://rhq.example.com:7443/coregui/#Resource/10001/Alerts/History/7"
        );
        assert_eq!(ReportContext::new("http://a/").console_url(), "http://a/coregui");
    }
}
