use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{ErrorKind, LibError};
use crate::models::{GroupId, NodeId, ResourceId, ResourceTypeId};
use crate::reports::definitions::RecentDriftParams;
use crate::reports::{
    AlertDefinitionCriteria, ConfigurationHistoryCriteria, DriftComplianceCriteria,
    InventoryDetailsCriteria, InventorySummaryCriteria, RecentAlertCriteria, RecentDriftCriteria,
    RecentOperationCriteria, ReportContext, ReportFormat, ReportKind, ReportSource, ReportStream,
    StreamOptions, SuspectMetricCriteria, start_report,
};
use crate::store::TreeSource;

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(kind = ?self.0.kind, error = %self.0.source, "console api request failed");
        (status, self.0.public).into_response()
    }
}

/// Application state the console routes need.
pub trait ConsoleApp {
    fn reports(&self) -> Arc<dyn ReportSource>;

    fn trees(&self) -> Arc<dyn TreeSource>;

    /// Fixed `<scheme>://<host>` for report detail links. Without one the
    /// request's `Host` header is used.
    fn public_url(&self) -> Option<String> {
        None
    }

    fn stream_options(&self) -> StreamOptions {
        StreamOptions::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub details: bool,
    pub resource_type_id: Option<i32>,
    pub version: Option<String>,
    pub alert_priority: Option<String>,
    pub operation_request_status: Option<String>,
    pub category_id: Option<String>,
    pub definition: Option<String>,
    pub snapshot: Option<String>,
    pub path: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTreeQuery {
    pub parent_id: Option<i32>,
    /// Comma-separated node ids already shown by the caller.
    pub rendered: Option<String>,
}

fn report_context<S: ConsoleApp>(app: &S, headers: &HeaderMap) -> ReportContext {
    if let Some(public_url) = app.public_url() {
        return ReportContext::new(public_url);
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let secure = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
    ReportContext::from_request(secure, host)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn open_report<S: ConsoleApp>(
    app: &S,
    kind: ReportKind,
    format: ReportFormat,
    query: &ReportQuery,
    context: ReportContext,
) -> crate::error::Result<ReportStream> {
    let reports = app.reports();
    let options = app.stream_options();
    let now = Utc::now();
    match kind {
        ReportKind::InventorySummary if query.details => {
            let criteria = InventoryDetailsCriteria {
                resource_type_id: query.resource_type_id.map(ResourceTypeId),
                version: non_blank(&query.version),
            };
            start_report(kind, format, criteria, reports, context, options).await
        }
        ReportKind::InventorySummary => {
            start_report(kind, format, InventorySummaryCriteria, reports, context, options).await
        }
        ReportKind::AlertDefinitions => {
            start_report(kind, format, AlertDefinitionCriteria, reports, context, options).await
        }
        ReportKind::ConfigurationHistory => {
            start_report(kind, format, ConfigurationHistoryCriteria, reports, context, options).await
        }
        ReportKind::DriftCompliance => {
            let criteria = DriftComplianceCriteria {
                resource_type_id: query.resource_type_id.map(ResourceTypeId),
                version: non_blank(&query.version),
            };
            start_report(kind, format, criteria, reports, context, options).await
        }
        ReportKind::SuspectMetrics => {
            start_report(kind, format, SuspectMetricCriteria, reports, context, options).await
        }
        ReportKind::RecentAlerts => {
            let criteria = RecentAlertCriteria::from_params(
                query.alert_priority.as_deref(),
                query.start_time,
                query.end_time,
                now,
            )?;
            start_report(kind, format, criteria, reports, context, options).await
        }
        ReportKind::RecentOperations => {
            let criteria = RecentOperationCriteria::from_params(
                query.operation_request_status.as_deref(),
                query.start_time,
                query.end_time,
                now,
            )?;
            start_report(kind, format, criteria, reports, context, options).await
        }
        ReportKind::RecentDrift => {
            let criteria = RecentDriftCriteria::from_params(
                RecentDriftParams {
                    category_id: query.category_id.as_deref(),
                    definition: query.definition.as_deref(),
                    snapshot: query.snapshot.as_deref(),
                    path: query.path.as_deref(),
                    start_time: query.start_time,
                    end_time: query.end_time,
                },
                now,
            )?;
            start_report(kind, format, criteria, reports, context, options).await
        }
    }
}

async fn report_handler<S>(
    State(app): State<S>,
    Path(name): Path<String>,
    Query(query): Query<ReportQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    S: ConsoleApp + Clone + Send + Sync + 'static,
{
    let kind: ReportKind = name.parse()?;
    let accept = headers
        .get(header::ACCEPT)
        .map(|value| {
            value.to_str().map_err(|err| {
                LibError::invalid("Accept header is not valid text", anyhow!(err))
            })
        })
        .transpose()?;
    let format = ReportFormat::negotiate(accept, kind)?;
    let context = report_context(&app, &headers);

    let stream = open_report(&app, kind, format, &query, context).await?;
    tracing::info!(report = %kind, format = ?format, "streaming report");
    Ok((
        [(header::CONTENT_TYPE, format.content_type())],
        Body::from_stream(stream),
    )
        .into_response())
}

fn parse_rendered(rendered: Option<&str>) -> Vec<NodeId> {
    rendered
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(NodeId::from)
        .collect()
}

async fn resource_tree_handler<S>(
    State(app): State<S>,
    Query(query): Query<ResourceTreeQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: ConsoleApp + Clone + Send + Sync + 'static,
{
    let rendered = parse_rendered(query.rendered.as_deref());
    let build = app
        .trees()
        .resource_tree(query.parent_id.map(ResourceId), rendered)
        .await?;
    Ok(Json(build))
}

async fn group_tree_handler<S>(
    State(app): State<S>,
    Path(group_id): Path<i32>,
) -> Result<impl IntoResponse, AppError>
where
    S: ConsoleApp + Clone + Send + Sync + 'static,
{
    let nodes = app.trees().group_tree(GroupId(group_id)).await?;
    Ok(Json(nodes))
}

pub fn routes<S>() -> Router<S>
where
    S: ConsoleApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /reports/{{name}} [GET]");
    tracing::info!("Registering route /tree/resources [GET]");
    tracing::info!("Registering route /tree/groups/{{group_id}} [GET]");
    tracing::info!("Registering route /{{name}} [GET]");

    Router::new()
        .route("/reports/{name}", get(report_handler::<S>))
        .route("/tree/resources", get(resource_tree_handler::<S>))
        .route("/tree/groups/{group_id}", get(group_tree_handler::<S>))
        // Older clients request reports at the root.
        .route("/{name}", get(report_handler::<S>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InventoryData, InventoryStore};
    use axum::http::HeaderValue;

    #[derive(Clone)]
    struct TestApp {
        store: Arc<InventoryStore>,
    }

    impl ConsoleApp for TestApp {
        fn reports(&self) -> Arc<dyn ReportSource> {
            self.store.clone()
        }

        fn trees(&self) -> Arc<dyn TreeSource> {
            self.store.clone()
        }

        fn public_url(&self) -> Option<String> {
            Some("https://console.example.com/".to_string())
        }
    }

    fn app() -> TestApp {
        TestApp {
            store: Arc::new(InventoryStore::new(InventoryData::demo(Utc::now()))),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    async fn get_report(name: &str, query: ReportQuery, accept: Option<&'static str>) -> Result<Response, AppError> {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(header::ACCEPT, HeaderValue::from_static(accept));
        }
        report_handler(State(app()), Path(name.to_string()), Query(query), headers).await
    }

    #[tokio::test]
    async fn csv_is_the_default_representation() {
        let response = get_report("inventorySummary", ReportQuery::default(), None)
            .await
            .expect("report");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");

        let body = body_text(response).await;
        let mut lines = body.lines();
        assert_eq!(
            lines.next(),
            Some("Resource Type,Plugin,Category,Version,Count")
        );
        assert!(lines.any(|line| line.starts_with("CPU,")));
    }

    #[tokio::test]
    async fn xml_on_a_csv_only_report_is_not_acceptable() {
        let err = get_report("recentAlerts", ReportQuery::default(), Some("application/xml"))
            .await
            .expect_err("406");
        assert_eq!(err.into_response().status(), StatusCode::NOT_ACCEPTABLE);

        let xml = get_report("suspectMetrics", ReportQuery::default(), Some("application/xml"))
            .await
            .expect("xml report");
        assert_eq!(xml.headers()[header::CONTENT_TYPE], "application/xml");
        assert!(body_text(xml).await.starts_with("<?xml"));
    }

    #[tokio::test]
    async fn unknown_reports_and_bad_filters_map_to_client_errors() {
        let missing = get_report("nope", ReportQuery::default(), None)
            .await
            .expect_err("404");
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let query = ReportQuery {
            alert_priority: Some("urgent".into()),
            ..ReportQuery::default()
        };
        let invalid = get_report("recentAlerts", query, None).await.expect_err("400");
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn detail_links_use_the_configured_public_url() {
        let response = get_report("suspectMetrics", ReportQuery::default(), None)
            .await
            .expect("report");
        let body = body_text(response).await;
        assert!(body.contains("https://console.example.com/coregui/#Resource/"));
    }

    #[test]
    fn host_header_builds_the_context_without_a_public_url() {
        #[derive(Clone)]
        struct HostOnly(TestApp);
        impl ConsoleApp for HostOnly {
            fn reports(&self) -> Arc<dyn ReportSource> {
                self.0.reports()
            }
            fn trees(&self) -> Arc<dyn TreeSource> {
                self.0.trees()
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("rhq:7080"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let context = report_context(&HostOnly(app()), &headers);
        assert_eq!(context.console_url(), "https://rhq:7080/coregui");
    }

    #[test]
    fn rendered_ids_split_on_commas() {
        assert_eq!(
            parse_rendered(Some("10001, subcat_1_10001,,")),
            vec![NodeId::from("10001"), NodeId::from("subcat_1_10001")]
        );
        assert!(parse_rendered(None).is_empty());
    }

    #[tokio::test]
    async fn tree_routes_return_json_batches() {
        let response = resource_tree_handler(State(app()), Query(ResourceTreeQuery::default()))
            .await
            .expect("tree")
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert!(json["nodes"].as_array().is_some_and(|nodes| !nodes.is_empty()));

        let missing = group_tree_handler(State(app()), Path(999))
            .await
            .err()
            .expect("404");
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
