use std::pin::pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use super::csv::CsvWriter;
use super::query::{Criteria, CriteriaExecutor, CriteriaQuery};
use super::{ReportContext, ReportFormat, ReportKind, ReportRow, headers, xml, xml_tags};
use crate::config::{DEFAULT_REPORT_CHANNEL_CAPACITY, DEFAULT_REPORT_PAGE_SIZE};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub page_size: u32,
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_REPORT_PAGE_SIZE as u32,
            channel_capacity: DEFAULT_REPORT_CHANNEL_CAPACITY,
        }
    }
}

/// Rendered report chunks in output order. An `Err` is always the last item.
pub type ReportStream = ReceiverStream<Result<String>>;

/// Runs a report query and streams its rendered output.
///
/// The first page is fetched before returning, so a failing query is an
/// error here rather than a truncated body. Later pages are fetched by a
/// spawned task that stops when the receiver is dropped.
pub async fn start_report<C, E>(
    kind: ReportKind,
    format: ReportFormat,
    criteria: C,
    executor: Arc<E>,
    context: ReportContext,
    options: StreamOptions,
) -> Result<ReportStream>
where
    C: Criteria,
    C::Row: ReportRow,
    E: CriteriaExecutor<C> + ?Sized + 'static,
{
    let cursor = CriteriaQuery::new(criteria, executor)
        .with_page_size(options.page_size)
        .start()
        .await?;

    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    tokio::spawn(async move {
        let writer = CsvWriter::new(kind.csv_style());
        let tags = xml_tags::<C::Row>();
        let opening = match format {
            ReportFormat::Csv => writer.header_line(&headers::<C::Row>()),
            ReportFormat::Xml => xml::open_document(kind.xml_root()),
        };
        if tx.send(Ok(opening)).await.is_err() {
            return;
        }

        let mut rows = pin!(cursor.into_stream());
        let mut written = 0usize;
        while let Some(row) = rows.next().await {
            let chunk = match row {
                Ok(row) => {
                    let fields = row.fields(&context);
                    match format {
                        ReportFormat::Csv => writer.line(&fields),
                        ReportFormat::Xml => xml::element(C::Row::XML_ELEMENT, &tags, &fields),
                    }
                }
                Err(err) => {
                    tracing::error!(report = %kind, rows = written, error = %err, "report stream failed");
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            };
            if tx.send(Ok(chunk)).await.is_err() {
                tracing::debug!(report = %kind, rows = written, "report client went away");
                return;
            }
            written += 1;
        }

        if format == ReportFormat::Xml && tx.send(Ok(xml::close_document(kind.xml_root()))).await.is_err() {
            return;
        }
        tracing::info!(report = %kind, rows = written, "report streamed");
    });

    Ok(ReceiverStream::new(rx))
}

/// Collects a whole report into memory.
pub async fn collect_report(stream: ReportStream) -> Result<String> {
    let mut stream = stream;
    let mut body = String::new();
    while let Some(chunk) = stream.next().await {
        body.push_str(&chunk?);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::{ErrorKind, LibError};
    use crate::models::{ResourceCategory, ResourceId, ResourceTypeId};
    use crate::reports::definitions::{
        ConfigurationHistoryCriteria, ConfigurationUpdateRow, ConfigurationUpdateStatus, ResourceRef,
        TypeCountRow,
    };
    use crate::reports::{InventorySummaryCriteria, PageControl, PageList};

    struct Rows {
        types: Vec<TypeCountRow>,
        fail_after_first_page: bool,
    }

    #[async_trait]
    impl CriteriaExecutor<InventorySummaryCriteria> for Rows {
        async fn execute(
            &self,
            _criteria: &InventorySummaryCriteria,
            page: PageControl,
        ) -> Result<PageList<TypeCountRow>> {
            if self.fail_after_first_page && page.page_number > 0 {
                return Err(LibError::database("Query failed", anyhow!("connection reset")));
            }
            Ok(PageList::from_rows(self.types.clone(), page))
        }
    }

    #[async_trait]
    impl CriteriaExecutor<ConfigurationHistoryCriteria> for Rows {
        async fn execute(
            &self,
            _criteria: &ConfigurationHistoryCriteria,
            page: PageControl,
        ) -> Result<PageList<ConfigurationUpdateRow>> {
            let submitted = Utc.timestamp_millis_opt(0).single().expect("time");
            let row = ConfigurationUpdateRow {
                version: 3,
                resource: ResourceRef {
                    id: ResourceId(5),
                    name: "db, primary".to_string(),
                    ancestry: None,
                },
                submitted_at: submitted,
                completed_at: None,
                status: ConfigurationUpdateStatus::Success,
                user: Some("rhqadmin".to_string()),
            };
            Ok(PageList::from_rows(vec![row], page))
        }
    }

    fn type_row(name: &str, count: u64) -> TypeCountRow {
        TypeCountRow {
            type_id: ResourceTypeId(1),
            type_name: name.to_string(),
            plugin: "JBossAS".to_string(),
            category: ResourceCategory::Server,
            version: Some("7.1".to_string()),
            count,
        }
    }

    fn options(page_size: u32) -> StreamOptions {
        StreamOptions {
            page_size,
            channel_capacity: 2,
        }
    }

    #[tokio::test]
    async fn csv_has_header_then_one_line_per_row() {
        let rows = Arc::new(Rows {
            types: vec![type_row("JBoss, AS", 2), type_row("Tomcat", 1), type_row("Linux", 4)],
            fail_after_first_page: false,
        });
        let stream = start_report(
            ReportKind::InventorySummary,
            ReportFormat::Csv,
            InventorySummaryCriteria,
            rows,
            ReportContext::new("http://localhost:7080"),
            options(2),
        )
        .await
        .expect("started");

        let body = collect_report(stream).await.expect("body");
        assert_eq!(
            body,
            "Resource Type,Plugin,Category,Version,Count\n\
             JBoss  AS,JBossAS,Server,7.1,2\n\
             Tomcat,JBossAS,Server,7.1,1\n\
             Linux,JBossAS,Server,7.1,4\n"
        );
    }

    #[tokio::test]
    async fn xml_wraps_rows_in_a_document() {
        let rows = Arc::new(Rows {
            types: vec![type_row("Tomcat", 1)],
            fail_after_first_page: false,
        });
        let stream = start_report(
            ReportKind::InventorySummary,
            ReportFormat::Xml,
            InventorySummaryCriteria,
            rows,
            ReportContext::new("http://localhost:7080"),
            StreamOptions::default(),
        )
        .await
        .expect("started");

        let body = collect_report(stream).await.expect("body");
        assert!(body.starts_with("<?xml"));
        assert!(body.contains("<resourceTypeCount><resourceType>Tomcat</resourceType>"));
        assert!(body.ends_with("</inventorySummary>\n"));
    }

    #[tokio::test]
    async fn configuration_history_quotes_instead_of_sanitizing() {
        let rows = Arc::new(Rows {
            types: Vec::new(),
            fail_after_first_page: false,
        });
        let stream = start_report(
            ReportKind::ConfigurationHistory,
            ReportFormat::Csv,
            ConfigurationHistoryCriteria,
            rows,
            ReportContext::new("http://localhost:7080"),
            StreamOptions::default(),
        )
        .await
        .expect("started");

        let body = collect_report(stream).await.expect("body");
        let line = body.lines().nth(1).expect("row");
        assert!(line.starts_with("\"db, primary\",,3,1970-01-01 00:00:00,,Success,rhqadmin,"));
    }

    #[tokio::test]
    async fn failure_after_output_started_ends_the_stream() {
        let rows = Arc::new(Rows {
            types: vec![type_row("A", 1), type_row("B", 1), type_row("C", 1)],
            fail_after_first_page: true,
        });
        let mut stream = start_report(
            ReportKind::InventorySummary,
            ReportFormat::Csv,
            InventorySummaryCriteria,
            rows,
            ReportContext::new("http://localhost:7080"),
            options(2),
        )
        .await
        .expect("first page succeeds");

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|chunk| chunk.is_ok()));
        let err = chunks[3].as_ref().expect_err("terminal error");
        assert_eq!(err.kind, ErrorKind::Database);
    }
}
