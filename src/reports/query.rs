use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::error::Result;

pub const DEFAULT_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageControl {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageControl {
    pub fn first(page_size: u32) -> Self {
        Self {
            page_number: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn next(self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            page_size: self.page_size,
        }
    }

    pub fn offset(self) -> u64 {
        u64::from(self.page_number) * u64::from(self.page_size)
    }
}

/// One page of a criteria query result.
#[derive(Debug, Clone, PartialEq)]
pub struct PageList<T> {
    pub items: Vec<T>,
    pub page_control: PageControl,
    /// Total matching rows when the executor knows it.
    pub total_size: Option<u64>,
}

impl<T> PageList<T> {
    pub fn new(items: Vec<T>, page_control: PageControl, total_size: Option<u64>) -> Self {
        Self {
            items,
            page_control,
            total_size,
        }
    }

    /// Slices `rows` according to `page_control`.
    pub fn from_rows(rows: Vec<T>, page_control: PageControl) -> Self {
        let total = rows.len() as u64;
        let offset = usize::try_from(page_control.offset()).unwrap_or(usize::MAX);
        let items = rows
            .into_iter()
            .skip(offset)
            .take(page_control.page_size as usize)
            .collect();
        Self::new(items, page_control, Some(total))
    }

    fn is_last(&self) -> bool {
        if self.items.len() < self.page_control.page_size as usize {
            return true;
        }
        self.total_size.is_some_and(|total| {
            self.page_control.offset() + self.items.len() as u64 >= total
        })
    }
}

/// Filter and sort specification for one report query.
pub trait Criteria: Clone + Send + Sync + 'static {
    type Row: Send + 'static;

    /// Name used in logs.
    const NAME: &'static str;
}

#[async_trait]
pub trait CriteriaExecutor<C: Criteria>: Send + Sync {
    async fn execute(&self, criteria: &C, page: PageControl) -> Result<PageList<C::Row>>;
}

/// Lazily pages through every row matching a criteria.
pub struct CriteriaQuery<C, E: ?Sized> {
    criteria: C,
    executor: Arc<E>,
    page_size: u32,
}

impl<C, E> CriteriaQuery<C, E>
where
    C: Criteria,
    E: CriteriaExecutor<C> + ?Sized + 'static,
{
    pub fn new(criteria: C, executor: Arc<E>) -> Self {
        Self {
            criteria,
            executor,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches the first page eagerly so callers can fail before output starts.
    pub async fn start(self) -> Result<QueryCursor<C, E>> {
        let page = PageControl::first(self.page_size);
        let first = self.executor.execute(&self.criteria, page).await?;
        tracing::debug!(
            criteria = C::NAME,
            rows = first.items.len(),
            total = ?first.total_size,
            "fetched first report page"
        );
        Ok(QueryCursor {
            criteria: self.criteria,
            executor: self.executor,
            first,
        })
    }

    pub fn stream(self) -> impl Stream<Item = Result<C::Row>> + Send
    where
        C::Row: Send,
    {
        try_stream! {
            let cursor = self.start().await?;
            for await row in cursor.into_stream() {
                yield row?;
            }
        }
    }
}

/// A started query holding its first page.
pub struct QueryCursor<C: Criteria, E: ?Sized> {
    criteria: C,
    executor: Arc<E>,
    first: PageList<C::Row>,
}

impl<C, E> QueryCursor<C, E>
where
    C: Criteria,
    E: CriteriaExecutor<C> + ?Sized + 'static,
{
    pub fn into_stream(self) -> impl Stream<Item = Result<C::Row>> + Send {
        let QueryCursor {
            criteria,
            executor,
            first,
        } = self;

        try_stream! {
            let mut page = first;
            loop {
                let last = page.is_last();
                let control = page.page_control;
                for row in page.items {
                    yield row;
                }
                if last {
                    break;
                }
                page = executor.execute(&criteria, control.next()).await?;
                tracing::trace!(criteria = C::NAME, page = control.next().page_number, "fetched report page");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::error::{ErrorKind, LibError};

    #[derive(Clone)]
    struct Numbers {
        upto: u32,
    }

    impl Criteria for Numbers {
        type Row = u32;
        const NAME: &'static str = "numbers";
    }

    #[derive(Default)]
    struct Executor {
        pages: Mutex<Vec<u32>>,
        fail_on_page: Option<u32>,
        report_total: bool,
    }

    #[async_trait]
    impl CriteriaExecutor<Numbers> for Executor {
        async fn execute(&self, criteria: &Numbers, page: PageControl) -> Result<PageList<u32>> {
            self.pages.lock().expect("pages").push(page.page_number);
            if self.fail_on_page == Some(page.page_number) {
                return Err(LibError::database("Query failed", anyhow!("boom")));
            }
            let rows: Vec<u32> = (0..criteria.upto).collect();
            let mut list = PageList::from_rows(rows, page);
            if !self.report_total {
                list.total_size = None;
            }
            Ok(list)
        }
    }

    #[tokio::test]
    async fn stream_walks_every_page_in_order() {
        let executor = Arc::new(Executor {
            report_total: true,
            ..Executor::default()
        });
        let rows: Vec<u32> = CriteriaQuery::new(Numbers { upto: 7 }, executor.clone())
            .with_page_size(3)
            .stream()
            .collect::<Result<Vec<_>>>()
            .await
            .expect("rows");

        assert_eq!(rows, (0..7).collect::<Vec<_>>());
        assert_eq!(*executor.pages.lock().expect("pages"), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn exact_multiple_without_total_needs_an_empty_page() {
        let executor = Arc::new(Executor::default());
        let rows: Vec<u32> = CriteriaQuery::new(Numbers { upto: 4 }, executor.clone())
            .with_page_size(2)
            .stream()
            .collect::<Result<Vec<_>>>()
            .await
            .expect("rows");

        assert_eq!(rows.len(), 4);
        assert_eq!(*executor.pages.lock().expect("pages"), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn first_page_failure_surfaces_before_any_row() {
        let executor = Arc::new(Executor {
            fail_on_page: Some(0),
            ..Executor::default()
        });
        let err = CriteriaQuery::new(Numbers { upto: 4 }, executor)
            .start()
            .await
            .err()
            .expect("first page fails");
        assert_eq!(err.kind, ErrorKind::Database);
    }

    #[tokio::test]
    async fn later_failure_ends_the_stream_after_earlier_rows() {
        let executor = Arc::new(Executor {
            fail_on_page: Some(1),
            ..Executor::default()
        });
        let results: Vec<Result<u32>> = CriteriaQuery::new(Numbers { upto: 10 }, executor)
            .with_page_size(4)
            .stream()
            .collect()
            .await;

        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(|row| row.is_ok()));
        assert!(results[4].is_err());
    }
}
