use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use prodsplit_core::ExtractError;

use crate::pdf::parse_pdf;
use crate::pool::PagePool;

/// Page-level access to a production document.
///
/// Pages are 0-indexed; ranges are inclusive on both ends.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn page_count(&self) -> Result<usize, ExtractError>;

    /// Text of pages `start_page..=end_page`, joined with blank lines.
    /// Fails with `PageRangeInvalid` when `start_page > end_page` or
    /// either index is outside `[0, page_count)`.
    async fn extract_text(&self, start_page: usize, end_page: usize)
        -> Result<String, ExtractError>;
}

/// [`PageSource`] backed by a parsed PDF.
///
/// The document is parsed exactly once, on the pool, at load time;
/// range extraction also runs on the pool so large joins cannot stall
/// the orchestration loop.
pub struct PdfPageSource {
    pages: Arc<Vec<String>>,
    pool: PagePool,
}

impl PdfPageSource {
    pub async fn load(bytes: Vec<u8>, pool: PagePool) -> Result<Self, ExtractError> {
        let pages = pool.run(move || parse_pdf(&bytes)).await??;
        debug!(pages = pages.len(), "parsed production PDF");
        Ok(Self {
            pages: Arc::new(pages),
            pool,
        })
    }

    fn check_range(&self, start_page: usize, end_page: usize) -> Result<(), ExtractError> {
        let total = self.pages.len();
        if start_page > end_page || end_page >= total {
            return Err(ExtractError::PageRangeInvalid {
                start: start_page,
                end: end_page,
                total,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PageSource for PdfPageSource {
    async fn page_count(&self) -> Result<usize, ExtractError> {
        Ok(self.pages.len())
    }

    async fn extract_text(
        &self,
        start_page: usize,
        end_page: usize,
    ) -> Result<String, ExtractError> {
        self.check_range(start_page, end_page)?;
        let pages = self.pages.clone();
        self.pool
            .run(move || pages[start_page..=end_page].join("\n\n"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pages: &[&str]) -> PdfPageSource {
        PdfPageSource {
            pages: Arc::new(pages.iter().map(|p| p.to_string()).collect()),
            pool: PagePool::new(2),
        }
    }

    #[tokio::test]
    async fn page_count_reports_all_pages() {
        let src = source(&["one", "two", "three"]);
        assert_eq!(src.page_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn extracts_inclusive_range() {
        let src = source(&["one", "two", "three"]);
        let text = src.extract_text(0, 1).await.unwrap();
        assert_eq!(text, "one\n\ntwo");
    }

    #[tokio::test]
    async fn inverted_range_is_invalid() {
        let src = source(&["one", "two"]);
        let err = src.extract_text(1, 0).await.unwrap_err();
        assert!(matches!(err, ExtractError::PageRangeInvalid { .. }));
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_invalid() {
        let src = source(&["one", "two"]);
        let err = src.extract_text(0, 2).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::PageRangeInvalid { total: 2, .. }
        ));
    }
}
