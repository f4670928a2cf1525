use crate::domain::policy::FailurePolicy;
use crate::utils::error::{HarvestError, Result};
use async_trait::async_trait;
use std::collections::HashSet;

/// 一頁游標分頁結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[async_trait]
pub trait CursorSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, after: Option<&str>) -> Result<CursorPage<Self::Item>>;
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationLimits {
    pub max_pages: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            max_pages: None,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

/// 依序取回所有頁面並按收到的順序串接
///
/// `hasNextPage` 為 false 之後不再發出查詢。認證錯誤一律中止；
/// 其他錯誤在 `Skip` 模式下保留已取得的頁面並停止。
pub async fn collect_all<S: CursorSource>(
    source: &S,
    limits: PaginationLimits,
) -> Result<Vec<S::Item>> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = match source.fetch_page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e @ HarvestError::AuthError { .. }) => return Err(e),
            Err(e) => {
                let item = format!("page {}", pages + 1);
                limits.failure_policy.absorb(e, &item)?;
                tracing::warn!(
                    "⚠️  Pagination stopped early with {} records from {} pages",
                    items.len(),
                    pages
                );
                break;
            }
        };

        pages += 1;
        tracing::info!(
            "📄 Page {}: {} records (has next: {})",
            pages,
            page.items.len(),
            page.has_next_page
        );
        items.extend(page.items);

        if !page.has_next_page {
            break;
        }

        let next = page
            .end_cursor
            .ok_or_else(|| HarvestError::query("hasNextPage is true but endCursor is missing"))?;
        if !seen_cursors.insert(next.clone()) {
            return Err(HarvestError::query(format!(
                "cursor '{}' repeated; pagination is not advancing",
                next
            )));
        }

        if limits.max_pages.is_some_and(|max| pages >= max) {
            tracing::warn!("Reached max_pages ({}), stopping pagination", pages);
            break;
        }

        cursor = Some(next);
    }

    Ok(items)
}
