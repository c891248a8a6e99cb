use sea_orm::{DatabaseConnection, PaginatorTrait, SelectorTrait};
use serde::Serialize;

use crate::error::AppResult;

/// One page of a list, with enough metadata to render pager links.
///
/// Out-of-range pages are not an error: page numbers below 1 are treated as
/// 1, and pages past the end come back empty.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u64>,
    pub next_num: Option<u64>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let page = page.max(1);
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        let has_prev = page > 1;
        let has_next = page < pages;

        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
            prev_num: self.prev_num,
            next_num: self.next_num,
        }
    }
}

/// Whether `page` (1-based) starts before the end of `total` rows.
///
/// Page numbers come from the URL, so the offset is computed without overflow.
#[must_use]
pub fn page_in_range(page: u64, per_page: u64, total: u64) -> bool {
    page.checked_sub(1)
        .and_then(|before| before.checked_mul(per_page))
        .is_some_and(|offset| offset < total)
}

/// Run a paginated query: one `COUNT` plus one `LIMIT/OFFSET` fetch.
///
/// # Errors
///
/// Returns `AppError::Database` if either query fails.
pub async fn paginate<'db, Q>(
    db: &'db DatabaseConnection,
    query: Q,
    page: u64,
    per_page: u64,
) -> AppResult<Page<<Q::Selector as SelectorTrait>::Item>>
where
    Q: PaginatorTrait<'db, DatabaseConnection>,
{
    let page = page.max(1);
    let per_page = per_page.max(1);

    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = if page_in_range(page, per_page, total) {
        paginator.fetch_page(page - 1).await?
    } else {
        Vec::new()
    };

    Ok(Page::new(items, page, per_page, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_several_pages() {
        let page = Page::new(vec![1, 2], 1, 2, 5);
        assert_eq!(page.pages, 3);
        assert!(!page.has_prev);
        assert!(page.has_next);
        assert_eq!(page.prev_num, None);
        assert_eq!(page.next_num, Some(2));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::new(vec![5], 3, 2, 5);
        assert!(page.has_prev);
        assert!(!page.has_next);
        assert_eq!(page.prev_num, Some(2));
    }

    #[test]
    fn page_below_one_is_clamped() {
        let page: Page<i32> = Page::new(Vec::new(), 0, 20, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 0);
        assert!(!page.has_next);
    }

    #[test]
    fn page_past_the_end_is_empty_but_valid() {
        let page: Page<i32> = Page::new(Vec::new(), 9, 20, 30);
        assert_eq!(page.pages, 2);
        assert!(page.has_prev);
        assert!(!page.has_next);
        assert_eq!(page.prev_num, Some(8));
    }

    #[test]
    fn offsets_that_overflow_are_out_of_range() {
        assert!(page_in_range(1, 20, 5));
        assert!(!page_in_range(2, 20, 5));
        assert!(!page_in_range(0, 20, 5));
        assert!(!page_in_range(u64::MAX, 20, 5));
        // (2^62 + 1 - 1) * 20 would wrap to 0
        assert!(!page_in_range((1 << 62) + 1, 20, 5));
    }

    #[test]
    fn huge_page_number_is_labelled_as_requested() {
        let page: Page<i32> = Page::new(Vec::new(), u64::MAX, 20, 5);
        assert_eq!(page.pages, 1);
        assert!(!page.has_next);
        assert_eq!(page.prev_num, Some(u64::MAX - 1));
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2, 3], 2, 3, 9).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20, 30]);
        assert_eq!(page.page, 2);
        assert_eq!(page.pages, 3);
    }
}
