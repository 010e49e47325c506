//! Pagination for company filing lists (100 rows/page)

pub const PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET
    pub offset: i64,
}

/// Clamp the requested page into [1, total_pages] and compute the offset
///
/// ```
/// use bvi_reader::pagination::calculate_pagination;
///
/// let p = calculate_pagination(250, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));

    Pagination {
        page,
        total_pages,
        offset: (page - 1) * PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_middle_page() {
        let p = calculate_pagination(250, 2);
        assert_eq!(p, Pagination { page: 2, total_pages: 3, offset: 100 });
    }

    #[test]
    fn test_pagination_clamps_low() {
        let p = calculate_pagination(150, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 5);
        assert_eq!(p, Pagination { page: 1, total_pages: 0, offset: 0 });
    }

    #[test]
    fn test_pagination_exact_boundary() {
        let p = calculate_pagination(200, 3);
        assert_eq!(p, Pagination { page: 2, total_pages: 2, offset: 100 });
    }
}
