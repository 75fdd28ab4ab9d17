//! Pagination for record list queries

/// Page size when the caller gives none
pub const DEFAULT_LIMIT: i64 = 25;

/// Largest page size a caller may request
pub const MAX_LIMIT: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page after clamping
    pub limit: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Clamp a requested page size into `[1, MAX_LIMIT]`
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Calculate pagination metadata from total results and requested page
///
/// Page is kept within `[1, total_pages]`.
///
/// # Examples
/// ```
/// use casedesk_records::pagination::calculate_pagination;
///
/// // 60 results at 25 per page = 3 pages
/// let p = calculate_pagination(60, 2, 25);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 25);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(60, 99, 25);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 50);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, limit: i64) -> Pagination {
    let limit = limit.max(1);
    let total_pages = (total_results + limit - 1) / limit;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * limit;

    Pagination {
        page,
        limit,
        total_pages,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn test_pagination_out_of_bounds() {
        let p = calculate_pagination(30, 99, 25);
        assert_eq!(p.page, 2);
        assert_eq!(p.offset, 25);

        let p = calculate_pagination(30, 0, 25);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1, 25);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(500)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(40)), 40);
    }
}
