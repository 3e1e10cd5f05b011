//! Pagination types shared by list endpoints

use serde::{Deserialize, Serialize};

const MAX_LIMIT: u32 = 100;

/// Escape character for search patterns, portable across SQLite and MySQL
pub const LIKE_ESCAPE: char = '!';

/// `?page=&limit=&search=` query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Optional case-insensitive search term
    #[serde(default)]
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Clamp values coming straight from a query string
    pub fn normalized(self) -> Self {
        let search = self.search.filter(|s| !s.trim().is_empty());
        Self {
            search,
            ..Self::new(self.page, self.limit)
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit as i64
    }

    pub fn limit(&self) -> i64 {
        self.limit as i64
    }

    /// `LIKE` pattern for a lower-cased column, `%` when there is no search.
    ///
    /// Wildcards in the term are escaped with [`LIKE_ESCAPE`]; queries must
    /// use `LIKE ? ESCAPE '!'`.
    pub fn like_pattern(&self) -> String {
        match &self.search {
            Some(term) => {
                let mut pattern = String::from("%");
                for c in term.trim().to_lowercase().chars() {
                    if matches!(c, '%' | '_' | LIKE_ESCAPE) {
                        pattern.push(LIKE_ESCAPE);
                    }
                    pattern.push(c);
                }
                pattern.push('%');
                pattern
            }
            None => "%".to_string(),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let limit = params.limit.max(1);
        let total_pages = ((total.max(0) as u64 + limit as u64 - 1) / limit as u64) as u32;
        Self {
            items,
            total,
            page: params.page,
            limit: params.limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_clamping() {
        let params = ListParams::new(3, 20);
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);

        let clamped = ListParams::new(0, 10_000);
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.limit, MAX_LIMIT);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(ListParams::default().like_pattern(), "%");
        assert_eq!(
            ListParams::default().with_search(" Safra ").like_pattern(),
            "%safra%"
        );
        assert_eq!(
            ListParams::default().with_search("50%_off!").like_pattern(),
            "%50!%!_off!!%"
        );
    }

    #[test]
    fn test_blank_search_is_dropped() {
        let params = ListParams::default().with_search("   ").normalized();
        assert!(params.search.is_none());
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages, 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages, 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages, 2);
    }
}
