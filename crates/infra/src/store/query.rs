//! Listing parameters and paged results.
//!
//! Sort columns are an explicit allow-list; raw caller input never reaches SQL.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Sortable transaction columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    TransactionDate,
    TotalAmount,
    Id,
}

impl SortKey {
    /// Parse a caller-supplied key; anything outside the allow-list falls back
    /// to `created_at`.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("transaction_date") => Self::TransactionDate,
            Some("total_amount") => Self::TotalAmount,
            Some("id") => Self::Id,
            _ => Self::CreatedAt,
        }
    }

    /// Column name on the `transactions` table.
    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::TransactionDate => "transaction_date",
            Self::TotalAmount => "total_amount",
            Self::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `asc` (any case) is ascending; everything else is the descending default.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Normalized listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub order: SortDirection,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            sort_by: SortKey::default(),
            order: SortDirection::default(),
        }
    }
}

impl ListQuery {
    /// Build a query from raw caller values.
    ///
    /// Page below 1 becomes 1; limit below 1 becomes the default and is
    /// capped at `MAX_PAGE_SIZE`; blank search terms are dropped.
    pub fn new(
        page: Option<i64>,
        limit: Option<i64>,
        search: Option<String>,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p.min(i64::from(u32::MAX)) as u32,
            _ => 1,
        };
        let limit = match limit {
            Some(l) if l >= 1 => l.min(i64::from(MAX_PAGE_SIZE)) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            page,
            limit,
            search,
            sort_by: SortKey::parse_or_default(sort_by),
            order: SortDirection::parse_or_default(order),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// `%term%` with LIKE metacharacters escaped (backslash escape).
    pub fn like_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|term| {
            let mut escaped = String::with_capacity(term.len() + 2);
            escaped.push('%');
            for c in term.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped.push('%');
            escaped
        })
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_are_normalized() {
        let q = ListQuery::new(Some(0), Some(0), Some("   ".into()), None, None);
        assert_eq!(q, ListQuery::default());

        let q = ListQuery::new(Some(3), Some(500), Some(" pen ".into()), Some("TOTAL_AMOUNT"), Some("asc"));
        assert_eq!(q.page, 3);
        assert_eq!(q.limit, MAX_PAGE_SIZE);
        assert_eq!(q.search.as_deref(), Some("pen"));
        assert_eq!(q.sort_by, SortKey::TotalAmount);
        assert_eq!(q.order, SortDirection::Asc);
        assert_eq!(q.offset(), 200);
    }

    #[test]
    fn unknown_sort_key_falls_back_to_created_at() {
        let q = ListQuery::new(None, None, None, Some("id; DROP TABLE transactions"), Some("sideways"));
        assert_eq!(q.sort_by, SortKey::CreatedAt);
        assert_eq!(q.order, SortDirection::Desc);
        assert_eq!(q.sort_by.column(), "created_at");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        let q = ListQuery::new(None, None, Some("50%_off\\".into()), None, None);
        assert_eq!(q.like_pattern().as_deref(), Some("%50\\%\\_off\\\\%"));
    }

    #[test]
    fn page_metadata() {
        let page = Page { items: vec![(); 10], page: 1, limit: 10, total: 25 };
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_prev());

        let last = Page { items: vec![(); 5], page: 3, limit: 10, total: 25 };
        assert!(!last.has_next());
        assert!(last.has_prev());

        let empty: Page<()> = Page { items: vec![], page: 1, limit: 10, total: 0 };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());
    }
}
