//! Pagination types shared by all list endpoints.

use serde::{Deserialize, Serialize};

/// Pagination parameters shared across all list endpoints.
///
/// - `per_page`: 1–100, default 25
/// - `page`: ≥ 1, default 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_per_page", rename = "per-page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_per_page() -> u32 {
    25
}

fn default_page() -> u32 {
    1
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            page: default_page(),
        }
    }
}

impl PageRequest {
    /// Clamp `per_page` to the valid range 1–100 and `page` to ≥ 1.
    ///
    /// Call after deserializing from query params to enforce bounds.
    pub fn clamped(self) -> Self {
        Self {
            per_page: self.per_page.clamp(1, 100),
            page: self.page.max(1),
        }
    }
}

/// One page of a list, windowed out of a counted query.
///
/// `next_page` / `previous_page` are `None` at the respective boundary, so
/// clients can walk a listing without computing offsets themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub next_page: Option<u32>,
    pub previous_page: Option<u32>,
}

impl<T> Page<T> {
    /// Assemble the page envelope from the items of the current window and
    /// the total row count of the unwindowed query.
    pub fn new(items: Vec<T>, total_items: u64, request: PageRequest) -> Self {
        let PageRequest { per_page, page } = request.clamped();
        let total_pages = total_items.div_ceil(per_page as u64) as u32;
        let next_page = (page < total_pages).then(|| page + 1);
        let previous_page = (page > 1).then(|| page - 1);
        Self {
            items,
            page,
            per_page,
            total_items,
            total_pages,
            next_page,
            previous_page,
        }
    }

    /// Map the item type while keeping the window bookkeeping.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: u32, per_page: u32) -> PageRequest {
        PageRequest { per_page, page }
    }

    #[test]
    fn should_default_to_per_page_25_page_1() {
        let p = PageRequest::default();
        assert_eq!(p.per_page, 25);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn should_deserialize_defaults_when_fields_absent() {
        let p: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(p.per_page, 25);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn should_clamp_per_page_to_1_100() {
        assert_eq!(request(1, 0).clamped().per_page, 1);
        assert_eq!(request(1, 200).clamped().per_page, 100);
        assert_eq!(request(1, 50).clamped().per_page, 50);
    }

    #[test]
    fn should_clamp_page_to_minimum_1() {
        assert_eq!(request(0, 25).clamped().page, 1);
        assert_eq!(request(5, 25).clamped().page, 5);
    }

    #[test]
    fn should_window_first_page_of_twelve_items() {
        let page = Page::new(vec![1, 2, 3, 4, 5], 12, request(1, 5));
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.previous_page, None);
    }

    #[test]
    fn should_window_last_page_of_twelve_items() {
        let page = Page::new(vec![11, 12], 12, request(3, 5));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(2));
    }

    #[test]
    fn should_window_middle_page() {
        let page = Page::new(vec![6, 7, 8, 9, 10], 12, request(2, 5));
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn should_handle_empty_listing() {
        let page: Page<i32> = Page::new(vec![], 0, request(1, 5));
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, None);
    }

    #[test]
    fn should_map_items_preserving_bookkeeping() {
        let page = Page::new(vec![1, 2], 12, request(2, 5)).map(|n| n.to_string());
        assert_eq!(page.items, vec!["1", "2"]);
        assert_eq!(page.next_page, Some(3));
    }
}
