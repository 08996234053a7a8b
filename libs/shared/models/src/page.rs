use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` (case-insensitive) sorts newest first.
    pub fn parse_or_desc(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Desc
    }
}

/// Zero-based page index plus page size, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: Option<u32>, default_size: u32) -> Self {
        Self {
            page: page.unwrap_or(0),
            size: size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page as u64 * self.size as u64
    }
}

/// Wire shape of list endpoints: `{content, totalElements, totalPages, page, size}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub page: u32,
    pub size: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: PageRequest) -> Self {
        let size = request.size.max(1) as u64;
        Self {
            content,
            total_elements,
            total_pages: total_elements.div_ceil(size),
            page: request.page,
            size: request.size,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page: self.page,
            size: self.size,
        }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<Result<Vec<U>, E>>()?,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page: self.page,
            size: self.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<u8> = Page::new(vec![1, 2, 3, 4, 5], 11, PageRequest::new(Some(0), Some(5), 10));
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<u8>::empty(PageRequest::new(None, None, 5)).total_pages, 0);
    }

    #[test]
    fn test_page_request_clamps_size() {
        assert_eq!(PageRequest::new(None, Some(0), 5).size, 1);
        assert_eq!(PageRequest::new(None, Some(1000), 5).size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(2), Some(10), 5).offset(), 20);
    }

    #[test]
    fn test_sort_direction_defaults_to_desc() {
        assert_eq!(SortDirection::parse_or_desc(Some("ASC")), SortDirection::Asc);
        assert_eq!(SortDirection::parse_or_desc(Some("")), SortDirection::Desc);
        assert_eq!(SortDirection::parse_or_desc(None), SortDirection::Desc);
    }
}
