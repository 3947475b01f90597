//! Page requests, sorting and page results
//!
//! # Example
//!
//! ```rust
//! use acton_crud::repository::{Order, Page, PageRequest, Sort};
//!
//! let request = PageRequest::of(2, 20).with_sort(Sort::by(vec![Order::desc("founded")]));
//! assert_eq!(request.offset(), 40);
//!
//! let page = Page::new(vec!["a", "b"], &PageRequest::of(0, 2), 5);
//! assert_eq!(page.total_pages(), 3);
//! assert!(page.has_next());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use acton_crud::repository::OrderDirection;
///
/// assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
/// assert_eq!(format!("{}", OrderDirection::Descending), "desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(rename = "asc", alias = "ascending", alias = "ASC")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(rename = "desc", alias = "descending", alias = "DESC")]
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Ordering on one property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    /// Field name
    pub property: String,
    /// Sort direction
    #[serde(default)]
    pub direction: OrderDirection,
}

impl Order {
    /// Ascending order on a property
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Ascending,
        }
    }

    /// Descending order on a property
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Descending,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.property, self.direction)
    }
}

/// Ordered list of sort orders; the first order is the primary key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sort(pub Vec<Order>);

impl Sort {
    /// No ordering
    #[must_use]
    pub const fn unsorted() -> Self {
        Self(Vec::new())
    }

    /// Sort by the given orders
    pub fn by(orders: Vec<Order>) -> Self {
        Self(orders)
    }

    /// Whether any order is set
    pub fn is_sorted(&self) -> bool {
        !self.0.is_empty()
    }

    /// Iterate over the orders
    pub fn iter(&self) -> std::slice::Iter<'_, Order> {
        self.0.iter()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, order) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}", order)?;
        }
        Ok(())
    }
}

/// A request for one page of results
///
/// Page numbers are 0-indexed.
///
/// # Example
///
/// ```rust
/// use acton_crud::repository::PageRequest;
///
/// let first = PageRequest::first(25);
/// assert_eq!(first.offset(), 0);
/// assert_eq!(PageRequest::of(3, 20).offset(), 60);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// 0-indexed page number
    pub page: u64,
    /// Maximum number of results per page
    pub size: u64,
    /// Result ordering
    pub sort: Sort,
}

impl PageRequest {
    /// Request a page
    #[must_use]
    pub const fn of(page: u64, size: u64) -> Self {
        Self {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    /// Request the first page with the given size
    #[must_use]
    pub const fn first(size: u64) -> Self {
        Self::of(0, size)
    }

    /// Set the ordering
    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Number of results to skip
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Copy of this request with the size limited to `1..=max`
    #[must_use]
    pub fn clamped(&self, max: u64) -> Self {
        Self {
            page: self.page,
            size: self.size.clamp(1, max.max(1)),
            sort: self.sort.clone(),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::of(0, 20)
    }
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page={}&size={}", self.page, self.size)?;
        if self.sort.is_sorted() {
            write!(f, "&sort={}", self.sort)?;
        }
        Ok(())
    }
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Entities on this page, in query order
    pub content: Vec<T>,
    /// 0-indexed page number
    pub number: u64,
    /// Requested page size
    pub size: u64,
    /// Total number of matching entities across all pages
    pub total_elements: u64,
}

impl<T> Page<T> {
    /// Wrap content for a request
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        }
    }

    /// An empty page for a request
    pub fn empty(request: &PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }

    /// Number of pages needed to hold every match
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return if self.total_elements == 0 { 0 } else { 1 };
        }
        self.total_elements.div_ceil(self.size)
    }

    /// Number of entities on this page
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    /// Whether this is the first page
    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    /// Whether this is the last page
    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    /// Whether a later page exists
    pub fn has_next(&self) -> bool {
        self.number.saturating_add(1) < self.total_pages()
    }

    /// Whether an earlier page exists
    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Convert the content, keeping the paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}
