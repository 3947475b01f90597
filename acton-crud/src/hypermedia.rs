//! Hypermedia representations
//!
//! Wraps single items and pages with navigation links. A [`LinkAssembler`]
//! decides which links an item gets; page navigation links (`first`, `prev`,
//! `next`, `last`) are derived from the page metadata.
//!
//! # Example
//!
//! ```rust
//! use acton_crud::entity::Identified;
//! use acton_crud::hypermedia::{LinkAssembler, PathLinkAssembler};
//! use acton_crud::repository::{Page, PageRequest};
//!
//! struct Company {
//!     id: Option<i64>,
//! }
//!
//! impl Identified for Company {
//!     type Id = i64;
//!     fn id(&self) -> Option<&i64> {
//!         self.id.as_ref()
//!     }
//! }
//!
//! let assembler = PathLinkAssembler::new("/companies");
//! let page = Page::new(vec![Company { id: Some(11) }], &PageRequest::of(1, 10), 35);
//! let model = assembler.to_page_model(page);
//! assert_eq!(model.content[0].link("self").unwrap().href, "/companies/11");
//! assert_eq!(model.link("next").unwrap().href, "/companies?page=2&size=10");
//! assert_eq!(model.link("last").unwrap().href, "/companies?page=3&size=10");
//! ```

use serde::{Deserialize, Serialize};

use crate::entity::Identified;
use crate::repository::Page;

/// A navigation link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Relation name, e.g. `self` or `next`
    pub rel: String,
    /// Target
    pub href: String,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
        }
    }
}

/// An item with its links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linked<T> {
    /// The decorated item
    #[serde(flatten)]
    pub content: T,
    /// Links for the item
    #[serde(rename = "_links", default)]
    pub links: Vec<Link>,
}

impl<T> Linked<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Link with the given relation name
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }
}

/// Paging metadata of a [`LinkedPage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Page size
    pub size: u64,
    /// 0-indexed page number
    pub number: u64,
    /// Total number of matches
    pub total_elements: u64,
    /// Number of pages
    pub total_pages: u64,
}

/// A page of linked items with navigation links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPage<T> {
    /// Linked items, in page order
    pub content: Vec<Linked<T>>,
    /// Paging metadata
    pub page: PageMetadata,
    /// Navigation links
    #[serde(rename = "_links", default)]
    pub links: Vec<Link>,
}

impl<T> LinkedPage<T> {
    /// Link with the given relation name
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == rel)
    }
}

/// Builds linked representations of items and pages
pub trait LinkAssembler<T>: Send + Sync + 'static {
    /// Links for one item
    fn item_links(&self, item: &T) -> Vec<Link>;

    /// Target of the page with the given number and size
    fn page_href(&self, number: u64, size: u64) -> String;

    /// Decorate one item
    fn to_model(&self, item: T) -> Linked<T> {
        let links = self.item_links(&item);
        Linked { content: item, links }
    }

    /// Decorate a page and each of its items
    fn to_page_model(&self, page: Page<T>) -> LinkedPage<T> {
        let metadata = PageMetadata {
            size: page.size,
            number: page.number,
            total_elements: page.total_elements,
            total_pages: page.total_pages(),
        };

        let mut links = vec![
            Link::new("self", self.page_href(page.number, page.size)),
            Link::new("first", self.page_href(0, page.size)),
        ];
        if page.has_previous() {
            links.push(Link::new("prev", self.page_href(page.number - 1, page.size)));
        }
        if page.has_next() {
            links.push(Link::new("next", self.page_href(page.number + 1, page.size)));
        }
        links.push(Link::new(
            "last",
            self.page_href(metadata.total_pages.saturating_sub(1), page.size),
        ));

        LinkedPage {
            content: page.content.into_iter().map(|item| self.to_model(item)).collect(),
            page: metadata,
            links,
        }
    }
}

/// Links relative to a collection path: `{path}/{id}` for items and
/// `{path}?page=N&size=M` for pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLinkAssembler {
    path: String,
}

impl PathLinkAssembler {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path: path.trim_end_matches('/').to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: Identified> LinkAssembler<T> for PathLinkAssembler {
    fn item_links(&self, item: &T) -> Vec<Link> {
        match item.id() {
            Some(id) => vec![Link::new("self", format!("{}/{}", self.path, id))],
            None => Vec::new(),
        }
    }

    fn page_href(&self, number: u64, size: u64) -> String {
        format!("{}?page={}&size={}", self.path, number, size)
    }
}
