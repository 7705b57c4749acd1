//! News content models, pagination and category mapping.
//!
//! Posts come from the read-only WordPress source. Partners receive a trimmed list view
//! (`NewsSummary`) and a full detail view (`NewsDetail`).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Characters kept in a list excerpt before `...` is appended.
const EXCERPT_LEN: usize = 150;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// A published post as read from the content source.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsPost {
    pub id: u64,
    pub title: String,
    pub slug: String,
    /// Raw HTML body
    pub content: String,
    /// URL of the featured image, if the post has one
    pub image: Option<String>,
    pub published_at: NaiveDateTime,
    /// Category names
    pub categories: Vec<String>,
}

/// One page of posts plus the total number of matching posts.
#[derive(Debug, Clone, Default)]
pub struct ContentPage {
    pub items: Vec<NewsPost>,
    pub total: i64,
}

/// List item returned to partners.
///
/// ```json
/// {
///   "id": 4211,
///   "title": "Milk procurement prices revised",
///   "excerpt": "The cooperative announced...",
///   "image": "https://dairynews7x7.com/wp-content/uploads/2025/01/cover.jpg",
///   "url": "https://dairynews7x7.com/news/milk-procurement-prices-revised",
///   "published_at": "2025-01-15T10:30:00",
///   "categories": ["Indian News"]
/// }
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct NewsSummary {
    pub id: u64,
    pub title: String,
    pub excerpt: String,
    pub image: Option<String>,
    pub url: String,
    pub published_at: NaiveDateTime,
    pub categories: Vec<String>,
}

impl NewsSummary {
    pub fn from_post(post: NewsPost, base_url: &Url) -> Self {
        Self {
            excerpt: excerpt(&post.content),
            url: article_url(base_url, &post.slug),
            id: post.id,
            title: post.title,
            image: post.image,
            published_at: post.published_at,
            categories: post.categories,
        }
    }
}

/// Detail view returned to partners. Carries the full HTML body.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewsDetail {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub url: String,
    pub published_at: NaiveDateTime,
    pub categories: Vec<String>,
}

impl NewsDetail {
    pub fn from_post(post: NewsPost, base_url: &Url) -> Self {
        Self {
            url: article_url(base_url, &post.slug),
            id: post.id,
            title: post.title,
            content: post.content,
            image: post.image,
            published_at: post.published_at,
            categories: post.categories,
        }
    }
}

/// Paginated list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewsListResponse {
    pub results: Vec<NewsSummary>,
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Query string of the list endpoint.
///
/// Values are kept as strings so that garbage falls back to defaults instead of
/// failing the (already paid for) request.
#[derive(Debug, Default, Deserialize)]
pub struct ListNewsQuery {
    pub category: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Validated pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// `page` is at least 1; `page_size` is clamped to `[1, max_page_size]`.
    pub fn from_query(query: &ListNewsQuery, default_page_size: i64, max_page_size: i64) -> Self {
        let page = parse_number(query.page.as_deref()).unwrap_or(1).max(1);
        let page_size = parse_number(query.page_size.as_deref())
            .unwrap_or(default_page_size)
            .clamp(1, max_page_size.max(1));
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn total_pages(&self, count: i64) -> i64 {
        (count + self.page_size - 1) / self.page_size
    }
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Category token → content source category ids.
///
/// Built once from configuration and shared read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    entries: HashMap<String, Vec<u64>>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid category entry `{0}`, expected `token=id[,id...]`")]
pub struct CategoryMapError(String);

impl CategoryMap {
    /// Ids for a token, matched case-insensitively.
    ///
    /// Unknown or absent tokens return `None`, which callers treat as "no filter".
    pub fn lookup(&self, token: Option<&str>) -> Option<&[u64]> {
        let token = token?.trim().to_lowercase();
        self.entries.get(&token).map(Vec::as_slice)
    }
}

impl FromStr for CategoryMap {
    type Err = CategoryMapError;

    /// Parse `indian=23;global=24;blog=1` style tables. A token may map to several ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = HashMap::new();

        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let invalid = || CategoryMapError(entry.to_string());

            let (token, ids) = entry.split_once('=').ok_or_else(invalid)?;
            let token = token.trim().to_lowercase();
            if token.is_empty() {
                return Err(invalid());
            }

            let ids = ids
                .split(',')
                .map(|id| id.trim().parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid())?;

            entries.insert(token, ids);
        }

        Ok(Self { entries })
    }
}

/// Plain-text excerpt of an HTML body.
pub fn excerpt(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    let text = text.trim();

    match text.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", text[..cut].trim()),
        None => text.to_string(),
    }
}

/// Canonical article URL for a slug.
pub fn article_url(base_url: &Url, slug: &str) -> String {
    base_url
        .join(slug)
        .map(String::from)
        .unwrap_or_else(|_| format!("{base_url}{slug}"))
}
