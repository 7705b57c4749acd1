//! Content repository - read-only access to the WordPress news database.
//!
//! Only published posts are visible, newest first. The featured image is the attachment
//! referenced by the `_thumbnail_id` post meta. This service is never gated itself; it is
//! only reached after the admission gateway has admitted the request.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{MySql, QueryBuilder};

use crate::{
    db::NewsPool,
    error::AppError,
    models::news::{ContentPage, NewsPost},
};

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// A page of published posts, optionally restricted to any of `category_ids`.
    async fn list(
        &self,
        category_ids: Option<&[u64]>,
        limit: i64,
        offset: i64,
    ) -> Result<ContentPage, AppError>;

    /// A single published post.
    async fn get(&self, post_id: u64) -> Result<Option<NewsPost>, AppError>;
}

/// Repository reading the WordPress schema through a MySQL pool.
#[derive(Clone)]
pub struct WordpressRepository {
    pool: NewsPool,
}

impl WordpressRepository {
    pub fn new(pool: NewsPool) -> Self {
        Self { pool }
    }

    /// Category names of the given posts, fetched in one query.
    async fn categories_of(&self, post_ids: &[u64]) -> Result<HashMap<u64, Vec<String>>, AppError> {
        let mut by_post: HashMap<u64, Vec<String>> = HashMap::new();
        if post_ids.is_empty() {
            return Ok(by_post);
        }

        let mut query = QueryBuilder::<MySql>::new(
            r#"
            SELECT tr.object_id, t.name
            FROM wp_terms t
            JOIN wp_term_taxonomy tt ON t.term_id = tt.term_id
            JOIN wp_term_relationships tr ON tt.term_taxonomy_id = tr.term_taxonomy_id
            WHERE tt.taxonomy = 'category' AND tr.object_id IN (
            "#,
        );
        let mut ids = query.separated(", ");
        for id in post_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let rows: Vec<(u64, String)> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::ContentSource)?;

        for (post_id, name) in rows {
            by_post.entry(post_id).or_default().push(name);
        }
        Ok(by_post)
    }

    async fn with_categories(&self, rows: Vec<PostRow>) -> Result<Vec<NewsPost>, AppError> {
        let ids: Vec<u64> = rows.iter().map(|row| row.id).collect();
        let mut categories = self.categories_of(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let names = categories.remove(&row.id).unwrap_or_default();
                row.into_post(names)
            })
            .collect())
    }
}

/// Columns selected for a post.
#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    #[sqlx(rename = "ID")]
    id: u64,
    post_date: NaiveDateTime,
    post_title: String,
    post_name: String,
    post_content: String,
    featured_media_url: Option<String>,
}

impl PostRow {
    fn into_post(self, categories: Vec<String>) -> NewsPost {
        NewsPost {
            id: self.id,
            title: self.post_title,
            slug: self.post_name,
            content: self.post_content,
            image: self.featured_media_url,
            published_at: self.post_date,
            categories,
        }
    }
}

const POST_COLUMNS: &str = r#"
    p.ID, p.post_date, p.post_title, p.post_name, p.post_content,
    wp_media.guid AS featured_media_url
"#;

const FEATURED_MEDIA_JOIN: &str = r#"
    LEFT JOIN wp_postmeta pm ON p.ID = pm.post_id AND pm.meta_key = '_thumbnail_id'
    LEFT JOIN wp_posts wp_media ON pm.meta_value = wp_media.ID AND wp_media.post_type = 'attachment'
"#;

const CATEGORY_JOIN: &str = r#"
    JOIN wp_term_relationships tr ON p.ID = tr.object_id
    JOIN wp_term_taxonomy tt ON tr.term_taxonomy_id = tt.term_taxonomy_id
"#;

const PUBLISHED: &str = "p.post_type = 'post' AND p.post_status = 'publish'";

#[async_trait]
impl ContentRepository for WordpressRepository {
    async fn list(
        &self,
        category_ids: Option<&[u64]>,
        limit: i64,
        offset: i64,
    ) -> Result<ContentPage, AppError> {
        let category_ids = category_ids.filter(|ids| !ids.is_empty());

        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(DISTINCT p.ID) FROM wp_posts p ");
        let mut posts = QueryBuilder::<MySql>::new("SELECT DISTINCT ");
        posts.push(POST_COLUMNS).push(" FROM wp_posts p ");

        if category_ids.is_some() {
            count.push(CATEGORY_JOIN);
            posts.push(CATEGORY_JOIN);
        }
        posts.push(FEATURED_MEDIA_JOIN);

        count.push(" WHERE ").push(PUBLISHED);
        posts.push(" WHERE ").push(PUBLISHED);

        if let Some(ids) = category_ids {
            for query in [&mut count, &mut posts] {
                query.push(" AND tt.taxonomy = 'category' AND tt.term_id IN (");
                let mut separated = query.separated(", ");
                for id in ids {
                    separated.push_bind(*id);
                }
                separated.push_unseparated(")");
            }
        }

        posts
            .push(" ORDER BY p.post_date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::ContentSource)?;

        let rows: Vec<PostRow> = posts
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::ContentSource)?;

        tracing::debug!(total, returned = rows.len(), "news page fetched");

        Ok(ContentPage {
            items: self.with_categories(rows).await?,
            total,
        })
    }

    async fn get(&self, post_id: u64) -> Result<Option<NewsPost>, AppError> {
        let mut query = QueryBuilder::<MySql>::new("SELECT ");
        query
            .push(POST_COLUMNS)
            .push(" FROM wp_posts p ")
            .push(FEATURED_MEDIA_JOIN)
            .push(" WHERE ")
            .push(PUBLISHED)
            .push(" AND p.ID = ")
            .push_bind(post_id);

        let row: Option<PostRow> = query
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::ContentSource)?;

        match row {
            Some(row) => Ok(self.with_categories(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}
