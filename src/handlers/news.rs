//! Partner news endpoints.
//!
//! Both endpoints sit behind the admission gateway; by the time a handler runs the
//! call has been paid for.
//! - GET /api/news/ - Paginated list, optionally filtered by category
//! - GET /api/news/{id}/ - Single article

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use crate::{
    error::AppError,
    middleware::admission::ApiKeyContext,
    models::news::{ListNewsQuery, NewsDetail, NewsListResponse, NewsSummary, PageRequest},
    state::AppState,
};

/// List published news.
///
/// # Query Parameters
///
/// - `category` - token such as `indian` (case-insensitive); unknown tokens mean no filter
/// - `page` - 1-based page number, default 1
/// - `page_size` - default and maximum come from configuration
///
/// # Response (200)
///
/// ```json
/// {
///   "results": [ { "id": 4211, "title": "...", "excerpt": "...", "...": "..." } ],
///   "count": 101,
///   "page": 1,
///   "page_size": 10,
///   "total_pages": 11
/// }
/// ```
pub async fn list_news(
    State(state): State<AppState>,
    Extension(caller): Extension<ApiKeyContext>,
    Query(query): Query<ListNewsQuery>,
) -> Result<Json<NewsListResponse>, AppError> {
    let settings = &state.settings;
    let page = PageRequest::from_query(&query, settings.default_page_size, settings.max_page_size);
    let category_ids = settings.categories.lookup(query.category.as_deref());

    tracing::debug!(
        key_id = %caller.key_id,
        account_id = %caller.account_id,
        key_label = %caller.label,
        daily_limit = caller.daily_limit,
        page = page.page,
        filtered = category_ids.is_some(),
        "listing news"
    );

    let content = state
        .content
        .list(category_ids, page.page_size, page.offset())
        .await?;

    let results = content
        .items
        .into_iter()
        .map(|post| NewsSummary::from_post(post, &settings.public_base_url))
        .collect();

    Ok(Json(NewsListResponse {
        results,
        count: content.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages(content.total),
    }))
}

/// Get one article with its full body.
///
/// # Response
///
/// - **Success (200 OK)**: the article
/// - **Error (404)**: no published article with this id
pub async fn get_news(
    State(state): State<AppState>,
    Extension(caller): Extension<ApiKeyContext>,
    Path(post_id): Path<u64>,
) -> Result<Json<NewsDetail>, AppError> {
    tracing::debug!(key_id = %caller.key_id, post_id, "fetching news article");

    let post = state
        .content
        .get(post_id)
        .await?
        .ok_or(AppError::NotFound("News"))?;

    Ok(Json(NewsDetail::from_post(post, &state.settings.public_base_url)))
}
