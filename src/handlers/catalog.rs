//! Public catalog pages.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use tera::Context;

use super::{CopyView, parse_id};
use crate::{
    AppState,
    cache::book_key,
    errors::{AppError, AppResult},
    models::BookDetail,
    pagination::{PageQuery, Paginator},
};

/// Home page with catalog counts.
///
/// # Errors
/// Returns database or template errors.
pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let counts = state.catalog.counts().await?;
    let mut ctx = Context::new();
    ctx.insert("counts", &counts);
    state.templates.render("index.html", ctx)
}

/// Paginated list of books.
///
/// # Errors
/// Returns not found for a page past the end, or database errors.
pub async fn book_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let paginator = Paginator::from_query(&query, state.config.page_size)?;
    let listing = state.catalog.list_books(paginator.request()).await?;
    let page = paginator.finish(listing.total)?;

    let mut ctx = Context::new();
    ctx.insert("book_list", &listing.items);
    page.insert_into(&mut ctx);
    state.templates.render("catalog/book_list.html", ctx)
}

/// Book detail, served from the cache when present.
///
/// A miss loads the book and stores it under `book_{id}` for the configured
/// TTL; a hit neither queries the catalog nor refreshes the entry.
///
/// # Errors
/// Returns not found or database errors.
pub async fn book_detail(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    let id: i64 = parse_id(&raw)?;
    let key = book_key(id);
    let cached = state
        .cache
        .get(&key)
        .and_then(|value| serde_json::from_value::<BookDetail>(value).ok());

    let detail = match cached {
        Some(detail) => detail,
        None => {
            let detail = state
                .catalog
                .find_book(id)
                .await?
                .ok_or(AppError::NotFound)?;
            let value = serde_json::to_value(&detail).map_err(|e| AppError::Anyhow(e.into()))?;
            state.cache.set(
                &key,
                value,
                Duration::from_secs(state.config.book_cache_ttl_secs),
            );
            tracing::debug!(%key, "book detail cached");
            detail
        }
    };

    let copies: Vec<CopyView> = detail.copies.iter().map(CopyView::new).collect();
    let mut ctx = Context::new();
    ctx.insert("detail", &detail);
    ctx.insert("copies", &copies);
    state.templates.render("catalog/book_detail.html", ctx)
}

/// Paginated list of authors.
///
/// # Errors
/// Returns not found for a page past the end, or database errors.
pub async fn author_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let paginator = Paginator::from_query(&query, state.config.page_size)?;
    let listing = state.catalog.list_authors(paginator.request()).await?;
    let page = paginator.finish(listing.total)?;

    let mut ctx = Context::new();
    ctx.insert("author_list", &listing.items);
    page.insert_into(&mut ctx);
    state.templates.render("catalog/author_list.html", ctx)
}

/// Author with their books.
///
/// # Errors
/// Returns not found or database errors.
pub async fn author_detail(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    let id: i64 = parse_id(&raw)?;
    let detail = state
        .catalog
        .find_author(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut ctx = Context::new();
    ctx.insert("detail", &detail);
    state.templates.render("catalog/author_detail.html", ctx)
}
