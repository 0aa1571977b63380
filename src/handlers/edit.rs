//! Create, update and delete pages for authors and books.

use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};
use tera::Context;

use super::parse_id;
use crate::{
    AppState,
    errors::{AppError, AppResult, found},
    forms::{AuthorForm, BookForm, FormErrors},
    middleware_auth::CurrentUser,
    models::{DeleteOutcome, NewBook, Permission},
};

fn author_url(id: i64) -> String {
    format!("/catalog/author/{id}")
}

fn book_url(id: i64) -> String {
    format!("/catalog/book/{id}")
}

fn render_author_form(
    state: &AppState,
    author_id: Option<i64>,
    form: &AuthorForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut ctx = Context::new();
    ctx.insert("author_id", &author_id);
    ctx.insert("fields", &form.fields(errors));
    state.templates.render("catalog/author_form.html", ctx)
}

/// # Errors
/// Returns forbidden or template errors.
pub async fn author_create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Html<String>> {
    user.require(Permission::AddAuthor)?;
    render_author_form(&state, None, &AuthorForm::default(), &FormErrors::default())
}

/// # Errors
/// Returns forbidden or database errors.
pub async fn author_create_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<AuthorForm>,
) -> AppResult<Response> {
    user.require(Permission::AddAuthor)?;
    match form.clean() {
        Ok(author) => {
            let created = state.catalog.create_author(author).await?;
            tracing::info!(author_id = created.id, "author created");
            Ok(found(&author_url(created.id)))
        }
        Err(errors) => Ok(render_author_form(&state, None, &form, &errors)?.into_response()),
    }
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn author_update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    user.require(Permission::ChangeAuthor)?;
    let id: i64 = parse_id(&raw)?;
    let detail = state
        .catalog
        .find_author(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let form = AuthorForm::from_author(&detail.author);
    render_author_form(&state, Some(id), &form, &FormErrors::default())
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn author_update_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
    Form(form): Form<AuthorForm>,
) -> AppResult<Response> {
    user.require(Permission::ChangeAuthor)?;
    let id: i64 = parse_id(&raw)?;
    match form.clean() {
        Ok(author) => {
            state
                .catalog
                .update_author(id, author)
                .await?
                .ok_or(AppError::NotFound)?;
            tracing::info!(author_id = id, "author updated");
            Ok(found(&author_url(id)))
        }
        Err(errors) => Ok(render_author_form(&state, Some(id), &form, &errors)?.into_response()),
    }
}

async fn render_author_delete(state: &AppState, id: i64) -> AppResult<Html<String>> {
    let detail = state
        .catalog
        .find_author(id)
        .await?
        .ok_or(AppError::NotFound)?;
    let mut ctx = Context::new();
    ctx.insert("author", &detail.author);
    ctx.insert("books", &detail.books);
    state.templates.render("catalog/author_confirm_delete.html", ctx)
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn author_delete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    user.require(Permission::DeleteAuthor)?;
    let id: i64 = parse_id(&raw)?;
    render_author_delete(&state, id).await
}

/// Deletes the author unless books still reference them; then the
/// confirmation page is shown again listing those books.
///
/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn author_delete_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Response> {
    user.require(Permission::DeleteAuthor)?;
    let id: i64 = parse_id(&raw)?;
    match state.catalog.delete_author(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(author_id = id, "author deleted");
            Ok(found("/catalog/authors/"))
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound),
        DeleteOutcome::InUse => Ok(render_author_delete(&state, id).await?.into_response()),
    }
}

async fn render_book_form(
    state: &AppState,
    book_id: Option<i64>,
    form: &BookForm,
    errors: &FormErrors,
) -> AppResult<Html<String>> {
    let mut ctx = Context::new();
    ctx.insert("book_id", &book_id);
    ctx.insert("fields", &form.fields(errors));
    ctx.insert(
        "authors",
        &state
            .catalog
            .list_authors(crate::repository::PageRequest {
                limit: i64::MAX,
                offset: 0,
            })
            .await?
            .items,
    );
    ctx.insert("languages", &state.catalog.list_languages().await?);
    ctx.insert("genres", &state.catalog.list_genres().await?);
    state.templates.render("catalog/book_form.html", ctx)
}

/// Reject author, language and genre ids that name nothing.
async fn check_references(state: &AppState, book: &NewBook) -> AppResult<FormErrors> {
    let mut errors = FormErrors::default();
    if let Some(author_id) = book.author_id {
        if state.catalog.find_author(author_id).await?.is_none() {
            errors.add("author", "Select a valid choice.");
        }
    }
    if let Some(language_id) = book.language_id {
        let languages = state.catalog.list_languages().await?;
        if !languages.iter().any(|l| l.id == language_id) {
            errors.add("language", "Select a valid choice.");
        }
    }
    let genres = state.catalog.list_genres().await?;
    if let Some(missing) = book
        .genre_ids
        .iter()
        .find(|id| !genres.iter().any(|g| g.id == **id))
    {
        errors.add("genres", format!("{missing} is not one of the available genres."));
    }
    Ok(errors)
}

/// Validate, then create (`id` is `None`) or update the book.
async fn save_book(
    state: &AppState,
    id: Option<i64>,
    form: &BookForm,
) -> AppResult<Response> {
    let book = match form.clean() {
        Ok(book) => book,
        Err(errors) => return Ok(render_book_form(state, id, form, &errors).await?.into_response()),
    };
    let errors = check_references(state, &book).await?;
    if !errors.is_empty() {
        return Ok(render_book_form(state, id, form, &errors).await?.into_response());
    }

    let saved = match id {
        Some(id) => state
            .catalog
            .update_book(id, book)
            .await
            .and_then(|b| b.ok_or(AppError::NotFound)),
        None => state.catalog.create_book(book).await,
    };
    match saved {
        Ok(book) => {
            tracing::info!(book_id = book.id, "book saved");
            Ok(found(&book_url(book.id)))
        }
        Err(AppError::Validation(message)) => {
            let mut errors = FormErrors::default();
            errors.add("isbn", message);
            Ok(render_book_form(state, id, form, &errors).await?.into_response())
        }
        Err(err) => Err(err),
    }
}

/// # Errors
/// Returns forbidden or database errors.
pub async fn book_create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Html<String>> {
    user.require(Permission::AddBook)?;
    render_book_form(&state, None, &BookForm::default(), &FormErrors::default()).await
}

/// # Errors
/// Returns forbidden or database errors.
pub async fn book_create_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<BookForm>,
) -> AppResult<Response> {
    user.require(Permission::AddBook)?;
    save_book(&state, None, &form).await
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn book_update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    user.require(Permission::ChangeBook)?;
    let id: i64 = parse_id(&raw)?;
    let detail = state.catalog.find_book(id).await?.ok_or(AppError::NotFound)?;
    let form = BookForm::from_detail(&detail);
    render_book_form(&state, Some(id), &form, &FormErrors::default()).await
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn book_update_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
    Form(form): Form<BookForm>,
) -> AppResult<Response> {
    user.require(Permission::ChangeBook)?;
    let id: i64 = parse_id(&raw)?;
    save_book(&state, Some(id), &form).await
}

async fn render_book_delete(state: &AppState, id: i64) -> AppResult<Html<String>> {
    let detail = state.catalog.find_book(id).await?.ok_or(AppError::NotFound)?;
    let mut ctx = Context::new();
    ctx.insert("book", &detail.book);
    ctx.insert("copies", &detail.copies);
    state.templates.render("catalog/book_confirm_delete.html", ctx)
}

/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn book_delete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Html<String>> {
    user.require(Permission::DeleteBook)?;
    let id: i64 = parse_id(&raw)?;
    render_book_delete(&state, id).await
}

/// Deletes the book unless copies of it exist.
///
/// # Errors
/// Returns forbidden, not found or database errors.
pub async fn book_delete_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> AppResult<Response> {
    user.require(Permission::DeleteBook)?;
    let id: i64 = parse_id(&raw)?;
    match state.catalog.delete_book(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(book_id = id, "book deleted");
            Ok(found("/catalog/books/"))
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound),
        DeleteOutcome::InUse => Ok(render_book_delete(&state, id).await?.into_response()),
    }
}
