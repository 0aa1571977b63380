//! Borrowed-book lists and the librarian renewal pages.

use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
};
use tera::Context;
use uuid::Uuid;

use super::{loan_views, parse_id};
use crate::{
    AppState,
    errors::{AppError, AppResult, found},
    middleware_auth::CurrentUser,
    models::{BookInstance, Permission},
    pagination::{PageQuery, Paginator},
    renewal::{RENEWAL_HELP_TEXT, RenewBookForm, RenewBookModelForm, RenewalDateField},
};

const ALL_BORROWED: &str = "/catalog/borrowed/";
const STANDALONE_LABEL: &str = "Renewal date";

/// Copies on loan to the signed-in user, soonest due first.
///
/// # Errors
/// Returns not found for a page past the end, or database errors.
pub async fn my_borrowed(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let paginator = Paginator::from_query(&query, state.config.page_size)?;
    let listing = state
        .catalog
        .list_loans_by_borrower(user.id, paginator.request())
        .await?;
    let page = paginator.finish(listing.total)?;

    let mut ctx = Context::new();
    ctx.insert("username", &user.username);
    ctx.insert(
        "bookinstance_list",
        &loan_views(&listing.items, state.clock.today()),
    );
    page.insert_into(&mut ctx);
    state
        .templates
        .render("catalog/bookinstance_list_borrowed_user.html", ctx)
}

/// Every copy on loan, for librarians.
///
/// # Errors
/// Returns forbidden without `can_mark_returned`, not found for a page past
/// the end, or database errors.
pub async fn all_borrowed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    user.require(Permission::CanMarkReturned)?;
    let paginator = Paginator::from_query(&query, state.config.page_size)?;
    let listing = state.catalog.list_all_loans(paginator.request()).await?;
    let page = paginator.finish(listing.total)?;

    let mut ctx = Context::new();
    ctx.insert(
        "bookinstance_list",
        &loan_views(&listing.items, state.clock.today()),
    );
    page.insert_into(&mut ctx);
    state
        .templates
        .render("catalog/bookinstance_list_borrowed_all.html", ctx)
}

async fn load_instance(
    state: &AppState,
    user: &CurrentUser,
    raw_id: &str,
) -> AppResult<BookInstance> {
    user.require(Permission::CanMarkReturned)?;
    let id: Uuid = parse_id(raw_id)?;
    state
        .catalog
        .find_instance(id)
        .await?
        .ok_or(AppError::NotFound)
}

async fn render_renewal<F: RenewalDateField>(
    state: &AppState,
    instance: &BookInstance,
    form: &F,
    label: &str,
    field_errors: &[String],
) -> AppResult<Html<String>> {
    let title = state
        .catalog
        .find_book(instance.book_id)
        .await?
        .map(|detail| detail.book.title)
        .unwrap_or_default();
    let borrower = match instance.borrower_id {
        Some(id) => state.catalog.find_user(id).await?.map(|u| u.username),
        None => None,
    };

    let mut ctx = Context::new();
    ctx.insert("title", &title);
    ctx.insert("borrower", &borrower);
    ctx.insert("due_back", &instance.due_back);
    ctx.insert("overdue", &instance.is_overdue(state.clock.today()));
    ctx.insert("field", F::FIELD);
    ctx.insert("label", label);
    ctx.insert("value", form.raw_date());
    ctx.insert("help_text", RENEWAL_HELP_TEXT);
    ctx.insert("field_errors", field_errors);
    state
        .templates
        .render("catalog/book_renew_librarian.html", ctx)
}

/// Validate a submitted renewal and store it, or show the form again with the
/// field error.
async fn submit_renewal<F: RenewalDateField>(
    state: &AppState,
    user: &CurrentUser,
    raw_id: &str,
    form: &F,
    label: &str,
) -> AppResult<Response> {
    let instance = load_instance(state, user, raw_id).await?;
    match form.clean(state.clock.as_ref()) {
        Ok(due_back) => {
            if !state.catalog.set_due_back(instance.id, due_back).await? {
                return Err(AppError::NotFound);
            }
            tracing::info!(
                instance = %instance.id,
                %due_back,
                librarian = %user.0.username,
                "loan renewed"
            );
            Ok(found(ALL_BORROWED))
        }
        Err(error) => {
            tracing::debug!(instance = %instance.id, field = error.field, "renewal rejected");
            let page = render_renewal(state, &instance, form, label, &[error.message]).await?;
            Ok(page.into_response())
        }
    }
}

/// Renewal page bound to the copy's due date.
///
/// # Errors
/// Returns forbidden, not found, or database errors.
pub async fn renew_book_librarian(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let instance = load_instance(&state, &user, &id).await?;
    let form = RenewBookModelForm::initial(state.clock.as_ref());
    render_renewal(&state, &instance, &form, RenewBookModelForm::LABEL, &[]).await
}

/// # Errors
/// Returns forbidden, not found, or database errors.
pub async fn renew_book_librarian_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(form): Form<RenewBookModelForm>,
) -> AppResult<Response> {
    submit_renewal(&state, &user, &id, &form, RenewBookModelForm::LABEL).await
}

/// Renewal page using the standalone date form.
///
/// # Errors
/// Returns forbidden, not found, or database errors.
pub async fn renew_book_date(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let instance = load_instance(&state, &user, &id).await?;
    let form = RenewBookForm::initial(state.clock.as_ref());
    render_renewal(&state, &instance, &form, STANDALONE_LABEL, &[]).await
}

/// # Errors
/// Returns forbidden, not found, or database errors.
pub async fn renew_book_date_submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Form(form): Form<RenewBookForm>,
) -> AppResult<Response> {
    submit_renewal(&state, &user, &id, &form, STANDALONE_LABEL).await
}
