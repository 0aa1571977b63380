use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{self, accounts, catalog, edit, loans},
    middleware_auth::require_login,
};

/// All catalog pages. Pages behind sign-in share the `require_login` layer.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route(
            "/accounts/login/",
            get(accounts::login_form).post(accounts::login),
        )
        .route("/accounts/logout/", post(accounts::logout))
        .route("/catalog/", get(catalog::index))
        .route("/catalog/books/", get(catalog::book_list))
        .route("/catalog/book/{id}", get(catalog::book_detail))
        .route("/catalog/authors/", get(catalog::author_list))
        .route("/catalog/author/{id}", get(catalog::author_detail));

    let protected_routes = Router::new()
        .route("/catalog/mybooks/", get(loans::my_borrowed))
        .route("/catalog/borrowed/", get(loans::all_borrowed))
        .route(
            "/catalog/book/{id}/renew/",
            get(loans::renew_book_librarian).post(loans::renew_book_librarian_submit),
        )
        .route(
            "/catalog/book/{id}/renew-date/",
            get(loans::renew_book_date).post(loans::renew_book_date_submit),
        )
        .route(
            "/catalog/author/create/",
            get(edit::author_create).post(edit::author_create_submit),
        )
        .route(
            "/catalog/author/{id}/update/",
            get(edit::author_update).post(edit::author_update_submit),
        )
        .route(
            "/catalog/author/{id}/delete/",
            get(edit::author_delete).post(edit::author_delete_submit),
        )
        .route(
            "/catalog/book/create/",
            get(edit::book_create).post(edit::book_create_submit),
        )
        .route(
            "/catalog/book/{id}/update/",
            get(edit::book_update).post(edit::book_update_submit),
        )
        .route(
            "/catalog/book/{id}/delete/",
            get(edit::book_delete).post(edit::book_delete_submit),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
