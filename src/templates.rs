use std::sync::Arc;

use axum::response::Html;
use tera::{Context, Tera};

use crate::errors::AppResult;

/// Page templates compiled into the binary.
pub mod embedded {
    pub const BASE_GENERIC: &str = include_str!("../templates/base_generic.html");
    pub const PAGINATION: &str = include_str!("../templates/pagination.html");
    pub const INDEX: &str = include_str!("../templates/index.html");
    pub const LOGIN: &str = include_str!("../templates/registration/login.html");
    pub const BOOK_LIST: &str = include_str!("../templates/catalog/book_list.html");
    pub const BOOK_DETAIL: &str = include_str!("../templates/catalog/book_detail.html");
    pub const BOOK_FORM: &str = include_str!("../templates/catalog/book_form.html");
    pub const BOOK_CONFIRM_DELETE: &str =
        include_str!("../templates/catalog/book_confirm_delete.html");
    pub const AUTHOR_LIST: &str = include_str!("../templates/catalog/author_list.html");
    pub const AUTHOR_DETAIL: &str = include_str!("../templates/catalog/author_detail.html");
    pub const AUTHOR_FORM: &str = include_str!("../templates/catalog/author_form.html");
    pub const AUTHOR_CONFIRM_DELETE: &str =
        include_str!("../templates/catalog/author_confirm_delete.html");
    pub const BORROWED_USER: &str =
        include_str!("../templates/catalog/bookinstance_list_borrowed_user.html");
    pub const BORROWED_ALL: &str =
        include_str!("../templates/catalog/bookinstance_list_borrowed_all.html");
    pub const RENEW_LIBRARIAN: &str =
        include_str!("../templates/catalog/book_renew_librarian.html");
}

/// Compiled template set shared by all handlers.
#[derive(Clone)]
pub struct Templates {
    tera: Arc<Tera>,
}

impl Templates {
    /// Compile the embedded templates.
    ///
    /// # Errors
    /// Returns the first template syntax error found.
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base_generic.html", embedded::BASE_GENERIC),
            ("pagination.html", embedded::PAGINATION),
            ("index.html", embedded::INDEX),
            ("registration/login.html", embedded::LOGIN),
            ("catalog/book_list.html", embedded::BOOK_LIST),
            ("catalog/book_detail.html", embedded::BOOK_DETAIL),
            ("catalog/book_form.html", embedded::BOOK_FORM),
            ("catalog/book_confirm_delete.html", embedded::BOOK_CONFIRM_DELETE),
            ("catalog/author_list.html", embedded::AUTHOR_LIST),
            ("catalog/author_detail.html", embedded::AUTHOR_DETAIL),
            ("catalog/author_form.html", embedded::AUTHOR_FORM),
            ("catalog/author_confirm_delete.html", embedded::AUTHOR_CONFIRM_DELETE),
            ("catalog/bookinstance_list_borrowed_user.html", embedded::BORROWED_USER),
            ("catalog/bookinstance_list_borrowed_all.html", embedded::BORROWED_ALL),
            ("catalog/book_renew_librarian.html", embedded::RENEW_LIBRARIAN),
        ])?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Render `name`; the page records its own template name in a `<meta>` tag.
    ///
    /// # Errors
    /// Returns a template error when a variable the page needs is missing.
    pub fn render(&self, name: &str, mut context: Context) -> AppResult<Html<String>> {
        context.insert("template", name);
        Ok(Html(self.tera.render(name, &context)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_compile() {
        assert!(Templates::new().is_ok());
    }

    #[test]
    fn index_page_renders_counts() {
        let templates = Templates::new().unwrap();
        let mut ctx = Context::new();
        ctx.insert("counts", &crate::models::CatalogCounts {
            books: 3,
            copies: 7,
            copies_available: 2,
            authors: 1,
        });
        let Html(body) = templates.render("index.html", ctx).unwrap();
        assert!(body.contains(r#"<meta name="template" content="index.html">"#));
        assert!(body.contains("<strong>Copies available:</strong> 2"));
    }
}
