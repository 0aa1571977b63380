use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    errors::AppResult,
    models::{
        Author, AuthorDetail, Book, BookDetail, BookInstance, BookSummary, CatalogCounts,
        DeleteOutcome, Genre, Language, LoanedCopy, NewAuthor, NewBook,
        NewBookInstance, User,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCatalog;
pub use postgres::PgCatalog;

/// Reported as [`crate::AppError::Validation`] when a book save reuses an ISBN.
pub const DUPLICATE_ISBN: &str = "Book with this ISBN already exists.";
pub const DUPLICATE_GENRE: &str = "Genre with this name already exists.";
pub const DUPLICATE_LANGUAGE: &str = "Language with this name already exists.";

/// Window of rows to fetch for one list page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

/// One page of rows plus the size of the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Persistent storage for the catalog.
///
/// Lists come back in display order: authors by last then first name, books by
/// title, loans by due date (undated loans last).
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn counts(&self) -> AppResult<CatalogCounts>;

    // Authors
    async fn list_authors(&self, page: PageRequest) -> AppResult<Listing<Author>>;
    async fn find_author(&self, id: i64) -> AppResult<Option<AuthorDetail>>;
    async fn create_author(&self, author: NewAuthor) -> AppResult<Author>;
    async fn update_author(&self, id: i64, author: NewAuthor) -> AppResult<Option<Author>>;
    /// Refused with [`DeleteOutcome::InUse`] while books reference the author.
    async fn delete_author(&self, id: i64) -> AppResult<DeleteOutcome>;

    // Books
    async fn list_books(&self, page: PageRequest) -> AppResult<Listing<BookSummary>>;
    async fn find_book(&self, id: i64) -> AppResult<Option<BookDetail>>;
    async fn create_book(&self, book: NewBook) -> AppResult<Book>;
    async fn update_book(&self, id: i64, book: NewBook) -> AppResult<Option<Book>>;
    /// Refused with [`DeleteOutcome::InUse`] while copies of the book exist.
    async fn delete_book(&self, id: i64) -> AppResult<DeleteOutcome>;

    // Reference data
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;
    async fn create_genre(&self, name: &str) -> AppResult<Genre>;
    async fn list_languages(&self) -> AppResult<Vec<Language>>;
    async fn create_language(&self, name: &str) -> AppResult<Language>;

    // Copies and loans
    async fn create_instance(&self, instance: NewBookInstance) -> AppResult<BookInstance>;
    async fn find_instance(&self, id: Uuid) -> AppResult<Option<BookInstance>>;
    async fn set_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<bool>;
    /// Copies on loan to `borrower`.
    async fn list_loans_by_borrower(
        &self,
        borrower: Uuid,
        page: PageRequest,
    ) -> AppResult<Listing<LoanedCopy>>;
    /// Every copy on loan.
    async fn list_all_loans(&self, page: PageRequest) -> AppResult<Listing<LoanedCopy>>;

    // Users
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        permissions: &[String],
    ) -> AppResult<User>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
}
