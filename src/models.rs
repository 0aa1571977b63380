use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn has_perm(&self, perm: Permission) -> bool {
        self.permissions.iter().any(|p| p == perm.as_str())
    }
}

/// Catalog permissions a user may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CanMarkReturned,
    AddAuthor,
    ChangeAuthor,
    DeleteAuthor,
    AddBook,
    ChangeBook,
    DeleteBook,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::CanMarkReturned,
        Permission::AddAuthor,
        Permission::ChangeAuthor,
        Permission::DeleteAuthor,
        Permission::AddBook,
        Permission::ChangeBook,
        Permission::DeleteBook,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Permission::CanMarkReturned => "catalog.can_mark_returned",
            Permission::AddAuthor => "catalog.add_author",
            Permission::ChangeAuthor => "catalog.change_author",
            Permission::DeleteAuthor => "catalog.delete_author",
            Permission::AddBook => "catalog.add_book",
            Permission::ChangeBook => "catalog.change_book",
            Permission::DeleteBook => "catalog.delete_book",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl Author {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
    pub language_id: Option<i64>,
}

/// Row of the book list page.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
}

/// Loan state of a copy, stored as a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status")]
pub enum LoanStatus {
    #[serde(rename = "m")]
    #[sqlx(rename = "m")]
    Maintenance,
    #[serde(rename = "o")]
    #[sqlx(rename = "o")]
    OnLoan,
    #[serde(rename = "a")]
    #[sqlx(rename = "a")]
    Available,
    #[serde(rename = "r")]
    #[sqlx(rename = "r")]
    Reserved,
}

impl LoanStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "Maintenance",
            LoanStatus::OnLoan => "On loan",
            LoanStatus::Available => "Available",
            LoanStatus::Reserved => "Reserved",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: i64,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<Uuid>,
}

impl BookInstance {
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_back.is_some_and(|d| d < today)
    }
}

/// A copy joined with the title it belongs to, for loan listings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanedCopy {
    pub id: Uuid,
    pub book_id: i64,
    pub title: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<Uuid>,
    pub borrower: Option<String>,
}

/// Everything the book detail page shows; this is also what gets cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    pub copies: Vec<BookInstance>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorDetail {
    pub author: Author,
    pub books: Vec<Book>,
}

#[derive(sqlx::FromRow, Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CatalogCounts {
    pub books: i64,
    pub copies: i64,
    pub copies_available: i64,
    pub authors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
    pub language_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookInstance {
    pub book_id: i64,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<Uuid>,
}

/// Result of a delete that other records may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    InUse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub refresh: bool,
}
