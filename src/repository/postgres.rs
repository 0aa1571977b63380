use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    CatalogRepository, DUPLICATE_GENRE, DUPLICATE_ISBN, DUPLICATE_LANGUAGE, Listing, PageRequest,
};
use crate::{
    errors::{AppError, AppResult},
    models::{
        Author, AuthorDetail, Book, BookDetail, BookInstance, BookSummary, CatalogCounts,
        DeleteOutcome, Genre, Language, LoanedCopy, NewAuthor, NewBook,
        NewBookInstance, User,
    },
};

const AUTHOR_COLUMNS: &str = "id, first_name, last_name, date_of_birth, date_of_death";
const BOOK_COLUMNS: &str = "id, title, author_id, summary, isbn, language_id";
const INSTANCE_COLUMNS: &str = "id, book_id, imprint, due_back, status, borrower_id";
const USER_COLUMNS: &str = "id, username, password_hash, permissions, created_at";

const LOAN_SELECT: &str = "SELECT i.id, i.book_id, b.title, i.due_back, i.status, i.borrower_id, u.username AS borrower
         FROM book_instances i
         JOIN books b ON b.id = i.book_id
         LEFT JOIN users u ON u.id = i.borrower_id";

/// Catalog stored in PostgreSQL.
#[derive(Clone)]
pub struct PgCatalog {
    db: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Maps a unique-constraint violation to a validation error carrying `message`.
fn unique_conflict(message: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation(message.to_string())
        }
        other => other.into(),
    }
}

async fn replace_genres(
    tx: &mut Transaction<'_, Postgres>,
    book_id: i64,
    genre_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM book_genres WHERE book_id = $1")
        .bind(book_id)
        .execute(&mut **tx)
        .await?;
    for genre_id in genre_ids {
        sqlx::query("INSERT INTO book_genres (book_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(book_id)
            .bind(genre_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgCatalog {
    async fn counts(&self) -> AppResult<CatalogCounts> {
        let counts = sqlx::query_as::<_, CatalogCounts>(
            "SELECT (SELECT COUNT(*) FROM books) AS books,
                    (SELECT COUNT(*) FROM book_instances) AS copies,
                    (SELECT COUNT(*) FROM book_instances WHERE status = 'a') AS copies_available,
                    (SELECT COUNT(*) FROM authors) AS authors",
        )
        .fetch_one(&self.db)
        .await?;
        Ok(counts)
    }

    async fn list_authors(&self, page: PageRequest) -> AppResult<Listing<Author>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.db)
            .await?;
        let items = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY last_name, first_name, id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(Listing { items, total })
    }

    async fn find_author(&self, id: i64) -> AppResult<Option<AuthorDetail>> {
        let Some(author) = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE author_id = $1 ORDER BY title, id"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        Ok(Some(AuthorDetail { author, books }))
    }

    async fn create_author(&self, author: NewAuthor) -> AppResult<Author> {
        let created = sqlx::query_as::<_, Author>(&format!(
            "INSERT INTO authors (first_name, last_name, date_of_birth, date_of_death)
             VALUES ($1, $2, $3, $4)
             RETURNING {AUTHOR_COLUMNS}"
        ))
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(author.date_of_birth)
        .bind(author.date_of_death)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn update_author(&self, id: i64, author: NewAuthor) -> AppResult<Option<Author>> {
        let updated = sqlx::query_as::<_, Author>(&format!(
            "UPDATE authors SET first_name = $2, last_name = $3, date_of_birth = $4, date_of_death = $5
             WHERE id = $1
             RETURNING {AUTHOR_COLUMNS}"
        ))
        .bind(id)
        .bind(&author.first_name)
        .bind(&author.last_name)
        .bind(author.date_of_birth)
        .bind(author.date_of_death)
        .fetch_optional(&self.db)
        .await?;
        Ok(updated)
    }

    async fn delete_author(&self, id: i64) -> AppResult<DeleteOutcome> {
        let deleted = sqlx::query(
            "DELETE FROM authors WHERE id = $1
             AND NOT EXISTS (SELECT 1 FROM books WHERE author_id = $1)",
        )
        .bind(id)
        .execute(&self.db)
        .await?
        .rows_affected();
        if deleted > 0 {
            return Ok(DeleteOutcome::Deleted);
        }
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM authors WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(if exists { DeleteOutcome::InUse } else { DeleteOutcome::NotFound })
    }

    async fn list_books(&self, page: PageRequest) -> AppResult<Listing<BookSummary>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books")
            .fetch_one(&self.db)
            .await?;
        let items = sqlx::query_as::<_, BookSummary>(
            "SELECT b.id, b.title,
                    CASE WHEN a.id IS NULL THEN NULL ELSE a.last_name || ', ' || a.first_name END AS author
             FROM books b
             LEFT JOIN authors a ON a.id = b.author_id
             ORDER BY b.title, b.id
             LIMIT $1 OFFSET $2",
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(Listing { items, total })
    }

    async fn find_book(&self, id: i64) -> AppResult<Option<BookDetail>> {
        let Some(book) = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        else {
            return Ok(None);
        };

        let author = match book.author_id {
            Some(author_id) => {
                sqlx::query_as::<_, Author>(&format!(
                    "SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1"
                ))
                .bind(author_id)
                .fetch_optional(&self.db)
                .await?
            }
            None => None,
        };
        let language = match book.language_id {
            Some(language_id) => {
                sqlx::query_as::<_, Language>("SELECT id, name FROM languages WHERE id = $1")
                    .bind(language_id)
                    .fetch_optional(&self.db)
                    .await?
            }
            None => None,
        };
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genres g
             JOIN book_genres bg ON bg.genre_id = g.id
             WHERE bg.book_id = $1
             ORDER BY g.name",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        let copies = sqlx::query_as::<_, BookInstance>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM book_instances WHERE book_id = $1
             ORDER BY due_back ASC NULLS LAST, id"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(BookDetail {
            book,
            author,
            language,
            genres,
            copies,
        }))
    }

    async fn create_book(&self, book: NewBook) -> AppResult<Book> {
        let mut tx = self.db.begin().await?;
        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books (title, author_id, summary, isbn, language_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.title)
        .bind(book.author_id)
        .bind(&book.summary)
        .bind(&book.isbn)
        .bind(book.language_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_conflict(DUPLICATE_ISBN))?;
        replace_genres(&mut tx, created.id, &book.genre_ids).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_book(&self, id: i64, book: NewBook) -> AppResult<Option<Book>> {
        let mut tx = self.db.begin().await?;
        let Some(updated) = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET title = $2, author_id = $3, summary = $4, isbn = $5, language_id = $6
             WHERE id = $1
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(id)
        .bind(&book.title)
        .bind(book.author_id)
        .bind(&book.summary)
        .bind(&book.isbn)
        .bind(book.language_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unique_conflict(DUPLICATE_ISBN))?
        else {
            return Ok(None);
        };
        replace_genres(&mut tx, id, &book.genre_ids).await?;
        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn delete_book(&self, id: i64) -> AppResult<DeleteOutcome> {
        let deleted = sqlx::query(
            "DELETE FROM books WHERE id = $1
             AND NOT EXISTS (SELECT 1 FROM book_instances WHERE book_id = $1)",
        )
        .bind(id)
        .execute(&self.db)
        .await?
        .rows_affected();
        if deleted > 0 {
            return Ok(DeleteOutcome::Deleted);
        }
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(if exists { DeleteOutcome::InUse } else { DeleteOutcome::NotFound })
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(genres)
    }

    async fn create_genre(&self, name: &str) -> AppResult<Genre> {
        let genre = sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.db)
            .await
            .map_err(unique_conflict(DUPLICATE_GENRE))?;
        Ok(genre)
    }

    async fn list_languages(&self) -> AppResult<Vec<Language>> {
        let languages = sqlx::query_as::<_, Language>("SELECT id, name FROM languages ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(languages)
    }

    async fn create_language(&self, name: &str) -> AppResult<Language> {
        let language =
            sqlx::query_as::<_, Language>("INSERT INTO languages (name) VALUES ($1) RETURNING id, name")
                .bind(name)
                .fetch_one(&self.db)
                .await
                .map_err(unique_conflict(DUPLICATE_LANGUAGE))?;
        Ok(language)
    }

    async fn create_instance(&self, instance: NewBookInstance) -> AppResult<BookInstance> {
        let created = sqlx::query_as::<_, BookInstance>(&format!(
            "INSERT INTO book_instances (id, book_id, imprint, due_back, status, borrower_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {INSTANCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(instance.book_id)
        .bind(&instance.imprint)
        .bind(instance.due_back)
        .bind(instance.status)
        .bind(instance.borrower_id)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn find_instance(&self, id: Uuid) -> AppResult<Option<BookInstance>> {
        let instance = sqlx::query_as::<_, BookInstance>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM book_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(instance)
    }

    async fn set_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<bool> {
        let updated = sqlx::query("UPDATE book_instances SET due_back = $2 WHERE id = $1")
            .bind(id)
            .bind(due_back)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    async fn list_loans_by_borrower(
        &self,
        borrower: Uuid,
        page: PageRequest,
    ) -> AppResult<Listing<LoanedCopy>> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM book_instances WHERE status = 'o' AND borrower_id = $1",
        )
        .bind(borrower)
        .fetch_one(&self.db)
        .await?;
        let items = sqlx::query_as::<_, LoanedCopy>(&format!(
            "{LOAN_SELECT}
             WHERE i.status = 'o' AND i.borrower_id = $1
             ORDER BY i.due_back ASC NULLS LAST, i.id
             LIMIT $2 OFFSET $3"
        ))
        .bind(borrower)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(Listing { items, total })
    }

    async fn list_all_loans(&self, page: PageRequest) -> AppResult<Listing<LoanedCopy>> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM book_instances WHERE status = 'o'")
                .fetch_one(&self.db)
                .await?;
        let items = sqlx::query_as::<_, LoanedCopy>(&format!(
            "{LOAN_SELECT}
             WHERE i.status = 'o'
             ORDER BY i.due_back ASC NULLS LAST, i.id
             LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;
        Ok(Listing { items, total })
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        permissions: &[String],
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, permissions)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(permissions)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.db)
                .await?;
        Ok(user)
    }
}
