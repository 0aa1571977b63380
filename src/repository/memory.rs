use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CatalogRepository, DUPLICATE_GENRE, DUPLICATE_ISBN, DUPLICATE_LANGUAGE, Listing, PageRequest,
};
use crate::{
    errors::{AppError, AppResult},
    models::{
        Author, AuthorDetail, Book, BookDetail, BookInstance, BookSummary, CatalogCounts,
        DeleteOutcome, Genre, Language, LoanStatus, LoanedCopy, NewAuthor, NewBook,
        NewBookInstance, User,
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    authors: BTreeMap<i64, Author>,
    books: BTreeMap<i64, Book>,
    book_genres: HashMap<i64, Vec<i64>>,
    genres: BTreeMap<i64, Genre>,
    languages: BTreeMap<i64, Language>,
    instances: HashMap<Uuid, BookInstance>,
    users: HashMap<Uuid, User>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Same rule as the `books.isbn` unique constraint.
    fn check_isbn(&self, isbn: &str, except: Option<i64>) -> AppResult<()> {
        if self
            .books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != except)
        {
            return Err(AppError::Validation(DUPLICATE_ISBN.to_string()));
        }
        Ok(())
    }

    fn loans(&self, keep: impl Fn(&BookInstance) -> bool) -> Vec<LoanedCopy> {
        let mut loans: Vec<LoanedCopy> = self
            .instances
            .values()
            .filter(|i| i.status == LoanStatus::OnLoan && keep(i))
            .map(|i| LoanedCopy {
                id: i.id,
                book_id: i.book_id,
                title: self
                    .books
                    .get(&i.book_id)
                    .map(|b| b.title.clone())
                    .unwrap_or_default(),
                due_back: i.due_back,
                status: i.status,
                borrower_id: i.borrower_id,
                borrower: i
                    .borrower_id
                    .and_then(|id| self.users.get(&id))
                    .map(|u| u.username.clone()),
            })
            .collect();
        // undated loans sort last, as NULLS LAST does
        loans.sort_by_key(|l| (l.due_back.is_none(), l.due_back, l.id));
        loans
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Listing<T> {
    let total = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let offset = usize::try_from(page.offset).unwrap_or(0);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    let items = items.into_iter().skip(offset).take(limit).collect();
    Listing { items, total }
}

/// Catalog held in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn counts(&self) -> AppResult<CatalogCounts> {
        let t = self.tables.read().await;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        Ok(CatalogCounts {
            books: count(t.books.len()),
            copies: count(t.instances.len()),
            copies_available: count(
                t.instances
                    .values()
                    .filter(|i| i.status == LoanStatus::Available)
                    .count(),
            ),
            authors: count(t.authors.len()),
        })
    }

    async fn list_authors(&self, page: PageRequest) -> AppResult<Listing<Author>> {
        let t = self.tables.read().await;
        let mut authors: Vec<Author> = t.authors.values().cloned().collect();
        authors.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(paginate(authors, page))
    }

    async fn find_author(&self, id: i64) -> AppResult<Option<AuthorDetail>> {
        let t = self.tables.read().await;
        let Some(author) = t.authors.get(&id).cloned() else {
            return Ok(None);
        };
        let mut books: Vec<Book> = t
            .books
            .values()
            .filter(|b| b.author_id == Some(id))
            .cloned()
            .collect();
        books.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(Some(AuthorDetail { author, books }))
    }

    async fn create_author(&self, author: NewAuthor) -> AppResult<Author> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let created = Author {
            id,
            first_name: author.first_name,
            last_name: author.last_name,
            date_of_birth: author.date_of_birth,
            date_of_death: author.date_of_death,
        };
        t.authors.insert(id, created.clone());
        Ok(created)
    }

    async fn update_author(&self, id: i64, author: NewAuthor) -> AppResult<Option<Author>> {
        let mut t = self.tables.write().await;
        Ok(t.authors.get_mut(&id).map(|existing| {
            existing.first_name = author.first_name;
            existing.last_name = author.last_name;
            existing.date_of_birth = author.date_of_birth;
            existing.date_of_death = author.date_of_death;
            existing.clone()
        }))
    }

    async fn delete_author(&self, id: i64) -> AppResult<DeleteOutcome> {
        let mut t = self.tables.write().await;
        if !t.authors.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if t.books.values().any(|b| b.author_id == Some(id)) {
            return Ok(DeleteOutcome::InUse);
        }
        t.authors.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_books(&self, page: PageRequest) -> AppResult<Listing<BookSummary>> {
        let t = self.tables.read().await;
        let mut books: Vec<BookSummary> = t
            .books
            .values()
            .map(|b| BookSummary {
                id: b.id,
                title: b.title.clone(),
                author: b
                    .author_id
                    .and_then(|id| t.authors.get(&id))
                    .map(Author::display_name),
            })
            .collect();
        books.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(paginate(books, page))
    }

    async fn find_book(&self, id: i64) -> AppResult<Option<BookDetail>> {
        let t = self.tables.read().await;
        let Some(book) = t.books.get(&id).cloned() else {
            return Ok(None);
        };
        let author = book.author_id.and_then(|a| t.authors.get(&a).cloned());
        let language = book.language_id.and_then(|l| t.languages.get(&l).cloned());
        let mut genres: Vec<Genre> = t
            .book_genres
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|g| t.genres.get(g).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        let mut copies: Vec<BookInstance> = t
            .instances
            .values()
            .filter(|i| i.book_id == id)
            .cloned()
            .collect();
        copies.sort_by_key(|i| (i.due_back.is_none(), i.due_back, i.id));
        Ok(Some(BookDetail {
            book,
            author,
            language,
            genres,
            copies,
        }))
    }

    async fn create_book(&self, book: NewBook) -> AppResult<Book> {
        let mut t = self.tables.write().await;
        t.check_isbn(&book.isbn, None)?;
        let id = t.next_id();
        let created = Book {
            id,
            title: book.title,
            author_id: book.author_id,
            summary: book.summary,
            isbn: book.isbn,
            language_id: book.language_id,
        };
        t.books.insert(id, created.clone());
        t.book_genres.insert(id, book.genre_ids);
        Ok(created)
    }

    async fn update_book(&self, id: i64, book: NewBook) -> AppResult<Option<Book>> {
        let mut t = self.tables.write().await;
        t.check_isbn(&book.isbn, Some(id))?;
        let Some(existing) = t.books.get_mut(&id) else {
            return Ok(None);
        };
        existing.title = book.title;
        existing.author_id = book.author_id;
        existing.summary = book.summary;
        existing.isbn = book.isbn;
        existing.language_id = book.language_id;
        let updated = existing.clone();
        t.book_genres.insert(id, book.genre_ids);
        Ok(Some(updated))
    }

    async fn delete_book(&self, id: i64) -> AppResult<DeleteOutcome> {
        let mut t = self.tables.write().await;
        if !t.books.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if t.instances.values().any(|i| i.book_id == id) {
            return Ok(DeleteOutcome::InUse);
        }
        t.books.remove(&id);
        t.book_genres.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let t = self.tables.read().await;
        let mut genres: Vec<Genre> = t.genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    async fn create_genre(&self, name: &str) -> AppResult<Genre> {
        let mut t = self.tables.write().await;
        if t.genres.values().any(|g| g.name == name) {
            return Err(AppError::Validation(DUPLICATE_GENRE.to_string()));
        }
        let id = t.next_id();
        let genre = Genre {
            id,
            name: name.to_string(),
        };
        t.genres.insert(id, genre.clone());
        Ok(genre)
    }

    async fn list_languages(&self) -> AppResult<Vec<Language>> {
        let t = self.tables.read().await;
        let mut languages: Vec<Language> = t.languages.values().cloned().collect();
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(languages)
    }

    async fn create_language(&self, name: &str) -> AppResult<Language> {
        let mut t = self.tables.write().await;
        if t.languages.values().any(|l| l.name == name) {
            return Err(AppError::Validation(DUPLICATE_LANGUAGE.to_string()));
        }
        let id = t.next_id();
        let language = Language {
            id,
            name: name.to_string(),
        };
        t.languages.insert(id, language.clone());
        Ok(language)
    }

    async fn create_instance(&self, instance: NewBookInstance) -> AppResult<BookInstance> {
        let mut t = self.tables.write().await;
        let created = BookInstance {
            id: Uuid::new_v4(),
            book_id: instance.book_id,
            imprint: instance.imprint,
            due_back: instance.due_back,
            status: instance.status,
            borrower_id: instance.borrower_id,
        };
        t.instances.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_instance(&self, id: Uuid) -> AppResult<Option<BookInstance>> {
        Ok(self.tables.read().await.instances.get(&id).cloned())
    }

    async fn set_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        Ok(t.instances
            .get_mut(&id)
            .map(|i| i.due_back = Some(due_back))
            .is_some())
    }

    async fn list_loans_by_borrower(
        &self,
        borrower: Uuid,
        page: PageRequest,
    ) -> AppResult<Listing<LoanedCopy>> {
        let t = self.tables.read().await;
        Ok(paginate(t.loans(|i| i.borrower_id == Some(borrower)), page))
    }

    async fn list_all_loans(&self, page: PageRequest) -> AppResult<Listing<LoanedCopy>> {
        let t = self.tables.read().await;
        Ok(paginate(t.loans(|_| true), page))
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        permissions: &[String],
    ) -> AppResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == username) {
            return Err(AppError::Validation(format!(
                "username `{username}` is taken"
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            permissions: permissions.to_vec(),
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
}
