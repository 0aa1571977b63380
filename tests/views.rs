use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use chrono::{Days, NaiveDate};
use http_body_util::BodyExt;
use library_catalog::{
    AppState, Backend, Config, DeleteOutcome, LoanStatus, NewAuthor, NewBook, NewBookInstance,
    Permission, User,
    cache::{CacheStore, MemoryCache},
    clock::FixedClock,
    hash_password, issue_tokens,
    repository::{CatalogRepository, InMemoryCatalog},
    routes,
};
use mockall::mock;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

mock! {
    pub Cache {}
    impl CacheStore for Cache {
        fn get(&self, key: &str) -> Option<Value>;
        fn set(&self, key: &str, value: Value, ttl: Duration);
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

fn test_config() -> Config {
    Config {
        backend: Backend::Memory,
        database_url: None,
        jwt_secret: "views_test_secret".into(),
        server_port: 0,
        page_size: 10,
        book_cache_ttl_secs: 3600,
        rate_limit_per_minute: 1000,
        librarian: None,
    }
}

struct Harness {
    app: Router,
    catalog: Arc<InMemoryCatalog>,
    config: Config,
}

impl Harness {
    fn new() -> Self {
        Self::build(Arc::new(InMemoryCatalog::new()), Arc::new(MemoryCache::new()))
    }

    fn build(catalog: Arc<InMemoryCatalog>, cache: Arc<dyn CacheStore>) -> Self {
        let config = test_config();
        let state = AppState::new(
            config.clone(),
            catalog.clone(),
            cache,
            Arc::new(FixedClock(today())),
        )
        .unwrap();
        Self {
            app: routes::router(Arc::new(state)),
            catalog,
            config,
        }
    }

    async fn user(&self, username: &str, perms: &[Permission]) -> User {
        let hash = hash_password("1X<ISRUkw+tuK").unwrap();
        let perms: Vec<String> = perms.iter().map(|p| p.as_str().to_string()).collect();
        self.catalog
            .create_user(username, &hash, &perms)
            .await
            .unwrap()
    }

    fn cookie(&self, user: &User) -> String {
        let tokens = issue_tokens(user.id, &self.config).unwrap();
        format!("access_token={}", tokens.access)
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, cookie: Option<&str>, form: &str) -> Response {
        let mut req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(req.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    async fn book(&self, title: &str, isbn: &str) -> i64 {
        let author = self
            .catalog
            .create_author(NewAuthor {
                first_name: "John".into(),
                last_name: "Smith".into(),
                date_of_birth: None,
                date_of_death: None,
            })
            .await
            .unwrap();
        let genre = self
            .catalog
            .create_genre(&format!("Fantasy {isbn}"))
            .await
            .unwrap();
        let language = self
            .catalog
            .create_language(&format!("English {isbn}"))
            .await
            .unwrap();
        self.catalog
            .create_book(NewBook {
                title: title.into(),
                author_id: Some(author.id),
                summary: "My book summary".into(),
                isbn: isbn.into(),
                language_id: Some(language.id),
                genre_ids: vec![genre.id],
            })
            .await
            .unwrap()
            .id
    }

    async fn copy(
        &self,
        book_id: i64,
        borrower: Option<Uuid>,
        due_back: NaiveDate,
        status: LoanStatus,
    ) -> Uuid {
        self.catalog
            .create_instance(NewBookInstance {
                book_id,
                imprint: "Unlikely Imprint, 2016".into(),
                due_back: Some(due_back),
                status,
                borrower_id: borrower,
            })
            .await
            .unwrap()
            .id
    }
}

async fn body_text(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(res: &Response) -> &str {
    res.headers()[LOCATION].to_str().unwrap()
}

fn template_marker(name: &str) -> String {
    format!(r#"<meta name="template" content="{name}">"#)
}

// ---- lists ----

#[tokio::test]
async fn author_list_is_paginated_by_ten() {
    let h = Harness::new();
    for n in 0..13 {
        h.catalog
            .create_author(NewAuthor {
                first_name: format!("Dominique {n}"),
                last_name: format!("Surname {n}"),
                date_of_birth: None,
                date_of_death: None,
            })
            .await
            .unwrap();
    }

    let res = h.get("/catalog/authors/", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(&template_marker("catalog/author_list.html")));
    assert_eq!(body.matches(r#"<li class="author">"#).count(), 10);
    assert!(body.contains("Page 1 of 2."));

    let body = body_text(h.get("/catalog/authors/?page=2", None).await).await;
    assert_eq!(body.matches(r#"<li class="author">"#).count(), 3);
}

#[tokio::test]
async fn page_outside_range_is_not_found() {
    let h = Harness::new();
    h.book("Book Title", "ABCDEFG").await;
    for uri in [
        "/catalog/books/?page=2",
        "/catalog/books/?page=0",
        "/catalog/books/?page=abc",
    ] {
        assert_eq!(h.get(uri, None).await.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    assert_eq!(
        h.get("/catalog/books/?page=1", None).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn index_shows_counts() {
    let h = Harness::new();
    let book = h.book("Book Title", "ABCDEFG").await;
    h.copy(book, None, today(), LoanStatus::Available).await;
    h.copy(book, None, today(), LoanStatus::Maintenance).await;

    let res = h.get("/catalog/", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(&template_marker("index.html")));
    assert!(body.contains("<strong>Copies:</strong> 2"));
    assert!(body.contains("<strong>Copies available:</strong> 1"));
}

#[tokio::test]
async fn root_redirects_to_catalog() {
    let h = Harness::new();
    let res = h.get("/", None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/catalog/");
}

#[tokio::test]
async fn unknown_book_and_author_are_not_found() {
    let h = Harness::new();
    assert_eq!(
        h.get("/catalog/book/999", None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        h.get("/catalog/author/999", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let h = Harness::new();
    let editor = h
        .user("editor", &[Permission::ChangeBook, Permission::DeleteAuthor])
        .await;
    let cookie = h.cookie(&editor);
    for uri in ["/catalog/book/abc", "/catalog/author/abc"] {
        assert_eq!(h.get(uri, None).await.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    assert_eq!(
        h.get("/catalog/book/abc/update/", Some(&cookie)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        h.post("/catalog/author/1.5/delete/", Some(&cookie), "")
            .await
            .status(),
        StatusCode::NOT_FOUND
    );
}

// ---- borrowed by user ----

#[tokio::test]
async fn my_borrowed_redirects_anonymous_to_login() {
    let h = Harness::new();
    let res = h.get("/catalog/mybooks/", None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/accounts/login/?next=/catalog/mybooks/");
}

/// Ten copies split between two borrowers, due over the next five days.
async fn lend_alternately(h: &Harness, book: i64, borrowers: [Uuid; 2], status: LoanStatus) {
    for n in 0..10u64 {
        let due = today() + Days::new(n % 5);
        let borrower = borrowers[usize::from(n % 2 == 1)];
        h.copy(book, Some(borrower), due, status).await;
    }
}

#[tokio::test]
async fn my_borrowed_lists_only_own_copies_on_loan_by_due_date() {
    let h = Harness::new();
    let user1 = h.user("testuser1", &[]).await;
    let user2 = h.user("testuser2", &[]).await;
    let book = h.book("Book Title", "ABCDEFG").await;

    lend_alternately(&h, book, [user1.id, user2.id], LoanStatus::Maintenance).await;
    let cookie = h.cookie(&user1);

    let res = h.get("/catalog/mybooks/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(&template_marker(
        "catalog/bookinstance_list_borrowed_user.html"
    )));
    assert!(body.contains("testuser1"));
    assert!(body.contains("There are no books borrowed."));

    lend_alternately(&h, book, [user1.id, user2.id], LoanStatus::OnLoan).await;

    let body = body_text(h.get("/catalog/mybooks/", Some(&cookie)).await).await;
    assert_eq!(body.matches(r#"<li class="loan"#).count(), 5);

    let dates: Vec<usize> = [0u64, 2, 4]
        .iter()
        .map(|d| body.find(&(today() + Days::new(*d)).to_string()).unwrap())
        .collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]), "sorted by due date");
}

#[tokio::test]
async fn all_borrowed_requires_permission() {
    let h = Harness::new();
    let patron = h.user("patron", &[]).await;
    let librarian = h.user("librarian", &[Permission::CanMarkReturned]).await;
    let book = h.book("Book Title", "ABCDEFG").await;
    h.copy(book, Some(patron.id), today(), LoanStatus::OnLoan).await;
    h.copy(
        book,
        Some(librarian.id),
        today() - Days::new(3),
        LoanStatus::OnLoan,
    )
    .await;

    let res = h.get("/catalog/borrowed/", Some(&h.cookie(&patron))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = h.get("/catalog/borrowed/", Some(&h.cookie(&librarian))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert_eq!(body.matches(r#"<li class="loan"#).count(), 2);
    assert_eq!(body.matches("text-danger").count(), 1, "one copy overdue");
}

#[tokio::test]
async fn refresh_cookie_renews_the_session() {
    let h = Harness::new();
    let user = h.user("testuser1", &[]).await;
    let tokens = issue_tokens(user.id, &h.config).unwrap();
    let cookie = format!("refresh_token={}", tokens.refresh);

    let res = h.get("/catalog/mybooks/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let set_cookies: Vec<&str> = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert!(set_cookies.iter().any(|c| c.starts_with("access_token=")));
}

#[tokio::test]
async fn refresh_token_is_not_accepted_as_access_token() {
    let h = Harness::new();
    let user = h.user("testuser1", &[]).await;
    let tokens = issue_tokens(user.id, &h.config).unwrap();
    let cookie = format!("access_token={}", tokens.refresh);
    let res = h.get("/catalog/mybooks/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

// ---- renewal ----

struct RenewFixture {
    h: Harness,
    patron: User,
    librarian: User,
    patron_copy: Uuid,
    librarian_copy: Uuid,
}

async fn renew_fixture() -> RenewFixture {
    let h = Harness::new();
    let patron = h.user("testuser1", &[]).await;
    let librarian = h.user("testuser2", &[Permission::CanMarkReturned]).await;
    let book = h.book("Book Title", "ABCDEFG").await;
    let due = today() + Days::new(5);
    let patron_copy = h.copy(book, Some(patron.id), due, LoanStatus::OnLoan).await;
    let librarian_copy = h
        .copy(book, Some(librarian.id), due, LoanStatus::OnLoan)
        .await;
    RenewFixture {
        h,
        patron,
        librarian,
        patron_copy,
        librarian_copy,
    }
}

fn renew_url(id: Uuid) -> String {
    format!("/catalog/book/{id}/renew/")
}

#[tokio::test]
async fn renew_redirects_anonymous_to_login() {
    let f = renew_fixture().await;
    let res = f.h.get(&renew_url(f.patron_copy), None).await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(location(&res).starts_with("/accounts/login/"));
}

#[tokio::test]
async fn renew_forbidden_without_permission() {
    let f = renew_fixture().await;
    let res = f
        .h
        .get(&renew_url(f.patron_copy), Some(&f.h.cookie(&f.patron)))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn librarian_can_open_renewal_for_any_borrower() {
    let f = renew_fixture().await;
    let cookie = f.h.cookie(&f.librarian);
    for copy in [f.librarian_copy, f.patron_copy] {
        let res = f.h.get(&renew_url(copy), Some(&cookie)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert!(body.contains(&template_marker("catalog/book_renew_librarian.html")));
    }
}

#[tokio::test]
async fn renew_unknown_copy_is_not_found() {
    let f = renew_fixture().await;
    let cookie = f.h.cookie(&f.librarian);
    let res = f.h.get(&renew_url(Uuid::new_v4()), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = f
        .h
        .get("/catalog/book/not-a-uuid/renew/", Some(&cookie))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn renewal_form_starts_three_weeks_out() {
    let f = renew_fixture().await;
    let res = f
        .h
        .get(&renew_url(f.patron_copy), Some(&f.h.cookie(&f.librarian)))
        .await;
    let body = body_text(res).await;
    let expected = today() + Days::new(21);
    assert!(body.contains(&format!(r#"name="due_back" id="id_due_back" value="{expected}""#)));
    assert!(body.contains("New renewal date"));
}

#[tokio::test]
async fn valid_renewal_redirects_and_updates_due_date() {
    let f = renew_fixture().await;
    let new_date = today() + Days::new(14);
    let res = f
        .h
        .post(
            &renew_url(f.patron_copy),
            Some(&f.h.cookie(&f.librarian)),
            &format!("due_back={new_date}"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/catalog/borrowed/");

    let copy = f.h.catalog.find_instance(f.patron_copy).await.unwrap().unwrap();
    assert_eq!(copy.due_back, Some(new_date));
}

#[tokio::test]
async fn renewal_in_past_is_rejected() {
    let f = renew_fixture().await;
    let past = today() - Days::new(7);
    let res = f
        .h
        .post(
            &renew_url(f.patron_copy),
            Some(&f.h.cookie(&f.librarian)),
            &format!("due_back={past}"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Invalid date - renewal in past"));

    let copy = f.h.catalog.find_instance(f.patron_copy).await.unwrap().unwrap();
    assert_eq!(copy.due_back, Some(today() + Days::new(5)));
}

#[tokio::test]
async fn renewal_beyond_four_weeks_is_rejected() {
    let f = renew_fixture().await;
    let future = today() + Days::new(35);
    let res = f
        .h
        .post(
            &renew_url(f.patron_copy),
            Some(&f.h.cookie(&f.librarian)),
            &format!("due_back={future}"),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(
        body_text(res)
            .await
            .contains("Invalid date - renewal more than 4 weeks ahead")
    );
}

#[tokio::test]
async fn standalone_renewal_form_accepts_the_last_allowed_day() {
    let f = renew_fixture().await;
    let cookie = f.h.cookie(&f.librarian);
    let url = format!("/catalog/book/{}/renew-date/", f.patron_copy);

    let body = body_text(f.h.get(&url, Some(&cookie)).await).await;
    assert!(body.contains(r#"name="renewal_date""#));

    let last_day = today() + Days::new(28);
    let res = f
        .h
        .post(&url, Some(&cookie), &format!("renewal_date={last_day}"))
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let copy = f.h.catalog.find_instance(f.patron_copy).await.unwrap().unwrap();
    assert_eq!(copy.due_back, Some(last_day));
}

// ---- book detail cache ----

async fn seeded_catalog() -> (Arc<InMemoryCatalog>, i64) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let book = catalog
        .create_book(NewBook {
            title: "Book Title".into(),
            author_id: None,
            summary: "My book summary".into(),
            isbn: "ABCDEFG".into(),
            language_id: None,
            genre_ids: Vec::new(),
        })
        .await
        .unwrap();
    (catalog, book.id)
}

#[tokio::test]
async fn book_detail_miss_loads_and_caches_for_an_hour() {
    let (catalog, id) = seeded_catalog().await;
    let key = format!("book_{id}");

    let mut cache = MockCache::new();
    let get_key = key.clone();
    cache
        .expect_get()
        .withf(move |k| k == get_key)
        .times(1)
        .returning(|_| None);
    cache
        .expect_set()
        .withf(move |k, value, ttl| {
            k == key && value["book"]["title"] == "Book Title" && *ttl == Duration::from_secs(3600)
        })
        .times(1)
        .return_const(());

    let h = Harness::build(catalog, Arc::new(cache));
    let res = h.get(&format!("/catalog/book/{id}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(&template_marker("catalog/book_detail.html")));
    assert!(body.contains("Book Title"));
}

#[tokio::test]
async fn book_detail_hit_skips_catalog_and_does_not_rewrite() {
    let (catalog, id) = seeded_catalog().await;
    let mut detail = catalog.find_book(id).await.unwrap().unwrap();
    detail.book.title = "Cached Title".into();
    let cached = serde_json::to_value(&detail).unwrap();

    let mut cache = MockCache::new();
    cache
        .expect_get()
        .times(1)
        .returning(move |_| Some(cached.clone()));
    cache.expect_set().never();

    let h = Harness::build(catalog, Arc::new(cache));
    let res = h.get(&format!("/catalog/book/{id}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains("Cached Title"));
    assert!(!body.contains("Book Title"));
}

#[tokio::test]
async fn book_detail_second_request_served_from_memory_cache() {
    let (catalog, id) = seeded_catalog().await;
    let cache = Arc::new(MemoryCache::new());
    let h = Harness::build(catalog, cache.clone());
    let uri = format!("/catalog/book/{id}");

    assert_eq!(h.get(&uri, None).await.status(), StatusCode::OK);
    assert!(cache.get(&format!("book_{id}")).is_some());
    assert_eq!(h.catalog.delete_book(id).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(h.get(&uri, None).await.status(), StatusCode::OK);
}

// ---- sign-in ----

#[tokio::test]
async fn login_sets_session_and_follows_next() {
    let h = Harness::new();
    h.user("testuser1", &[]).await;

    let res = h.get("/accounts/login/?next=/catalog/mybooks/", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains(&template_marker("registration/login.html")));

    let res = h
        .post(
            "/accounts/login/",
            None,
            "username=testuser1&password=1X%3CISRUkw%2BtuK&next=%2Fcatalog%2Fmybooks%2F",
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/catalog/mybooks/");
    let access = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("access_token="))
        .and_then(|c| c.split(';').next())
        .unwrap()
        .to_string();

    let res = h.get("/catalog/mybooks/", Some(&access)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_with_wrong_password_shows_error() {
    let h = Harness::new();
    h.user("testuser1", &[]).await;
    let res = h
        .post("/accounts/login/", None, "username=testuser1&password=nope&next=")
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(SET_COOKIE).is_none());
    assert!(
        body_text(res)
            .await
            .contains("Please enter a correct username and password.")
    );
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let h = Harness::new();
    h.user("testuser1", &[]).await;
    for next in [
        "%2F%2Fevil.example%2F",
        "%2F%5Cevil.example%2F",
        "https%3A%2F%2Fevil.example%2F",
    ] {
        let res = h
            .post(
                "/accounts/login/",
                None,
                &format!("username=testuser1&password=1X%3CISRUkw%2BtuK&next={next}"),
            )
            .await;
        assert_eq!(res.status(), StatusCode::FOUND, "{next}");
        assert_eq!(location(&res), "/catalog/", "{next}");
    }
}

#[tokio::test]
async fn logout_clears_session() {
    let h = Harness::new();
    let user = h.user("testuser1", &[]).await;
    let res = h.post("/accounts/logout/", Some(&h.cookie(&user)), "").await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/accounts/login/");
    assert!(
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .any(|c| c.to_str().unwrap().starts_with("access_token="))
    );
}

// ---- editing ----

#[tokio::test]
async fn author_create_requires_permission() {
    let h = Harness::new();
    let patron = h.user("patron", &[]).await;
    let res = h.get("/catalog/author/create/", Some(&h.cookie(&patron))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = h
        .post(
            "/catalog/author/create/",
            Some(&h.cookie(&patron)),
            "first_name=Ada&last_name=Lovelace",
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn author_create_update_and_delete() {
    let h = Harness::new();
    let librarian = h
        .user(
            "librarian",
            &[
                Permission::AddAuthor,
                Permission::ChangeAuthor,
                Permission::DeleteAuthor,
            ],
        )
        .await;
    let cookie = h.cookie(&librarian);

    let res = h.get("/catalog/author/create/", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains(&template_marker("catalog/author_form.html")));

    let res = h
        .post(
            "/catalog/author/create/",
            Some(&cookie),
            "first_name=Ada&last_name=Lovelace&date_of_birth=1815-12-10&date_of_death=",
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let url = location(&res).to_string();
    let id: i64 = url.trim_start_matches("/catalog/author/").parse().unwrap();
    let author = h.catalog.find_author(id).await.unwrap().unwrap().author;
    assert_eq!(author.last_name, "Lovelace");
    assert_eq!(author.date_of_death, None);

    let res = h
        .post(
            &format!("/catalog/author/{id}/update/"),
            Some(&cookie),
            "first_name=Ada&last_name=Lovelace&date_of_birth=1815-12-10&date_of_death=1852-11-27",
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), url);
    let author = h.catalog.find_author(id).await.unwrap().unwrap().author;
    assert_eq!(author.date_of_death, NaiveDate::from_ymd_opt(1852, 11, 27));

    let res = h
        .post(&format!("/catalog/author/{id}/delete/"), Some(&cookie), "")
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/catalog/authors/");
    assert!(h.catalog.find_author(id).await.unwrap().is_none());
}

#[tokio::test]
async fn author_form_errors_are_shown_again() {
    let h = Harness::new();
    let librarian = h.user("librarian", &[Permission::AddAuthor]).await;
    let res = h
        .post(
            "/catalog/author/create/",
            Some(&h.cookie(&librarian)),
            "first_name=Ada&last_name=Lovelace&date_of_birth=1852-11-27&date_of_death=1815-12-10",
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(
        body_text(res)
            .await
            .contains("Date of death cannot be before date of birth.")
    );
}

#[tokio::test]
async fn author_with_books_cannot_be_deleted() {
    let h = Harness::new();
    let librarian = h.user("librarian", &[Permission::DeleteAuthor]).await;
    let book = h.book("Book Title", "ABCDEFG").await;
    let author_id = h
        .catalog
        .find_book(book)
        .await
        .unwrap()
        .unwrap()
        .book
        .author_id
        .unwrap();

    let res = h
        .post(
            &format!("/catalog/author/{author_id}/delete/"),
            Some(&h.cookie(&librarian)),
            "",
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(&template_marker("catalog/author_confirm_delete.html")));
    assert!(body.contains("Book Title"));
    assert!(h.catalog.find_author(author_id).await.unwrap().is_some());
}

#[tokio::test]
async fn book_create_checks_references() {
    let h = Harness::new();
    let librarian = h.user("librarian", &[Permission::AddBook]).await;
    let cookie = h.cookie(&librarian);

    let res = h
        .post(
            "/catalog/book/create/",
            Some(&cookie),
            "title=Orphan&author=999&summary=&isbn=1234567890123&language=&genres=",
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Select a valid choice."));

    let genre = h.catalog.create_genre("Poetry").await.unwrap();
    let res = h
        .post(
            "/catalog/book/create/",
            Some(&cookie),
            &format!("title=Verses&author=&summary=&isbn=1234567890123&language=&genres={}", genre.id),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    let id: i64 = location(&res)
        .trim_start_matches("/catalog/book/")
        .parse()
        .unwrap();
    let detail = h.catalog.find_book(id).await.unwrap().unwrap();
    assert_eq!(detail.book.title, "Verses");
    assert_eq!(detail.genres, vec![genre]);

    let res = h
        .post(
            "/catalog/book/create/",
            Some(&cookie),
            "title=Copycat&author=&summary=&isbn=1234567890123&language=&genres=",
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Book with this ISBN already exists."));
}

#[tokio::test]
async fn book_with_copies_cannot_be_deleted() {
    let h = Harness::new();
    let librarian = h
        .user("librarian", &[Permission::DeleteBook, Permission::ChangeBook])
        .await;
    let cookie = h.cookie(&librarian);
    let book = h.book("Book Title", "ABCDEFG").await;
    h.copy(book, None, today(), LoanStatus::Available).await;

    let res = h.get(&format!("/catalog/book/{book}/update/"), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains(&template_marker("catalog/book_form.html")));

    let res = h
        .post(&format!("/catalog/book/{book}/delete/"), Some(&cookie), "")
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Unlikely Imprint, 2016"));
    assert!(h.catalog.find_book(book).await.unwrap().is_some());

    let empty = h.book("Another", "HIJKLMN").await;
    let res = h
        .post(&format!("/catalog/book/{empty}/delete/"), Some(&cookie), "")
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res), "/catalog/books/");
}
