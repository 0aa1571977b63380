//! HTML forms for editing authors and books, and for signing in.

use std::{borrow::Cow, collections::BTreeMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{Author, BookDetail, NewAuthor, NewBook};

/// Error messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    /// Collect `validator` output. Struct-level errors are reported on `schema_field`.
    #[must_use]
    pub fn from_validation(errors: &ValidationErrors, schema_field: &str) -> Self {
        let mut out = Self::default();
        for (field, errs) in errors.field_errors() {
            let field = if field == "__all__" { schema_field } else { &*field };
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| "Enter a valid value.".to_string(), ToString::to_string);
                out.add(field, message);
            }
        }
        out
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Vec<String> {
        self.0.get(field).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One input as the form templates lay it out.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

impl FieldView {
    fn new(
        name: &'static str,
        label: &'static str,
        input_type: &'static str,
        value: &str,
        errors: &FormErrors,
    ) -> Self {
        Self {
            name,
            label,
            input_type,
            value: value.to_string(),
            errors: errors.get(name),
        }
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn parse_optional_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn parse_optional_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

fn validate_optional_date(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || parse_optional_date(value).is_some() {
        Ok(())
    } else {
        Err(invalid("date", "Enter a valid date."))
    }
}

fn validate_optional_id(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || parse_optional_id(value).is_some() {
        Ok(())
    } else {
        Err(invalid("choice", "Select a valid choice."))
    }
}

fn validate_id_list(value: &str) -> Result<(), ValidationError> {
    let all_valid = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .all(|part| part.parse::<i64>().is_ok());
    if all_valid {
        Ok(())
    } else {
        Err(invalid("choice", "Enter a comma-separated list of genre ids."))
    }
}

fn validate_lifespan(form: &AuthorForm) -> Result<(), ValidationError> {
    match (
        parse_optional_date(&form.date_of_birth),
        parse_optional_date(&form.date_of_death),
    ) {
        (Some(born), Some(died)) if died < born => Err(invalid(
            "lifespan",
            "Date of death cannot be before date of birth.",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_lifespan"))]
pub struct AuthorForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Enter a first name of at most 100 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Enter a last name of at most 100 characters."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_optional_date"))]
    pub date_of_birth: String,
    #[serde(default)]
    #[validate(custom(function = "validate_optional_date"))]
    pub date_of_death: String,
}

impl AuthorForm {
    #[must_use]
    pub fn from_author(author: &Author) -> Self {
        Self {
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            date_of_birth: author.date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
            date_of_death: author.date_of_death.map(|d| d.to_string()).unwrap_or_default(),
        }
    }

    /// Validate and convert into a record.
    ///
    /// # Errors
    /// The per-field messages when any rule fails.
    pub fn clean(&self) -> Result<NewAuthor, FormErrors> {
        self.validate()
            .map_err(|e| FormErrors::from_validation(&e, "date_of_death"))?;
        Ok(NewAuthor {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth: parse_optional_date(&self.date_of_birth),
            date_of_death: parse_optional_date(&self.date_of_death),
        })
    }

    #[must_use]
    pub fn fields(&self, errors: &FormErrors) -> Vec<FieldView> {
        vec![
            FieldView::new("first_name", "First name", "text", &self.first_name, errors),
            FieldView::new("last_name", "Last name", "text", &self.last_name, errors),
            FieldView::new("date_of_birth", "Date of birth", "date", &self.date_of_birth, errors),
            FieldView::new("date_of_death", "Died", "date", &self.date_of_death, errors),
        ]
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct BookForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Enter a title of at most 200 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "validate_optional_id"))]
    pub author: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Keep the summary under 1000 characters."))]
    pub summary: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 13, message = "Enter an ISBN of at most 13 characters."))]
    pub isbn: String,
    #[serde(default)]
    #[validate(custom(function = "validate_optional_id"))]
    pub language: String,
    #[serde(default)]
    #[validate(custom(function = "validate_id_list"))]
    pub genres: String,
}

impl BookForm {
    #[must_use]
    pub fn from_detail(detail: &BookDetail) -> Self {
        let book = &detail.book;
        Self {
            title: book.title.clone(),
            author: book.author_id.map(|id| id.to_string()).unwrap_or_default(),
            summary: book.summary.clone(),
            isbn: book.isbn.clone(),
            language: book.language_id.map(|id| id.to_string()).unwrap_or_default(),
            genres: detail
                .genres
                .iter()
                .map(|g| g.id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Validate and convert into a record.
    ///
    /// # Errors
    /// The per-field messages when any rule fails.
    pub fn clean(&self) -> Result<NewBook, FormErrors> {
        self.validate()
            .map_err(|e| FormErrors::from_validation(&e, "title"))?;
        Ok(NewBook {
            title: self.title.trim().to_string(),
            author_id: parse_optional_id(&self.author),
            summary: self.summary.trim().to_string(),
            isbn: self.isbn.trim().to_string(),
            language_id: parse_optional_id(&self.language),
            genre_ids: parse_id_list(&self.genres),
        })
    }

    #[must_use]
    pub fn fields(&self, errors: &FormErrors) -> Vec<FieldView> {
        vec![
            FieldView::new("title", "Title", "text", &self.title, errors),
            FieldView::new("author", "Author id", "text", &self.author, errors),
            FieldView::new("summary", "Summary", "text", &self.summary, errors),
            FieldView::new("isbn", "ISBN", "text", &self.isbn, errors),
            FieldView::new("language", "Language id", "text", &self.language, errors),
            FieldView::new("genres", "Genre ids", "text", &self.genres, errors),
        ]
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub next: String,
}
