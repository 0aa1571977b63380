use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    errors::{AppError, AppResult},
    models::{BookInstance, LoanStatus, LoanedCopy},
};

pub mod accounts;
pub mod catalog;
pub mod edit;
pub mod loans;

/// Health check endpoint.
#[must_use]
#[allow(clippy::unused_async)]
pub async fn health_check() -> &'static str {
    "OK"
}

/// `/` lands on the catalog home page.
#[allow(clippy::unused_async)]
pub async fn root() -> axum::response::Response {
    crate::errors::found("/catalog/")
}

/// A copy as the detail page lists it.
#[derive(Debug, Serialize)]
struct CopyView {
    id: Uuid,
    imprint: String,
    due_back: Option<NaiveDate>,
    status_label: &'static str,
    status_class: &'static str,
}

impl CopyView {
    fn new(copy: &BookInstance) -> Self {
        Self {
            id: copy.id,
            imprint: copy.imprint.clone(),
            due_back: copy.due_back,
            status_label: copy.status.label(),
            status_class: match copy.status {
                LoanStatus::Available => "text-success",
                LoanStatus::Maintenance => "text-danger",
                LoanStatus::OnLoan | LoanStatus::Reserved => "text-warning",
            },
        }
    }
}

/// A loan as the borrowed-book lists show it.
#[derive(Debug, Serialize)]
struct LoanView<'a> {
    #[serde(flatten)]
    copy: &'a LoanedCopy,
    overdue: bool,
}

fn loan_views(loans: &[LoanedCopy], today: NaiveDate) -> Vec<LoanView<'_>> {
    loans
        .iter()
        .map(|copy| LoanView {
            copy,
            overdue: copy.due_back.is_some_and(|d| d < today),
        })
        .collect()
}

/// Path ids that do not parse are reported the same way as unknown ones.
fn parse_id<T: FromStr>(raw: &str) -> AppResult<T> {
    raw.parse().map_err(|_| AppError::NotFound)
}
