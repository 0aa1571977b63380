//! Renewal date rules and the two forms that collect a new due date.
//!
//! A renewal is accepted when `today <= date <= today + 28 days`. The rule is
//! evaluated with "today" taken from a [`Clock`] at the moment the form is
//! cleaned, not when it was built.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Longest extension a renewal may grant, counted from today.
pub const RENEWAL_WINDOW: Days = Days::new(28);

/// Extension pre-filled in renewal forms.
pub const DEFAULT_RENEWAL: Days = Days::new(21);

pub const RENEWAL_HELP_TEXT: &str = "Enter a date between now and 4 weeks (default 3 weeks).";

const DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenewalRejection {
    #[error("Invalid date - renewal in past")]
    PastDate,
    #[error("Invalid date - renewal more than 4 weeks ahead")]
    TooFarAhead,
}

/// Accept `candidate` as a new due date, or say why it cannot be one.
///
/// # Errors
/// [`RenewalRejection::PastDate`] before `today`,
/// [`RenewalRejection::TooFarAhead`] after `today + 28 days`.
pub fn validate_renewal_date(
    candidate: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, RenewalRejection> {
    if candidate < today {
        return Err(RenewalRejection::PastDate);
    }
    let latest = today.checked_add_days(RENEWAL_WINDOW).unwrap_or(NaiveDate::MAX);
    if candidate > latest {
        return Err(RenewalRejection::TooFarAhead);
    }
    Ok(candidate)
}

/// The date offered to the user before they pick one.
#[must_use]
pub fn default_renewal_date(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(DEFAULT_RENEWAL).unwrap_or(NaiveDate::MAX)
}

/// An error attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn parse_date_input(raw: &str) -> Result<NaiveDate, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("This field is required.");
    }
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or("Enter a valid date.")
}

/// A form carrying one renewal date field.
///
/// Both renewal forms clean through the provided [`clean`](Self::clean), so
/// they reach the same decision for the same input and day.
pub trait RenewalDateField {
    /// Name of the field as submitted by the browser.
    const FIELD: &'static str;

    fn raw_date(&self) -> &str;

    /// Parse the submitted date and apply the renewal window.
    ///
    /// # Errors
    /// A [`FieldError`] on [`Self::FIELD`] when the input is missing, malformed,
    /// or outside the renewal window.
    fn clean(&self, clock: &dyn Clock) -> Result<NaiveDate, FieldError> {
        let candidate =
            parse_date_input(self.raw_date()).map_err(|msg| FieldError::new(Self::FIELD, msg))?;
        validate_renewal_date(candidate, clock.today())
            .map_err(|rejection| FieldError::new(Self::FIELD, rejection.to_string()))
    }
}

/// Standalone renewal form for librarians.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RenewBookForm {
    #[serde(default)]
    pub renewal_date: String,
}

impl RenewBookForm {
    /// Unbound form pre-filled with three weeks from today.
    #[must_use]
    pub fn initial(clock: &dyn Clock) -> Self {
        Self {
            renewal_date: default_renewal_date(clock.today()).to_string(),
        }
    }
}

impl RenewalDateField for RenewBookForm {
    const FIELD: &'static str = "renewal_date";

    fn raw_date(&self) -> &str {
        &self.renewal_date
    }
}

/// Renewal form bound to a book instance's `due_back` column.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RenewBookModelForm {
    #[serde(default)]
    pub due_back: String,
}

impl RenewBookModelForm {
    pub const LABEL: &'static str = "New renewal date";

    /// Unbound form pre-filled with three weeks from today, whatever the
    /// instance's current due date is.
    #[must_use]
    pub fn initial(clock: &dyn Clock) -> Self {
        Self {
            due_back: default_renewal_date(clock.today()).to_string(),
        }
    }
}

impl RenewalDateField for RenewBookModelForm {
    const FIELD: &'static str = "due_back";

    fn raw_date(&self) -> &str {
        &self.due_back
    }
}
