use chrono::{Local, NaiveDate};

/// Source of "today" for date-sensitive rules.
///
/// Handlers read the date through this trait so that renewal checks can be
/// exercised against a pinned calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The server's local calendar date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
