// ── Declaration period ──
//
// A declaration covers one calendar month, half-open: `[begin, end)`.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    /// First day of the month.
    pub begin: NaiveDate,
    /// First day of the following month, excluded.
    pub end: NaiveDate,
}

impl Period {
    /// The month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Self {
        let end = first_of_month(today);
        let begin = first_of_month(end - Days::new(1));
        Self { begin, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.begin <= date && date < self.end
    }

    /// Name of the receipt file for this period, e.g. `CA_2024_05.pdf`.
    pub fn pdf_file_name(&self) -> String {
        self.begin.format("CA_%Y_%m.pdf").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.begin, self.end)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}
