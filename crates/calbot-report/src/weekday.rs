//! German weekday names

use chrono::NaiveDate;

use crate::error::{ReportError, Result};

/// English `%A` weekday names and their German display names
pub const WEEKDAY_TRANSLATIONS: [(&str, &str); 7] = [
    ("Monday", "Montag"),
    ("Tuesday", "Dienstag"),
    ("Wednesday", "Mittwoch"),
    ("Thursday", "Donnerstag"),
    ("Friday", "Freitag"),
    ("Saturday", "Samstag"),
    ("Sunday", "Sonntag"),
];

/// Translate an English weekday name
pub fn translate_weekday(english: &str) -> Result<&'static str> {
    WEEKDAY_TRANSLATIONS
        .iter()
        .find(|(en, _)| *en == english)
        .map(|(_, de)| *de)
        .ok_or_else(|| ReportError::UnknownWeekday(english.to_string()))
}

/// German weekday name of `date`
pub fn german_weekday(date: NaiveDate) -> Result<&'static str> {
    translate_weekday(&date.format("%A").to_string())
}
