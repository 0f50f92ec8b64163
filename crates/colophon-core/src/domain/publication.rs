//! Publication dates and publisher/place canonicalization.
//!
//! Providers report dates at wildly different granularity ("2005",
//! "2005-07", "2005-07-16") and publishers under many surface forms
//! ("Penguin Books Ltd.", "The Penguin Group (UK)"). Both get a canonical
//! form here so reconciliation can compare values instead of spellings.
//! Normalization is idempotent: applying it twice yields the same string.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MIN_YEAR: i32 = 1000;
const MAX_YEAR: i32 = 2200;

/// Granularity of a publication date, ordered coarse to fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

/// A publication date at year, month, or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl PublicationDate {
    pub fn from_year(year: i32) -> Result<Self, ValidationError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::YearOutOfRange { year });
        }
        Ok(Self {
            year,
            month: None,
            day: None,
        })
    }

    pub fn from_year_month(year: i32, month: u8) -> Result<Self, ValidationError> {
        let mut date = Self::from_year(year)?;
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidMonth { month });
        }
        date.month = Some(month);
        Ok(date)
    }

    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, ValidationError> {
        let mut date = Self::from_year_month(year, month)?;
        let month_enum =
            time::Month::try_from(month).map_err(|_| ValidationError::InvalidMonth { month })?;
        if time::Date::from_calendar_date(year, month_enum, day).is_err() {
            return Err(ValidationError::InvalidDay { year, month, day });
        }
        date.day = Some(day);
        Ok(date)
    }

    /// Parse `YYYY`, `YYYY-MM`, or `YYYY-MM-DD`. As a fallback, scans the
    /// input for a plausible four-digit year (providers emit free-form
    /// strings like "July 16, 2005").
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "publication date",
            });
        }

        let mut parts = trimmed.splitn(3, '-');
        let year_part = parts.next().unwrap_or_default();
        if let Ok(year) = year_part.parse::<i32>() {
            if (MIN_YEAR..=MAX_YEAR).contains(&year) {
                return match (
                    parts.next().map(str::parse::<u8>),
                    parts.next().map(str::parse::<u8>),
                ) {
                    (None, _) => Self::from_year(year),
                    (Some(Ok(month)), None) => Self::from_year_month(year, month),
                    (Some(Ok(month)), Some(Ok(day))) => Self::from_ymd(year, month, day),
                    _ => Self::from_year(year),
                };
            }
        }

        scan_for_year(trimmed)
            .map(|year| Self {
                year,
                month: None,
                day: None,
            })
            .ok_or(ValidationError::EmptyField {
                field: "publication date",
            })
    }

    pub fn precision(&self) -> DatePrecision {
        match (self.month, self.day) {
            (Some(_), Some(_)) => DatePrecision::Day,
            (Some(_), None) => DatePrecision::Month,
            _ => DatePrecision::Year,
        }
    }

    /// Canonical string form at this date's precision.
    pub fn canonical(&self) -> String {
        match (self.month, self.day) {
            (Some(month), Some(day)) => format!("{:04}-{:02}-{:02}", self.year, month, day),
            (Some(month), None) => format!("{:04}-{:02}", self.year, month),
            _ => format!("{:04}", self.year),
        }
    }

    /// True when the two dates agree on every component both specify.
    pub fn agrees_with(&self, other: &PublicationDate) -> bool {
        if self.year != other.year {
            return false;
        }
        if let (Some(a), Some(b)) = (self.month, other.month) {
            if a != b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (self.day, other.day) {
            if a != b {
                return false;
            }
        }
        true
    }

    /// Similarity used by duplicate screening.
    pub fn similarity(&self, other: &PublicationDate) -> f64 {
        if self.year == other.year {
            let mut score: f64 = 0.8;
            if let (Some(a), Some(b)) = (self.month, other.month) {
                if a == b {
                    score += 0.1;
                    if let (Some(a), Some(b)) = (self.day, other.day) {
                        if a == b {
                            score += 0.1;
                        }
                    }
                } else {
                    score = 0.6;
                }
            }
            return score.min(1.0);
        }

        match (self.year - other.year).abs() {
            1 => 0.3,
            2 => 0.1,
            _ => 0.0,
        }
    }

    /// Orders by specificity: day-precision beats month beats year.
    pub fn cmp_specificity(&self, other: &PublicationDate) -> Ordering {
        self.precision().cmp(&other.precision())
    }
}

impl Display for PublicationDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn scan_for_year(input: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in input.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if digits.len() == 4 {
            if let Ok(year) = digits.parse::<i32>() {
                if (MIN_YEAR..=MAX_YEAR).contains(&year) {
                    return Some(year);
                }
            }
        }
        digits.clear();
    }
    None
}

/// Tokens dropped from the tail of a publisher name.
const PUBLISHER_STOP_TOKENS: &[&str] = &[
    "inc",
    "incorporated",
    "ltd",
    "limited",
    "llc",
    "co",
    "corp",
    "corporation",
    "company",
    "publishers",
    "publishing",
    "publications",
    "books",
    "group",
    "verlag",
];

/// Canonical form of a publisher name.
///
/// Strips legal suffixes, a leading "The", parenthesized regional
/// qualifiers, and unifies `&` with `and`, so equivalent names collapse to
/// one form ("Penguin Books Ltd." and "The Penguin Group (UK)" both reduce
/// toward "penguin").
pub fn canonical_publisher(input: &str) -> String {
    let mut text = strip_parenthesized(input);
    text = text.replace('&', " and ");
    text = text.to_lowercase();

    let mut tokens: Vec<String> = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| token.trim_matches(|c: char| c == '.' || c == ',').to_string())
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.first().map(String::as_str) == Some("the") && tokens.len() > 1 {
        tokens.remove(0);
    }

    while tokens.len() > 1 {
        let last = tokens.last().map(String::as_str).unwrap_or_default();
        if PUBLISHER_STOP_TOKENS.contains(&last) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens.join(" ")
}

/// Canonical form of a publication place: the city component, lowercased.
pub fn canonical_place(input: &str) -> String {
    let city = input.split([',', ';']).next().unwrap_or_default();
    let city = strip_parenthesized(city);
    city.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_parenthesized(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0u32;
    for ch in input.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_precision() {
        assert_eq!(
            PublicationDate::parse("2005").expect("year").precision(),
            DatePrecision::Year
        );
        assert_eq!(
            PublicationDate::parse("2005-07").expect("month").precision(),
            DatePrecision::Month
        );
        assert_eq!(
            PublicationDate::parse("2005-07-16").expect("day").precision(),
            DatePrecision::Day
        );
    }

    #[test]
    fn parses_year_from_free_form_text() {
        let date = PublicationDate::parse("July 16, 2005").expect("should find the year");
        assert_eq!(date.year, 2005);
        assert_eq!(date.precision(), DatePrecision::Year);
    }

    #[test]
    fn rejects_invalid_calendar_day() {
        let err = PublicationDate::from_ymd(2023, 2, 30).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDay { .. }));
    }

    #[test]
    fn canonical_matches_precision() {
        let date = PublicationDate::from_year_month(1999, 4).expect("valid");
        assert_eq!(date.canonical(), "1999-04");
    }

    #[test]
    fn agreement_ignores_unspecified_components() {
        let year_only = PublicationDate::from_year(2005).expect("valid");
        let full = PublicationDate::from_ymd(2005, 7, 16).expect("valid");
        assert!(year_only.agrees_with(&full));
        assert!(full.agrees_with(&year_only));

        let other = PublicationDate::from_year(2006).expect("valid");
        assert!(!full.agrees_with(&other));
    }

    #[test]
    fn publisher_normalization_collapses_equivalent_names() {
        assert_eq!(canonical_publisher("Penguin Books Ltd."), "penguin");
        assert_eq!(canonical_publisher("The Penguin Group (UK)"), "penguin");
        assert_eq!(
            canonical_publisher("Farrar, Straus & Giroux"),
            "farrar straus and giroux"
        );
    }

    #[test]
    fn publisher_normalization_is_idempotent() {
        let once = canonical_publisher("Harper & Row, Publishers, Inc.");
        let twice = canonical_publisher(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn place_keeps_city_component() {
        assert_eq!(canonical_place("New York, NY"), "new york");
        assert_eq!(canonical_place("London (England)"), "london");
    }
}
