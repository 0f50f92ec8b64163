//! Identifier normalization and validation.
//!
//! Raw identifiers arrive with separators, URL wrappers, and scheme
//! prefixes ("978-0-7432-7356-5", "https://doi.org/10.1000/xyz",
//! "(OCoLC)812345"). Each kind gets a canonical normalized form; ISBN-10s
//! are canonicalized to their ISBN-13 digit string so equivalent numbers
//! collapse to one identifier. Normalization is idempotent.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifier kind, ordered by reconciliation preference (ISBN first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Isbn,
    Doi,
    Oclc,
    Lccn,
    Asin,
    Other,
}

impl IdentifierKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isbn => "isbn",
            Self::Doi => "doi",
            Self::Oclc => "oclc",
            Self::Lccn => "lccn",
            Self::Asin => "asin",
            Self::Other => "other",
        }
    }
}

impl Display for IdentifierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identifier with its raw and canonical forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub raw: String,
    pub normalized: String,
    pub valid: bool,
}

impl Identifier {
    /// Detect the kind, normalize, and validate. Never fails: unrecognized
    /// input yields `kind = Other, valid = false`.
    pub fn parse(raw: &str) -> Identifier {
        let kind = detect_kind(raw);
        Self::with_kind(kind, raw)
    }

    /// Normalize and validate under a known kind.
    pub fn with_kind(kind: IdentifierKind, raw: &str) -> Identifier {
        let (normalized, valid) = match kind {
            IdentifierKind::Isbn => normalize_isbn(raw),
            IdentifierKind::Doi => normalize_doi(raw),
            IdentifierKind::Oclc => normalize_oclc(raw),
            IdentifierKind::Lccn => normalize_lccn(raw),
            IdentifierKind::Asin => normalize_asin(raw),
            IdentifierKind::Other => (raw.trim().to_string(), false),
        };
        Identifier {
            kind,
            raw: raw.to_string(),
            normalized,
            valid,
        }
    }
}

fn detect_kind(raw: &str) -> IdentifierKind {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();

    if lower.starts_with("isbn") {
        return IdentifierKind::Isbn;
    }
    if lower.starts_with("doi:")
        || lower.contains("doi.org/")
        || (lower.starts_with("10.") && lower.contains('/'))
    {
        return IdentifierKind::Doi;
    }
    if lower.starts_with("(ocolc)")
        || lower.starts_with("ocm")
        || lower.starts_with("ocn")
        || lower.starts_with("oclc")
    {
        return IdentifierKind::Oclc;
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if compact.len() == 10 && compact.starts_with('B') {
        return IdentifierKind::Asin;
    }

    if compact.len() == 13 && compact.chars().all(|c| c.is_ascii_digit()) {
        return IdentifierKind::Isbn;
    }
    // A bare ten-digit string is ambiguous between ISBN-10 and LCCN; the
    // checksum decides.
    let isbn10_shaped = compact.len() == 10
        && compact[..9].chars().all(|c| c.is_ascii_digit())
        && compact
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_digit() || c == 'X');
    if isbn10_shaped && isbn10_check(&compact) {
        return IdentifierKind::Isbn;
    }
    if lccn_shaped(&compact.to_ascii_lowercase()) {
        return IdentifierKind::Lccn;
    }
    if isbn10_shaped {
        return IdentifierKind::Isbn;
    }

    IdentifierKind::Other
}

fn normalize_isbn(raw: &str) -> (String, bool) {
    let mut stripped = raw.trim();
    let lower = stripped.to_lowercase();
    for prefix in ["isbn-13", "isbn-10", "isbn13", "isbn10", "isbn"] {
        if lower.starts_with(prefix) {
            stripped = &stripped[prefix.len()..];
            break;
        }
    }
    let stripped = stripped.trim_start_matches(':');
    let compact: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() == 13 && compact.chars().all(|c| c.is_ascii_digit()) {
        let valid = isbn13_check(&compact);
        return (compact, valid);
    }
    if compact.len() == 10 {
        if isbn10_check(&compact) {
            return (isbn10_to_13(&compact), true);
        }
        return (compact, false);
    }
    (compact, false)
}

fn isbn13_check(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let value = u32::from(b - b'0');
            if i % 2 == 0 {
                value
            } else {
                value * 3
            }
        })
        .sum();
    sum % 10 == 0
}

fn isbn10_check(chars: &str) -> bool {
    if chars.len() != 10 {
        return false;
    }
    let mut sum: u32 = 0;
    for (i, ch) in chars.chars().enumerate() {
        let value = match ch {
            '0'..='9' => ch.to_digit(10).unwrap_or(0),
            'X' if i == 9 => 10,
            _ => return false,
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn isbn10_to_13(isbn10: &str) -> String {
    let body = format!("978{}", &isbn10[..9]);
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let value = u32::from(b - b'0');
            if i % 2 == 0 {
                value
            } else {
                value * 3
            }
        })
        .sum();
    let check = (10 - (sum % 10)) % 10;
    format!("{body}{check}")
}

fn normalize_doi(raw: &str) -> (String, bool) {
    let mut value = raw.trim().to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "doi.org/", "doi:"] {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest.trim().to_string();
            break;
        }
    }
    let valid = value.starts_with("10.")
        && value.contains('/')
        && value
            .split('/')
            .next()
            .is_some_and(|registrant| registrant.len() >= 7);
    (value, valid)
}

fn normalize_oclc(raw: &str) -> (String, bool) {
    let lower = raw.trim().to_lowercase();
    let rest = lower
        .strip_prefix("(ocolc)")
        .or_else(|| lower.strip_prefix("ocm"))
        .or_else(|| lower.strip_prefix("ocn"))
        .or_else(|| lower.strip_prefix("oclc:"))
        .or_else(|| lower.strip_prefix("oclc"))
        .unwrap_or(&lower);
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    let valid = !digits.is_empty() && digits.len() <= 12;
    (digits, valid)
}

fn normalize_lccn(raw: &str) -> (String, bool) {
    let compact: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    (compact.clone(), lccn_shaped(&compact))
}

fn lccn_shaped(value: &str) -> bool {
    let prefix_len = value.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    let digits = &value[prefix_len..];
    prefix_len <= 3
        && (8..=10).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

fn normalize_asin(raw: &str) -> (String, bool) {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = compact.len() == 10 && compact.starts_with('B');
    (compact, valid)
}
