//! Subject and genre canonicalization.
//!
//! Inputs arrive as free text ("Sci-Fi", "FICTION / Science Fiction") or
//! structured classification claims ({name, code, scheme}). Known Dewey and
//! LCC ranges and common genre synonyms map to canonical terms so that
//! reconciliation deduplicates by meaning rather than spelling.

use serde::{Deserialize, Serialize};

/// Canonical subject category, ordered subject > genre > keyword > tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Subject,
    Genre,
    Keyword,
    Tag,
}

/// A raw subject claim from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectClaim {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Optional caller-supplied kind; derived when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SubjectKind>,
}

impl SubjectClaim {
    pub fn free_text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            scheme: None,
            kind: None,
        }
    }

    pub fn classified(
        name: impl Into<String>,
        code: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            code: Some(code.into()),
            scheme: Some(scheme.into()),
            kind: None,
        }
    }
}

/// A canonical subject produced by normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub kind: SubjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Subject {
    /// Normalize one claim into canonical form.
    pub fn from_claim(claim: &SubjectClaim) -> Subject {
        let classified = classify_code(claim);
        let name = match &classified {
            Some(term) => (*term).to_string(),
            None => canonical_subject_name(&claim.name),
        };

        let kind = claim.kind.unwrap_or_else(|| {
            if classified.is_some() || claim.code.is_some() {
                SubjectKind::Subject
            } else if genre_synonym(&name).is_some() || GENRES.contains(&name.as_str()) {
                SubjectKind::Genre
            } else {
                SubjectKind::Keyword
            }
        });

        let name = genre_synonym(&name)
            .map(str::to_string)
            .unwrap_or(name);

        Subject {
            name,
            kind,
            code: claim.code.as_deref().map(normalize_code),
        }
    }
}

/// Canonical text form: lowercased, punctuation trimmed, whitespace
/// collapsed, BISAC-style "FICTION / Science Fiction" reduced to its leaf.
pub fn canonical_subject_name(input: &str) -> String {
    let leaf = input.rsplit('/').next().unwrap_or(input);
    leaf.to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '\'')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase().replace(' ', "")
}

/// Canonical genre terms recognized without a synonym hop.
const GENRES: &[&str] = &[
    "science fiction",
    "fantasy",
    "mystery",
    "thriller",
    "romance",
    "horror",
    "biography",
    "young adult",
    "historical fiction",
    "nonfiction",
    "poetry",
];

const GENRE_SYNONYMS: &[(&str, &str)] = &[
    ("sci fi", "science fiction"),
    ("scifi", "science fiction"),
    ("sf", "science fiction"),
    ("speculative fiction", "science fiction"),
    ("detective", "mystery"),
    ("detective fiction", "mystery"),
    ("crime fiction", "mystery"),
    ("whodunit", "mystery"),
    ("suspense", "thriller"),
    ("bio", "biography"),
    ("biographies", "biography"),
    ("memoir", "biography"),
    ("ya", "young adult"),
    ("ya fiction", "young adult"),
    ("non fiction", "nonfiction"),
    ("verse", "poetry"),
];

fn genre_synonym(canonical_name: &str) -> Option<&'static str> {
    GENRE_SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == canonical_name)
        .map(|(_, term)| *term)
}

/// Dewey hundreds classes mapped to canonical subject terms.
const DEWEY_CLASSES: &[&str] = &[
    "general works",
    "philosophy",
    "religion",
    "social sciences",
    "language",
    "science",
    "technology",
    "arts",
    "literature",
    "history",
];

const LCC_CLASSES: &[(char, &str)] = &[
    ('A', "general works"),
    ('B', "philosophy"),
    ('C', "history"),
    ('D', "history"),
    ('E', "history"),
    ('F', "history"),
    ('G', "geography"),
    ('H', "social sciences"),
    ('J', "political science"),
    ('K', "law"),
    ('L', "education"),
    ('M', "music"),
    ('N', "arts"),
    ('P', "literature"),
    ('Q', "science"),
    ('R', "medicine"),
    ('S', "agriculture"),
    ('T', "technology"),
    ('U', "military science"),
    ('V', "naval science"),
    ('Z', "library science"),
];

/// Map a classification code to its canonical subject term, if recognized.
fn classify_code(claim: &SubjectClaim) -> Option<&'static str> {
    let code = claim.code.as_deref()?;
    let code = normalize_code(code);
    let scheme = claim
        .scheme
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let looks_dewey = scheme.contains("dewey")
        || scheme == "ddc"
        || (scheme.is_empty() && code.chars().next().is_some_and(|c| c.is_ascii_digit()));
    if looks_dewey {
        let hundreds = code.chars().next()?.to_digit(10)? as usize;
        return DEWEY_CLASSES.get(hundreds).copied();
    }

    let looks_lcc = scheme.contains("lcc")
        || scheme.contains("congress")
        || (scheme.is_empty() && code.chars().next().is_some_and(|c| c.is_ascii_alphabetic()));
    if looks_lcc {
        let letter = code.chars().next()?.to_ascii_uppercase();
        return LCC_CLASSES
            .iter()
            .find(|(class, _)| *class == letter)
            .map(|(_, term)| *term);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_is_idempotent() {
        let once = canonical_subject_name("FICTION / Science-Fiction!");
        let twice = canonical_subject_name(&once);
        assert_eq!(once, "science fiction");
        assert_eq!(once, twice);
    }

    #[test]
    fn genre_synonyms_map_to_canonical_terms() {
        let claim = SubjectClaim::free_text("Sci-Fi");
        let subject = Subject::from_claim(&claim);
        assert_eq!(subject.name, "science fiction");
        assert_eq!(subject.kind, SubjectKind::Genre);
    }

    #[test]
    fn dewey_code_maps_to_class_term() {
        let claim = SubjectClaim::classified("anything", "813.54", "ddc");
        let subject = Subject::from_claim(&claim);
        assert_eq!(subject.name, "literature");
        assert_eq!(subject.kind, SubjectKind::Subject);
    }

    #[test]
    fn lcc_code_maps_to_class_term() {
        let claim = SubjectClaim::classified("anything", "QA76.73", "lcc");
        let subject = Subject::from_claim(&claim);
        assert_eq!(subject.name, "science");
        assert_eq!(subject.kind, SubjectKind::Subject);
    }

    #[test]
    fn free_text_without_genre_match_is_keyword() {
        let subject = Subject::from_claim(&SubjectClaim::free_text("Beekeeping"));
        assert_eq!(subject.name, "beekeeping");
        assert_eq!(subject.kind, SubjectKind::Keyword);
    }

    #[test]
    fn kind_ordering_puts_subjects_first() {
        assert!(SubjectKind::Subject < SubjectKind::Genre);
        assert!(SubjectKind::Genre < SubjectKind::Keyword);
        assert!(SubjectKind::Keyword < SubjectKind::Tag);
    }
}
