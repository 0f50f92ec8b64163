use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Identifier for a registered metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    OpenLibrary,
    GoogleBooks,
    Crossref,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenLibrary => "open_library",
            Self::GoogleBooks => "google_books",
            Self::Crossref => "crossref",
        }
    }

    /// All known providers in stable (alphabetical) order.
    pub const fn all() -> [ProviderId; 3] {
        [Self::Crossref, Self::GoogleBooks, Self::OpenLibrary]
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open_library" | "openlibrary" => Ok(Self::OpenLibrary),
            "google_books" | "googlebooks" => Ok(Self::GoogleBooks),
            "crossref" => Ok(Self::Crossref),
            other => Err(ValidationError::UnknownProvider {
                value: other.to_string(),
            }),
        }
    }
}
