use serde::{Deserialize, Serialize};

use crate::provider::FieldType;
use crate::ValidationError;

const DEFAULT_RESULT_LIMIT: usize = 10;

/// Multi-criteria discovery query.
///
/// Constructed through the `by_*` helpers for single-criterion searches or
/// built up field by field; `validate` rejects a query with no criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            title: None,
            creators: Vec::new(),
            isbn: None,
            publisher: None,
            publication_year: None,
            language: None,
            subjects: Vec::new(),
            limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchQuery {
    pub fn by_title(title: impl Into<String>) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }
        Ok(Self {
            title: Some(title),
            ..Self::default()
        })
    }

    pub fn by_isbn(isbn: impl Into<String>) -> Result<Self, ValidationError> {
        let isbn = isbn.into();
        if isbn.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "isbn" });
        }
        Ok(Self {
            isbn: Some(isbn),
            ..Self::default()
        })
    }

    pub fn by_creator(creator: impl Into<String>) -> Result<Self, ValidationError> {
        let creator = creator.into();
        if creator.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "creator" });
        }
        Ok(Self {
            creators: vec![creator],
            ..Self::default()
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creators.push(creator.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subjects.push(subject.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.creators.is_empty()
            && self.isbn.is_none()
            && self.publisher.is_none()
            && self.publication_year.is_none()
            && self.language.is_none()
            && self.subjects.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyCriteria);
        }
        Ok(())
    }

    /// Field types a query is asking about, inferred from populated
    /// criteria. An empty query assumes the common discovery set.
    pub fn relevant_field_types(&self) -> Vec<FieldType> {
        if self.is_empty() {
            return vec![
                FieldType::Title,
                FieldType::Authors,
                FieldType::Isbn,
                FieldType::PublicationDate,
                FieldType::Description,
            ];
        }

        let mut types = Vec::new();
        if self.title.is_some() {
            types.push(FieldType::Title);
        }
        if !self.creators.is_empty() {
            types.push(FieldType::Authors);
        }
        if self.isbn.is_some() {
            types.push(FieldType::Isbn);
        }
        if self.language.is_some() {
            types.push(FieldType::Language);
        }
        if !self.subjects.is_empty() {
            types.push(FieldType::Subjects);
        }
        if self.publisher.is_some() {
            types.push(FieldType::Publisher);
        }
        if self.publication_year.is_some() {
            types.push(FieldType::PublicationDate);
        }
        types
    }
}
