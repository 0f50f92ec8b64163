pub mod identifier;
pub mod publication;
pub mod query;
pub mod record;
pub mod subject;

pub use identifier::{Identifier, IdentifierKind};
pub use publication::{canonical_place, canonical_publisher, DatePrecision, PublicationDate};
pub use query::SearchQuery;
pub use record::{MetadataRecord, MetadataSource, PhysicalDimensions};
pub use subject::{canonical_subject_name, Subject, SubjectClaim, SubjectKind};
