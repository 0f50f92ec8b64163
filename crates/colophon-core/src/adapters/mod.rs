//! Provider adapters (Open Library, Google Books, Crossref).

mod crossref;
mod google_books;
mod open_library;

pub use crossref::CrossrefAdapter;
pub use google_books::GoogleBooksAdapter;
pub use open_library::OpenLibraryAdapter;
