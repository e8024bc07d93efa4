pub mod archive_org;
pub mod gemini;
pub mod google_books;
pub mod isbndb;
pub mod librarything;
pub mod openlibrary;
pub mod wikidata;
pub mod xai;
