//! Personal vocabulary notebook: dictionary lookups plus favourites, pins,
//! notes, tags and history kept in a single JSON document.

pub mod aggregate;
pub mod dictionary;
pub mod document;
pub mod error;
pub mod languages;
pub mod persistence;
pub mod store;

#[cfg(feature = "web")]
pub mod web;

pub use dictionary::{Dictionary, FreeDictionaryClient, LookupResult};
pub use document::{Document, Note, normalize_tag};
pub use error::{NotebookError, NotebookResult};
pub use languages::{DEFAULT_LANGUAGE, LANGUAGE_OPTIONS, LanguageOption};
pub use persistence::{DocumentRepository, JsonFileRepository, MemoryRepository};
pub use store::Notebook;
