//! Core domain logic for the library catalog.
//! This crate is the single source of truth for catalog invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::book::{Book, BookField, BookId, NewBook, UnknownBookField};
pub use model::borrow::{
    BookBorrowCount, BorrowRecord, BorrowState, MemberBorrowCount, RecordId, DAY_MS,
};
pub use model::member::{Member, MemberId, NewMember};
pub use model::validation::ValidationError;
pub use repo::library_repo::{
    BookMatch, BookQuery, BorrowQuery, EntityRef, LibraryRepository, RepoError, RepoResult,
    SqliteLibraryRepository, MAX_STOCK,
};
pub use service::library_service::{
    now_epoch_ms, ConflictReason, LibraryError, LibraryResult, LibraryService,
    DEFAULT_OVERDUE_DAYS, DEFAULT_TOP_BORROWED,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
