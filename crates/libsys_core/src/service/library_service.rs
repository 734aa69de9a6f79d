//! Library catalog use-case service.
//!
//! # Responsibility
//! - Provide member/book CRUD, borrow/return and report entry points.
//! - Translate repository outcomes into the operator-facing error taxonomy
//!   (`NotFound`, `Conflict`, `Validation`).
//! - Emit metadata-only logging events for state-changing use-cases.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Service layer remains storage-agnostic.
//! - Failed use-cases leave the store unchanged.

use crate::model::book::{Book, BookField, BookId, NewBook};
use crate::model::borrow::{overdue_cutoff, BookBorrowCount, BorrowRecord, MemberBorrowCount};
use crate::model::member::{Member, MemberId, NewMember};
use crate::model::validation::ValidationError;
use crate::repo::library_repo::{
    BookQuery, BorrowQuery, EntityRef, LibraryRepository, RepoError,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default age after which an open borrow is reported as overdue.
pub const DEFAULT_OVERDUE_DAYS: u32 = 14;
/// Default size of the most-borrowed report.
pub const DEFAULT_TOP_BORROWED: u32 = 5;

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Why a use-case was refused even though its targets exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    /// Delete blocked by open borrow records.
    ActiveBorrows { target: EntityRef, open_records: u64 },
    /// Borrow blocked by zero stock.
    OutOfStock(BookId),
    /// Return blocked because stock cannot grow past its maximum.
    StockAtCapacity(BookId),
    /// Return blocked because the pair has several open records.
    AmbiguousReturn {
        member_id: MemberId,
        book_id: BookId,
        open_records: u64,
    },
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActiveBorrows {
                target: EntityRef::Book(book_id),
                ..
            } => write!(f, "cannot delete book {book_id}: it is currently borrowed"),
            Self::ActiveBorrows { target, .. } => {
                write!(f, "cannot delete {target}: it has active borrowed books")
            }
            Self::OutOfStock(book_id) => write!(f, "book {book_id} is not available"),
            Self::StockAtCapacity(book_id) => write!(
                f,
                "book {book_id} stock is already at its maximum; lower it before returning"
            ),
            Self::AmbiguousReturn {
                member_id,
                book_id,
                open_records,
            } => write!(
                f,
                "member {member_id} holds {open_records} open borrows of book {book_id}; cannot pick one to return"
            ),
        }
    }
}

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum LibraryError {
    /// Target member, book or open borrow record does not exist.
    NotFound(EntityRef),
    /// Target exists but its state forbids the operation.
    Conflict(ConflictReason),
    /// Operator input is malformed.
    Validation(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl LibraryError {
    /// Stable short code used in logging events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Repo(_) => "repo",
        }
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(EntityRef::OpenBorrow { member_id, book_id }) => write!(
                f,
                "no active borrow record found for member {member_id} and book {book_id}"
            ),
            Self::NotFound(target) => write!(f, "{target} not found"),
            Self::Conflict(reason) => write!(f, "{reason}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LibraryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LibraryError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(target) => Self::NotFound(target),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::OutOfStock(book_id) => Self::Conflict(ConflictReason::OutOfStock(book_id)),
            RepoError::StockAtCapacity(book_id) => {
                Self::Conflict(ConflictReason::StockAtCapacity(book_id))
            }
            RepoError::ActiveBorrows {
                target,
                open_records,
            } => Self::Conflict(ConflictReason::ActiveBorrows {
                target,
                open_records,
            }),
            RepoError::AmbiguousOpenBorrow {
                member_id,
                book_id,
                open_records,
            } => Self::Conflict(ConflictReason::AmbiguousReturn {
                member_id,
                book_id,
                open_records,
            }),
            other => Self::Repo(other),
        }
    }
}

/// Catalog service facade over repository implementations.
pub struct LibraryService<R: LibraryRepository> {
    repo: R,
}

impl<R: LibraryRepository> LibraryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a member and returns the stored record.
    pub fn add_member(&self, member: &NewMember) -> LibraryResult<Member> {
        let created = self
            .repo
            .insert_member(member)
            .map_err(|err| log_failure("member_add", err))?;
        info!(
            "event=member_add module=service status=ok member_id={}",
            created.member_id
        );
        Ok(created)
    }

    pub fn get_member(&self, member_id: MemberId) -> LibraryResult<Option<Member>> {
        Ok(self.repo.get_member(member_id)?)
    }

    pub fn list_members(&self) -> LibraryResult<Vec<Member>> {
        Ok(self.repo.list_members()?)
    }

    /// Overwrites one member email and returns the updated record.
    pub fn update_member_email(
        &self,
        member_id: MemberId,
        email: &str,
    ) -> LibraryResult<Member> {
        self.repo
            .update_member_email(member_id, email)
            .map_err(|err| log_failure("member_update", err))?;
        let updated = self
            .repo
            .get_member(member_id)?
            .ok_or(LibraryError::NotFound(EntityRef::Member(member_id)))?;
        info!("event=member_update module=service status=ok member_id={member_id}");
        Ok(updated)
    }

    /// Deletes a member unless it still holds borrowed books.
    pub fn delete_member(&mut self, member_id: MemberId) -> LibraryResult<()> {
        self.repo
            .delete_member(member_id)
            .map_err(|err| log_failure("member_delete", err))?;
        info!("event=member_delete module=service status=ok member_id={member_id}");
        Ok(())
    }

    /// Catalogs a book and returns the stored record.
    pub fn add_book(&self, book: &NewBook) -> LibraryResult<Book> {
        let created = self
            .repo
            .insert_book(book)
            .map_err(|err| log_failure("book_add", err))?;
        info!(
            "event=book_add module=service status=ok book_id={} stock={}",
            created.book_id, created.stock
        );
        Ok(created)
    }

    pub fn get_book(&self, book_id: BookId) -> LibraryResult<Option<Book>> {
        Ok(self.repo.get_book(book_id)?)
    }

    /// Lists every catalogued book.
    pub fn list_books(&self) -> LibraryResult<Vec<Book>> {
        Ok(self.repo.list_books(&BookQuery::all())?)
    }

    /// Case-insensitive substring search on one text column.
    ///
    /// A blank pattern matches every book.
    pub fn search_books(&self, field: BookField, pattern: &str) -> LibraryResult<Vec<Book>> {
        let query = BookQuery::contains(field, pattern.trim());
        Ok(self.repo.list_books(&query)?)
    }

    /// Overwrites stock and returns the updated book.
    ///
    /// Open borrows are not reconciled against the new value.
    pub fn update_stock(&self, book_id: BookId, stock: u32) -> LibraryResult<Book> {
        self.repo
            .update_book_stock(book_id, stock)
            .map_err(|err| log_failure("book_stock_update", err))?;
        let updated = self
            .repo
            .get_book(book_id)?
            .ok_or(LibraryError::NotFound(EntityRef::Book(book_id)))?;
        info!("event=book_stock_update module=service status=ok book_id={book_id} stock={stock}");
        Ok(updated)
    }

    /// Deletes a book unless copies of it are still borrowed.
    pub fn delete_book(&mut self, book_id: BookId) -> LibraryResult<()> {
        self.repo
            .delete_book(book_id)
            .map_err(|err| log_failure("book_delete", err))?;
        info!("event=book_delete module=service status=ok book_id={book_id}");
        Ok(())
    }

    /// Lends one copy of a book to a member at the current time.
    pub fn borrow_book(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> LibraryResult<BorrowRecord> {
        self.borrow_book_at(member_id, book_id, now_epoch_ms())
    }

    /// Lends one copy of a book to a member at `now_ms`.
    ///
    /// # Contract
    /// - Refuses with `NotFound` for unknown member/book and `Conflict` at
    ///   zero stock; refusals change nothing.
    /// - On success stock is one lower and one Open record exists for it.
    pub fn borrow_book_at(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        now_ms: i64,
    ) -> LibraryResult<BorrowRecord> {
        let record = self
            .repo
            .checkout(member_id, book_id, now_ms)
            .map_err(|err| log_failure("book_borrow", err))?;
        info!(
            "event=book_borrow module=service status=ok record_id={} member_id={member_id} book_id={book_id}",
            record.record_id
        );
        Ok(record)
    }

    /// Returns a borrowed book at the current time.
    pub fn return_book(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
    ) -> LibraryResult<BorrowRecord> {
        self.return_book_at(member_id, book_id, now_epoch_ms())
    }

    /// Closes the single open borrow record of `(member_id, book_id)` at
    /// `now_ms` and puts the copy back in stock.
    pub fn return_book_at(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        now_ms: i64,
    ) -> LibraryResult<BorrowRecord> {
        let record = self
            .repo
            .checkin(member_id, book_id, now_ms)
            .map_err(|err| log_failure("book_return", err))?;
        info!(
            "event=book_return module=service status=ok record_id={} member_id={member_id} book_id={book_id}",
            record.record_id
        );
        Ok(record)
    }

    /// Lists borrow records matching `query`, oldest first.
    pub fn list_borrows(&self, query: &BorrowQuery) -> LibraryResult<Vec<BorrowRecord>> {
        Ok(self.repo.list_borrows(query)?)
    }

    /// Open records borrowed more than `threshold_days` ago.
    pub fn overdue_books(&self, threshold_days: u32) -> LibraryResult<Vec<BorrowRecord>> {
        self.overdue_books_at(threshold_days, now_epoch_ms())
    }

    /// Open records borrowed strictly before `now_ms - threshold_days`.
    pub fn overdue_books_at(
        &self,
        threshold_days: u32,
        now_ms: i64,
    ) -> LibraryResult<Vec<BorrowRecord>> {
        let query = BorrowQuery {
            open_only: true,
            borrowed_before: Some(overdue_cutoff(now_ms, threshold_days)),
            ..BorrowQuery::default()
        };
        Ok(self.repo.list_borrows(&query)?)
    }

    /// The `top_n` most borrowed books, counting open and closed records.
    pub fn most_borrowed(&self, top_n: u32) -> LibraryResult<Vec<BookBorrowCount>> {
        if top_n == 0 {
            return Ok(Vec::new());
        }
        Ok(self.repo.count_borrows_by_book(Some(top_n))?)
    }

    /// Borrow record count for every member that has borrowed at least once.
    pub fn books_per_member(&self) -> LibraryResult<Vec<MemberBorrowCount>> {
        Ok(self.repo.count_borrows_by_member()?)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

fn log_failure(event: &'static str, err: impl Into<LibraryError>) -> LibraryError {
    let err = err.into();
    warn!(
        "event={event} module=service status=error error_code={}",
        err.code()
    );
    err
}
