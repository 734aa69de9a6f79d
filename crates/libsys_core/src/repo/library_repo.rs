//! Library repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/select/update/delete APIs over `members`, `books` and
//!   `borrow_records`.
//! - Own the transactional checkout/checkin units that pair a stock change
//!   with a borrow-record state change.
//! - Push borrow counting into SQL (`GROUP BY`) instead of client-side tallies.
//!
//! # Invariants
//! - `books.stock` stays within `u32`: checkout refuses at zero, checkin
//!   refuses at [`MAX_STOCK`].
//! - A borrow record transitions `Open -> Closed` at most once
//!   (`returned_at IS NULL` guard on update).
//! - Deletes of members/books with open borrow records leave the store
//!   unchanged.

use crate::db::functions::CONTAINS_FOLDED_FN;
use crate::db::DbError;
use crate::model::book::{Book, BookField, BookId, NewBook};
use crate::model::borrow::{BookBorrowCount, BorrowRecord, MemberBorrowCount, RecordId};
use crate::model::member::{Member, MemberId, NewMember};
use crate::model::validation::{normalize_email, ValidationError};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MEMBER_SELECT_SQL: &str = "SELECT member_id, name, email FROM members";
const BOOK_SELECT_SQL: &str = "SELECT book_id, title, author, category, stock FROM books";
const BORROW_SELECT_SQL: &str = "SELECT
    record_id,
    member_id,
    book_id,
    borrowed_at,
    returned_at
FROM borrow_records";

pub type RepoResult<T> = Result<T, RepoError>;

/// Highest stock a book row can hold.
pub const MAX_STOCK: u32 = u32::MAX;

/// Row (or row set) a repository call was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Member(MemberId),
    Book(BookId),
    /// The open borrow records of one member for one book.
    OpenBorrow {
        member_id: MemberId,
        book_id: BookId,
    },
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member(id) => write!(f, "member {id}"),
            Self::Book(id) => write!(f, "book {id}"),
            Self::OpenBorrow { member_id, book_id } => {
                write!(f, "open borrow of book {book_id} by member {member_id}")
            }
        }
    }
}

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(EntityRef),
    /// Checkout refused because no copies are left.
    OutOfStock(BookId),
    /// Checkin refused because stock is already at [`MAX_STOCK`].
    StockAtCapacity(BookId),
    /// Delete refused because open borrow records reference the target.
    ActiveBorrows {
        target: EntityRef,
        open_records: u64,
    },
    /// Checkin refused because the pair has several open records.
    AmbiguousOpenBorrow {
        member_id: MemberId,
        book_id: BookId,
        open_records: u64,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "{target} not found"),
            Self::OutOfStock(book_id) => write!(f, "book {book_id} is out of stock"),
            Self::StockAtCapacity(book_id) => {
                write!(f, "book {book_id} stock is already at {MAX_STOCK}")
            }
            Self::ActiveBorrows {
                target,
                open_records,
            } => write!(f, "{target} has {open_records} active borrow record(s)"),
            Self::AmbiguousOpenBorrow {
                member_id,
                book_id,
                open_records,
            } => write!(
                f,
                "member {member_id} has {open_records} open borrow records for book {book_id}; expected exactly one"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Case-insensitive substring filter on one book text column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMatch {
    pub field: BookField,
    /// Matched literally after Unicode lowercasing.
    pub text: String,
}

/// Query options for listing books.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pub contains: Option<BookMatch>,
}

impl BookQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(field: BookField, text: impl Into<String>) -> Self {
        Self {
            contains: Some(BookMatch {
                field,
                text: text.into(),
            }),
        }
    }
}

/// Query options for listing borrow records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorrowQuery {
    pub member_id: Option<MemberId>,
    pub book_id: Option<BookId>,
    /// Restrict to records with `returned_at IS NULL`.
    pub open_only: bool,
    /// Restrict to records with `borrowed_at < value` (epoch ms).
    pub borrowed_before: Option<i64>,
}

/// Repository interface for catalog operations.
pub trait LibraryRepository {
    /// Validates and inserts one member, returning the stored row.
    fn insert_member(&self, member: &NewMember) -> RepoResult<Member>;
    fn get_member(&self, member_id: MemberId) -> RepoResult<Option<Member>>;
    fn list_members(&self) -> RepoResult<Vec<Member>>;
    /// Validates and overwrites one member email.
    fn update_member_email(&self, member_id: MemberId, email: &str) -> RepoResult<()>;
    /// Deletes one member unless open borrow records reference it.
    fn delete_member(&mut self, member_id: MemberId) -> RepoResult<()>;

    /// Validates and inserts one book, returning the stored row.
    fn insert_book(&self, book: &NewBook) -> RepoResult<Book>;
    fn get_book(&self, book_id: BookId) -> RepoResult<Option<Book>>;
    fn list_books(&self, query: &BookQuery) -> RepoResult<Vec<Book>>;
    /// Overwrites stock without reconciling open borrows.
    fn update_book_stock(&self, book_id: BookId, stock: u32) -> RepoResult<()>;
    /// Deletes one book unless open borrow records reference it.
    fn delete_book(&mut self, book_id: BookId) -> RepoResult<()>;

    fn list_borrows(&self, query: &BorrowQuery) -> RepoResult<Vec<BorrowRecord>>;
    /// Decrements stock and opens a borrow record in one transaction.
    fn checkout(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        borrowed_at: i64,
    ) -> RepoResult<BorrowRecord>;
    /// Closes the single open record for the pair and increments stock in one
    /// transaction. Refuses when stock is already at [`MAX_STOCK`].
    fn checkin(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        returned_at: i64,
    ) -> RepoResult<BorrowRecord>;

    /// Borrow counts per book, highest first, ties by ascending book id.
    fn count_borrows_by_book(&self, limit: Option<u32>) -> RepoResult<Vec<BookBorrowCount>>;
    /// Borrow counts per member, ascending member id.
    fn count_borrows_by_member(&self) -> RepoResult<Vec<MemberBorrowCount>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteLibraryRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteLibraryRepository<'conn> {
    /// Wraps a migrated connection (see [`crate::db::open_db`]).
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl LibraryRepository for SqliteLibraryRepository<'_> {
    fn insert_member(&self, member: &NewMember) -> RepoResult<Member> {
        let member = member.validated()?;
        self.conn.execute(
            "INSERT INTO members (name, email) VALUES (?1, ?2);",
            params![member.name.as_str(), member.email.as_str()],
        )?;

        Ok(Member {
            member_id: self.conn.last_insert_rowid(),
            name: member.name,
            email: member.email,
        })
    }

    fn get_member(&self, member_id: MemberId) -> RepoResult<Option<Member>> {
        let member = self
            .conn
            .query_row(
                &format!("{MEMBER_SELECT_SQL} WHERE member_id = ?1;"),
                [member_id],
                parse_member_row,
            )
            .optional()?;
        Ok(member)
    }

    fn list_members(&self) -> RepoResult<Vec<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} ORDER BY member_id ASC;"))?;
        let members = stmt
            .query_map([], parse_member_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    fn update_member_email(&self, member_id: MemberId, email: &str) -> RepoResult<()> {
        let email = normalize_email(email)?;
        let changed = self.conn.execute(
            "UPDATE members SET email = ?2 WHERE member_id = ?1;",
            params![member_id, email.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Member(member_id)));
        }

        Ok(())
    }

    fn delete_member(&mut self, member_id: MemberId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let target = EntityRef::Member(member_id);
        if !row_exists(&tx, "members", "member_id", member_id)? {
            return Err(RepoError::NotFound(target));
        }

        let open_records = count_open_borrows(&tx, "member_id", member_id)?;
        if open_records > 0 {
            return Err(RepoError::ActiveBorrows {
                target,
                open_records,
            });
        }

        tx.execute("DELETE FROM members WHERE member_id = ?1;", [member_id])?;
        tx.commit()?;
        Ok(())
    }

    fn insert_book(&self, book: &NewBook) -> RepoResult<Book> {
        let book = book.validated()?;
        self.conn.execute(
            "INSERT INTO books (title, author, category, stock) VALUES (?1, ?2, ?3, ?4);",
            params![
                book.title.as_str(),
                book.author.as_str(),
                book.category.as_str(),
                i64::from(book.stock),
            ],
        )?;

        Ok(Book {
            book_id: self.conn.last_insert_rowid(),
            title: book.title,
            author: book.author,
            category: book.category,
            stock: book.stock,
        })
    }

    fn get_book(&self, book_id: BookId) -> RepoResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOOK_SELECT_SQL} WHERE book_id = ?1;"))?;
        let mut rows = stmt.query([book_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_book_row(row)?));
        }

        Ok(None)
    }

    fn list_books(&self, query: &BookQuery) -> RepoResult<Vec<Book>> {
        let mut sql = format!("{BOOK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(filter) = query.contains.as_ref() {
            // Column name comes from a closed enum, never from input.
            sql.push_str(&format!(
                " AND {CONTAINS_FOLDED_FN}({}, ?)",
                filter.field.column()
            ));
            bind_values.push(Value::Text(filter.text.clone()));
        }

        sql.push_str(" ORDER BY book_id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut books = Vec::new();
        while let Some(row) = rows.next()? {
            books.push(parse_book_row(row)?);
        }

        Ok(books)
    }

    fn update_book_stock(&self, book_id: BookId, stock: u32) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE books SET stock = ?2 WHERE book_id = ?1;",
            params![book_id, i64::from(stock)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Book(book_id)));
        }

        Ok(())
    }

    fn delete_book(&mut self, book_id: BookId) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let target = EntityRef::Book(book_id);
        if !row_exists(&tx, "books", "book_id", book_id)? {
            return Err(RepoError::NotFound(target));
        }

        let open_records = count_open_borrows(&tx, "book_id", book_id)?;
        if open_records > 0 {
            return Err(RepoError::ActiveBorrows {
                target,
                open_records,
            });
        }

        tx.execute("DELETE FROM books WHERE book_id = ?1;", [book_id])?;
        tx.commit()?;
        Ok(())
    }

    fn list_borrows(&self, query: &BorrowQuery) -> RepoResult<Vec<BorrowRecord>> {
        let mut sql = format!("{BORROW_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(member_id) = query.member_id {
            sql.push_str(" AND member_id = ?");
            bind_values.push(Value::Integer(member_id));
        }

        if let Some(book_id) = query.book_id {
            sql.push_str(" AND book_id = ?");
            bind_values.push(Value::Integer(book_id));
        }

        if query.open_only {
            sql.push_str(" AND returned_at IS NULL");
        }

        if let Some(bound) = query.borrowed_before {
            sql.push_str(" AND borrowed_at < ?");
            bind_values.push(Value::Integer(bound));
        }

        sql.push_str(" ORDER BY borrowed_at ASC, record_id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(bind_values), parse_borrow_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn checkout(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        borrowed_at: i64,
    ) -> RepoResult<BorrowRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !row_exists(&tx, "members", "member_id", member_id)? {
            return Err(RepoError::NotFound(EntityRef::Member(member_id)));
        }

        let stock: Option<i64> = tx
            .query_row(
                "SELECT stock FROM books WHERE book_id = ?1;",
                [book_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stock) = stock else {
            return Err(RepoError::NotFound(EntityRef::Book(book_id)));
        };
        if stock < 1 {
            return Err(RepoError::OutOfStock(book_id));
        }

        tx.execute(
            "UPDATE books SET stock = stock - 1 WHERE book_id = ?1 AND stock > 0;",
            [book_id],
        )?;
        tx.execute(
            "INSERT INTO borrow_records (member_id, book_id, borrowed_at, returned_at)
             VALUES (?1, ?2, ?3, NULL);",
            params![member_id, book_id, borrowed_at],
        )?;
        let record_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(BorrowRecord {
            record_id,
            member_id,
            book_id,
            borrowed_at,
            returned_at: None,
        })
    }

    fn checkin(
        &mut self,
        member_id: MemberId,
        book_id: BookId,
        returned_at: i64,
    ) -> RepoResult<BorrowRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let open = {
            let mut stmt = tx.prepare(&format!(
                "{BORROW_SELECT_SQL}
                 WHERE member_id = ?1
                   AND book_id = ?2
                   AND returned_at IS NULL
                 ORDER BY record_id ASC;"
            ))?;
            let rows = stmt
                .query_map(params![member_id, book_id], parse_borrow_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut record = match open.len() {
            0 => {
                return Err(RepoError::NotFound(EntityRef::OpenBorrow {
                    member_id,
                    book_id,
                }))
            }
            1 => open.into_iter().next().ok_or_else(|| {
                RepoError::InvalidData("open borrow record vanished during checkin".to_string())
            })?,
            count => {
                return Err(RepoError::AmbiguousOpenBorrow {
                    member_id,
                    book_id,
                    open_records: count as u64,
                })
            }
        };

        tx.execute(
            "UPDATE borrow_records
             SET returned_at = ?2
             WHERE record_id = ?1
               AND returned_at IS NULL;",
            params![record.record_id, returned_at],
        )?;
        let changed = tx.execute(
            "UPDATE books SET stock = stock + 1 WHERE book_id = ?1 AND stock < ?2;",
            params![book_id, i64::from(MAX_STOCK)],
        )?;
        if changed == 0 {
            if row_exists(&tx, "books", "book_id", book_id)? {
                return Err(RepoError::StockAtCapacity(book_id));
            }
            return Err(RepoError::NotFound(EntityRef::Book(book_id)));
        }
        tx.commit()?;

        record.returned_at = Some(returned_at);
        Ok(record)
    }

    fn count_borrows_by_book(&self, limit: Option<u32>) -> RepoResult<Vec<BookBorrowCount>> {
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(
            "SELECT book_id, COUNT(*) AS borrow_count
             FROM borrow_records
             GROUP BY book_id
             ORDER BY borrow_count DESC, book_id ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([limit])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            counts.push(BookBorrowCount {
                book_id: row.get("book_id")?,
                count: parse_count(row)?,
            });
        }
        Ok(counts)
    }

    fn count_borrows_by_member(&self) -> RepoResult<Vec<MemberBorrowCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, COUNT(*) AS borrow_count
             FROM borrow_records
             GROUP BY member_id
             ORDER BY member_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            counts.push(MemberBorrowCount {
                member_id: row.get("member_id")?,
                count: parse_count(row)?,
            });
        }
        Ok(counts)
    }
}

fn parse_member_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        member_id: row.get("member_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
    })
}

fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let book_id: BookId = row.get("book_id")?;
    let stock_value: i64 = row.get("stock")?;
    let stock = u32::try_from(stock_value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid stock value `{stock_value}` in books.stock for book {book_id}"
        ))
    })?;

    Ok(Book {
        book_id,
        title: row.get("title")?,
        author: row.get("author")?,
        category: row.get("category")?,
        stock,
    })
}

fn parse_borrow_row(row: &Row<'_>) -> rusqlite::Result<BorrowRecord> {
    Ok(BorrowRecord {
        record_id: row.get::<_, RecordId>("record_id")?,
        member_id: row.get("member_id")?,
        book_id: row.get("book_id")?,
        borrowed_at: row.get("borrowed_at")?,
        returned_at: row.get("returned_at")?,
    })
}

fn parse_count(row: &Row<'_>) -> RepoResult<u64> {
    let value: i64 = row.get("borrow_count")?;
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative borrow count `{value}`")))
}

fn row_exists(conn: &Connection, table: &str, id_column: &str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {id_column} = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn count_open_borrows(conn: &Connection, id_column: &str, id: i64) -> RepoResult<u64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*)
             FROM borrow_records
             WHERE {id_column} = ?1
               AND returned_at IS NULL;"
        ),
        [id],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}
