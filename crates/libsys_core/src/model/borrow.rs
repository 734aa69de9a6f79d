//! Borrow record model and its two-state lifecycle.

use crate::model::book::BookId;
use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};

/// Store-assigned borrow record identifier.
pub type RecordId = i64;

/// One day in epoch milliseconds.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Lifecycle state of a borrow record. `Open -> Closed` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowState {
    /// Book is still out.
    Open,
    /// Book was returned.
    Closed,
}

/// A member holding (or having held) one copy of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRecord {
    pub record_id: RecordId,
    pub member_id: MemberId,
    pub book_id: BookId,
    /// Unix epoch milliseconds.
    pub borrowed_at: i64,
    /// Unix epoch milliseconds. `None` while the book is out.
    pub returned_at: Option<i64>,
}

impl BorrowRecord {
    pub fn state(&self) -> BorrowState {
        match self.returned_at {
            None => BorrowState::Open,
            Some(_) => BorrowState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == BorrowState::Open
    }

    /// Whether this record is still open and was borrowed strictly before
    /// `now_ms - threshold_days`.
    pub fn is_overdue(&self, now_ms: i64, threshold_days: u32) -> bool {
        self.is_open() && self.borrowed_at < overdue_cutoff(now_ms, threshold_days)
    }
}

/// Borrow timestamp bound below which open records count as overdue.
pub fn overdue_cutoff(now_ms: i64, threshold_days: u32) -> i64 {
    now_ms.saturating_sub(i64::from(threshold_days).saturating_mul(DAY_MS))
}

/// Number of borrow records grouped by book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowCount {
    pub book_id: BookId,
    pub count: u64,
}

/// Number of borrow records grouped by member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBorrowCount {
    pub member_id: MemberId,
    pub count: u64,
}
