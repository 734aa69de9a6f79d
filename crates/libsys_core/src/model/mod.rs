//! Library catalog domain model.
//!
//! # Responsibility
//! - Define the member/book/borrow-record shapes shared by repository and
//!   service layers.
//! - Own input validation for records created or edited by operators.
//!
//! # Invariants
//! - Identifiers are assigned by the store and never reused.
//! - Book stock is non-negative by construction (`u32`).
//! - A borrow record is Open until its return timestamp is set, then Closed
//!   forever.

pub mod book;
pub mod borrow;
pub mod member;
pub mod validation;
