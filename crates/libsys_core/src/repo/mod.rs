//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define table-scoped data access contracts for members, books and
//!   borrow records.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate operator input before SQL mutations.
//! - Multi-row writes (borrow, return, guarded deletes) commit as one unit
//!   or not at all.
//! - Repository APIs return semantic errors (`NotFound`, stock and borrow
//!   conflicts) in addition to DB transport errors.

pub mod library_repo;
