//! Application-defined SQL functions registered on every catalog connection.
//!
//! # Invariants
//! - `contains_folded(haystack, needle)` is true when `needle` occurs in
//!   `haystack` after Unicode lowercasing of both sides. Pattern characters
//!   have no special meaning; an empty needle matches everything.
//! - Either argument being NULL yields false.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Name of the case-insensitive substring function used by book search.
pub const CONTAINS_FOLDED_FN: &str = "contains_folded";

/// Registers catalog SQL functions on `conn`.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CONTAINS_FOLDED_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<Option<String>>(0)?;
            let needle = ctx.get::<Option<String>>(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => contains_folded(&haystack, &needle),
                _ => false,
            })
        },
    )
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
