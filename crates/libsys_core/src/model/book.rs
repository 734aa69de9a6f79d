//! Catalog book model and search field selector.

use crate::model::validation::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-assigned book identifier.
pub type BookId = i64;

/// Catalogued book with its available copy count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub category: String,
    /// Copies currently on the shelf. Open borrows are not counted.
    pub stock: u32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }
}

/// Cataloging input for a new book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: String,
    pub stock: u32,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        stock: u32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            category: category.into(),
            stock,
        }
    }

    /// Returns a trimmed copy, or the first invalid field.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: require_text("title", &self.title)?,
            author: require_text("author", &self.author)?,
            category: require_text("category", &self.category)?,
            stock: self.stock,
        })
    }
}

/// Text column a book search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookField {
    Title,
    Author,
    Category,
}

impl BookField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Category => "category",
        }
    }
}

impl Display for BookField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Error returned when parsing an unknown search field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBookField(pub String);

impl Display for UnknownBookField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown search field `{}`; expected title|author|category",
            self.0
        )
    }
}

impl std::error::Error for UnknownBookField {}

impl FromStr for BookField {
    type Err = UnknownBookField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            "category" => Ok(Self::Category),
            other => Err(UnknownBookField(other.to_string())),
        }
    }
}
