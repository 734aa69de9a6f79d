//! Library member model.

use crate::model::validation::{normalize_email, require_text, ValidationError};
use serde::{Deserialize, Serialize};

/// Store-assigned member identifier.
pub type MemberId = i64;

/// Registered library member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub name: String,
    pub email: String,
}

/// Registration input for a new member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub email: String,
}

impl NewMember {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Returns a trimmed copy, or the first invalid field.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: require_text("name", &self.name)?,
            email: normalize_email(&self.email)?,
        })
    }
}
