//! Domain model for subjects and the school roster around them.
//!
//! # Responsibility
//! - Define canonical records used by registry and cascade logic.
//! - Own input validation for subject batches.
//!
//! # Invariants
//! - Every record is identified by a stable UUID v4.
//! - Teacher and student references to subjects are non-owning; nothing in
//!   storage cascades them.

pub mod roster;
pub mod subject;

use std::fmt::{Display, Formatter};

/// Record families that can be looked up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Subject,
    Class,
    School,
    Teacher,
    Student,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Class => "class",
            Self::School => "school",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
