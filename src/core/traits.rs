//! Collaborator contracts consumed by the ledger
//!
//! The ledger does not own user profiles or the course catalog. Reads that
//! need them (exports) go through the [`Directory`] trait so any backing
//! store can be plugged in.

use crate::types::{CourseId, OwnerId};

/// Display profile of a wallet owner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn new(name: Option<&str>, email: Option<&str>) -> Self {
        UserProfile {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    /// Name if set and not blank, otherwise email, otherwise empty
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or_default()
    }
}

/// Lookup of owner profiles and course titles
pub trait Directory: Send + Sync {
    /// Profile of an owner, if known
    fn user(&self, owner_id: OwnerId) -> Option<UserProfile>;

    /// Title of a course, if known
    fn course_title(&self, course_id: CourseId) -> Option<String>;
}
