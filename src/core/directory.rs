//! In-memory [`Directory`] implementation

use dashmap::DashMap;

use super::traits::{Directory, UserProfile};
use crate::types::{CourseId, OwnerId};

/// Directory backed by concurrent maps
///
/// Used by the replay tool and tests; production deployments plug in the
/// platform's user and course services instead.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<OwnerId, UserProfile>,
    courses: DashMap<CourseId, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, owner_id: OwnerId, profile: UserProfile) {
        self.users.insert(owner_id, profile);
    }

    pub fn add_course(&self, course_id: CourseId, title: impl Into<String>) {
        self.courses.insert(course_id, title.into());
    }
}

impl Directory for InMemoryDirectory {
    fn user(&self, owner_id: OwnerId) -> Option<UserProfile> {
        self.users.get(&owner_id).map(|profile| profile.value().clone())
    }

    fn course_title(&self, course_id: CourseId) -> Option<String> {
        self.courses.get(&course_id).map(|title| title.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let directory = InMemoryDirectory::new();
        directory.add_user(1, UserProfile::new(Some("Ada"), None));
        directory.add_course(10, "Rust 101");

        assert_eq!(directory.user(1).unwrap().display_name(), "Ada");
        assert!(directory.user(2).is_none());
        assert_eq!(directory.course_title(10).as_deref(), Some("Rust 101"));
        assert!(directory.course_title(11).is_none());
    }
}
