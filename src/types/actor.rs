//! Actor and role types supplied by the identity collaborator
//!
//! Authentication happens outside the ledger. Every operation receives the
//! resulting [`Actor`] and checks the role it needs before touching storage.

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::wallet::OwnerId;

/// Role of the caller, as established by the session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// No authenticated session
    Anonymous,
    Student,
    Instructor,
    /// Elevated role: approvals, adjustments, bulk, statistics, export
    Admin,
}

/// The caller of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: OwnerId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: OwnerId, role: Role) -> Self {
        Actor { id, role }
    }

    pub fn anonymous() -> Self {
        Actor {
            id: 0,
            role: Role::Anonymous,
        }
    }

    pub fn admin(id: OwnerId) -> Self {
        Actor::new(id, Role::Admin)
    }

    pub fn student(id: OwnerId) -> Self {
        Actor::new(id, Role::Student)
    }

    pub fn is_elevated(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require any authenticated session
    pub fn require_authenticated(&self, operation: &str) -> Result<(), LedgerError> {
        match self.role {
            Role::Anonymous => Err(LedgerError::unauthorized(operation)),
            _ => Ok(()),
        }
    }

    /// Require the elevated role
    pub fn require_elevated(&self, operation: &str) -> Result<(), LedgerError> {
        self.require_authenticated(operation)?;
        if self.is_elevated() {
            Ok(())
        } else {
            Err(LedgerError::forbidden(self.id, operation))
        }
    }

    /// Require that the actor is `owner` or holds the elevated role
    pub fn require_owner_or_elevated(
        &self,
        owner: OwnerId,
        operation: &str,
    ) -> Result<(), LedgerError> {
        self.require_authenticated(operation)?;
        if self.is_elevated() || self.id == owner {
            Ok(())
        } else {
            Err(LedgerError::forbidden(self.id, operation))
        }
    }
}
