use thiserror::Error;
use uuid::Uuid;

use crate::models::User;

/// Principal
///
/// The attributes of a user that matter to the visibility policy. Borrowed from a
/// loaded `User` (course owner) or from the authenticated request identity (actor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal<'a> {
    pub id: Uuid,
    pub filiere: Option<&'a str>,
    pub annee: Option<&'a str>,
}

impl<'a> Principal<'a> {
    pub fn new(id: Uuid, filiere: Option<&'a str>, annee: Option<&'a str>) -> Self {
        Self { id, filiere, annee }
    }
}

impl User {
    pub fn principal(&self) -> Principal<'_> {
        Principal::new(self.id, self.filiere.as_deref(), self.annee.as_deref())
    }
}

/// Operation
///
/// What the actor is trying to do to a course or to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// View a course, its tasks or its resource list. Checks program and year.
    Read,
    /// Fetch a resource file. Checks program only.
    Download,
    Update,
    Delete,
    /// Add a task or a resource to a course.
    CreateChild,
}

impl Operation {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::Update | Operation::Delete | Operation::CreateChild
        )
    }
}

/// DenyReason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("Only the owner can modify this course")]
    NotOwner,
    #[error("You must set your program to view courses shared by other students")]
    NoProgram,
    #[error("This course belongs to another program")]
    ProgramMismatch,
    #[error("This course belongs to another year")]
    YearMismatch,
}

/// Decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

// Blank profile attributes count as unset.
fn attribute(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// can_access
///
/// Decides whether `actor` may perform `op` on an entity owned by `owner`.
///
/// The owner may do anything. Everyone else may never write, and may read only
/// when they share the owner's program (`filiere`). `Read` additionally requires the
/// same year (`annee`) when both sides have one; `Download` ignores the year.
pub fn can_access(actor: Principal<'_>, owner: Principal<'_>, op: Operation) -> Decision {
    if actor.id == owner.id {
        return Decision::Allow;
    }
    if op.is_write() {
        return Decision::Deny(DenyReason::NotOwner);
    }

    let Some(actor_program) = attribute(actor.filiere) else {
        return Decision::Deny(DenyReason::NoProgram);
    };
    if attribute(owner.filiere) != Some(actor_program) {
        return Decision::Deny(DenyReason::ProgramMismatch);
    }

    if op == Operation::Read {
        if let (Some(actor_year), Some(owner_year)) = (attribute(actor.annee), attribute(owner.annee)) {
            if actor_year != owner_year {
                return Decision::Deny(DenyReason::YearMismatch);
            }
        }
    }

    Decision::Allow
}

