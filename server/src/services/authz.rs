//! Single authorization predicate shared by every mutating entry point.

use crate::auth::Principal;
use crate::models::Event;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Update, delete or open the edit form of an event.
    Manage,
    /// Book a spot at an event.
    Book,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    NotOwner,
    SelfBooking,
}

pub fn authorize(principal: Option<&Principal>, action: Action, event: &Event) -> Decision {
    let Some(principal) = principal else {
        return Decision::Unauthenticated;
    };

    let is_owner = principal.email == event.creator_email;
    match action {
        Action::Manage if is_owner => Decision::Allow,
        Action::Manage => Decision::NotOwner,
        Action::Book if is_owner => Decision::SelfBooking,
        Action::Book => Decision::Allow,
    }
}

/// Fails with [`AppError::AuthError`] for anonymous callers.
pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, AppError> {
    principal.ok_or_else(|| AppError::AuthError("You must be signed in".to_string()))
}

impl Decision {
    pub fn ensure(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Unauthenticated => {
                Err(AppError::AuthError("You must be signed in".to_string()))
            }
            Decision::NotOwner => Err(AppError::Forbidden(
                "Only the creator of this event can change it".to_string(),
            )),
            Decision::SelfBooking => Err(AppError::SelfBooking(
                "You cannot book your own event".to_string(),
            )),
        }
    }
}
