use tracing::warn;

use crate::{error::ApiError, store::User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Allow iff the target is owned by `actor`. A missing owner is a denial.
pub fn authorize(actor: &User, target_owner: Option<i64>) -> Decision {
    match target_owner {
        Some(owner) if owner == actor.id => Decision::Allow,
        _ => Decision::Deny,
    }
}

/// Like [`authorize`], but turns a denial into `Forbidden`.
pub fn ensure_owner(actor: &User, target_owner: Option<i64>, action: &str) -> Result<(), ApiError> {
    match authorize(actor, target_owner) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            warn!(actor_id = actor.id, target_owner = ?target_owner, action, "ownership check denied");
            Err(ApiError::Forbidden(format!(
                "You do not have permission to {action}"
            )))
        }
    }
}

/// Reads an owner id from a path segment. Only the canonical decimal form of
/// an id is accepted: signs, leading zeros or whitespace yield `None`, which
/// the guard treats as a denial.
pub fn owner_from_path(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| id.to_string() == raw)
}
