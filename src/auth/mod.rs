//! Caller identity and ownership checks shared by the user and photo routes.

pub mod guard;
pub mod identity;
pub mod jwt;
pub mod password;

pub use guard::{authorize, ensure_owner, owner_from_path, Decision};
pub use identity::{resolve, CurrentUser};
pub use jwt::JwtKeys;
