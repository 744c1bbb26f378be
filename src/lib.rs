//! Photo-sharing backend: users own photos, and only the owner may change
//! or remove what they own.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod photos;
pub mod state;
pub mod store;
pub mod users;

pub use app::{build_app, serve};
pub use config::{AppConfig, JwtConfig, ListScope};
pub use error::ApiError;
pub use state::AppState;
