pub mod auth;
pub mod config;
pub mod generated;

pub use auth::{AuthError, AuthResult, AuthService, AuthenticationPort};
pub use config::Settings;
