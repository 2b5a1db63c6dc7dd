pub mod adapters;
pub mod domain;
pub mod password;
pub mod ports;
pub mod service;
pub mod token;

pub use domain::{App, AuthError, AuthResult, User};
pub use ports::AuthenticationPort;
pub use service::AuthService;
