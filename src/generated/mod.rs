// Code in this module is produced by build.rs from proto/auth.proto.
#[allow(clippy::all)]
pub mod auth;
