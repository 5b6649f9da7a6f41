//! ミドルウェア

pub mod auth;

pub use auth::{
    AuthError, Authenticator, CallerIdentity, Claims, IdentitySource, TokenVerifier,
    require_identity,
};
