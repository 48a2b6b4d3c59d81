//! Permission scopes, role bindings, and the token pipeline that authenticates API calls.

pub mod cache;
pub mod credentials;
pub mod issuer;
pub mod roles;
pub mod scope;
pub mod sigv4;
pub mod token;

pub use cache::*;
pub use credentials::*;
pub use issuer::*;
pub use roles::*;
pub use scope::*;
pub use sigv4::SigningParams;
pub use token::{record::*, secret::*};
