//! Token material: redacted secrets, issued tokens, and cached entries.

pub mod record;
pub mod secret;
