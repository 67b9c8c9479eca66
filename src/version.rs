// Build metadata baked in from Cargo.toml

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// One-line package description.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
