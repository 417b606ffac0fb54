//! Routing module
//!
//! Maps a raw request target onto a canonical pathname inside the served root:
//! - Path normalization (query stripping, dot-segment resolution, root clamping)
//! - Exact-match pathname aliases

mod alias;
mod normalize;

pub use alias::Aliases;
pub use normalize::{join_under_root, normalize};

/// Normalize a raw request target and apply the alias table
pub fn resolve(raw: &str, aliases: &Aliases) -> String {
    let canonical = normalize(raw);
    aliases.apply(&canonical).to_string()
}
