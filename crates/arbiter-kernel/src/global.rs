//! Optional process-wide authority for hosts that want one.

use std::sync::OnceLock;

use crate::Authority;

static AUTHORITY: OnceLock<Authority> = OnceLock::new();

/// Installs `authority` once; a second install hands its argument back.
pub fn install(authority: Authority) -> Result<(), Authority> {
    AUTHORITY.set(authority)
}

pub fn get() -> Option<&'static Authority> {
    AUTHORITY.get()
}
